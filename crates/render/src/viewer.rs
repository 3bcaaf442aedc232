//! Window viewer driven by the stepping loop.
//!
//! There is no render loop of its own: every [`Viewer::render`] call pumps the
//! pending window events without waiting, then draws the snapshot unless the
//! previous frame was presented less than a frame interval ago.

use crate::{camera::Camera, pipeline, scene};
use anyhow::{Context, Result};
use physics::{Snapshot, Viewer, ViewerStatus};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use wgpu::util::DeviceExt;
use winit::{
    dpi::{LogicalSize, PhysicalSize},
    event::{Event, WindowEvent},
    event_loop::EventLoop,
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowBuilder},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Frames arriving faster than this are dropped.
    pub max_fps: f32,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            title: "Arena".into(),
            width: 1280,
            height: 720,
            max_fps: 60.0,
        }
    }
}

/// Decides which frames are drawn.
#[derive(Debug, Clone)]
pub struct FrameClock {
    interval: Duration,
    last: Option<Instant>,
}

impl FrameClock {
    /// A non-positive rate disables throttling.
    pub fn new(max_fps: f32) -> Self {
        let interval = if max_fps > 0.0 {
            Duration::from_secs_f32(1.0 / max_fps)
        } else {
            Duration::ZERO
        };
        Self { interval, last: None }
    }

    /// Claims the frame at `now` if the interval since the last claimed
    /// frame has passed.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// `winit` window with a `wgpu` line renderer.
pub struct WindowViewer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    camera: Camera,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    vertex_buffer: wgpu::Buffer,
    clock: FrameClock,
    window: Arc<Window>,
    event_loop: EventLoop<()>,
}

impl WindowViewer {
    /// Opens the window and initialises the GPU.
    ///
    /// # Errors
    ///
    /// Fails when there is no display, no compatible adapter, or the device
    /// cannot be created.
    pub fn new(options: &ViewerOptions) -> Result<Self> {
        let event_loop = EventLoop::new().context("failed to create event loop")?;
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(&options.title)
                .with_inner_size(LogicalSize::new(options.width, options.height))
                .build(&event_loop)
                .context("failed to create window")?,
        );

        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(Arc::clone(&window))
            .context("failed to create surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to get adapter")?;
        tracing::info!(adapter = ?adapter.get_info().name, "viewer adapter");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("viewer device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
            },
            None,
        ))
        .context("failed to request device")?;

        let size = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(wgpu::TextureFormat::is_srgb)
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoNoVsync,
            alpha_mode: caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let camera = Camera::new(config.width, config.height);
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camera buffer"),
            contents: bytemuck::bytes_of(&camera.uniform()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let layout = pipeline::create_bind_group_layout(&device);
        let camera_bind_group = pipeline::create_bind_group(&device, &layout, &camera_buffer);
        let pipeline = pipeline::create_render_pipeline(&device, &layout, format);
        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vertices"),
            size: 64 * 1024,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            camera,
            camera_buffer,
            camera_bind_group,
            vertex_buffer,
            clock: FrameClock::new(options.max_fps),
            window,
            event_loop,
        })
    }

    #[must_use]
    pub fn window(&self) -> &Window {
        &self.window
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width > 0 && size.height > 0 {
            self.config.width = size.width;
            self.config.height = size.height;
            self.camera.resize(size.width, size.height);
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Drains pending window events. Returns `false` once the window closed.
    fn pump(&mut self) -> bool {
        let mut closed = false;
        let mut resized = None;
        let status = self.event_loop.pump_events(Some(Duration::ZERO), |event, elwt| {
            if let Event::WindowEvent { event, .. } = event {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                        closed = true;
                        elwt.exit();
                    }
                    WindowEvent::Resized(size) => resized = Some(size),
                    _ => {}
                }
            }
        });
        if let Some(size) = resized {
            self.resize(size);
        }
        !closed && !matches!(status, PumpStatus::Exit(_))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn draw(&mut self, snapshot: &Snapshot) -> Result<(), wgpu::SurfaceError> {
        let vertices = scene::build_lines(snapshot);
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        if self.vertex_buffer.size() < bytes.len() as u64 {
            self.vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("vertices"),
                contents: bytes,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            });
        } else {
            self.queue.write_buffer(&self.vertex_buffer, 0, bytes);
        }

        self.camera
            .follow(glam::Vec3::from_array(snapshot.torso_center.to_array()));
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&self.camera.uniform()));

        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("enc") });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("rpass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.05,
                            g: 0.05,
                            b: 0.07,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.camera_bind_group, &[]);
            rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            rpass.draw(0..vertices.len() as u32, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        output.present();
        Ok(())
    }
}

impl Viewer for WindowViewer {
    fn render(&mut self, snapshot: &Snapshot) -> ViewerStatus {
        if !self.pump() {
            return ViewerStatus::Closed;
        }
        if !self.clock.ready(Instant::now()) {
            return ViewerStatus::Skipped;
        }
        match self.draw(snapshot) {
            Ok(()) => ViewerStatus::Presented,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                ViewerStatus::Skipped
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::warn!("surface timed out, dropping frame");
                ViewerStatus::Skipped
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                tracing::error!("surface out of memory, closing viewer");
                ViewerStatus::Closed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_inside_the_interval_are_dropped() {
        let mut clock = FrameClock::new(50.0);
        let start = Instant::now();
        assert!(clock.ready(start));
        assert!(!clock.ready(start + Duration::from_millis(5)));
        assert!(!clock.ready(start + Duration::from_millis(19)));
        assert!(clock.ready(start + Duration::from_millis(21)));
        assert!(!clock.ready(start + Duration::from_millis(30)));
    }

    #[test]
    fn zero_rate_draws_everything() {
        let mut clock = FrameClock::new(0.0);
        let now = Instant::now();
        assert!(clock.ready(now));
        assert!(clock.ready(now));
    }
}
