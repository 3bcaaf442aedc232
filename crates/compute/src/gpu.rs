//! GPU implementation of [`ComputeBackend`] built on [`wgpu`].
//!
//! Each kernel's WGSL is compiled the first time it is dispatched and the
//! pipeline is cached by kernel name, so repeated dispatches of the same
//! kernel with same-shaped buffers never recompile. Initialization fails with
//! [`ComputeError::BackendUnavailable`] if no compatible adapter is found.

use crate::{validate_binds, Access, BufferView, ComputeBackend, ComputeError, Kernel};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use wgpu::util::DeviceExt;

struct CachedPipeline {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    // Mutex for interior mutability with &self in dispatch
    pipelines: Mutex<HashMap<&'static str, Arc<CachedPipeline>>>,
}

impl GpuBackend {
    /// Opens the default adapter selected by `WGPU_BACKEND` / `WGPU_ADAPTER_NAME`
    /// or the platform default.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::BackendUnavailable`] when no adapter or device
    /// can be created.
    pub fn try_new() -> Result<Self, ComputeError> {
        let backends = wgpu::util::backend_bits_from_env().unwrap_or_else(wgpu::Backends::all);
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let adapter = pollster::block_on(wgpu::util::initialize_adapter_from_env_or_default(
            &instance,
            None,
        ))
        .ok_or(ComputeError::BackendUnavailable)?;
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("compute-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))
        .map_err(|_| ComputeError::BackendUnavailable)?;

        tracing::info!(adapter = ?adapter.get_info().name, "wgpu compute device ready");

        Ok(Self {
            device,
            queue,
            pipelines: Mutex::new(HashMap::new()),
        })
    }

    fn pipeline(&self, kernel: &Kernel) -> Arc<CachedPipeline> {
        let mut cache = self.pipelines.lock();
        if let Some(cached) = cache.get(kernel.name) {
            return Arc::clone(cached);
        }

        tracing::debug!(kernel = kernel.name, "compiling compute pipeline");
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(kernel.name),
                source: wgpu::ShaderSource::Wgsl(kernel.wgsl.into()),
            });

        let entries: Vec<wgpu::BindGroupLayoutEntry> = kernel
            .bindings
            .iter()
            .enumerate()
            .map(|(i, access)| wgpu::BindGroupLayoutEntry {
                binding: binding_index(i),
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage {
                        read_only: *access == Access::ReadOnly,
                    },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();

        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(kernel.name),
                entries: &entries,
            });

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(kernel.name),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });

        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(kernel.name),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: kernel.entry_point,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            });

        let cached = Arc::new(CachedPipeline { pipeline, layout });
        cache.insert(kernel.name, Arc::clone(&cached));
        cached
    }
}

fn binding_index(i: usize) -> u32 {
    u32::try_from(i).unwrap_or(u32::MAX)
}

impl ComputeBackend for GpuBackend {
    fn dispatch(
        &self,
        kernel: &Kernel,
        binds: &[BufferView],
        workgroups: [u32; 3],
    ) -> Result<Vec<Vec<u8>>, ComputeError> {
        validate_binds(kernel, binds)?;
        let cached = self.pipeline(kernel);

        let buffers: Vec<wgpu::Buffer> = binds
            .iter()
            .enumerate()
            .map(|(i, view)| {
                self.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(kernel.name),
                        // zero-sized storage bindings are not allowed
                        contents: if view.data.is_empty() { &[0u8; 4] } else { &view.data },
                        usage: match kernel.bindings[i] {
                            Access::ReadOnly => wgpu::BufferUsages::STORAGE,
                            Access::ReadWrite => {
                                wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC
                            }
                        },
                    })
            })
            .collect();

        let entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(i, buffer)| wgpu::BindGroupEntry {
                binding: binding_index(i),
                resource: buffer.as_entire_binding(),
            })
            .collect();

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel.name),
            layout: &cached.layout,
            entries: &entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(kernel.name) });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.name),
                timestamp_writes: None,
            });
            pass.set_pipeline(&cached.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(workgroups[0], workgroups[1], workgroups[2]);
        }

        let mut staging = Vec::with_capacity(kernel.output_count());
        for (i, view) in binds.iter().enumerate() {
            if kernel.bindings[i] != Access::ReadWrite {
                continue;
            }
            let size = view.data.len() as u64;
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("staging"),
                size: size.max(4),
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            encoder.copy_buffer_to_buffer(&buffers[i], 0, &buffer, 0, size.max(4));
            staging.push((buffer, view.data.len()));
        }

        self.queue.submit(Some(encoder.finish()));

        let mut results = Vec::with_capacity(staging.len());
        for (buffer, len) in &staging {
            let slice = buffer.slice(..);
            let (tx, rx) = std::sync::mpsc::channel();
            slice.map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });
            self.device.poll(wgpu::Maintain::Wait);
            rx.recv()
                .map_err(|e| ComputeError::Device(e.to_string()))?
                .map_err(|e| ComputeError::Device(e.to_string()))?;
            let bytes = slice.get_mapped_range()[..*len].to_vec();
            buffer.unmap();
            results.push(bytes);
        }

        Ok(results)
    }

    fn name(&self) -> &'static str {
        "wgpu"
    }
}
