//! Chase camera for the viewer.
//!
//! The world is z-up. The camera keeps a fixed offset from the torso and
//! looks at it, so the robot stays centred while it walks.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Uniform buffer representation of the camera matrices used by the shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    /// Combined view projection matrix used by the vertex shader.
    pub view_proj: [[f32; 4]; 4],
}

/// Perspective camera that follows a target point.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    /// Eye position relative to the target.
    pub offset: Vec3,
    pub aspect: f32,
    /// Field of view in radians.
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        let offset = Vec3::new(-2.5, -2.5, 1.8);
        Self {
            eye: offset,
            target: Vec3::ZERO,
            offset,
            aspect: aspect(width, height),
            fovy: 45.0f32.to_radians(),
            znear: 0.05,
            zfar: 100.0,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = aspect(width, height);
    }

    /// Re-centres on `point`. Only the planar position is tracked so the
    /// view does not bob with the torso.
    pub fn follow(&mut self, point: Vec3) {
        self.target = Vec3::new(point.x, point.y, 0.3);
        self.eye = self.target + self.offset;
    }

    pub fn build_view_projection_matrix(&self) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye, self.target, Vec3::Z);
        let proj = Mat4::perspective_rh(self.fovy, self.aspect, self.znear, self.zfar);
        proj * view
    }

    pub fn uniform(&self) -> CameraUniform {
        CameraUniform {
            view_proj: self.build_view_projection_matrix().to_cols_array_2d(),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn aspect(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}
