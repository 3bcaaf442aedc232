//! Forward kinematics of one leg in the torso frame.

use crate::{math::Vec3, model::LegParams};

/// Joint and foot positions of a leg plus the foot Jacobian columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegFrame {
    pub hip: Vec3,
    pub knee: Vec3,
    pub foot: Vec3,
    /// d(foot) / d(hip angle)
    pub foot_dhip: Vec3,
    /// d(foot) / d(ankle angle)
    pub foot_dankle: Vec3,
}

#[must_use]
pub fn leg_frame(leg: &LegParams, hip_angle: f32, ankle_angle: f32) -> LegFrame {
    let hip = Vec3::new(leg.mount_angle.cos(), leg.mount_angle.sin(), 0.0) * leg.hip_offset;
    let yaw = leg.mount_angle + hip_angle;
    let (s0, c0) = yaw.sin_cos();
    let knee = hip + Vec3::new(c0, s0, 0.0) * leg.thigh_length;
    let (sa, ca) = ankle_angle.sin_cos();
    let foot = knee + Vec3::new(ca * c0, ca * s0, -sa) * leg.shin_length;
    let reach = foot - hip;
    LegFrame {
        hip,
        knee,
        foot,
        foot_dhip: Vec3::new(-reach.y, reach.x, 0.0),
        foot_dankle: Vec3::new(-sa * c0, -sa * s0, -ca) * leg.shin_length,
    }
}
