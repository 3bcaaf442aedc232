use crate::math::{Quat, Vec3};

/// Entries of `qpos` before the first joint angle: position and orientation.
pub const QPOS_ROOT: usize = 7;
/// Entries of `qvel` before the first joint rate: linear and angular velocity.
pub const QVEL_ROOT: usize = 6;

/// Dynamic state of one simulation instance, exclusively owned.
#[derive(Debug, Clone, PartialEq)]
pub struct SimState {
    /// `[x, y, z, qw, qx, qy, qz, hip_0, ankle_0, ...]`
    pub qpos: Vec<f32>,
    /// `[vx, vy, vz]` in the world frame, `[wx, wy, wz]` in the torso frame,
    /// then joint rates.
    pub qvel: Vec<f32>,
    /// Last applied control, already clamped to the actuator ranges.
    pub ctrl: Vec<f32>,
    /// Normal force per contact slot: one per foot, then the torso.
    pub contact: Vec<f32>,
    pub time: f32,
}

/// Read access to one simulation instance, owned or borrowed from a batch.
pub trait StateView {
    fn qpos(&self) -> &[f32];
    fn qvel(&self) -> &[f32];
    fn ctrl(&self) -> &[f32];
    fn contact(&self) -> &[f32];
    fn time(&self) -> f32;

    fn torso_position(&self) -> Vec3 {
        Vec3::from_slice(&self.qpos()[0..3])
    }

    fn torso_orientation(&self) -> Quat {
        Quat::from_slice(&self.qpos()[3..QPOS_ROOT])
    }

    /// Torso linear velocity in the world frame.
    fn linear_velocity(&self) -> Vec3 {
        Vec3::from_slice(&self.qvel()[0..3])
    }

    /// Torso angular velocity in the torso frame.
    fn angular_velocity(&self) -> Vec3 {
        Vec3::from_slice(&self.qvel()[3..QVEL_ROOT])
    }

    fn joint_positions(&self) -> &[f32] {
        &self.qpos()[QPOS_ROOT..]
    }

    fn joint_velocities(&self) -> &[f32] {
        &self.qvel()[QVEL_ROOT..]
    }

    /// `false` once the integration has produced NaN or infinity.
    fn is_finite(&self) -> bool {
        self.qpos().iter().chain(self.qvel()).all(|v| v.is_finite())
    }
}

impl StateView for SimState {
    fn qpos(&self) -> &[f32] {
        &self.qpos
    }

    fn qvel(&self) -> &[f32] {
        &self.qvel
    }

    fn ctrl(&self) -> &[f32] {
        &self.ctrl
    }

    fn contact(&self) -> &[f32] {
        &self.contact
    }

    fn time(&self) -> f32 {
        self.time
    }
}

impl<T: StateView + ?Sized> StateView for &T {
    fn qpos(&self) -> &[f32] {
        (**self).qpos()
    }

    fn qvel(&self) -> &[f32] {
        (**self).qvel()
    }

    fn ctrl(&self) -> &[f32] {
        (**self).ctrl()
    }

    fn contact(&self) -> &[f32] {
        (**self).contact()
    }

    fn time(&self) -> f32 {
        (**self).time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::two_leg_model;

    #[test]
    fn accessors_split_root_and_joints() {
        let mut state = two_leg_model().initial_state();
        state.qvel[0] = 1.5;
        state.qvel[5] = -0.5;
        assert_eq!(state.torso_position(), Vec3::new(0.0, 0.0, 0.6));
        assert_eq!(state.torso_orientation(), Quat::IDENTITY);
        assert_eq!(state.linear_velocity().x, 1.5);
        assert_eq!(state.angular_velocity().z, -0.5);
        assert_eq!(state.joint_positions(), &[0.0, 0.6, 0.0, 0.6]);
        assert_eq!(state.joint_velocities().len(), 4);
    }

    #[test]
    fn nan_anywhere_is_not_finite() {
        let mut state = two_leg_model().initial_state();
        assert!(state.is_finite());
        state.qvel[7] = f32::NAN;
        assert!(!state.is_finite());
    }
}
