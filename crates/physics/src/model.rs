//! Immutable description of a legged robot and its compact numeric form.
//!
//! [`Model`] is what the loader produces and what environments share. At
//! construction it is flattened into [`ModelParams`]: one Pod header followed
//! by one Pod record per leg. The dynamics and the device kernel read only
//! this flat form; the offsets in `shaders/integrate_legged.wgsl` mirror the
//! field order of [`ParamsHeader`], [`LegParams`] and [`JointParams`].

use crate::{
    config::PhysicsConfig,
    state::{SimState, QPOS_ROOT, QVEL_ROOT},
};
use compute::{BufferView, ComputeError};

/// Legs the device kernel has scratch space for.
pub const MAX_LEGS: usize = 8;

/// Rigid torso, modelled as a sphere carrying the lumped mass of the robot.
#[derive(Debug, Clone, PartialEq)]
pub struct Torso {
    pub mass: f32,
    pub radius: f32,
    /// Diagonal of the inertia tensor in the torso frame.
    pub inertia: [f32; 3],
    /// Initial height of the torso centre.
    pub spawn_height: f32,
}

/// A hinge joint and the motor driving it.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub range: [f32; 2],
    pub init: f32,
    pub armature: f32,
    pub damping: f32,
    /// Torque per unit of control.
    pub gear: f32,
    pub ctrl_range: [f32; 2],
}

/// Two-segment leg: a hip rotating about the torso z axis and an ankle
/// pitching the shin down from the thigh.
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub name: String,
    /// Direction of the leg in the torso frame, radians from +x.
    pub mount_angle: f32,
    /// Distance from the torso centre to the hip.
    pub hip_offset: f32,
    pub thigh_length: f32,
    pub shin_length: f32,
    pub foot_radius: f32,
    /// Segment mass, lumped into the torso.
    pub mass: f32,
    pub hip: Joint,
    pub ankle: Joint,
}

#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    torso: Torso,
    legs: Vec<Leg>,
    config: PhysicsConfig,
    params: ModelParams,
}

impl Model {
    /// Builds the model and derives its numeric parameters.
    ///
    /// The description is assumed to be validated; the loader in the
    /// `phenotype` crate rejects malformed scenes before getting here.
    #[must_use]
    pub fn new(name: impl Into<String>, torso: Torso, legs: Vec<Leg>, config: PhysicsConfig) -> Self {
        let params = ModelParams::build(&torso, &legs, &config);
        tracing::debug!(legs = legs.len(), timestep = config.timestep, substeps = config.substeps, "model built");
        Self {
            name: name.into(),
            torso,
            legs,
            config,
            params,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn torso(&self) -> &Torso {
        &self.torso
    }

    #[must_use]
    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    #[must_use]
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    #[must_use]
    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Length of `qpos`.
    #[must_use]
    pub fn nq(&self) -> usize {
        QPOS_ROOT + 2 * self.legs.len()
    }

    /// Length of `qvel`.
    #[must_use]
    pub fn nv(&self) -> usize {
        QVEL_ROOT + 2 * self.legs.len()
    }

    /// Number of actuators.
    #[must_use]
    pub fn nu(&self) -> usize {
        2 * self.legs.len()
    }

    /// Number of contact slots: one per foot plus the torso.
    #[must_use]
    pub fn ncontact(&self) -> usize {
        self.legs.len() + 1
    }

    #[must_use]
    pub fn total_mass(&self) -> f32 {
        self.params.header.total_mass
    }

    /// Iterates actuators in control order: hip then ankle of every leg.
    pub fn joints(&self) -> impl Iterator<Item = &Joint> {
        self.legs.iter().flat_map(|leg| [&leg.hip, &leg.ankle])
    }

    /// Control bounds per actuator, in control order.
    #[must_use]
    pub fn ctrl_bounds(&self) -> (Vec<f32>, Vec<f32>) {
        self.joints().map(|j| (j.ctrl_range[0], j.ctrl_range[1])).unzip()
    }

    /// Resting pose at the spawn height with every joint at its initial angle.
    #[must_use]
    pub fn initial_state(&self) -> SimState {
        let mut qpos = vec![0.0, 0.0, self.torso.spawn_height, 1.0, 0.0, 0.0, 0.0];
        qpos.extend(self.joints().map(|j| j.init));
        SimState {
            qpos,
            qvel: vec![0.0; self.nv()],
            ctrl: vec![0.0; self.nu()],
            contact: vec![0.0; self.ncontact()],
            time: 0.0,
        }
    }
}

/// Global part of [`ModelParams`]. Counts are stored as `f32` so the whole
/// buffer is a single `array<f32>` on the device.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParamsHeader {
    pub num_legs: f32,
    pub timestep: f32,
    pub substeps: f32,
    pub gravity: f32,
    pub total_mass: f32,
    pub torso_radius: f32,
    pub inertia: [f32; 3],
    pub contact_stiffness: f32,
    pub contact_damping: f32,
    pub friction: f32,
    pub friction_smoothing: f32,
    pub limit_stiffness: f32,
    pub limit_damping: f32,
    pub _pad: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct JointParams {
    pub lower: f32,
    pub upper: f32,
    pub gear: f32,
    pub armature: f32,
    pub damping: f32,
    pub ctrl_lower: f32,
    pub ctrl_upper: f32,
    pub _pad: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LegParams {
    pub mount_angle: f32,
    pub hip_offset: f32,
    pub thigh_length: f32,
    pub shin_length: f32,
    pub foot_radius: f32,
    pub _pad: [f32; 3],
    pub hip: JointParams,
    pub ankle: JointParams,
}

pub const HEADER_FLOATS: usize = std::mem::size_of::<ParamsHeader>() / 4;
pub const LEG_FLOATS: usize = std::mem::size_of::<LegParams>() / 4;

impl From<&Joint> for JointParams {
    fn from(j: &Joint) -> Self {
        Self {
            lower: j.range[0],
            upper: j.range[1],
            gear: j.gear,
            armature: j.armature,
            damping: j.damping,
            ctrl_lower: j.ctrl_range[0],
            ctrl_upper: j.ctrl_range[1],
            _pad: 0.0,
        }
    }
}

impl From<&Leg> for LegParams {
    fn from(leg: &Leg) -> Self {
        Self {
            mount_angle: leg.mount_angle,
            hip_offset: leg.hip_offset,
            thigh_length: leg.thigh_length,
            shin_length: leg.shin_length,
            foot_radius: leg.foot_radius,
            _pad: [0.0; 3],
            hip: (&leg.hip).into(),
            ankle: (&leg.ankle).into(),
        }
    }
}

/// Flat numeric form of a [`Model`].
#[derive(Debug, Clone)]
pub struct ModelParams {
    pub header: ParamsHeader,
    pub legs: Vec<LegParams>,
}

impl ModelParams {
    #[allow(clippy::cast_precision_loss)]
    fn build(torso: &Torso, legs: &[Leg], config: &PhysicsConfig) -> Self {
        let total_mass = torso.mass + legs.iter().map(|l| l.mass).sum::<f32>();
        let header = ParamsHeader {
            num_legs: legs.len() as f32,
            timestep: config.timestep,
            substeps: config.substeps as f32,
            gravity: config.gravity,
            total_mass,
            torso_radius: torso.radius,
            inertia: torso.inertia,
            contact_stiffness: config.contact.stiffness,
            contact_damping: config.contact.damping,
            friction: config.contact.friction,
            friction_smoothing: config.contact.friction_smoothing,
            limit_stiffness: config.limit.stiffness,
            limit_damping: config.limit.damping,
            _pad: 0.0,
        };
        Self {
            header,
            legs: legs.iter().map(LegParams::from).collect(),
        }
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn substeps(&self) -> u32 {
        self.header.substeps as u32
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = bytemuck::bytes_of(&self.header).to_vec();
        bytes.extend_from_slice(bytemuck::cast_slice(&self.legs));
        bytes
    }

    /// Wraps the flat parameters as a one dimensional `f32` buffer.
    #[must_use]
    pub fn to_buffer(&self) -> BufferView {
        let bytes = self.to_bytes();
        let len = bytes.len() / 4;
        BufferView::new(bytes.into(), vec![len], 4)
    }

    /// Parses the layout written by [`ModelParams::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::ShapeMismatch`] if the buffer is too short or
    /// the leg count in the header disagrees with the number of leg records.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ComputeError> {
        let header_len = std::mem::size_of::<ParamsHeader>();
        let leg_len = std::mem::size_of::<LegParams>();
        if bytes.len() < header_len || (bytes.len() - header_len) % leg_len != 0 {
            return Err(ComputeError::ShapeMismatch("model parameter buffer has a partial record"));
        }
        let header: ParamsHeader = bytemuck::pod_read_unaligned(&bytes[..header_len]);
        let legs: Vec<LegParams> = bytes[header_len..]
            .chunks_exact(leg_len)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        if header.num_legs != legs.len() as f32 || legs.len() > MAX_LEGS {
            return Err(ComputeError::ShapeMismatch("leg count disagrees with model parameter buffer"));
        }
        Ok(Self { header, legs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::two_leg_model;

    #[test]
    fn pod_layouts_are_float_packed() {
        assert_eq!(HEADER_FLOATS, 16);
        assert_eq!(LEG_FLOATS, 24);
        assert_eq!(std::mem::size_of::<JointParams>(), 32);
    }

    #[test]
    fn dimensions_follow_leg_count() {
        let model = two_leg_model();
        assert_eq!(model.nq(), 11);
        assert_eq!(model.nv(), 10);
        assert_eq!(model.nu(), 4);
        assert_eq!(model.ncontact(), 3);
        assert!((model.total_mass() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn initial_state_uses_joint_inits() {
        let state = two_leg_model().initial_state();
        assert_eq!(state.qpos, vec![0.0, 0.0, 0.6, 1.0, 0.0, 0.0, 0.0, 0.0, 0.6, 0.0, 0.6]);
        assert_eq!(state.qvel.len(), 10);
        assert_eq!(state.time, 0.0);
    }

    #[test]
    fn params_survive_the_byte_layout() {
        let model = two_leg_model();
        let bytes = model.params().to_bytes();
        assert_eq!(bytes.len(), 4 * (HEADER_FLOATS + 2 * LEG_FLOATS));
        let parsed = ModelParams::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.header.num_legs, 2.0);
        assert_eq!(parsed.legs[1].ankle.lower, 0.3);
        assert_eq!(parsed.substeps(), 5);
    }

    #[test]
    fn truncated_params_are_rejected() {
        let bytes = two_leg_model().params().to_bytes();
        assert!(ModelParams::from_bytes(&bytes[..bytes.len() - 4]).is_err());
        assert!(ModelParams::from_bytes(&bytes[..8]).is_err());
    }
}
