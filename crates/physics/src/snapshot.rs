//! Read-only pictures of a simulation instance for viewers.
//!
//! A [`Snapshot`] is a value: capturing one copies everything a viewer needs
//! in world coordinates, so a [`Viewer`] can never reach back into the state
//! it was taken from.

use crate::{
    kinematics::leg_frame,
    math::{Quat, Vec3},
    model::Model,
    state::{StateView, QPOS_ROOT},
};

#[derive(Debug, Clone, PartialEq)]
pub struct LegSnapshot {
    pub hip: Vec3,
    pub knee: Vec3,
    pub foot: Vec3,
    pub foot_radius: f32,
    pub contact_force: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub torso_center: Vec3,
    pub torso_orientation: Quat,
    pub torso_radius: f32,
    pub torso_contact_force: f32,
    pub legs: Vec<LegSnapshot>,
    pub time: f32,
}

impl Snapshot {
    /// Resolves the leg geometry of `state` in world coordinates.
    #[must_use]
    pub fn capture(model: &Model, state: &impl StateView) -> Self {
        let center = state.torso_position();
        let rotation = state.torso_orientation();
        let qpos = state.qpos();
        let contact = state.contact();
        let to_world = |p: Vec3| center + rotation.rotate(p);

        let legs = model
            .params()
            .legs
            .iter()
            .enumerate()
            .map(|(k, leg)| {
                let frame = leg_frame(leg, qpos[QPOS_ROOT + 2 * k], qpos[QPOS_ROOT + 2 * k + 1]);
                LegSnapshot {
                    hip: to_world(frame.hip),
                    knee: to_world(frame.knee),
                    foot: to_world(frame.foot),
                    foot_radius: leg.foot_radius,
                    contact_force: contact.get(k).copied().unwrap_or(0.0),
                }
            })
            .collect();

        Self {
            torso_center: center,
            torso_orientation: rotation,
            torso_radius: model.torso().radius,
            torso_contact_force: contact.get(model.legs().len()).copied().unwrap_or(0.0),
            legs,
            time: state.time(),
        }
    }
}

/// Outcome of handing a snapshot to a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerStatus {
    /// The frame was drawn.
    Presented,
    /// The frame arrived before the frame budget elapsed and was dropped.
    Skipped,
    /// The user closed the window; further snapshots are ignored.
    Closed,
}

/// Consumer of snapshots. Implementations must return promptly; slow
/// viewers drop frames instead of stalling the stepping loop.
pub trait Viewer {
    fn render(&mut self, snapshot: &Snapshot) -> ViewerStatus;
}
