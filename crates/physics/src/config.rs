use serde::Deserialize;

/// Physics constants a [`Model`](crate::Model) is built with.
///
/// Passed explicitly to the loader; two models built from different configs
/// can coexist in one process.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhysicsConfig {
    /// Duration of one integration substep in seconds.
    pub timestep: f32,
    /// Substeps per control step (frame-skip).
    pub substeps: u32,
    /// Acceleration along world z.
    pub gravity: f32,
    pub contact: ContactParams,
    pub limit: LimitParams,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            timestep: 0.004,
            substeps: 5,
            gravity: -9.81,
            contact: ContactParams::default(),
            limit: LimitParams::default(),
        }
    }
}

impl PhysicsConfig {
    /// Simulated seconds covered by one control step.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn control_dt(&self) -> f32 {
        self.timestep * self.substeps as f32
    }
}

/// Penalty contact against the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContactParams {
    pub stiffness: f32,
    pub damping: f32,
    /// Coulomb coefficient.
    pub friction: f32,
    /// Slip speed below which friction fades out linearly.
    pub friction_smoothing: f32,
}

impl Default for ContactParams {
    fn default() -> Self {
        Self {
            stiffness: 5000.0,
            damping: 50.0,
            friction: 1.0,
            friction_smoothing: 0.5,
        }
    }
}

/// Spring and damper pushing joints back inside their range.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitParams {
    pub stiffness: f32,
    pub damping: f32,
}

impl Default for LimitParams {
    fn default() -> Self {
        Self {
            stiffness: 1000.0,
            damping: 20.0,
        }
    }
}
