#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::similar_names)]
//! # Legged physics
//!
//! Reduced-coordinate dynamics for a sphere torso carrying two-segment legs,
//! with penalty contacts against the ground plane.
//!
//! ## Key Components
//!
//! -   **Model:** [`Model`] is the immutable robot description. It is built
//!     once from a [`PhysicsConfig`] and flattened into [`ModelParams`], the
//!     numeric form every stepping path consumes.
//! -   **In-place stepping:** [`step`] advances an owned [`SimState`] by one
//!     control step (`substeps` integration steps of `timestep`).
//! -   **Batched stepping:** [`BatchStepper`] advances a [`BatchState`] of N
//!     independent instances in a single dispatch of [`INTEGRATE_LEGGED`] on
//!     any [`compute::ComputeBackend`]. The CPU reference of that kernel calls
//!     the same per-instance function as [`step`]; the WGSL program is a port
//!     of it.
//! -   **Snapshots:** [`Snapshot`] and the [`Viewer`] trait decouple
//!     rendering from simulation.
//!
//! ```rust,ignore
//! let model = phenotype::Phenotype::ant()?.into_model(PhysicsConfig::default())?;
//! let mut state = model.initial_state();
//! physics::step(&model, &mut state, &vec![0.0; model.nu()])?;
//! ```

pub mod batch;
pub mod config;
pub mod dynamics;
pub mod error;
pub mod kinematics;
pub mod math;
pub mod model;
pub mod snapshot;
pub mod state;

#[cfg(test)]
mod test_support;

pub use batch::{BatchState, BatchStepper, StateRef, INTEGRATE_LEGGED};
pub use config::{ContactParams, LimitParams, PhysicsConfig};
pub use dynamics::step;
pub use error::PhysicsError;
pub use math::{Quat, Vec3};
pub use model::{
    Joint, JointParams, Leg, LegParams, Model, ModelParams, ParamsHeader, Torso, MAX_LEGS,
};
pub use snapshot::{LegSnapshot, Snapshot, Viewer, ViewerStatus};
pub use state::{SimState, StateView, QPOS_ROOT, QVEL_ROOT};
