#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Ant velocity tracking
//!
//! A legged robot learns to follow a commanded planar velocity and yaw rate.
//! The task is written once, as free functions in [`task`], and served through
//! two facades:
//!
//! -   [`AntEnv`]: one instance stepped in place on the CPU, conventional
//!     reset/step/close protocol, optional [`physics::Viewer`].
//! -   [`BatchedAntEnv`]: N instances stepped functionally on any
//!     [`compute::ComputeBackend`], with auto-reset through numeric masks.
//!
//! For the same key and actions the batched CPU backend reproduces the
//! single-instance trajectory exactly.

pub mod batched;
pub mod command;
pub mod config;
pub mod cpu_env;
pub mod env;
pub mod error;
pub mod info;
pub mod registry;
pub mod spaces;
pub mod task;

pub use batched::{BatchedAntEnv, EnvState};
pub use command::Command;
pub use config::{CommandRanges, EnvConfig, RewardWeights, TaskConfig};
pub use cpu_env::{AntEnv, Phase, StepResult};
pub use env::Env;
pub use error::EnvError;
pub use info::{EpisodeInfo, RewardTerms, StepInfo};
pub use registry::{GeneralProperties, ANT_VELOCITY, ANT_VELOCITY_BATCHED};
pub use spaces::BoxSpace;
