//! Named environments and their static properties.

use crate::{batched::BatchedAntEnv, config::EnvConfig, cpu_env::AntEnv, error::EnvError};
use compute::ComputeBackend;
use std::sync::Arc;

pub const ANT_VELOCITY: &str = "ant-velocity";
pub const ANT_VELOCITY_BATCHED: &str = "ant-velocity-batched";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSpaceType {
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationSpaceType {
    FlatValues,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// One instance stepped in place.
    Single,
    /// A fixed-size batch stepped functionally.
    Batched,
}

/// What a training loop needs to know before building an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneralProperties {
    pub action_space_type: ActionSpaceType,
    pub observation_space_type: ObservationSpaceType,
    pub execution: Execution,
}

#[must_use]
pub fn names() -> &'static [&'static str] {
    &[ANT_VELOCITY, ANT_VELOCITY_BATCHED]
}

/// # Errors
///
/// [`EnvError::UnknownEnvironment`] for a name not in [`names`].
pub fn properties(name: &str) -> Result<GeneralProperties, EnvError> {
    let execution = match name {
        ANT_VELOCITY => Execution::Single,
        ANT_VELOCITY_BATCHED => Execution::Batched,
        _ => return Err(EnvError::UnknownEnvironment(name.to_owned())),
    };
    Ok(GeneralProperties {
        action_space_type: ActionSpaceType::Continuous,
        observation_space_type: ObservationSpaceType::FlatValues,
        execution,
    })
}

/// Builds a single-instance environment.
///
/// # Errors
///
/// [`EnvError::UnknownEnvironment`] unless `name` has [`Execution::Single`];
/// otherwise whatever [`AntEnv::from_config`] reports.
pub fn make(name: &str, config: &EnvConfig) -> Result<AntEnv, EnvError> {
    match properties(name)?.execution {
        Execution::Single => AntEnv::from_config(config),
        Execution::Batched => Err(EnvError::UnknownEnvironment(format!("{name} is batched, use make_batched"))),
    }
}

/// Builds a batched environment on `backend`.
///
/// # Errors
///
/// [`EnvError::UnknownEnvironment`] unless `name` has
/// [`Execution::Batched`]; otherwise whatever [`BatchedAntEnv::from_config`]
/// reports.
pub fn make_batched(
    name: &str,
    config: &EnvConfig,
    batch_size: usize,
    backend: Arc<dyn ComputeBackend>,
) -> Result<BatchedAntEnv, EnvError> {
    match properties(name)?.execution {
        Execution::Batched => BatchedAntEnv::from_config(config, batch_size, backend),
        Execution::Single => Err(EnvError::UnknownEnvironment(format!("{name} is not batched, use make"))),
    }
}
