use crate::cpu_env::Phase;
use phenotype::LoadError;
use physics::PhysicsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("failed to load the scene: {0}")]
    Load(#[from] LoadError),
    #[error("physics error: {0}")]
    Physics(#[from] PhysicsError),
    #[error("environment is {0:?}; call reset before stepping")]
    NotRunning(Phase),
    #[error("unknown environment {0:?}")]
    UnknownEnvironment(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("viewer unavailable: {0}")]
    Viewer(String),
}
