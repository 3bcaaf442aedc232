use compute::ComputeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhysicsError {
    #[error("action has {actual} values, expected {expected}")]
    ActionShape { expected: usize, actual: usize },
    #[error("batch holds {actual} instances, expected {expected}")]
    BatchSize { expected: usize, actual: usize },
    #[error("state dimensions do not match the model")]
    StateShape,
    #[error("compute backend error: {0}")]
    Backend(#[from] ComputeError),
}
