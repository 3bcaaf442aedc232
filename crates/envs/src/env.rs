use crate::{cpu_env::StepResult, error::EnvError, spaces::BoxSpace};

/// Reinforcement learning environment trait.
///
/// The conventional reset/step protocol: [`reset`] starts an episode and
/// returns its first observation, each call to [`step`] advances it by one
/// action. An episode ends when a step reports `terminated` or `truncated`;
/// the caller must reset before stepping again.
///
/// [`reset`]: Env::reset
/// [`step`]: Env::step
pub trait Env {
    /// Reset to a fresh episode and return the initial observation. `None`
    /// continues the environment's own seed sequence.
    fn reset(&mut self, seed: Option<u64>) -> Vec<f32>;

    /// Advance the running episode by one action.
    ///
    /// # Errors
    ///
    /// Implementations reject actions of the wrong shape and steps outside a
    /// running episode.
    fn step(&mut self, action: &[f32]) -> Result<StepResult, EnvError>;

    fn observation_space(&self) -> &BoxSpace;

    fn action_space(&self) -> &BoxSpace;

    /// Size of the observation vector.
    fn obs_size(&self) -> usize {
        self.observation_space().dim()
    }

    /// Size of the action vector.
    fn action_size(&self) -> usize {
        self.action_space().dim()
    }
}
