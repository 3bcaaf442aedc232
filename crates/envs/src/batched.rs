//! Functional, batch-vectorised environment.
//!
//! [`BatchedAntEnv`] holds only immutable configuration. The caller threads
//! an [`EnvState`] through [`BatchedAntEnv::reset`] and
//! [`BatchedAntEnv::step`]; every element is an independent episode that is
//! auto-reset from its own key when it finishes.

use crate::{
    command::{self, Command},
    config::{EnvConfig, TaskConfig},
    error::EnvError,
    info::{EpisodeInfo, RewardTerms},
    spaces::BoxSpace,
    task,
};
use compute::ComputeBackend;
use phenotype::Phenotype;
use physics::{BatchState, BatchStepper, Model, PhysicsError, SimState, Snapshot};
use std::sync::Arc;

/// Everything that changes between steps, stacked over the batch.
///
/// Per-element vectors are indexed by batch row; `command`,
/// `next_observation` and `actual_next_observation` are row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvState {
    pub physics: BatchState,
    pub command: Vec<f32>,
    pub step_count: Vec<u32>,
    pub episode_return: Vec<f32>,
    pub keys: Vec<u64>,
    /// Observation to act on next; already reset for finished elements.
    pub next_observation: Vec<f32>,
    /// Observation reached by the last step, before any auto-reset.
    pub actual_next_observation: Vec<f32>,
    pub reward: Vec<f32>,
    pub terminated: Vec<f32>,
    pub truncated: Vec<f32>,
    pub reward_terms: Vec<RewardTerms>,
    /// Return and length of elements that finished on the last step, zero
    /// elsewhere.
    pub final_episode_return: Vec<f32>,
    pub final_episode_length: Vec<u32>,
}

impl EnvState {
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.physics.batch_size()
    }

    #[must_use]
    pub fn command(&self, i: usize) -> Command {
        Command::from_slice(&self.command[i * Command::LEN..(i + 1) * Command::LEN])
    }

    /// Whether element `i` finished on the last step.
    #[must_use]
    pub fn done(&self, i: usize) -> bool {
        self.terminated[i] > 0.5 || self.truncated[i] > 0.5
    }
}

fn mask(flag: bool) -> f32 {
    f32::from(u8::from(flag))
}

/// Ant velocity tracking over a fixed-size batch.
pub struct BatchedAntEnv {
    model: Arc<Model>,
    config: TaskConfig,
    stepper: BatchStepper,
    observation_space: BoxSpace,
    action_space: BoxSpace,
}

impl BatchedAntEnv {
    /// # Errors
    ///
    /// [`EnvError::Config`] for an invalid task or a zero batch size.
    pub fn new(
        model: Arc<Model>,
        config: TaskConfig,
        batch_size: usize,
        backend: Arc<dyn ComputeBackend>,
    ) -> Result<Self, EnvError> {
        config.validate()?;
        if batch_size == 0 {
            return Err(EnvError::Config("batch size must be at least 1".into()));
        }
        let (low, high) = model.ctrl_bounds();
        let observation_space = BoxSpace::unbounded(task::observation_size(&model));
        let stepper = BatchStepper::new(Arc::clone(&model), backend, batch_size);
        tracing::info!(
            model = model.name(),
            batch_size,
            backend = stepper.backend_name(),
            "batched environment ready"
        );
        Ok(Self {
            model,
            config,
            stepper,
            observation_space,
            action_space: BoxSpace::new(low, high),
        })
    }

    /// Builds the built-in Ant for `config`.
    ///
    /// # Errors
    ///
    /// See [`BatchedAntEnv::new`]; [`EnvError::Load`] if the model is invalid.
    pub fn from_config(
        config: &EnvConfig,
        batch_size: usize,
        backend: Arc<dyn ComputeBackend>,
    ) -> Result<Self, EnvError> {
        let model = Phenotype::ant()?.into_model(config.physics)?;
        Self::new(Arc::new(model), config.task, batch_size, backend)
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.stepper.batch_size()
    }

    #[must_use]
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    #[must_use]
    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.stepper.backend_name()
    }

    /// Space of one element's observation.
    #[must_use]
    pub fn observation_space(&self) -> &BoxSpace {
        &self.observation_space
    }

    /// Space of one element's action.
    #[must_use]
    pub fn action_space(&self) -> &BoxSpace {
        &self.action_space
    }

    /// Fresh episodes for every element. Element `i` starts from the `i`th
    /// key split off `key`.
    ///
    /// # Errors
    ///
    /// Only fails if the model produces inconsistent states.
    pub fn reset(&self, key: u64) -> Result<EnvState, EnvError> {
        let n = self.batch_size();
        let fresh = self.reset_all(&command::split_key(key, n))?;
        let observations = self.observe_all(&fresh.physics, &fresh.command);
        tracing::debug!(key, batch_size = n, "batch reset");
        Ok(EnvState {
            physics: fresh.physics,
            command: fresh.command,
            step_count: vec![0; n],
            episode_return: vec![0.0; n],
            keys: fresh.keys,
            actual_next_observation: observations.clone(),
            next_observation: observations,
            reward: vec![0.0; n],
            terminated: vec![0.0; n],
            truncated: vec![0.0; n],
            reward_terms: vec![RewardTerms::default(); n],
            final_episode_return: vec![0.0; n],
            final_episode_length: vec![0; n],
        })
    }

    /// One control step of every element. `actions` is `batch_size × nu`,
    /// row-major. Returns the next state; `state` is left untouched.
    ///
    /// # Errors
    ///
    /// [`EnvError::Physics`] with [`PhysicsError::BatchSize`] or
    /// [`PhysicsError::ActionShape`] when the inputs do not match the batch.
    pub fn step(&self, state: &EnvState, actions: &[f32]) -> Result<EnvState, EnvError> {
        let n = self.batch_size();
        let nu = self.model.nu();
        if state.batch_size() != n {
            return Err(PhysicsError::BatchSize {
                expected: n,
                actual: state.batch_size(),
            }
            .into());
        }
        if actions.len() != n * nu {
            return Err(PhysicsError::ActionShape {
                expected: n * nu,
                actual: actions.len(),
            }
            .into());
        }

        let mut ctrl = vec![0.0; actions.len()];
        for (action, out) in actions.chunks_exact(nu).zip(ctrl.chunks_exact_mut(nu)) {
            task::process_action(&self.model, &self.config, action, out);
        }
        let stepped = self.stepper.step(&state.physics, &ctrl)?;

        let mut step_count = Vec::with_capacity(n);
        let mut episode_return = Vec::with_capacity(n);
        let mut command = Vec::with_capacity(n * Command::LEN);
        let mut keys = Vec::with_capacity(n);
        let mut reward = Vec::with_capacity(n);
        let mut reward_terms = Vec::with_capacity(n);
        let mut terminated = Vec::with_capacity(n);
        let mut truncated = Vec::with_capacity(n);
        let mut done = Vec::with_capacity(n);

        for (i, (row, action)) in stepped.rows().zip(actions.chunks_exact(nu)).enumerate() {
            let count = state.step_count[i] + 1;
            let terms = task::compute_reward(&self.config, &row, &state.command(i), action);
            let (cmd, key) = task::maybe_resample(&self.config, count, state.command(i), state.keys[i]);
            let (term, trunc) = task::done_flags(&self.config, &row, count);

            step_count.push(count);
            episode_return.push(state.episode_return[i] + terms.total());
            command.extend_from_slice(&cmd.to_array());
            keys.push(key);
            reward.push(terms.total());
            reward_terms.push(terms);
            terminated.push(mask(term));
            truncated.push(mask(trunc));
            done.push(mask(term || trunc));
        }
        let actual_next_observation = self.observe_all(&stepped, &command);

        // Both candidates exist for every element; the mask picks.
        let fresh = self.reset_all(&keys)?;
        let physics = BatchState::select(&done, &fresh.physics, &stepped)?;
        let command = pick(&done, Command::LEN, &fresh.command, &command);
        let next_observation = pick(
            &done,
            self.observation_space.dim(),
            &self.observe_all(&fresh.physics, &fresh.command),
            &actual_next_observation,
        );
        let keys = pick(&done, 1, &fresh.keys, &keys);
        let (zero_returns, zero_counts) = (vec![0.0; n], vec![0; n]);
        let final_episode_return = pick(&done, 1, &episode_return, &zero_returns);
        let final_episode_length = pick(&done, 1, &step_count, &zero_counts);
        let step_count = pick(&done, 1, &zero_counts, &step_count);
        let episode_return = pick(&done, 1, &zero_returns, &episode_return);

        Ok(EnvState {
            physics,
            command,
            step_count,
            episode_return,
            keys,
            next_observation,
            actual_next_observation,
            reward,
            terminated,
            truncated,
            reward_terms,
            final_episode_return,
            final_episode_length,
        })
    }

    /// Render-ready view of element `i`, or `None` past the batch.
    #[must_use]
    pub fn snapshot(&self, state: &EnvState, i: usize) -> Option<Snapshot> {
        (i < state.batch_size()).then(|| Snapshot::capture(&self.model, &state.physics.row(i)))
    }

    /// Infos of the elements that finished on the last step.
    #[must_use]
    pub fn episode_infos(&self, state: &EnvState) -> Vec<(usize, EpisodeInfo)> {
        (0..state.batch_size())
            .filter(|&i| state.done(i))
            .map(|i| {
                let info = EpisodeInfo {
                    episode_return: state.final_episode_return[i],
                    episode_length: state.final_episode_length[i],
                };
                (i, info)
            })
            .collect()
    }

    fn reset_all(&self, keys: &[u64]) -> Result<Fresh, EnvError> {
        let mut states: Vec<SimState> = Vec::with_capacity(keys.len());
        let mut command = Vec::with_capacity(keys.len() * Command::LEN);
        let mut next_keys = Vec::with_capacity(keys.len());
        for &key in keys {
            let (state, cmd, next) = task::reset_instance(&self.model, &self.config, key);
            states.push(state);
            command.extend_from_slice(&cmd.to_array());
            next_keys.push(next);
        }
        Ok(Fresh {
            physics: BatchState::stack(&states)?,
            command,
            keys: next_keys,
        })
    }

    fn observe_all(&self, physics: &BatchState, command: &[f32]) -> Vec<f32> {
        let mut out = Vec::with_capacity(physics.batch_size() * self.observation_space.dim());
        for (row, cmd) in physics.rows().zip(command.chunks_exact(Command::LEN)) {
            out.extend(task::observe(&row, &Command::from_slice(cmd)));
        }
        out
    }
}

struct Fresh {
    physics: BatchState,
    command: Vec<f32>,
    keys: Vec<u64>,
}

/// Row-wise select over flat per-element data of `width` values per row.
fn pick<T: Copy>(mask: &[f32], width: usize, on_set: &[T], otherwise: &[T]) -> Vec<T> {
    on_set
        .iter()
        .zip(otherwise)
        .enumerate()
        .map(|(j, (a, b))| if mask[j / width] > 0.5 { *a } else { *b })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use compute::CpuBackend;

    fn env(batch: usize, task: TaskConfig) -> BatchedAntEnv {
        let config = EnvConfig {
            task,
            ..EnvConfig::default()
        };
        BatchedAntEnv::from_config(&config, batch, Arc::new(CpuBackend::new())).unwrap()
    }

    #[test]
    fn reset_shapes() {
        let env = env(3, TaskConfig::default());
        let state = env.reset(0).unwrap();
        assert_eq!(state.batch_size(), 3);
        assert_eq!(state.next_observation.len(), 3 * 30);
        assert_eq!(state.next_observation, state.actual_next_observation);
        assert_eq!(state.command.len(), 9);
        assert!(env.episode_infos(&state).is_empty());
    }

    #[test]
    fn wrong_action_length_is_rejected() {
        let env = env(2, TaskConfig::default());
        let state = env.reset(1).unwrap();
        assert!(matches!(
            env.step(&state, &[0.0; 8]),
            Err(EnvError::Physics(PhysicsError::ActionShape { expected: 16, actual: 8 }))
        ));
    }

    #[test]
    fn mismatched_batch_is_rejected() {
        let small = env(2, TaskConfig::default());
        let large = env(3, TaskConfig::default());
        let state = small.reset(1).unwrap();
        assert!(matches!(
            large.step(&state, &[0.0; 24]),
            Err(EnvError::Physics(PhysicsError::BatchSize { expected: 3, actual: 2 }))
        ));
    }

    #[test]
    fn elements_finishing_at_the_horizon_are_reset() {
        let env = env(2, TaskConfig {
            horizon: 3,
            ..TaskConfig::default()
        });
        let mut state = env.reset(5).unwrap();
        for _ in 0..2 {
            state = env.step(&state, &[0.0; 16]).unwrap();
            assert!(state.truncated.iter().all(|&t| t == 0.0));
        }
        let before = state.clone();
        state = env.step(&before, &[0.0; 16]).unwrap();
        assert_eq!(state.truncated, vec![1.0, 1.0]);
        assert_eq!(state.step_count, vec![0, 0]);
        assert_eq!(state.episode_return, vec![0.0, 0.0]);
        assert_ne!(state.next_observation, state.actual_next_observation);

        let infos = env.episode_infos(&state);
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].1.episode_length, 3);
        let expected = before.episode_return[0] + state.reward[0];
        assert_eq!(infos[0].1.episode_return, expected);
    }

    #[test]
    fn snapshot_is_bounded_by_batch() {
        let env = env(2, TaskConfig::default());
        let state = env.reset(0).unwrap();
        assert!(env.snapshot(&state, 1).is_some());
        assert!(env.snapshot(&state, 2).is_none());
    }

    #[test]
    fn zero_batch_is_a_config_error() {
        let config = EnvConfig::default();
        assert!(matches!(
            BatchedAntEnv::from_config(&config, 0, Arc::new(CpuBackend::new())),
            Err(EnvError::Config(_))
        ));
    }
}
