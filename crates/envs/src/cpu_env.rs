//! Single-instance environment with the conventional reset/step/close
//! protocol and an optional viewer.

use crate::{
    command::Command,
    config::{EnvConfig, TaskConfig},
    error::EnvError,
    info::{EpisodeInfo, StepInfo},
    spaces::BoxSpace,
    task, Env,
};
use phenotype::Phenotype;
use physics::{Model, SimState, Snapshot, Viewer, ViewerStatus};
use std::sync::Arc;

/// Lifecycle of the current episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Running,
    Terminated,
    Truncated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub observation: Vec<f32>,
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
    pub info: StepInfo,
}

/// Ant velocity tracking on the in-place CPU stepper.
pub struct AntEnv {
    model: Arc<Model>,
    config: TaskConfig,
    observation_space: BoxSpace,
    action_space: BoxSpace,
    state: SimState,
    command: Command,
    key: u64,
    step_count: u32,
    episode_return: f32,
    phase: Phase,
    ctrl: Vec<f32>,
    viewer: Option<Box<dyn Viewer>>,
}

impl AntEnv {
    /// # Errors
    ///
    /// [`EnvError::Config`] if `config` fails validation.
    pub fn new(model: Arc<Model>, config: TaskConfig) -> Result<Self, EnvError> {
        config.validate()?;
        let (low, high) = model.ctrl_bounds();
        let observation_space = BoxSpace::unbounded(task::observation_size(&model));
        tracing::info!(
            model = model.name(),
            obs = observation_space.dim(),
            act = low.len(),
            "cpu environment ready"
        );
        Ok(Self {
            state: model.initial_state(),
            ctrl: vec![0.0; model.nu()],
            model,
            config,
            observation_space,
            action_space: BoxSpace::new(low, high),
            command: Command::default(),
            key: 0,
            step_count: 0,
            episode_return: 0.0,
            phase: Phase::Uninitialized,
            viewer: None,
        })
    }

    /// Builds the built-in Ant for `config`.
    ///
    /// # Errors
    ///
    /// [`EnvError::Load`] if the model cannot be built, [`EnvError::Config`]
    /// for an invalid task section.
    pub fn from_config(config: &EnvConfig) -> Result<Self, EnvError> {
        let model = Phenotype::ant()?.into_model(config.physics)?;
        Self::new(Arc::new(model), config.task)
    }

    #[must_use]
    pub fn with_viewer(mut self, viewer: Box<dyn Viewer>) -> Self {
        self.attach_viewer(viewer);
        self
    }

    pub fn attach_viewer(&mut self, viewer: Box<dyn Viewer>) {
        self.viewer = Some(viewer);
    }

    /// Attaches the viewer built by `open`, which may fail when there is no
    /// display or adapter.
    ///
    /// # Errors
    ///
    /// [`EnvError::Viewer`] carrying the message of the failed construction.
    pub fn try_attach_viewer<E: std::fmt::Display>(
        &mut self,
        open: impl FnOnce() -> Result<Box<dyn Viewer>, E>,
    ) -> Result<(), EnvError> {
        let viewer = open().map_err(|e| EnvError::Viewer(format!("{e:#}")))?;
        self.attach_viewer(viewer);
        Ok(())
    }

    /// Starts a new episode. `seed` replaces the episode key; `None`
    /// continues from the key left by the previous episode.
    pub fn reset(&mut self, seed: Option<u64>) -> Vec<f32> {
        let key = seed.unwrap_or(self.key);
        let (state, command, next_key) = task::reset_instance(&self.model, &self.config, key);
        self.state = state;
        self.command = command;
        self.key = next_key;
        self.step_count = 0;
        self.episode_return = 0.0;
        self.phase = Phase::Running;
        tracing::debug!(key, ?command, "episode reset");
        self.push_snapshot();
        task::observe(&self.state, &self.command)
    }

    /// Advances the running episode by one control step.
    ///
    /// # Errors
    ///
    /// [`EnvError::NotRunning`] before the first reset or after the episode
    /// ended, [`EnvError::Physics`] for an action of the wrong length.
    pub fn step(&mut self, action: &[f32]) -> Result<StepResult, EnvError> {
        if self.phase != Phase::Running {
            return Err(EnvError::NotRunning(self.phase));
        }
        let model = &self.model;
        if action.len() != model.nu() {
            return Err(physics::PhysicsError::ActionShape {
                expected: model.nu(),
                actual: action.len(),
            }
            .into());
        }

        task::process_action(model, &self.config, action, &mut self.ctrl);
        physics::step(model, &mut self.state, &self.ctrl)?;
        self.step_count += 1;

        let terms = task::compute_reward(&self.config, &self.state, &self.command, action);
        let reward = terms.total();
        self.episode_return += reward;
        (self.command, self.key) = task::maybe_resample(&self.config, self.step_count, self.command, self.key);

        let (terminated, truncated) = task::done_flags(&self.config, &self.state, self.step_count);
        let episode = if terminated || truncated {
            self.phase = if terminated { Phase::Terminated } else { Phase::Truncated };
            tracing::debug!(
                episode_return = self.episode_return,
                episode_length = self.step_count,
                terminated,
                "episode finished"
            );
            Some(EpisodeInfo {
                episode_return: self.episode_return,
                episode_length: self.step_count,
            })
        } else {
            None
        };

        self.push_snapshot();
        Ok(StepResult {
            observation: task::observe(&self.state, &self.command),
            reward,
            terminated,
            truncated,
            info: StepInfo {
                reward_terms: terms,
                episode,
            },
        })
    }

    /// Pushes the current state to the viewer, if one is attached.
    pub fn render(&mut self) -> Option<ViewerStatus> {
        self.push_snapshot()
    }

    /// Releases the viewer. The environment can still be reset and stepped
    /// headless afterwards.
    pub fn close(&mut self) {
        if self.viewer.take().is_some() {
            tracing::info!("viewer closed");
        }
    }

    fn push_snapshot(&mut self) -> Option<ViewerStatus> {
        let viewer = self.viewer.as_mut()?;
        let status = viewer.render(&Snapshot::capture(&self.model, &self.state));
        match status {
            ViewerStatus::Closed => {
                tracing::info!("viewer window closed, continuing headless");
                self.viewer = None;
            }
            ViewerStatus::Skipped => tracing::trace!("viewer dropped a frame"),
            ViewerStatus::Presented => {}
        }
        Some(status)
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
    pub fn state(&self) -> &SimState {
        &self.state
    }

    #[must_use]
    pub fn command(&self) -> Command {
        self.command
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    #[must_use]
    pub fn has_viewer(&self) -> bool {
        self.viewer.is_some()
    }
}

impl Env for AntEnv {
    fn reset(&mut self, seed: Option<u64>) -> Vec<f32> {
        AntEnv::reset(self, seed)
    }

    fn step(&mut self, action: &[f32]) -> Result<StepResult, EnvError> {
        AntEnv::step(self, action)
    }

    fn observation_space(&self) -> &BoxSpace {
        &self.observation_space
    }

    fn action_space(&self) -> &BoxSpace {
        &self.action_space
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    fn env() -> AntEnv {
        AntEnv::from_config(&EnvConfig::default()).unwrap()
    }

    struct Recorder {
        frames: Rc<RefCell<Vec<Snapshot>>>,
        close_after: usize,
    }

    impl Viewer for Recorder {
        fn render(&mut self, snapshot: &Snapshot) -> ViewerStatus {
            let mut frames = self.frames.borrow_mut();
            frames.push(snapshot.clone());
            if frames.len() >= self.close_after {
                ViewerStatus::Closed
            } else {
                ViewerStatus::Presented
            }
        }
    }

    #[test]
    fn step_before_reset_is_rejected() {
        let mut env = env();
        assert_eq!(env.phase(), Phase::Uninitialized);
        assert!(matches!(
            env.step(&[0.0; 8]),
            Err(EnvError::NotRunning(Phase::Uninitialized))
        ));
    }

    #[test]
    fn reset_observation_matches_observe() {
        let mut env = env();
        let obs = env.reset(Some(0));
        assert_eq!(obs.len(), env.observation_space().dim());
        assert_eq!(obs, task::observe(env.state(), &env.command()));
        assert_eq!(env.phase(), Phase::Running);
    }

    #[test]
    fn wrong_action_length_is_a_physics_error() {
        let mut env = env();
        env.reset(Some(1));
        assert!(matches!(env.step(&[0.0; 3]), Err(EnvError::Physics(_))));
        assert_eq!(env.step_count(), 0);
    }

    #[test]
    fn viewer_sees_every_step_until_closed() {
        let frames = Rc::new(RefCell::new(Vec::new()));
        let mut env = env().with_viewer(Box::new(Recorder {
            frames: Rc::clone(&frames),
            close_after: 3,
        }));
        env.reset(Some(2));
        env.step(&[0.0; 8]).unwrap();
        assert!(env.has_viewer());
        env.step(&[0.0; 8]).unwrap();
        assert!(!env.has_viewer());
        env.step(&[0.0; 8]).unwrap();
        assert_eq!(frames.borrow().len(), 3);
        assert_eq!(env.render(), None);
    }

    #[test]
    fn failed_viewer_is_reported() {
        let mut env = env();
        let result = env.try_attach_viewer(|| Err::<Box<dyn Viewer>, _>("no display"));
        assert!(matches!(result, Err(EnvError::Viewer(msg)) if msg == "no display"));
        assert!(!env.has_viewer());
    }

    #[test]
    fn close_drops_the_viewer() {
        let frames = Rc::new(RefCell::new(Vec::new()));
        let mut env = env();
        env.attach_viewer(Box::new(Recorder {
            frames: Rc::clone(&frames),
            close_after: usize::MAX,
        }));
        assert_eq!(env.render(), Some(ViewerStatus::Presented));
        env.close();
        assert!(!env.has_viewer());
        assert_eq!(frames.borrow().len(), 1);
    }
}
