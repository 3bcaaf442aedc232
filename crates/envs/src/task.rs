//! Velocity-tracking task as free functions over a [`StateView`].
//!
//! Nothing here mutates its inputs. The CPU facade calls these on its owned
//! [`SimState`]; the batched facade calls them on every row of a
//! [`physics::BatchState`].

use crate::{
    command::{self, Command},
    config::TaskConfig,
    info::RewardTerms,
};
use physics::{Model, SimState, StateView, QPOS_ROOT};

/// Length of the observation vector for `model`:
/// `nq - 2` positions (x and y are dropped), `nv` velocities and the command.
#[must_use]
pub fn observation_size(model: &Model) -> usize {
    model.nq() - 2 + model.nv() + Command::LEN
}

/// `[z, quaternion, joint angles, torso-frame linear velocity, torso-frame
/// angular velocity, joint rates, command]`.
#[must_use]
pub fn observe(state: &impl StateView, command: &Command) -> Vec<f32> {
    let qpos = state.qpos();
    let qvel = state.qvel();
    let mut obs = Vec::with_capacity(qpos.len() - 2 + qvel.len() + Command::LEN);
    obs.extend_from_slice(&qpos[2..]);
    let linear_body = state.torso_orientation().inverse_rotate(state.linear_velocity());
    obs.extend_from_slice(&linear_body.to_array());
    obs.extend_from_slice(&qvel[3..]);
    obs.extend_from_slice(&command.to_array());
    obs
}

/// Velocity actually achieved, in the same frame as a [`Command`]: planar
/// velocity rotated into the heading frame and the world yaw rate.
#[must_use]
pub fn achieved_velocity(state: &impl StateView) -> Command {
    let rotation = state.torso_orientation();
    let v = state.linear_velocity();
    let (s, c) = rotation.yaw().sin_cos();
    let yaw_rate = rotation.rotate(state.angular_velocity()).z;
    Command::new(c * v.x + s * v.y, -s * v.x + c * v.y, yaw_rate)
}

#[must_use]
pub fn compute_reward(
    config: &TaskConfig,
    state: &impl StateView,
    command: &Command,
    action: &[f32],
) -> RewardTerms {
    let achieved = achieved_velocity(state);
    let w = &config.reward;
    let dvx = achieved.vx - command.vx;
    let dvy = achieved.vy - command.vy;
    let dyaw = achieved.yaw_rate - command.yaw_rate;
    RewardTerms {
        tracking_lin: -w.tracking_lin * (dvx * dvx + dvy * dvy),
        tracking_ang: -w.tracking_ang * dyaw * dyaw,
        control: -w.control * action.iter().map(|a| a * a).sum::<f32>(),
        healthy: w.healthy,
    }
}

/// Unhealthy or numerically broken states end the episode.
#[must_use]
pub fn is_terminated(config: &TaskConfig, state: &impl StateView) -> bool {
    if !state.is_finite() {
        tracing::warn!("non-finite simulation state, terminating episode");
        return true;
    }
    let z = state.torso_position().z;
    z < config.min_height || z > config.max_height || state.torso_orientation().up_z() < config.min_up_z
}

#[must_use]
pub fn is_truncated(config: &TaskConfig, step_count: u32) -> bool {
    step_count >= config.horizon
}

/// `(terminated, truncated)`; termination wins when both hold.
#[must_use]
pub fn done_flags(config: &TaskConfig, state: &impl StateView, step_count: u32) -> (bool, bool) {
    let terminated = is_terminated(config, state);
    (terminated, !terminated && is_truncated(config, step_count))
}

/// `ctrl = clip(action · action_scale)` per actuator range.
pub fn process_action(model: &Model, config: &TaskConfig, action: &[f32], ctrl: &mut [f32]) {
    for ((out, a), joint) in ctrl.iter_mut().zip(action).zip(model.joints()) {
        *out = (a * config.action_scale).max(joint.ctrl_range[0]).min(joint.ctrl_range[1]);
    }
}

/// Fresh episode from `key`: initial pose with uniform joint noise, noisy
/// velocities and a sampled command. Returns the key for the next draw.
#[must_use]
pub fn reset_instance(model: &Model, config: &TaskConfig, key: u64) -> (SimState, Command, u64) {
    let mut rng = fastrand::Rng::with_seed(key);
    let scale = config.reset_noise_scale;
    let noise = || scale * (2.0 * rng.f32() - 1.0);

    let mut state = model.initial_state();
    for q in &mut state.qpos[QPOS_ROOT..] {
        *q += noise();
    }
    for v in &mut state.qvel {
        *v += noise();
    }
    let command = command::sample(&mut rng, &config.command);
    let next_key = rng.u64(..);
    (state, command, next_key)
}

/// Periodic resampling. `step_count` is the count after the step just
/// taken; returns the command and key to carry on with.
#[must_use]
pub fn maybe_resample(config: &TaskConfig, step_count: u32, command: Command, key: u64) -> (Command, u64) {
    let interval = config.command_resample_interval;
    if interval > 0 && step_count % interval == 0 {
        command::sample_with_key(key, &config.command)
    } else {
        (command, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phenotype::Phenotype;
    use physics::{PhysicsConfig, Quat};

    fn ant() -> Model {
        Phenotype::ant().unwrap().into_model(PhysicsConfig::default()).unwrap()
    }

    #[test]
    fn observation_layout_for_the_ant() {
        let model = ant();
        assert_eq!(observation_size(&model), 30);
        let (state, cmd, _) = reset_instance(&model, &TaskConfig::default(), 0);
        let obs = observe(&state, &cmd);
        assert_eq!(obs.len(), 30);
        assert_eq!(obs[0], state.qpos[2]);
        assert_eq!(&obs[27..], &cmd.to_array());
    }

    #[test]
    fn commanding_the_achieved_velocity_zeroes_tracking() {
        let model = ant();
        let config = TaskConfig::default();
        let (mut state, _, _) = reset_instance(&model, &config, 4);
        let yaw = Quat::from_yaw(0.7);
        state.qpos[3..7].copy_from_slice(&yaw.to_array());
        state.qvel[..6].copy_from_slice(&[0.3, -0.2, 0.0, 0.0, 0.0, 0.4]);
        let target = achieved_velocity(&state);
        let terms = compute_reward(&config, &state, &target, &[0.0; 8]);
        assert_eq!(terms.tracking_lin, 0.0);
        assert_eq!(terms.tracking_ang, 0.0);
        assert_eq!(terms.total(), config.reward.healthy);

        let off = Command::new(target.vx + 1.0, target.vy, target.yaw_rate);
        assert!(compute_reward(&config, &state, &off, &[0.0; 8]).tracking_lin < 0.0);
    }

    #[test]
    fn achieved_velocity_is_in_heading_frame() {
        let model = ant();
        let mut state = model.initial_state();
        state.qpos[3..7].copy_from_slice(&Quat::from_yaw(std::f32::consts::FRAC_PI_2).to_array());
        state.qvel[1] = 1.0;
        let v = achieved_velocity(&state);
        assert!((v.vx - 1.0).abs() < 1e-6);
        assert!(v.vy.abs() < 1e-6);
    }

    #[test]
    fn control_cost_is_quadratic() {
        let model = ant();
        let config = TaskConfig::default();
        let state = model.initial_state();
        let terms = compute_reward(&config, &state, &Command::default(), &[1.0, -1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!((terms.control + 2.0 * config.reward.control).abs() < 1e-7);
    }

    #[test]
    fn termination_checks_height_flip_and_nan() {
        let model = ant();
        let config = TaskConfig::default();
        let mut state = model.initial_state();
        assert!(!is_terminated(&config, &state));

        state.qpos[2] = 0.1;
        assert!(is_terminated(&config, &state));
        state.qpos[2] = 0.5;

        // upside down
        state.qpos[3..7].copy_from_slice(&[0.0, 1.0, 0.0, 0.0]);
        assert!(is_terminated(&config, &state));

        let mut state = model.initial_state();
        state.qvel[9] = f32::NAN;
        assert!(is_terminated(&config, &state));
    }

    #[test]
    fn termination_takes_precedence_over_truncation() {
        let model = ant();
        let config = TaskConfig::default();
        let mut state = model.initial_state();
        assert_eq!(done_flags(&config, &state, config.horizon - 1), (false, false));
        assert_eq!(done_flags(&config, &state, config.horizon), (false, true));
        state.qpos[2] = 5.0;
        assert_eq!(done_flags(&config, &state, config.horizon), (true, false));
    }

    #[test]
    fn actions_are_scaled_then_clipped() {
        let model = ant();
        let config = TaskConfig {
            action_scale: 2.0,
            ..TaskConfig::default()
        };
        let mut ctrl = vec![0.0; 8];
        process_action(&model, &config, &[0.25, 0.75, -3.0, 0.0, 0.0, 0.0, 0.0, 0.0], &mut ctrl);
        assert_eq!(&ctrl[..3], &[0.5, 1.0, -1.0]);
    }

    #[test]
    fn reset_is_deterministic_per_key() {
        let model = ant();
        let config = TaskConfig::default();
        let a = reset_instance(&model, &config, 9);
        let b = reset_instance(&model, &config, 9);
        let c = reset_instance(&model, &config, 10);
        assert_eq!(a, b);
        assert_ne!(a.0, c.0);
        let noise = a.0.qpos[QPOS_ROOT..]
            .iter()
            .zip(&model.initial_state().qpos[QPOS_ROOT..])
            .all(|(x, y)| (x - y).abs() <= config.reset_noise_scale);
        assert!(noise);
    }

    #[test]
    fn resampling_follows_the_interval() {
        let config = TaskConfig {
            command_resample_interval: 5,
            ..TaskConfig::default()
        };
        let cmd = Command::new(0.1, 0.2, 0.3);
        assert_eq!(maybe_resample(&config, 4, cmd, 1), (cmd, 1));
        let (next, key) = maybe_resample(&config, 10, cmd, 1);
        assert_ne!(next, cmd);
        assert_ne!(key, 1);
        assert_eq!(maybe_resample(&TaskConfig::default(), 10, cmd, 1), (cmd, 1));
    }
}
