use envs::{task, AntEnv, Env, EnvConfig, EnvError, Phase, TaskConfig};
use phenotype::Phenotype;
use physics::PhysicsConfig;
use std::sync::Arc;

fn ant_env(task: TaskConfig) -> AntEnv {
    let config = EnvConfig {
        task,
        ..EnvConfig::default()
    };
    AntEnv::from_config(&config).unwrap()
}

fn random_actions(seed: u64, steps: usize, nu: usize) -> Vec<Vec<f32>> {
    let rng = fastrand::Rng::with_seed(seed);
    (0..steps)
        .map(|_| (0..nu).map(|_| 2.0 * rng.f32() - 1.0).collect())
        .collect()
}

#[test]
fn reset_returns_declared_observation() {
    let mut env = ant_env(TaskConfig::default());
    let obs = env.reset(Some(0));
    assert_eq!(obs.len(), env.obs_size());
    assert_eq!(env.action_size(), 8);
    assert!(env.observation_space().contains(&obs));
    assert_eq!(obs, task::observe(env.state(), &env.command()));
}

#[test]
fn same_seed_same_trajectory() {
    let actions = random_actions(3, 60, 8);
    let run = || {
        let mut env = ant_env(TaskConfig::default());
        let mut trace = vec![env.reset(Some(42))];
        for a in &actions {
            let result = env.step(a).unwrap();
            trace.push(result.observation);
            trace.push(vec![result.reward]);
            if result.terminated || result.truncated {
                break;
            }
        }
        trace
    };
    assert_eq!(run(), run());
}

#[test]
fn observation_shape_is_preserved() {
    let mut env = ant_env(TaskConfig::default());
    env.reset(Some(1));
    let mut rng = fastrand::Rng::with_seed(8);
    for _ in 0..30 {
        let action = env.action_space().sample(&mut rng);
        assert!(env.action_space().contains(&action));
        let result = env.step(&action).unwrap();
        assert_eq!(result.observation.len(), env.obs_size());
        if result.terminated {
            break;
        }
    }
}

#[test]
fn truncates_exactly_at_horizon() {
    let horizon = 12;
    let mut env = ant_env(TaskConfig {
        horizon,
        ..TaskConfig::default()
    });
    env.reset(Some(7));
    for t in 1..=horizon {
        let result = env.step(&[0.0; 8]).unwrap();
        assert!(!result.terminated);
        assert_eq!(result.truncated, t == horizon, "step {t}");
        assert_eq!(result.info.episode.is_some(), t == horizon);
    }
    assert_eq!(env.phase(), Phase::Truncated);
    assert!(matches!(
        env.step(&[0.0; 8]),
        Err(EnvError::NotRunning(Phase::Truncated))
    ));

    env.reset(None);
    assert_eq!(env.phase(), Phase::Running);
    assert_eq!(env.step_count(), 0);
}

#[test]
fn episode_info_sums_rewards() {
    let mut env = ant_env(TaskConfig {
        horizon: 5,
        ..TaskConfig::default()
    });
    env.reset(Some(2));
    let mut total = 0.0;
    let mut last = None;
    for a in random_actions(9, 5, 8) {
        let result = env.step(&a).unwrap();
        total += result.reward;
        assert_eq!(result.reward, result.info.reward_terms.total());
        last = result.info.episode;
    }
    let info = last.unwrap();
    assert_eq!(info.episode_length, 5);
    assert_eq!(info.episode_return, total);
}

#[test]
fn zero_action_is_passive_dynamics() {
    let mut unpowered = Phenotype::ant().unwrap();
    unpowered.defaults.joint.gear = Some(0.0);
    let unpowered = unpowered.into_model(PhysicsConfig::default()).unwrap();

    let mut env = ant_env(TaskConfig::default());
    let mut passive = AntEnv::new(Arc::new(unpowered), TaskConfig::default()).unwrap();
    env.reset(Some(11));
    passive.reset(Some(11));
    for a in random_actions(5, 40, 8) {
        let driven = env.step(&[0.0; 8]).unwrap();
        let reference = passive.step(&a).unwrap();
        assert_eq!(env.state().qpos, passive.state().qpos);
        assert_eq!(env.state().qvel, passive.state().qvel);
        assert_eq!(driven.terminated, reference.terminated);
        if driven.terminated {
            break;
        }
    }
}

#[test]
fn config_file_drives_the_episode() {
    let config = EnvConfig::from_path(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/short_horizon.json")).unwrap();
    assert_eq!(config.physics.substeps, 4);
    assert_eq!(config.task.horizon, 25);
    assert_eq!(config.task.command.vy, TaskConfig::default().command.vy);

    let mut env = AntEnv::from_config(&config).unwrap();
    env.reset(Some(0));
    let first = env.command();
    assert!((0.2..=0.8).contains(&first.vx));
    let mut steps = 0;
    loop {
        let result = env.step(&[0.0; 8]).unwrap();
        steps += 1;
        if steps == 10 && !result.terminated {
            assert_ne!(env.command(), first, "command resampled after 10 steps");
        }
        if result.terminated || result.truncated {
            break;
        }
    }
    assert!(steps <= 25);
}

#[test]
fn invalid_config_file_is_rejected() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/bad_range.json");
    assert!(matches!(EnvConfig::from_path(path), Err(EnvError::Config(_))));
    assert!(matches!(
        EnvConfig::from_path("tests/data/missing.json"),
        Err(EnvError::Config(_))
    ));
}
