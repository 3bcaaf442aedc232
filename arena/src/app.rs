use crate::{Backend, BatchArgs, Policy, RunArgs};
use anyhow::{Context, Result};
use compute::{ComputeBackend, CpuBackend};
use envs::{AntEnv, BatchedAntEnv, Env, EnvConfig};
use phenotype::Phenotype;
use physics::Model;
use std::{path::Path, sync::Arc, time::Instant};

fn load_config(path: Option<&Path>) -> Result<EnvConfig> {
    match path {
        Some(path) => EnvConfig::from_path(path).with_context(|| format!("loading config {}", path.display())),
        None => Ok(EnvConfig::default()),
    }
}

fn load_model(scene: Option<&Path>, config: &EnvConfig) -> Result<Arc<Model>> {
    let phenotype = match scene {
        Some(path) => Phenotype::from_path(path)?,
        None => Phenotype::ant()?,
    };
    let model = phenotype.into_model(config.physics).context("building the model")?;
    Ok(Arc::new(model))
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let model = load_model(args.scene.as_deref(), &config)?;
    let mut env = AntEnv::new(model, config.task)?;
    if args.render {
        attach_viewer(&mut env)?;
    }

    let mut rng = fastrand::Rng::with_seed(args.seed);
    let zero = vec![0.0; env.action_size()];
    env.reset(Some(args.seed));
    let mut finished = 0;
    while finished < args.episodes {
        let action = match args.policy {
            Policy::Zero => zero.clone(),
            Policy::Random => env.action_space().sample(&mut rng),
        };
        let result = env.step(&action)?;
        if let Some(episode) = result.info.episode {
            finished += 1;
            tracing::info!(
                episode = finished,
                episode_return = episode.episode_return,
                episode_length = episode.episode_length,
                terminated = result.terminated,
                "episode finished"
            );
            env.reset(None);
        }
    }
    env.close();
    Ok(())
}

#[cfg(feature = "render")]
fn attach_viewer(env: &mut AntEnv) -> Result<()> {
    env.try_attach_viewer(|| {
        let viewer = render::WindowViewer::new(&render::ViewerOptions::default())?;
        Ok::<Box<dyn physics::Viewer>, anyhow::Error>(Box::new(viewer))
    })
    .context("opening the viewer")
}

#[cfg(not(feature = "render"))]
fn attach_viewer(_env: &mut AntEnv) -> Result<()> {
    anyhow::bail!("arena was built without the `render` feature")
}

fn backend(choice: Backend) -> Result<Arc<dyn ComputeBackend>> {
    Ok(match choice {
        Backend::Cpu => Arc::new(CpuBackend::new()),
        Backend::Auto => compute::default_backend(),
        #[cfg(feature = "gpu")]
        Backend::Gpu => Arc::new(compute::GpuBackend::try_new().context("initialising the GPU backend")?),
        #[cfg(not(feature = "gpu"))]
        Backend::Gpu => anyhow::bail!("arena was built without the `gpu` feature"),
    })
}

#[allow(clippy::cast_precision_loss)]
pub fn batch(args: &BatchArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let env = BatchedAntEnv::from_config(&config, args.batch_size, backend(args.backend)?)?;
    let action_dim = env.action_space().dim();
    let rng = fastrand::Rng::with_seed(args.seed);

    let mut state = env.reset(args.seed)?;
    let mut actions = vec![0.0; args.batch_size * action_dim];
    let mut finished = 0usize;
    let mut total_return = 0.0;
    let start = Instant::now();
    for _ in 0..args.steps {
        for a in &mut actions {
            *a = 2.0 * rng.f32() - 1.0;
        }
        state = env.step(&state, &actions)?;
        for (_, info) in env.episode_infos(&state) {
            finished += 1;
            total_return += info.episode_return;
        }
    }
    let elapsed = start.elapsed().as_secs_f64();
    let transitions = f64::from(args.steps) * args.batch_size as f64;
    tracing::info!(
        backend = env.backend_name(),
        batch_size = args.batch_size,
        steps = args.steps,
        steps_per_second = transitions / elapsed.max(f64::EPSILON),
        finished,
        mean_return = if finished > 0 { total_return / finished as f32 } else { 0.0 },
        "batch run complete"
    );
    Ok(())
}

pub fn describe(scene: Option<&Path>) -> Result<()> {
    let config = EnvConfig::default();
    let model = load_model(scene, &config)?;
    let env = AntEnv::new(Arc::clone(&model), config.task)?;
    tracing::info!(
        model = model.name(),
        nq = model.nq(),
        nv = model.nv(),
        nu = model.nu(),
        legs = model.legs().len(),
        total_mass = model.total_mass(),
        control_dt = model.config().control_dt(),
        "model"
    );
    tracing::info!(
        observation = env.obs_size(),
        action = env.action_size(),
        "spaces"
    );
    for leg in model.legs() {
        tracing::info!(
            leg = leg.name.as_str(),
            hip_range = ?leg.hip.range,
            ankle_range = ?leg.ankle.range,
            gear = leg.hip.gear,
            "leg"
        );
    }
    Ok(())
}
