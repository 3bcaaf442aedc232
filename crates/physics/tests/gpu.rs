#![cfg(feature = "gpu")]

use compute::{CpuBackend, GpuBackend};
use physics::{BatchState, BatchStepper, Joint, Leg, Model, PhysicsConfig, Torso};
use std::sync::Arc;

fn quad() -> Arc<Model> {
    let joint = |lo: f32, hi: f32, init: f32| Joint {
        range: [lo, hi],
        init,
        armature: 1.0,
        damping: 1.0,
        gear: 10.0,
        ctrl_range: [-1.0, 1.0],
    };
    let legs = (0..4u8)
        .map(|k| Leg {
            name: format!("leg_{k}"),
            mount_angle: std::f32::consts::FRAC_PI_4 * f32::from(2 * k + 1),
            hip_offset: 0.2,
            thigh_length: 0.2,
            shin_length: 0.4,
            foot_radius: 0.05,
            mass: 0.5,
            hip: joint(-0.5, 0.5, 0.0),
            ankle: joint(0.3, 1.2, 0.6),
        })
        .collect();
    let torso = Torso {
        mass: 4.0,
        radius: 0.2,
        inertia: [0.2, 0.2, 0.3],
        spawn_height: 0.6,
    };
    Arc::new(Model::new("quad", torso, legs, PhysicsConfig::default()))
}

#[test]
fn gpu_kernel_tracks_cpu_reference() {
    let gpu = match GpuBackend::try_new() {
        Ok(gpu) => gpu,
        Err(e) => {
            eprintln!("skipping: {e}");
            return;
        }
    };
    let model = quad();
    let n = 16;
    let cpu_stepper = BatchStepper::new(Arc::clone(&model), Arc::new(CpuBackend::new()), n);
    let gpu_stepper = BatchStepper::new(Arc::clone(&model), Arc::new(gpu), n);

    let mut cpu_state = BatchState::replicate(&model.initial_state(), n);
    let mut gpu_state = cpu_state.clone();
    let ctrl: Vec<f32> = (0..n * model.nu()).map(|i| ((i % 7) as f32 - 3.0) / 3.0).collect();
    for _ in 0..10 {
        cpu_state = cpu_stepper.step(&cpu_state, &ctrl).unwrap();
        gpu_state = gpu_stepper.step(&gpu_state, &ctrl).unwrap();
    }
    for (a, b) in cpu_state.qpos.iter().zip(&gpu_state.qpos) {
        assert!((a - b).abs() < 1e-3, "cpu {a} vs gpu {b}");
    }
}
