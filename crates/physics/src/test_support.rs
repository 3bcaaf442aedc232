use crate::{Joint, Leg, Model, PhysicsConfig, Torso};

fn joint(lo: f32, hi: f32, init: f32, gear: f32) -> Joint {
    Joint {
        range: [lo, hi],
        init,
        armature: 1.0,
        damping: 1.0,
        gear,
        ctrl_range: [-1.0, 1.0],
    }
}

fn leg(name: &str, angle: f32, gear: f32) -> Leg {
    Leg {
        name: name.into(),
        mount_angle: angle,
        hip_offset: 0.2,
        thigh_length: 0.2,
        shin_length: 0.4,
        foot_radius: 0.05,
        mass: 0.5,
        hip: joint(-0.5, 0.5, 0.0, gear),
        ankle: joint(0.3, 1.2, 0.6, gear),
    }
}

fn torso() -> Torso {
    Torso {
        mass: 4.0,
        radius: 0.2,
        inertia: [0.2, 0.2, 0.3],
        spawn_height: 0.6,
    }
}

pub fn two_leg_model() -> Model {
    Model::new(
        "biped",
        torso(),
        vec![leg("left", 0.0, 10.0), leg("right", std::f32::consts::PI, 10.0)],
        PhysicsConfig::default(),
    )
}

/// Four legs on the diagonals with a configurable motor gear.
pub fn quad_model(gear: f32) -> Model {
    let legs = (0..4u8)
        .map(|k| {
            let angle = std::f32::consts::FRAC_PI_4 * f32::from(2 * k + 1);
            leg(&format!("leg_{k}"), angle, gear)
        })
        .collect();
    Model::new("quad", torso(), legs, PhysicsConfig::default())
}
