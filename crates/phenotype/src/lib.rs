#![warn(clippy::all, clippy::pedantic)]
//! Scene descriptions for legged robots.
//!
//! A [`Phenotype`] is the JSON form of a robot: a torso, a list of legs and
//! optional defaults shared by every leg and joint (the way MJCF `<default>`
//! classes work). [`Phenotype::into_model`] validates it and builds a
//! [`physics::Model`] for an explicit [`PhysicsConfig`].
//!
//! ```json
//! {
//!   "name": "tripod",
//!   "angle": "degree",
//!   "torso": { "mass": 5.0, "radius": 0.2, "inertia": [0.3, 0.3, 0.5], "spawn_height": 0.6 },
//!   "legs": [ { "name": "a", "mount_angle": 0, "hip_offset": 0.2, ... } ]
//! }
//! ```

use physics::{Joint, Leg, Model, PhysicsConfig, Torso, MAX_LEGS};
use serde::Deserialize;
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;

const ANT: &str = include_str!("../assets/ant.json");

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read scene {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed scene: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid scene: {0}")]
    Invalid(String),
}

fn invalid(msg: impl Into<String>) -> LoadError {
    LoadError::Invalid(msg.into())
}

/// Unit of every angle in the description.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    #[default]
    Degree,
    Radian,
}

impl AngleUnit {
    fn to_radians(self, value: f32) -> f32 {
        match self {
            Self::Degree => value.to_radians(),
            Self::Radian => value,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Phenotype {
    pub name: String,
    #[serde(default)]
    pub angle: AngleUnit,
    #[serde(default)]
    pub defaults: Defaults,
    pub torso: TorsoDef,
    pub legs: Vec<LegDef>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    #[serde(default)]
    pub joint: JointDefaults,
    #[serde(default)]
    pub leg: LegDefaults,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct JointDefaults {
    pub armature: Option<f32>,
    pub damping: Option<f32>,
    pub gear: Option<f32>,
    pub ctrl_range: Option<[f32; 2]>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct LegDefaults {
    pub hip_offset: Option<f32>,
    pub thigh_length: Option<f32>,
    pub shin_length: Option<f32>,
    pub foot_radius: Option<f32>,
    pub mass: Option<f32>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct TorsoDef {
    pub mass: f32,
    pub radius: f32,
    pub inertia: [f32; 3],
    pub spawn_height: f32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct LegDef {
    pub name: String,
    pub mount_angle: f32,
    pub hip_offset: Option<f32>,
    pub thigh_length: Option<f32>,
    pub shin_length: Option<f32>,
    pub foot_radius: Option<f32>,
    pub mass: Option<f32>,
    pub hip: JointDef,
    pub ankle: JointDef,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct JointDef {
    pub range: [f32; 2],
    #[serde(default)]
    pub init: f32,
    pub armature: Option<f32>,
    pub damping: Option<f32>,
    pub gear: Option<f32>,
    pub ctrl_range: Option<[f32; 2]>,
}

impl FromStr for Phenotype {
    type Err = LoadError;

    fn from_str(json: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Phenotype {
    /// Reads and parses a scene file.
    ///
    /// # Errors
    ///
    /// [`LoadError::Io`] if the file cannot be read, [`LoadError::Parse`] if
    /// it is not a well-formed description.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        json.parse()
    }

    /// The built-in four-legged Ant.
    ///
    /// # Errors
    ///
    /// Only if the bundled asset is corrupt.
    pub fn ant() -> Result<Self, LoadError> {
        ANT.parse()
    }

    /// Validates the description and builds a model for `config`.
    ///
    /// # Errors
    ///
    /// [`LoadError::Invalid`] for descriptions that cannot be simulated:
    /// no legs, more legs than the batched kernel supports, non-positive
    /// masses or lengths, inverted ranges, initial angles outside their
    /// range, and configs with a non-positive timestep or zero substeps.
    pub fn into_model(self, config: PhysicsConfig) -> Result<Model, LoadError> {
        validate_config(&config)?;
        if self.legs.is_empty() {
            return Err(invalid("scene has no legs"));
        }
        if self.legs.len() > MAX_LEGS {
            return Err(invalid(format!(
                "scene has {} legs, at most {MAX_LEGS} are supported",
                self.legs.len()
            )));
        }

        let torso = &self.torso;
        positive("torso.mass", torso.mass)?;
        positive("torso.radius", torso.radius)?;
        positive("torso.spawn_height", torso.spawn_height)?;
        for (axis, value) in ["x", "y", "z"].iter().zip(torso.inertia) {
            positive(&format!("torso.inertia.{axis}"), value)?;
        }

        let mut names = HashSet::new();
        let mut legs = Vec::with_capacity(self.legs.len());
        for def in &self.legs {
            if !names.insert(def.name.as_str()) {
                return Err(invalid(format!("duplicate leg name {:?}", def.name)));
            }
            legs.push(self.build_leg(def)?);
        }

        let torso = Torso {
            mass: torso.mass,
            radius: torso.radius,
            inertia: torso.inertia,
            spawn_height: torso.spawn_height,
        };
        Ok(Model::new(self.name, torso, legs, config))
    }

    fn build_leg(&self, def: &LegDef) -> Result<Leg, LoadError> {
        let d = &self.defaults.leg;
        let field = |name: &str, own: Option<f32>, fallback: Option<f32>| {
            let value = own
                .or(fallback)
                .ok_or_else(|| invalid(format!("leg {:?} has no {name}", def.name)))?;
            positive(&format!("{}.{name}", def.name), value)?;
            Ok::<_, LoadError>(value)
        };
        let mass = def.mass.or(d.mass).unwrap_or(0.0);
        if !(mass.is_finite() && mass >= 0.0) {
            return Err(invalid(format!("{}.mass must be non-negative", def.name)));
        }

        Ok(Leg {
            name: def.name.clone(),
            mount_angle: self.angle.to_radians(def.mount_angle),
            hip_offset: field("hip_offset", def.hip_offset, d.hip_offset)?,
            thigh_length: field("thigh_length", def.thigh_length, d.thigh_length)?,
            shin_length: field("shin_length", def.shin_length, d.shin_length)?,
            foot_radius: field("foot_radius", def.foot_radius, d.foot_radius)?,
            mass,
            hip: self.build_joint(&format!("{}.hip", def.name), &def.hip)?,
            ankle: self.build_joint(&format!("{}.ankle", def.name), &def.ankle)?,
        })
    }

    fn build_joint(&self, name: &str, def: &JointDef) -> Result<Joint, LoadError> {
        let d = &self.defaults.joint;
        let range = [
            self.angle.to_radians(def.range[0]),
            self.angle.to_radians(def.range[1]),
        ];
        let init = self.angle.to_radians(def.init);
        if !ordered(range) {
            return Err(invalid(format!("{name} has an inverted range")));
        }
        if !(range[0]..=range[1]).contains(&init) {
            return Err(invalid(format!("{name} starts outside its range")));
        }

        let armature = def.armature.or(d.armature).unwrap_or(1.0);
        positive(&format!("{name}.armature"), armature)?;
        let damping = def.damping.or(d.damping).unwrap_or(0.0);
        if !(damping.is_finite() && damping >= 0.0) {
            return Err(invalid(format!("{name}.damping must be non-negative")));
        }
        let gear = def.gear.or(d.gear).unwrap_or(1.0);
        if !gear.is_finite() {
            return Err(invalid(format!("{name}.gear must be finite")));
        }
        let ctrl_range = def.ctrl_range.or(d.ctrl_range).unwrap_or([-1.0, 1.0]);
        if !ordered(ctrl_range) {
            return Err(invalid(format!("{name} has an inverted control range")));
        }

        Ok(Joint {
            range,
            init,
            armature,
            damping,
            gear,
            ctrl_range,
        })
    }
}

fn ordered([lo, hi]: [f32; 2]) -> bool {
    lo.is_finite() && hi.is_finite() && lo <= hi
}

fn positive(name: &str, value: f32) -> Result<(), LoadError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be positive, got {value}")))
    }
}

fn non_negative(name: &str, value: f32) -> Result<(), LoadError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be non-negative, got {value}")))
    }
}

fn validate_config(config: &PhysicsConfig) -> Result<(), LoadError> {
    positive("timestep", config.timestep)?;
    // Divides the friction force; zero gives 0/0 for a resting body.
    positive("contact.friction_smoothing", config.contact.friction_smoothing)?;
    non_negative("contact.stiffness", config.contact.stiffness)?;
    non_negative("contact.damping", config.contact.damping)?;
    non_negative("contact.friction", config.contact.friction)?;
    non_negative("limit.stiffness", config.limit.stiffness)?;
    non_negative("limit.damping", config.limit.damping)?;
    if config.substeps == 0 {
        return Err(invalid("substeps must be at least 1"));
    }
    if !config.gravity.is_finite() {
        return Err(invalid("gravity must be finite"));
    }
    Ok(())
}
