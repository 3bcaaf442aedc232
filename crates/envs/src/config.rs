//! Task and environment configuration.
//!
//! Everything deserializes from JSON with every field optional; missing
//! fields take the documented defaults.

use crate::error::EnvError;
use physics::PhysicsConfig;
use serde::Deserialize;
use std::{cmp::Ordering, path::Path};

/// Scale of each reward term. The total reward is
/// `-tracking_lin·|v_xy − cmd_xy|² − tracking_ang·(ω_z − cmd_yaw)² − control·|a|² + healthy`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewardWeights {
    pub tracking_lin: f32,
    pub tracking_ang: f32,
    pub control: f32,
    pub healthy: f32,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            tracking_lin: 1.0,
            tracking_ang: 0.5,
            control: 0.01,
            healthy: 1.0,
        }
    }
}

/// Sampling bounds of the velocity command, `[low, high]` per component.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandRanges {
    pub vx: [f32; 2],
    pub vy: [f32; 2],
    pub yaw_rate: [f32; 2],
}

impl Default for CommandRanges {
    fn default() -> Self {
        Self {
            vx: [-1.0, 1.0],
            vy: [-0.5, 0.5],
            yaw_rate: [-0.5, 0.5],
        }
    }
}

impl CommandRanges {
    #[must_use]
    pub fn as_array(&self) -> [[f32; 2]; 3] {
        [self.vx, self.vy, self.yaw_rate]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskConfig {
    /// Control steps after which an episode is truncated.
    pub horizon: u32,
    pub reward: RewardWeights,
    pub command: CommandRanges,
    /// Steps between command resamples; 0 keeps one command per episode.
    pub command_resample_interval: u32,
    pub min_height: f32,
    pub max_height: f32,
    /// Episodes end when the torso up axis has a smaller world z component.
    pub min_up_z: f32,
    /// Half-width of the uniform noise added to joint angles and velocities
    /// at reset.
    pub reset_noise_scale: f32,
    /// Multiplier applied to actions before clipping to the control range.
    pub action_scale: f32,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            horizon: 1000,
            reward: RewardWeights::default(),
            command: CommandRanges::default(),
            command_resample_interval: 0,
            min_height: 0.2,
            max_height: 1.0,
            min_up_z: 0.0,
            reset_noise_scale: 0.1,
            action_scale: 1.0,
        }
    }
}

impl TaskConfig {
    /// # Errors
    ///
    /// [`EnvError::Config`] for inverted command ranges or height bounds, a
    /// zero horizon, a negative noise scale or any non-finite scale or weight.
    pub fn validate(&self) -> Result<(), EnvError> {
        if self.horizon == 0 {
            return Err(EnvError::Config("horizon must be at least 1".into()));
        }
        for (name, [lo, hi]) in ["vx", "vy", "yaw_rate"].iter().zip(self.command.as_array()) {
            if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
                return Err(EnvError::Config(format!("command range {name} is not [low, high]")));
            }
        }
        if self.min_height.partial_cmp(&self.max_height) != Some(Ordering::Less) {
            return Err(EnvError::Config("min_height must be below max_height".into()));
        }
        if !(self.reset_noise_scale.is_finite() && self.reset_noise_scale >= 0.0) {
            return Err(EnvError::Config("reset_noise_scale must be finite and non-negative".into()));
        }
        let finite = [
            ("action_scale", self.action_scale),
            ("min_up_z", self.min_up_z),
            ("reward.tracking_lin", self.reward.tracking_lin),
            ("reward.tracking_ang", self.reward.tracking_ang),
            ("reward.control", self.reward.control),
            ("reward.healthy", self.reward.healthy),
        ];
        if let Some((name, value)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(EnvError::Config(format!("{name} must be finite, got {value}")));
        }
        Ok(())
    }
}

/// Everything needed to build an environment besides the scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvConfig {
    pub physics: PhysicsConfig,
    pub task: TaskConfig,
}

impl EnvConfig {
    /// Reads a JSON config file.
    ///
    /// # Errors
    ///
    /// [`EnvError::Config`] when the file cannot be read or parsed, or the
    /// task section fails [`TaskConfig::validate`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EnvError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| EnvError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| EnvError::Config(format!("cannot parse {}: {e}", path.display())))?;
        config.task.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EnvConfig =
            serde_json::from_str(r#"{ "task": { "horizon": 50, "reward": { "healthy": 0.5 } } }"#).unwrap();
        assert_eq!(config.task.horizon, 50);
        assert_eq!(config.task.reward.healthy, 0.5);
        assert_eq!(config.task.reward.tracking_lin, 1.0);
        assert_eq!(config.physics, PhysicsConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(serde_json::from_str::<EnvConfig>(r#"{ "task": { "horizn": 5 } }"#).is_err());
    }

    #[test]
    fn inverted_command_range_fails_validation() {
        let mut task = TaskConfig::default();
        task.command.vy = [1.0, -1.0];
        assert!(matches!(task.validate(), Err(EnvError::Config(_))));
        assert!(TaskConfig::default().validate().is_ok());
    }

    #[test]
    fn non_finite_scales_fail_validation() {
        let tweaks: [fn(&mut TaskConfig); 5] = [
            |t| t.reset_noise_scale = f32::INFINITY,
            |t| t.reset_noise_scale = -0.1,
            |t| t.action_scale = f32::NAN,
            |t| t.min_up_z = f32::NEG_INFINITY,
            |t| t.reward.control = f32::NAN,
        ];
        for tweak in tweaks {
            let mut task = TaskConfig::default();
            tweak(&mut task);
            assert!(matches!(task.validate(), Err(EnvError::Config(_))), "{task:?}");
        }
    }
}
