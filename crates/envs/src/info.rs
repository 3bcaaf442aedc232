//! Per-step and per-episode diagnostics.

/// Individual reward contributions of one step; `total` is their sum.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RewardTerms {
    pub tracking_lin: f32,
    pub tracking_ang: f32,
    pub control: f32,
    pub healthy: f32,
}

impl RewardTerms {
    #[must_use]
    pub fn total(&self) -> f32 {
        self.tracking_lin + self.tracking_ang + self.control + self.healthy
    }
}

/// Summary of a finished episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeInfo {
    pub episode_return: f32,
    pub episode_length: u32,
}

/// Diagnostics attached to every step result.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepInfo {
    pub reward_terms: RewardTerms,
    /// Set on the step that ends an episode.
    pub episode: Option<EpisodeInfo>,
}
