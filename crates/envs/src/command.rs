//! Velocity commands and the keys they are drawn from.
//!
//! Randomness is threaded explicitly: a key seeds a [`fastrand::Rng`], the
//! draw consumes it and a fresh key for the next draw is taken from the same
//! generator. Equal keys always give equal draws.

use crate::config::CommandRanges;

/// Target velocity in the torso heading frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Command {
    pub vx: f32,
    pub vy: f32,
    pub yaw_rate: f32,
}

impl Command {
    pub const LEN: usize = 3;

    #[must_use]
    pub const fn new(vx: f32, vy: f32, yaw_rate: f32) -> Self {
        Self { vx, vy, yaw_rate }
    }

    #[must_use]
    pub fn from_slice(values: &[f32]) -> Self {
        Self::new(values[0], values[1], values[2])
    }

    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.vx, self.vy, self.yaw_rate]
    }
}

fn uniform(rng: &mut fastrand::Rng, [lo, hi]: [f32; 2]) -> f32 {
    lo + (hi - lo) * rng.f32()
}

/// Draws a command uniformly inside `ranges`.
pub fn sample(rng: &mut fastrand::Rng, ranges: &CommandRanges) -> Command {
    Command::new(
        uniform(rng, ranges.vx),
        uniform(rng, ranges.vy),
        uniform(rng, ranges.yaw_rate),
    )
}

/// Draws a command from `key` and returns it with the next key.
#[must_use]
pub fn sample_with_key(key: u64, ranges: &CommandRanges) -> (Command, u64) {
    let mut rng = fastrand::Rng::with_seed(key);
    let command = sample(&mut rng, ranges);
    (command, rng.u64(..))
}

/// Derives `n` independent keys from one.
#[must_use]
pub fn split_key(key: u64, n: usize) -> Vec<u64> {
    let rng = fastrand::Rng::with_seed(key);
    (0..n).map(|_| rng.u64(..)).collect()
}
