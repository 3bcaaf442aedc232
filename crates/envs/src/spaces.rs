//! Flat box spaces for observations and actions.

/// Axis-aligned box of `f32` vectors. Bounds may be infinite.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSpace {
    pub low: Vec<f32>,
    pub high: Vec<f32>,
}

impl BoxSpace {
    /// # Panics
    ///
    /// Panics if the bounds have different lengths.
    #[must_use]
    pub fn new(low: Vec<f32>, high: Vec<f32>) -> Self {
        assert_eq!(low.len(), high.len(), "box bounds must have the same length");
        Self { low, high }
    }

    /// `(-∞, ∞)` in every one of `n` dimensions.
    #[must_use]
    pub fn unbounded(n: usize) -> Self {
        Self::new(vec![f32::NEG_INFINITY; n], vec![f32::INFINITY; n])
    }

    #[must_use]
    pub fn shape(&self) -> [usize; 1] {
        [self.low.len()]
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.low.len()
    }

    #[must_use]
    pub fn contains(&self, x: &[f32]) -> bool {
        x.len() == self.dim()
            && x
                .iter()
                .zip(self.low.iter().zip(&self.high))
                .all(|(v, (lo, hi))| (*lo..=*hi).contains(v))
    }

    /// Clamps every component into the box. NaN components map to the lower
    /// bound.
    #[must_use]
    pub fn clip(&self, x: &[f32]) -> Vec<f32> {
        x.iter()
            .zip(self.low.iter().zip(&self.high))
            .map(|(v, (lo, hi))| v.max(*lo).min(*hi))
            .collect()
    }

    /// Uniform sample inside the box. Unbounded dimensions draw from
    /// `[-1, 1]` around their finite bound (or the origin).
    pub fn sample(&self, rng: &mut fastrand::Rng) -> Vec<f32> {
        self.low
            .iter()
            .zip(&self.high)
            .map(|(&lo, &hi)| match (lo.is_finite(), hi.is_finite()) {
                (true, true) => lo + (hi - lo) * rng.f32(),
                (true, false) => lo + rng.f32(),
                (false, true) => hi - rng.f32(),
                (false, false) => 2.0 * rng.f32() - 1.0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_stay_inside() {
        let space = BoxSpace::new(vec![-1.0, 0.0, 2.0], vec![1.0, 0.5, 2.0]);
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..100 {
            assert!(space.contains(&space.sample(&mut rng)));
        }
    }

    #[test]
    fn clip_projects_onto_box() {
        let space = BoxSpace::new(vec![-1.0; 2], vec![1.0; 2]);
        assert_eq!(space.clip(&[3.0, -0.25]), vec![1.0, -0.25]);
        assert!(!space.contains(&[3.0, 0.0]));
        assert!(!space.contains(&[0.0]));
    }

    #[test]
    fn unbounded_contains_everything_finite() {
        let space = BoxSpace::unbounded(3);
        assert_eq!(space.shape(), [3]);
        assert!(space.contains(&[1e30, -1e30, 0.0]));
        assert!(!space.contains(&[f32::NAN, 0.0, 0.0]));
        let mut rng = fastrand::Rng::with_seed(1);
        assert!(space.sample(&mut rng).iter().all(|v| v.abs() <= 1.0));
    }
}
