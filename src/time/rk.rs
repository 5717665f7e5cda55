//! Multi-stage low-storage schemes.
//!
//! One stage evaluates `q_s = q + alpha_s * dt * L(q_{s-1})`, so a scheme is
//! fully described by its coefficient list. The final coefficient must be
//! one for the step to be consistent.

/// Stage coefficients of a low-storage multi-stage scheme.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StageScheme {
    /// Fractional step multiplier of each stage, last entry 1.
    pub alpha: Vec<f64>,
}

impl StageScheme {
    /// The default five-stage scheme tuned for steady-state marching.
    pub fn low_storage_rk5() -> Self {
        Self {
            alpha: vec![0.05, 0.125, 0.25, 0.5, 1.0],
        }
    }

    /// Classic four-stage coefficients.
    pub fn rk4() -> Self {
        Self {
            alpha: vec![0.25, 1.0 / 3.0, 0.5, 1.0],
        }
    }

    /// Single forward-Euler stage.
    pub fn forward_euler() -> Self {
        Self { alpha: vec![1.0] }
    }

    /// A custom coefficient list. The final stage coefficient must be one.
    pub fn custom(alpha: Vec<f64>) -> Self {
        assert!(!alpha.is_empty(), "need at least one stage");
        let last = *alpha.last().unwrap();
        assert!(
            (last - 1.0).abs() < 1e-12,
            "final stage coefficient must be 1, got {last}"
        );
        Self { alpha }
    }

    /// Number of stages.
    pub fn n_stages(&self) -> usize {
        self.alpha.len()
    }
}

impl Default for StageScheme {
    fn default() -> Self {
        Self::low_storage_rk5()
    }
}
