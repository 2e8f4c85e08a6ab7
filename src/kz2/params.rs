//! # KZ2 parameters
//!
//! All costs are integers so that each expansion move is an exact integer min-cut. Real valued
//! weights are expressed as fractions over a shared `denominator`: the data term is multiplied by
//! it, which is equivalent to using `lambda1 / denominator`, `lambda2 / denominator` and
//! `k / denominator`.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::*;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Largest denominator tried when turning real weights into fractions.
pub const MAX_DENOMINATOR: i64 = 16;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Norm applied to the intensity distance of the data term.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataCost {
    L1,
    L2,
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Params {
    pub data_cost: DataCost,
    pub denominator: i64,

    /// Intensity difference from which a neighbour pair is treated as an edge.
    pub i_threshold2: i64,
    /// Smoothness cost not across an edge.
    pub lambda1: i64,
    /// Smoothness cost across an edge, must not exceed `lambda1`.
    pub lambda2: i64,
    /// Occlusion penalty.
    pub k: i64,
    /// Occlusion penalty for pixels whose disparity range leaves the right image. `None` uses `k`.
    pub border_occlusion: Option<i64>,

    /// Maximum number of sweeps over the disparity labels.
    pub iter_max: usize,
    /// Visit labels in a fresh random order every sweep instead of ascending order.
    pub randomize_every_iteration: bool,
    pub seed: u64,
}

/// Weights left unset are derived from the images, see `AutoParams::resolve`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AutoParams {
    pub k: Option<f32>,
    pub lambda: Option<f32>,
    pub lambda1: Option<f32>,
    pub lambda2: Option<f32>,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Params {
            data_cost: DataCost::L2,
            denominator: 1,
            i_threshold2: 8,
            lambda1: 15,
            lambda2: 5,
            k: 25,
            border_occlusion: None,
            iter_max: 4,
            randomize_every_iteration: false,
            seed: 0,
        }
    }
}

impl Params {
    /// Load parameters from a TOML file. Missing keys keep their default value.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let params: Params = toml::from_str(text)?;
        params.validate()?;
        Ok(params)
    }

    /// Check the parameters describe a regular (graph-representable) energy.
    pub fn validate(&self) -> Result<()> {
        if self.denominator <= 0 {
            return Err(Error::Configuration(format!(
                "denominator must be positive, got {}",
                self.denominator
            )));
        }
        if self.i_threshold2 < 0 {
            return Err(Error::Configuration(format!(
                "i_threshold2 must be non-negative, got {}",
                self.i_threshold2
            )));
        }
        if self.lambda2 < 0 || self.lambda1 < 0 {
            return Err(Error::Configuration(format!(
                "smoothness costs must be non-negative, got lambda1 = {}, lambda2 = {}",
                self.lambda1, self.lambda2
            )));
        }
        if self.lambda2 > self.lambda1 {
            return Err(Error::Configuration(format!(
                "lambda2 ({}) must not exceed lambda1 ({})",
                self.lambda2, self.lambda1
            )));
        }
        if self.k < 0 {
            return Err(Error::Configuration(format!(
                "occlusion penalty must be non-negative, got {}",
                self.k
            )));
        }
        if let Some(k) = self.border_occlusion {
            if k < 0 {
                return Err(Error::Configuration(format!(
                    "border occlusion penalty must be non-negative, got {}",
                    k
                )));
            }
        }
        if self.iter_max == 0 {
            return Err(Error::Configuration("iter_max must be at least 1".into()));
        }

        Ok(())
    }
}

impl AutoParams {
    /// Fill in `k`, `lambda1` and `lambda2` of `base`.
    ///
    /// A missing `k` comes from `estimate_k`, which is only called when needed. A missing `lambda`
    /// is `k / 5`, `lambda1` defaults to `3 * lambda` and `lambda2` to `lambda`. The three real
    /// values are then written as fractions sharing the denominator up to `MAX_DENOMINATOR` with
    /// the least relative rounding error.
    pub fn resolve<F>(&self, base: Params, estimate_k: F) -> Result<Params>
    where
        F: FnOnce() -> Result<f32>,
    {
        let k = match self.k {
            Some(k) => k,
            None => estimate_k()?,
        };
        let lambda = self.lambda.unwrap_or(k / 5.0);
        let lambda1 = self.lambda1.unwrap_or(3.0 * lambda);
        let lambda2 = self.lambda2.unwrap_or(lambda);

        for (name, v) in &[("k", k), ("lambda1", lambda1), ("lambda2", lambda2)] {
            if !v.is_finite() || *v < 0.0 {
                return Err(Error::Configuration(format!(
                    "{} must be a non-negative number, got {}",
                    name, v
                )));
            }
        }

        let (denominator, [k, lambda1, lambda2]) = best_fractions([k, lambda1, lambda2]);

        let params = Params {
            denominator,
            k,
            lambda1,
            lambda2,
            ..base
        };
        params.validate()?;
        Ok(params)
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Shared denominator and numerators approximating `values`.
fn best_fractions(values: [f32; 3]) -> (i64, [i64; 3]) {
    let mut best = (1, [0; 3]);
    let mut best_error = f32::MAX;

    for den in 1..=MAX_DENOMINATOR {
        let mut error = 0.0;
        let mut nums = [0; 3];

        for (num, &v) in nums.iter_mut().zip(values.iter()) {
            let scaled = den as f32 * v;
            *num = (scaled + 0.5) as i64;
            if v > 0.0 {
                error += (*num as f32 / scaled - 1.0).abs();
            }
        }

        if error < best_error {
            best_error = error;
            best = (den, nums);
        }
    }

    best
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_valid() {
        assert!(Params::default().validate().is_ok());
    }

    #[test]
    fn edge_cost_above_smooth_cost_is_rejected() {
        let params = Params {
            lambda1: 1,
            lambda2: 2,
            ..Params::default()
        };

        assert!(matches!(params.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn non_positive_denominator_is_rejected() {
        let params = Params {
            denominator: 0,
            ..Params::default()
        };

        assert!(matches!(params.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn toml_keeps_defaults_for_missing_keys() {
        let params = Params::from_toml_str(
            r#"
            data_cost = "L1"
            k = 12
            randomize_every_iteration = true
            "#,
        )
        .unwrap();

        assert_eq!(params.data_cost, DataCost::L1);
        assert_eq!(params.k, 12);
        assert!(params.randomize_every_iteration);
        assert_eq!(params.lambda1, Params::default().lambda1);
    }

    #[test]
    fn invalid_toml_params_are_rejected() {
        assert!(matches!(
            Params::from_toml_str("lambda1 = 1\nlambda2 = 4"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn integer_weights_need_no_denominator() {
        let auto = AutoParams {
            k: Some(10.0),
            ..AutoParams::default()
        };
        let params = auto.resolve(Params::default(), || unreachable!()).unwrap();

        assert_eq!(params.denominator, 1);
        assert_eq!((params.k, params.lambda1, params.lambda2), (10, 6, 2));
    }

    #[test]
    fn fractional_weights_share_a_denominator() {
        // k = 7.5, lambda = 1.5, lambda1 = 4.5
        let auto = AutoParams::default();
        let params = auto.resolve(Params::default(), || Ok(7.5)).unwrap();

        assert_eq!(params.denominator, 2);
        assert_eq!((params.k, params.lambda1, params.lambda2), (15, 9, 3));
    }
}
