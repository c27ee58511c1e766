//! Weight configuration for the grouping objectives.
//!
//! Two classes of member attributes are weighted per characteristic:
//! *divergent* attributes (rewarded for spread inside a group) and
//! *convergent* attributes (rewarded for similarity inside a group).
//! Scalar weights then combine the divergent/convergent contributions into a
//! single mix score, and the four fitness terms (mix, balance, preference,
//! distribution) into the composite cost.

use crate::error::{GaError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Characteristic and term weights used by the fitness evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WeightsFile")]
pub struct AttributeWeights {
    /// Per-characteristic weights of the divergent attributes
    pub divergent: Vec<f64>,
    /// Per-characteristic weights of the convergent attributes
    pub convergent: Vec<f64>,
    /// Sum of `divergent`
    pub divergent_sum: f64,
    /// Sum of `convergent`
    pub convergent_sum: f64,
    /// Share of the divergent contribution in the mix score
    pub divergent_mix: f64,
    /// Share of the convergent contribution in the mix score
    pub convergent_mix: f64,
    /// Weight of the mix term
    pub mix: f64,
    /// Weight of the balance term
    pub balance: f64,
    /// Weight of the preference term
    pub preference: f64,
    /// Weight of the distribution term
    pub distribution: f64,
}

/// On-disk shape of a weights file. Sums are always derived, never read.
#[derive(Debug, Clone, Deserialize)]
struct WeightsFile {
    divergent: Vec<f64>,
    convergent: Vec<f64>,
    #[serde(default = "default_half")]
    divergent_mix: f64,
    #[serde(default = "default_half")]
    convergent_mix: f64,
    #[serde(default = "default_one")]
    mix: f64,
    #[serde(default = "default_one")]
    balance: f64,
    #[serde(default = "default_one")]
    preference: f64,
    #[serde(default = "default_one")]
    distribution: f64,
}

fn default_half() -> f64 {
    0.5
}

fn default_one() -> f64 {
    1.0
}

impl From<WeightsFile> for AttributeWeights {
    fn from(file: WeightsFile) -> Self {
        AttributeWeights::new(file.divergent, file.convergent)
            .with_mix(file.divergent_mix, file.convergent_mix)
            .with_terms(file.mix, file.balance, file.preference, file.distribution)
    }
}

impl AttributeWeights {
    /// Build weights from per-characteristic vectors. Mix shares default to an
    /// even split and every term weight defaults to 1.
    pub fn new(divergent: Vec<f64>, convergent: Vec<f64>) -> Self {
        let divergent_sum = divergent.iter().sum();
        let convergent_sum = convergent.iter().sum();
        AttributeWeights {
            divergent,
            convergent,
            divergent_sum,
            convergent_sum,
            divergent_mix: 0.5,
            convergent_mix: 0.5,
            mix: 1.0,
            balance: 1.0,
            preference: 1.0,
            distribution: 1.0,
        }
    }

    /// Every characteristic weighted 1
    pub fn uniform(divergent_len: usize, convergent_len: usize) -> Self {
        Self::new(vec![1.0; divergent_len], vec![1.0; convergent_len])
    }

    /// Divide absolute characteristic weights by their grand total, so that
    /// all characteristic weights of both classes sum to 1. The grand total
    /// must be positive and finite.
    pub fn normalized(divergent: &[f64], convergent: &[f64]) -> Result<Self> {
        let total: f64 = divergent.iter().chain(convergent).sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(GaError::config(format!(
                "characteristic weights total {} cannot be normalized",
                total
            )));
        }
        Ok(Self::new(
            divergent.iter().map(|w| w / total).collect(),
            convergent.iter().map(|w| w / total).collect(),
        ))
    }

    /// Read weights from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let weights: AttributeWeights = serde_json::from_reader(BufReader::new(file))?;
        weights.validate()?;
        Ok(weights)
    }

    pub fn with_mix(mut self, divergent_mix: f64, convergent_mix: f64) -> Self {
        self.divergent_mix = divergent_mix;
        self.convergent_mix = convergent_mix;
        self
    }

    pub fn with_terms(mut self, mix: f64, balance: f64, preference: f64, distribution: f64) -> Self {
        self.mix = mix;
        self.balance = balance;
        self.preference = preference;
        self.distribution = distribution;
        self
    }

    /// Numerator of the fitness reciprocal
    #[inline]
    pub fn total_term_weight(&self) -> f64 {
        self.mix + self.balance + self.preference + self.distribution
    }

    pub fn divergent_len(&self) -> usize {
        self.divergent.len()
    }

    pub fn convergent_len(&self) -> usize {
        self.convergent.len()
    }

    /// Reject negative or non-finite weights, and weight vectors whose sum
    /// would make the pairwise normalization divide by zero.
    pub fn validate(&self) -> Result<()> {
        let scalars = [
            ("divergent_mix", self.divergent_mix),
            ("convergent_mix", self.convergent_mix),
            ("mix", self.mix),
            ("balance", self.balance),
            ("preference", self.preference),
            ("distribution", self.distribution),
        ];
        for (name, value) in scalars {
            if !value.is_finite() || value < 0.0 {
                return Err(GaError::config(format!("weight `{}` must be non-negative, got {}", name, value)));
            }
        }

        for (class, weights, sum) in [
            ("divergent", &self.divergent, self.divergent_sum),
            ("convergent", &self.convergent, self.convergent_sum),
        ] {
            if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
                return Err(GaError::config(format!("{} characteristic weight must be non-negative, got {}", class, w)));
            }
            if !weights.is_empty() && sum <= 0.0 {
                return Err(GaError::config(format!("{} characteristic weights sum to zero", class)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sums_precomputed() {
        let w = AttributeWeights::new(vec![2.0, 5.0], vec![2.0, 3.0]);
        assert_eq!(w.divergent_sum, 7.0);
        assert_eq!(w.convergent_sum, 5.0);
        assert_eq!(w.total_term_weight(), 4.0);
    }

    #[test]
    fn test_normalized_by_grand_total() {
        let w = AttributeWeights::normalized(&[2.0, 5.0], &[2.0, 3.0]).unwrap();
        assert!((w.divergent[1] - 5.0 / 12.0).abs() < 1e-12);
        assert!((w.divergent_sum + w.convergent_sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalized_rejects_empty_total() {
        assert!(matches!(
            AttributeWeights::normalized(&[0.0, 0.0], &[0.0]),
            Err(GaError::InvalidConfiguration(_))
        ));
        assert!(AttributeWeights::normalized(&[], &[]).is_err());
        assert!(AttributeWeights::normalized(&[f64::INFINITY], &[1.0]).is_err());
    }

    #[test]
    fn test_validate_rejects_negative() {
        let w = AttributeWeights::uniform(2, 2).with_terms(1.0, -1.0, 0.0, 0.0);
        assert!(w.validate().is_err());

        let w = AttributeWeights::new(vec![0.0, 0.0], vec![1.0]);
        assert!(w.validate().is_err());

        assert!(AttributeWeights::uniform(0, 3).validate().is_ok());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let json = r#"{ "divergent": [1.0, 3.0], "convergent": [2.0], "balance": 2.5 }"#;
        let w: AttributeWeights = serde_json::from_str(json).unwrap();
        assert_eq!(w.divergent_sum, 4.0);
        assert_eq!(w.balance, 2.5);
        assert_eq!(w.mix, 1.0);
        assert_eq!(w.divergent_mix, 0.5);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        std::fs::write(&path, r#"{ "divergent": [1.0], "convergent": [1.0, 1.0], "preference": 0.0 }"#).unwrap();

        let w = AttributeWeights::from_json_file(&path).unwrap();
        assert_eq!(w.convergent_len(), 2);
        assert_eq!(w.preference, 0.0);

        std::fs::write(&path, r#"{ "divergent": [-1.0], "convergent": [] }"#).unwrap();
        assert!(AttributeWeights::from_json_file(&path).is_err());
        assert!(AttributeWeights::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
