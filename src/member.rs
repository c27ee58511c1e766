//! Members to be grouped and the pairwise scores the fitness is built from.

use crate::weights::AttributeWeights;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Stable identity of a member within a run
pub type MemberId = usize;

/// An entity to be assigned to a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Identity assigned by whoever builds the roster
    pub id: MemberId,
    /// Attributes rewarded for spread inside a group, each in [0, 1]
    pub divergent: Vec<f64>,
    /// Attributes rewarded for similarity inside a group, each in [0, 1]
    pub convergent: Vec<f64>,
    /// Members this one would like to share a group with
    #[serde(default)]
    pub preferences: HashSet<MemberId>,
}

impl Member {
    pub fn new(id: MemberId, divergent: Vec<f64>, convergent: Vec<f64>) -> Self {
        Member { id, divergent, convergent, preferences: HashSet::new() }
    }

    pub fn with_preferences<I: IntoIterator<Item = MemberId>>(mut self, preferences: I) -> Self {
        self.preferences = preferences.into_iter().collect();
        self
    }

    #[inline]
    pub fn prefers(&self, other: MemberId) -> bool {
        self.preferences.contains(&other)
    }

    /// Weighted mean absolute difference over divergent attributes, in [0, 1].
    /// Higher means more different.
    pub fn divergence(&self, other: &Member, weights: &AttributeWeights) -> f64 {
        weighted_difference(&self.divergent, &other.divergent, &weights.divergent, weights.divergent_sum)
    }

    /// One minus the weighted mean absolute difference over convergent
    /// attributes, in [0, 1]. Higher means more similar.
    pub fn convergence(&self, other: &Member, weights: &AttributeWeights) -> f64 {
        1.0 - weighted_difference(&self.convergent, &other.convergent, &weights.convergent, weights.convergent_sum)
    }

    /// `1 - (a prefers b + b prefers a) / 2`: 1.0 when neither lists the other,
    /// 0.5 for a one-sided preference, 0.0 for a mutual one.
    pub fn preference_score(&self, other: &Member) -> f64 {
        let first = if self.prefers(other.id) { 1.0 } else { 0.0 };
        let second = if other.prefers(self.id) { 1.0 } else { 0.0 };
        1.0 - (first + second) / 2.0
    }

    /// -1 when both members must be aggregated, +1 when both must be
    /// separated, 0 otherwise. Aggregation wins if a pair is in both sets.
    pub fn distribution_score(
        &self,
        other: &Member,
        aggregate: &HashSet<MemberId>,
        separate: &HashSet<MemberId>,
    ) -> i32 {
        if aggregate.contains(&self.id) && aggregate.contains(&other.id) {
            -1
        } else if separate.contains(&self.id) && separate.contains(&other.id) {
            1
        } else {
            0
        }
    }
}

fn weighted_difference(a: &[f64], b: &[f64], weights: &[f64], weight_sum: f64) -> f64 {
    if weight_sum <= 0.0 {
        return 0.0;
    }
    let sum: f64 = a.iter()
        .zip(b)
        .zip(weights)
        .map(|((x, y), w)| w * (x - y).abs())
        .sum();
    sum / weight_sum
}
