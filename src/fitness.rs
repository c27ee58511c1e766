//! Composite fitness of a grouping.
//!
//! A permutation of members is cut into groups by the run's [`GroupLayout`].
//! Four cost terms are summed over all groups:
//!
//! - **mix**: how far each pair falls short of full divergence and of full
//!   convergence, weighted by the divergent/convergent mix shares
//! - **balance**: squared deviation of each group's attribute means from the
//!   population means
//! - **preference**: unmet pairwise preferences
//! - **distribution**: separated pairs sharing a group plus aggregated pairs
//!   split across groups
//!
//! Every term is non-negative. Fitness is `total_term_weight / weighted_cost`,
//! so lower cost means higher fitness. A zero cost has no usable reciprocal
//! and is reported as [`GaError::NonFiniteFitness`].
//!
//! [`GroupLayout`]: crate::context::GroupLayout

use crate::context::RunContext;
use crate::error::{GaError, Result};
use serde::{Deserialize, Serialize};

/// Raw and weighted terms behind one fitness value
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FitnessBreakdown {
    /// Sum of pairwise divergence over all in-group pairs
    pub divergence: f64,
    /// Sum of pairwise convergence over all in-group pairs
    pub convergence: f64,
    /// Sum of pairwise preference scores
    pub preference: f64,
    /// Sum of pairwise distribution scores, offset by the roster's aggregate
    /// pair count so that it counts violated constraints
    pub distribution: f64,
    /// Summed squared deviation of group means from population means
    pub balance: f64,
    /// Number of in-group pairs
    pub pairs: usize,
    /// Mix cost before the term weight is applied
    pub mix: f64,
    /// Weighted sum of the four cost terms
    pub cost: f64,
    /// `total_term_weight / cost`
    pub fitness: f64,
}

/// Scores permutations against a [`RunContext`]
#[derive(Debug, Clone, Copy)]
pub struct FitnessEvaluator<'a> {
    context: &'a RunContext,
}

impl<'a> FitnessEvaluator<'a> {
    pub fn new(context: &'a RunContext) -> Self {
        FitnessEvaluator { context }
    }

    pub fn context(&self) -> &'a RunContext {
        self.context
    }

    /// Fitness of `order`, a permutation of indices into the context's members
    pub fn evaluate(&self, order: &[usize]) -> Result<f64> {
        self.breakdown(order).map(|b| b.fitness)
    }

    /// All terms of the fitness of `order`
    pub fn breakdown(&self, order: &[usize]) -> Result<FitnessBreakdown> {
        let ctx = self.context;
        let members = ctx.members();
        let weights = ctx.weights();
        let means = ctx.means();
        let constraints = ctx.constraints();
        let n = ctx.member_count() as f64;

        check_permutation(order, ctx.member_count())?;

        let mut b = FitnessBreakdown::default();
        let mut group_divergent = vec![0.0; weights.divergent_len()];
        let mut group_convergent = vec![0.0; weights.convergent_len()];

        for range in ctx.layout().group_ranges() {
            let group = &order[range];

            for (i, &a) in group.iter().enumerate() {
                let a = &members[a];
                for &other in &group[i + 1..] {
                    let other = &members[other];
                    b.divergence += a.divergence(other, weights);
                    b.convergence += a.convergence(other, weights);
                    b.preference += a.preference_score(other);
                    b.distribution +=
                        a.distribution_score(other, &constraints.aggregate, &constraints.separate) as f64;
                    b.pairs += 1;
                }
            }

            // Group means are taken over the whole roster size, like the
            // population means they are compared against.
            group_divergent.iter_mut().for_each(|x| *x = 0.0);
            group_convergent.iter_mut().for_each(|x| *x = 0.0);
            for &idx in group {
                let m = &members[idx];
                for (acc, v) in group_divergent.iter_mut().zip(&m.divergent) {
                    *acc += v;
                }
                for (acc, v) in group_convergent.iter_mut().zip(&m.convergent) {
                    *acc += v;
                }
            }

            b.balance += squared_deviation(&group_divergent, &means.divergent, n);
            b.balance += squared_deviation(&group_convergent, &means.convergent, n);
        }

        // -1 per aggregate pair kept together, so the offset leaves the split ones
        b.distribution += ctx.aggregate_pairs() as f64;

        let pairs = b.pairs as f64;
        b.mix = (pairs - b.divergence) * weights.divergent_mix
            + (pairs - b.convergence) * weights.convergent_mix;

        b.cost = b.mix * weights.mix
            + b.balance * weights.balance
            + b.preference * weights.preference
            + b.distribution * weights.distribution;

        if !b.cost.is_finite() || b.cost <= 0.0 {
            return Err(GaError::NonFiniteFitness { cost: b.cost });
        }

        b.fitness = weights.total_term_weight() / b.cost;
        if !b.fitness.is_finite() {
            return Err(GaError::NonFiniteFitness { cost: b.cost });
        }

        Ok(b)
    }
}

pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(GaError::IndexOutOfRange { index, len });
    }
    Ok(())
}

/// `order` must hold every index in `0..len` exactly once
pub(crate) fn check_permutation(order: &[usize], len: usize) -> Result<()> {
    if order.len() != len {
        return Err(GaError::config(format!(
            "permutation has {} entries, roster has {}",
            order.len(),
            len
        )));
    }
    let mut seen = vec![false; len];
    for &idx in order {
        check_index(idx, len)?;
        if std::mem::replace(&mut seen[idx], true) {
            return Err(GaError::config(format!("index {} appears twice in permutation", idx)));
        }
    }
    Ok(())
}

fn squared_deviation(sums: &[f64], means: &[f64], n: f64) -> f64 {
    sums.iter()
        .zip(means)
        .map(|(s, m)| (s / n - m).powi(2))
        .sum()
}
