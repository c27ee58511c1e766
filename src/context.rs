//! Run-scoped, immutable data shared by every genome of a run.
//!
//! The group layout, the population attribute means and the co-location
//! constraints are derived once from the roster and never change while the
//! algorithm runs. They travel together as a [`RunContext`].

use crate::error::{GaError, Result};
use crate::member::{Member, MemberId};
use crate::weights::AttributeWeights;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;

/// Positional partition of permutation slots into contiguous groups.
///
/// With `n` members and `g` groups every group holds `n / g` slots, and the
/// last `n % g` groups hold one extra.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLayout {
    offsets: Vec<usize>,
    member_count: usize,
}

impl GroupLayout {
    pub fn new(member_count: usize, group_count: usize) -> Result<Self> {
        if group_count == 0 {
            return Err(GaError::config("group count must be positive"));
        }
        if member_count < group_count {
            return Err(GaError::config(format!(
                "cannot split {} members into {} groups",
                member_count, group_count
            )));
        }

        let base = member_count / group_count;
        let remainder = member_count % group_count;
        let first_larger = group_count - remainder;

        let mut offsets = Vec::with_capacity(group_count);
        let mut offset = 0;
        for group in 0..group_count {
            offsets.push(offset);
            offset += if group >= first_larger { base + 1 } else { base };
        }

        Ok(GroupLayout { offsets, member_count })
    }

    /// First slot of each group
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn group_count(&self) -> usize {
        self.offsets.len()
    }

    pub fn member_count(&self) -> usize {
        self.member_count
    }

    /// Slot range of group `group`
    pub fn group_range(&self, group: usize) -> Range<usize> {
        let start = self.offsets[group];
        let end = self.offsets.get(group + 1).copied().unwrap_or(self.member_count);
        start..end
    }

    pub fn group_ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.group_count()).map(move |g| self.group_range(g))
    }

    pub fn group_size(&self, group: usize) -> usize {
        self.group_range(group).len()
    }
}

/// Mean of every attribute over the whole roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationMeans {
    pub divergent: Vec<f64>,
    pub convergent: Vec<f64>,
}

impl PopulationMeans {
    pub fn from_members(members: &[Member], divergent_len: usize, convergent_len: usize) -> Self {
        let n = members.len().max(1) as f64;
        let mut divergent = vec![0.0; divergent_len];
        let mut convergent = vec![0.0; convergent_len];

        for member in members {
            for (acc, v) in divergent.iter_mut().zip(&member.divergent) {
                *acc += v;
            }
            for (acc, v) in convergent.iter_mut().zip(&member.convergent) {
                *acc += v;
            }
        }
        divergent.iter_mut().for_each(|x| *x /= n);
        convergent.iter_mut().for_each(|x| *x /= n);

        PopulationMeans { divergent, convergent }
    }
}

/// Identities that should share a group, and identities that should not
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionConstraints {
    #[serde(default)]
    pub aggregate: HashSet<MemberId>,
    #[serde(default)]
    pub separate: HashSet<MemberId>,
}

impl DistributionConstraints {
    pub fn new<A, S>(aggregate: A, separate: S) -> Self
    where
        A: IntoIterator<Item = MemberId>,
        S: IntoIterator<Item = MemberId>,
    {
        DistributionConstraints {
            aggregate: aggregate.into_iter().collect(),
            separate: separate.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.aggregate.is_empty() && self.separate.is_empty()
    }

    /// Number of roster pairs that are both marked for aggregation
    pub fn aggregate_pairs(&self, members: &[Member]) -> usize {
        let k = members.iter().filter(|m| self.aggregate.contains(&m.id)).count();
        k * k.saturating_sub(1) / 2
    }
}

/// Everything a fitness evaluation needs besides the permutation itself
#[derive(Debug, Clone)]
pub struct RunContext {
    members: Vec<Member>,
    layout: GroupLayout,
    means: PopulationMeans,
    weights: AttributeWeights,
    constraints: DistributionConstraints,
    aggregate_pairs: usize,
}

impl RunContext {
    /// Validate the roster against the weights and derive layout and means.
    pub fn new(
        members: Vec<Member>,
        group_count: usize,
        weights: AttributeWeights,
        constraints: DistributionConstraints,
    ) -> Result<Self> {
        if members.is_empty() {
            return Err(GaError::config("member list is empty"));
        }
        weights.validate()?;

        let mut seen = HashSet::with_capacity(members.len());
        for member in &members {
            if !seen.insert(member.id) {
                return Err(GaError::config(format!("duplicate member id {}", member.id)));
            }
            if member.divergent.len() != weights.divergent_len() {
                return Err(GaError::config(format!(
                    "member {} has {} divergent attributes, weights expect {}",
                    member.id,
                    member.divergent.len(),
                    weights.divergent_len()
                )));
            }
            if member.convergent.len() != weights.convergent_len() {
                return Err(GaError::config(format!(
                    "member {} has {} convergent attributes, weights expect {}",
                    member.id,
                    member.convergent.len(),
                    weights.convergent_len()
                )));
            }
            let attributes = member.divergent.iter().chain(&member.convergent);
            if let Some(value) = attributes.copied().find(|v| !(0.0..=1.0).contains(v)) {
                return Err(GaError::config(format!(
                    "member {} has attribute {} outside [0, 1]",
                    member.id, value
                )));
            }
        }

        let layout = GroupLayout::new(members.len(), group_count)?;
        let means = PopulationMeans::from_members(&members, weights.divergent_len(), weights.convergent_len());

        let aggregate_pairs = constraints.aggregate_pairs(&members);

        Ok(RunContext { members, layout, means, weights, constraints, aggregate_pairs })
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn layout(&self) -> &GroupLayout {
        &self.layout
    }

    pub fn means(&self) -> &PopulationMeans {
        &self.means
    }

    pub fn weights(&self) -> &AttributeWeights {
        &self.weights
    }

    pub fn constraints(&self) -> &DistributionConstraints {
        &self.constraints
    }

    /// Aggregate pairs in the roster, the most a grouping can keep together
    pub fn aggregate_pairs(&self) -> usize {
        self.aggregate_pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_even_split() {
        let layout = GroupLayout::new(20, 5).unwrap();
        assert_eq!(layout.offsets(), &[0, 4, 8, 12, 16]);
        assert!(layout.group_ranges().all(|r| r.len() == 4));
    }

    #[test]
    fn test_layout_remainder_goes_to_last_groups() {
        let layout = GroupLayout::new(11, 3).unwrap();
        let sizes: Vec<usize> = (0..3).map(|g| layout.group_size(g)).collect();
        assert_eq!(sizes, vec![3, 4, 4]);
        assert_eq!(layout.offsets(), &[0, 3, 7]);
        assert_eq!(layout.group_range(2), 7..11);
    }

    #[test]
    fn test_layout_rejects_degenerate_input() {
        assert!(GroupLayout::new(5, 0).is_err());
        assert!(GroupLayout::new(2, 3).is_err());
    }

    #[test]
    fn test_population_means() {
        let members = vec![
            Member::new(0, vec![0.0, 1.0], vec![0.2]),
            Member::new(1, vec![1.0, 1.0], vec![0.4]),
        ];
        let means = PopulationMeans::from_members(&members, 2, 1);
        assert_eq!(means.divergent, vec![0.5, 1.0]);
        assert!((means.convergent[0] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_context_validation() {
        let weights = AttributeWeights::uniform(1, 1);
        let ok = vec![Member::new(0, vec![0.1], vec![0.2]), Member::new(1, vec![0.3], vec![0.4])];
        assert!(RunContext::new(ok.clone(), 2, weights.clone(), Default::default()).is_ok());

        assert!(RunContext::new(Vec::new(), 1, weights.clone(), Default::default()).is_err());

        let duplicate = vec![Member::new(0, vec![0.1], vec![0.2]), Member::new(0, vec![0.3], vec![0.4])];
        assert!(RunContext::new(duplicate, 1, weights.clone(), Default::default()).is_err());

        let short = vec![Member::new(0, vec![], vec![0.2]), Member::new(1, vec![0.3], vec![0.4])];
        assert!(matches!(
            RunContext::new(short, 1, weights.clone(), Default::default()),
            Err(GaError::InvalidConfiguration(_))
        ));

        let out_of_range = vec![Member::new(0, vec![0.1], vec![1.2]), Member::new(1, vec![0.3], vec![0.4])];
        assert!(matches!(
            RunContext::new(out_of_range, 1, weights, Default::default()),
            Err(GaError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_aggregate_pairs_count_roster_members_only() {
        let members: Vec<Member> = (0..5).map(|id| Member::new(id, vec![], vec![])).collect();
        // 9 is not on the roster
        let constraints = DistributionConstraints::new([0, 1, 2, 9], [3, 4]);
        assert_eq!(constraints.aggregate_pairs(&members), 3);

        let ctx = RunContext::new(members, 1, AttributeWeights::uniform(0, 0), constraints).unwrap();
        assert_eq!(ctx.aggregate_pairs(), 3);
    }
}
