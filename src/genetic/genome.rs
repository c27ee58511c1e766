//! Permutation genome and its operators.
//!
//! A genome is an ordering of every member of the roster, stored as indices
//! into the run's member list. The run's group layout cuts the ordering into
//! groups. Every operator returns a permutation of the same indices.

use crate::context::RunContext;
use crate::error::Result;
use crate::fitness::{check_index, check_permutation, FitnessEvaluator};
use crate::member::MemberId;
use rand::prelude::*;

/// One candidate grouping with its cached fitness
#[derive(Debug, Clone, PartialEq)]
pub struct Genome {
    order: Vec<usize>,
    fitness: f64,
}

impl Genome {
    /// Evaluate `order` and wrap it. `order` must be a permutation of
    /// `0..member_count`.
    pub fn new(order: Vec<usize>, evaluator: &FitnessEvaluator) -> Result<Self> {
        let fitness = evaluator.evaluate(&order)?;
        Ok(Genome { order, fitness })
    }

    /// Wrap an ordering whose fitness is already known. The ordering is not
    /// checked here; operators reject it if it is not a permutation.
    pub fn with_fitness(order: Vec<usize>, fitness: f64) -> Self {
        Genome { order, fitness }
    }

    /// Uniformly random permutation of the roster, evaluated
    pub fn random<R: Rng + ?Sized>(evaluator: &FitnessEvaluator, rng: &mut R) -> Result<Self> {
        let order = Self::shuffled_order(evaluator.context().member_count(), rng);
        let fitness = evaluator.evaluate(&order)?;
        Ok(Genome { order, fitness })
    }

    /// Uniformly random permutation of `0..len`
    pub fn shuffled_order<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(rng);
        order
    }

    #[inline]
    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Member identities of each group, in layout order
    pub fn groups(&self, context: &RunContext) -> Vec<Vec<MemberId>> {
        let members = context.members();
        context.layout()
            .group_ranges()
            .map(|range| self.order[range].iter().map(|&i| members[i].id).collect())
            .collect()
    }

    /// Partially Mapped Crossover producing the child based on `self`.
    ///
    /// The child keeps `self`'s slots `start..=end`. Every other slot takes
    /// `other`'s entry, followed through the slice mapping
    /// `self[k] -> other[k]` until it no longer collides with the kept slice.
    /// Calling this on both parents with the same bounds yields the
    /// complementary pair of children.
    pub fn crossover(&self, other: &Genome, start: usize, end: usize, evaluator: &FitnessEvaluator) -> Result<Genome> {
        let child = self.pmx_order(other, start, end)?;
        let fitness = evaluator.evaluate(&child)?;
        Ok(Genome::with_fitness(child, fitness))
    }

    fn pmx_order(&self, other: &Genome, start: usize, end: usize) -> Result<Vec<usize>> {
        let n = self.len();
        // the mapping chase only terminates on two permutations of 0..n
        check_permutation(&self.order, n)?;
        check_permutation(&other.order, n)?;
        check_index(start, n)?;
        check_index(end, n)?;
        let (start, end) = (start.min(end), start.max(end));

        let mut mapping: Vec<Option<usize>> = vec![None; n];
        for k in start..=end {
            mapping[self.order[k]] = Some(other.order[k]);
        }

        let mut child = other.order.clone();
        child[start..=end].copy_from_slice(&self.order[start..=end]);

        for i in (0..start).chain(end + 1..n) {
            let mut value = child[i];
            while let Some(next) = mapping[value] {
                value = next;
            }
            child[i] = value;
        }

        Ok(child)
    }

    /// Exchange the members at slots `i` and `j`. Always applied.
    pub fn mutate_swap(mut self, i: usize, j: usize, evaluator: &FitnessEvaluator) -> Result<Genome> {
        check_index(i, self.len())?;
        check_index(j, self.len())?;
        if i != j {
            self.order.swap(i, j);
            self.fitness = evaluator.evaluate(&self.order)?;
        }
        Ok(self)
    }

    /// Reverse slots `min(i, j)..=max(i, j)` and keep the result only if its
    /// fitness strictly exceeds the current one; otherwise return `self`
    /// unchanged.
    pub fn mutate_invert(self, i: usize, j: usize, evaluator: &FitnessEvaluator) -> Result<Genome> {
        check_index(i, self.len())?;
        check_index(j, self.len())?;
        let (left, right) = (i.min(j), i.max(j));
        if left == right {
            return Ok(self);
        }

        let mut candidate = self.order.clone();
        candidate[left..=right].reverse();
        let fitness = evaluator.evaluate(&candidate)?;

        if fitness > self.fitness {
            Ok(Genome::with_fitness(candidate, fitness))
        } else {
            Ok(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GaError;
    use crate::member::Member;
    use crate::weights::AttributeWeights;
    use rand_chacha::ChaCha8Rng;

    fn create_test_context(n: usize, groups: usize) -> RunContext {
        let members = (0..n)
            .map(|id| {
                let x = id as f64 / n as f64;
                Member::new(id, vec![x, 1.0 - x], vec![(x * 7.0).fract()])
            })
            .collect();
        RunContext::new(members, groups, AttributeWeights::uniform(2, 1), Default::default()).unwrap()
    }

    fn is_permutation(order: &[usize], n: usize) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted == (0..n).collect::<Vec<_>>()
    }

    #[test]
    fn test_random_genome_is_permutation() {
        let ctx = create_test_context(12, 3);
        let eval = FitnessEvaluator::new(&ctx);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let genome = Genome::random(&eval, &mut rng).unwrap();
        assert_eq!(genome.len(), 12);
        assert!(is_permutation(genome.order(), 12));
        assert_eq!(genome.fitness(), eval.evaluate(genome.order()).unwrap());
    }

    #[test]
    fn test_new_rejects_non_permutation() {
        let ctx = create_test_context(4, 2);
        let eval = FitnessEvaluator::new(&ctx);
        assert!(Genome::new(vec![0, 1, 1, 3], &eval).is_err());
        assert!(Genome::new(vec![0, 1, 2], &eval).is_err());
        assert!(matches!(
            Genome::new(vec![0, 1, 2, 9], &eval),
            Err(GaError::IndexOutOfRange { index: 9, len: 4 })
        ));
    }

    #[test]
    fn test_pmx_known_children() {
        let a = Genome::with_fitness(vec![0, 1, 2, 3, 4, 5, 6, 7], 1.0);
        let b = Genome::with_fitness(vec![3, 7, 5, 1, 6, 0, 2, 4], 1.0);

        // slice 3..=5 of a is [3, 4, 5], mapping 3->1, 4->6, 5->0
        let child = a.pmx_order(&b, 3, 5).unwrap();
        assert_eq!(child, vec![1, 7, 0, 3, 4, 5, 2, 6]);

        // slice 3..=5 of b is [1, 6, 0], mapping 1->3, 6->4, 0->5
        let sibling = b.pmx_order(&a, 3, 5).unwrap();
        assert_eq!(sibling, vec![5, 3, 2, 1, 6, 0, 4, 7]);

        // bounds are normalized
        assert_eq!(a.pmx_order(&b, 5, 3).unwrap(), child);
    }

    #[test]
    fn test_pmx_single_point_and_full_slice() {
        let a = Genome::with_fitness(vec![4, 2, 0, 1, 3], 1.0);
        let b = Genome::with_fitness(vec![0, 1, 2, 3, 4], 1.0);

        let child = a.pmx_order(&b, 2, 2).unwrap();
        assert_eq!(child[2], 0);
        assert!(is_permutation(&child, 5));

        assert_eq!(a.pmx_order(&b, 0, 4).unwrap(), a.order().to_vec());
    }

    #[test]
    fn test_crossover_evaluates_child() {
        let ctx = create_test_context(10, 2);
        let eval = FitnessEvaluator::new(&ctx);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let a = Genome::random(&eval, &mut rng).unwrap();
        let b = Genome::random(&eval, &mut rng).unwrap();

        let child = a.crossover(&b, 2, 6, &eval).unwrap();
        assert!(is_permutation(child.order(), 10));
        assert_eq!(&child.order()[2..=6], &a.order()[2..=6]);
        assert_eq!(child.fitness(), eval.evaluate(child.order()).unwrap());
    }

    #[test]
    fn test_crossover_rejects_out_of_range() {
        let ctx = create_test_context(6, 2);
        let eval = FitnessEvaluator::new(&ctx);
        let a = Genome::new(vec![0, 1, 2, 3, 4, 5], &eval).unwrap();
        let b = Genome::new(vec![5, 4, 3, 2, 1, 0], &eval).unwrap();

        assert!(matches!(
            a.crossover(&b, 1, 6, &eval),
            Err(GaError::IndexOutOfRange { index: 6, len: 6 })
        ));
    }

    #[test]
    fn test_crossover_rejects_non_permutation_parent() {
        let ctx = create_test_context(4, 2);
        let eval = FitnessEvaluator::new(&ctx);
        let valid = Genome::new(vec![3, 2, 1, 0], &eval).unwrap();

        let stray = Genome::with_fitness(vec![0, 1, 2, 9], 1.0);
        assert!(matches!(
            stray.crossover(&valid, 3, 3, &eval),
            Err(GaError::IndexOutOfRange { index: 9, len: 4 })
        ));
        assert!(valid.crossover(&stray, 0, 1, &eval).is_err());

        let repeated = Genome::with_fitness(vec![0, 1, 1, 3], 1.0);
        assert!(matches!(
            repeated.crossover(&valid, 0, 0, &eval),
            Err(GaError::InvalidConfiguration(_))
        ));

        let short = Genome::with_fitness(vec![0, 1, 2], 1.0);
        assert!(valid.crossover(&short, 0, 1, &eval).is_err());
    }

    #[test]
    fn test_mutate_swap_always_applies() {
        let ctx = create_test_context(6, 2);
        let eval = FitnessEvaluator::new(&ctx);
        let genome = Genome::new(vec![0, 1, 2, 3, 4, 5], &eval).unwrap();

        let swapped = genome.mutate_swap(0, 5, &eval).unwrap();
        assert_eq!(swapped.order(), &[5, 1, 2, 3, 4, 0]);
        assert_eq!(swapped.fitness(), eval.evaluate(swapped.order()).unwrap());

        assert!(swapped.mutate_swap(0, 6, &eval).is_err());
    }

    #[test]
    fn test_mutate_invert_never_worsens() {
        let ctx = create_test_context(12, 3);
        let eval = FitnessEvaluator::new(&ctx);
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        for _ in 0..50 {
            let genome = Genome::random(&eval, &mut rng).unwrap();
            let before = genome.clone();
            let i = rng.gen_range(0..12);
            let j = rng.gen_range(0..12);

            let after = genome.mutate_invert(i, j, &eval).unwrap();
            assert!(after.fitness() >= before.fitness());
            if after.fitness() == before.fitness() {
                assert_eq!(after, before);
            }
            assert!(is_permutation(after.order(), 12));
        }
    }

    #[test]
    fn test_mutate_invert_applies_improvement() {
        let ctx = create_test_context(4, 2);
        let eval = FitnessEvaluator::new(&ctx);
        let orders = [vec![0, 1, 2, 3], vec![0, 2, 1, 3]];
        let (worse, better) = {
            let f0 = eval.evaluate(&orders[0]).unwrap();
            let f1 = eval.evaluate(&orders[1]).unwrap();
            assert_ne!(f0, f1);
            if f0 < f1 { (&orders[0], &orders[1]) } else { (&orders[1], &orders[0]) }
        };

        let genome = Genome::new(worse.clone(), &eval).unwrap();
        let inverted = genome.mutate_invert(2, 1, &eval).unwrap();
        assert_eq!(inverted.order(), better.as_slice());

        let genome = Genome::new(better.clone(), &eval).unwrap();
        let kept = genome.clone().mutate_invert(1, 2, &eval).unwrap();
        assert_eq!(kept, genome);
    }

    #[test]
    fn test_mutate_invert_rejects_out_of_range() {
        let ctx = create_test_context(6, 2);
        let eval = FitnessEvaluator::new(&ctx);
        let genome = Genome::new(vec![0, 1, 2, 3, 4, 5], &eval).unwrap();

        assert!(matches!(
            genome.clone().mutate_invert(2, 6, &eval),
            Err(GaError::IndexOutOfRange { index: 6, len: 6 })
        ));
        assert!(matches!(
            genome.mutate_invert(7, 0, &eval),
            Err(GaError::IndexOutOfRange { index: 7, len: 6 })
        ));
    }

    #[test]
    fn test_groups_follow_layout() {
        let ctx = create_test_context(7, 3);
        let genome = Genome::with_fitness(vec![6, 5, 4, 3, 2, 1, 0], 1.0);
        assert_eq!(genome.groups(&ctx), vec![vec![6, 5], vec![4, 3], vec![2, 1, 0]]);
    }
}
