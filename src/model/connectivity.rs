//! Connectivity rules: named strategies for generating the edge set of a
//! projection.
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// The strategy generating the edges between a source and a destination
/// population. The actual sampling is normally carried out by the executing
/// engine; [`ConnectivityRule::realize`] provides the reference realisation
/// for backends that require explicit edge lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConnectivityRule {
    /// Unit i of the source connects to unit i of the destination;
    /// requires equally sized populations.
    OneToOne,
    /// Every source unit connects to every destination unit.
    AllToAll,
    /// Each destination unit receives exactly `n` distinct presynaptic
    /// sources, sampled without replacement.
    FixedFanIn { n: usize },
    /// Each destination unit receives `n` presynaptic sources sampled with
    /// replacement (multapses allowed).
    RandomFanIn { n: usize },
}

impl ConnectivityRule {
    /// The declared number of presynaptic sources per destination unit.
    pub fn fan_in(&self, n_source: usize) -> usize {
        match self {
            ConnectivityRule::OneToOne => 1,
            ConnectivityRule::AllToAll => n_source,
            ConnectivityRule::FixedFanIn { n } | ConnectivityRule::RandomFanIn { n } => *n,
        }
    }

    /// Check the rule against the populations it is to connect.
    pub fn check(&self, n_source: usize, n_target: usize) -> Result<(), SimError> {
        match self {
            ConnectivityRule::OneToOne if n_source != n_target => {
                Err(SimError::InvalidConnectivity(format!(
                    "OneToOne requires equal population sizes (got {} and {})",
                    n_source, n_target
                )))
            }
            ConnectivityRule::FixedFanIn { n } if *n > n_source => {
                Err(SimError::InvalidConnectivity(format!(
                    "FixedFanIn of {} exceeds the source population size {}",
                    n, n_source
                )))
            }
            _ => Ok(()),
        }
    }

    /// Generate the edge set as (source, target) index pairs. Every
    /// destination unit ends up with exactly `fan_in` presynaptic sources.
    pub fn realize<R: Rng>(
        &self,
        n_source: usize,
        n_target: usize,
        rng: &mut R,
    ) -> Result<Vec<(usize, usize)>, SimError> {
        self.check(n_source, n_target)?;
        let edges = match self {
            ConnectivityRule::OneToOne => (0..n_source).map(|i| (i, i)).collect(),
            ConnectivityRule::AllToAll => (0..n_target)
                .flat_map(|tgt| (0..n_source).map(move |src| (src, tgt)))
                .collect(),
            ConnectivityRule::FixedFanIn { n } => {
                let mut edges = Vec::with_capacity(n * n_target);
                for tgt in 0..n_target {
                    for src in rand::seq::index::sample(rng, n_source, *n) {
                        edges.push((src, tgt));
                    }
                }
                edges
            }
            ConnectivityRule::RandomFanIn { n } => {
                let source_dist = Uniform::from(0..n_source);
                let mut edges = Vec::with_capacity(n * n_target);
                for tgt in 0..n_target {
                    for _ in 0..*n {
                        edges.push((source_dist.sample(rng), tgt));
                    }
                }
                edges
            }
        };
        Ok(edges)
    }
}

/// The number of synapses per destination unit derived from a connection
/// probability, `floor(epsilon * n)`.
pub fn fan_in_from_probability(epsilon: f64, n: usize) -> usize {
    (epsilon * n as f64).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashSet;

    fn fan_in_counts(edges: &[(usize, usize)], n_target: usize) -> Vec<usize> {
        let mut counts = vec![0; n_target];
        for &(_, tgt) in edges {
            counts[tgt] += 1;
        }
        counts
    }

    #[test]
    fn test_fan_in_from_probability() {
        assert_eq!(fan_in_from_probability(0.1, 4000), 400);
        assert_eq!(fan_in_from_probability(0.1, 1005), 100);
        assert_eq!(fan_in_from_probability(0.0, 4000), 0);
        assert_eq!(fan_in_from_probability(1.0, 4000), 4000);
        for (p, n) in [(0.1, 17), (0.37, 1000), (1.0, 250)] {
            assert!(fan_in_from_probability(p, n) <= n);
        }
    }

    #[test]
    fn test_one_to_one() {
        let mut rng = StdRng::seed_from_u64(42);
        let edges = ConnectivityRule::OneToOne.realize(5, 5, &mut rng).unwrap();
        assert_eq!(edges, vec![(0, 0), (1, 1), (2, 2), (3, 3), (4, 4)]);
        assert!(ConnectivityRule::OneToOne.realize(5, 6, &mut rng).is_err());
    }

    #[test]
    fn test_all_to_all() {
        let mut rng = StdRng::seed_from_u64(42);
        let edges = ConnectivityRule::AllToAll.realize(3, 4, &mut rng).unwrap();
        assert_eq!(edges.len(), 12);
        assert_eq!(fan_in_counts(&edges, 4), vec![3; 4]);
    }

    #[test]
    fn test_fixed_fan_in_is_exact_and_distinct() {
        let mut rng = StdRng::seed_from_u64(42);
        let rule = ConnectivityRule::FixedFanIn { n: 10 };
        assert_eq!(rule.fan_in(100), 10);
        let edges = rule.realize(100, 30, &mut rng).unwrap();
        assert_eq!(fan_in_counts(&edges, 30), vec![10; 30]);
        for tgt in 0..30 {
            let sources: HashSet<usize> = edges
                .iter()
                .filter(|(_, t)| *t == tgt)
                .map(|(s, _)| *s)
                .collect();
            assert_eq!(sources.len(), 10);
        }
    }

    #[test]
    fn test_fixed_fan_in_rejects_oversized_count() {
        let rule = ConnectivityRule::FixedFanIn { n: 101 };
        assert!(matches!(
            rule.check(100, 30),
            Err(SimError::InvalidConnectivity(_))
        ));
    }

    #[test]
    fn test_random_fan_in_is_exact() {
        let mut rng = StdRng::seed_from_u64(42);
        let rule = ConnectivityRule::RandomFanIn { n: 7 };
        let edges = rule.realize(50, 20, &mut rng).unwrap();
        assert_eq!(fan_in_counts(&edges, 20), vec![7; 20]);
    }

    #[test]
    fn test_realize_is_deterministic_for_a_seed() {
        let rule = ConnectivityRule::FixedFanIn { n: 5 };
        let mut rng1 = StdRng::seed_from_u64(7);
        let mut rng2 = StdRng::seed_from_u64(7);
        assert_eq!(
            rule.realize(40, 10, &mut rng1).unwrap(),
            rule.realize(40, 10, &mut rng2).unwrap()
        );
    }
}
