//! Search-order and pruning advisors.
//!
//! Before a level of the fault-set lattice is checked, every [`Heuristic`] sees
//! the candidates of that level together with the verdicts found so far, and
//! returns an [`Advice`]: priorities to reorder the candidates, and candidates
//! to skip.
//!
//! A heuristic may only skip a candidate that is a superset of an already known
//! critical set. It never decides a verdict by itself. In debug builds the
//! search re-verifies every skip and fails with
//! [`AnalysisError::HeuristicContractViolation`][crate::error::AnalysisError::HeuristicContractViolation]
//! on an unsound one.
//!
//! Advice of several heuristics is combined as follows: skip lists are
//! concatenated, and candidates are ordered by the priorities of the first
//! heuristic, ties broken by the second one, and so on. Lower priorities are
//! checked first; the sort is stable, so candidates without any priority keep
//! the lexicographic order of the lattice enumeration.

use crate::fault::{Fault, FaultSet};

/// What the search knows when it asks for advice.
#[derive(Debug, Clone, Copy)]
pub struct SearchContext<'a> {
    pub faults: &'a [Fault],
    /// Faults the search ranges over.
    pub universe: &'a FaultSet,
    pub safe: &'a [FaultSet],
    pub critical: &'a [FaultSet],
    /// Cardinality of the candidates of the current level.
    pub level: usize,
    /// Number of fault sets checked so far.
    pub checked: usize,
}

impl SearchContext<'_> {
    /// Whether a known critical set is contained in `candidate`.
    pub fn is_subsumed(&self, candidate: &FaultSet) -> bool {
        self.critical.iter().any(|c| c.is_subset(candidate))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Advice {
    /// One priority per candidate, lower first.
    pub priorities: Option<Vec<i64>>,
    pub skip: Vec<FaultSet>,
}

pub trait Heuristic: Send + Sync {
    fn name(&self) -> &str;

    fn advise(&self, context: &SearchContext<'_>, candidates: &[FaultSet]) -> Advice;
}

/// Checks sets combining several redundant faults last.
///
/// Faults in a redundancy group provide overlapping capability (e.g. two
/// sensors measuring the same value), so the system usually masks the failure
/// of a single one. Sets with fewer redundant faults are more likely to be
/// critical on their own, so they are checked first.
#[derive(Debug, Clone)]
pub struct RedundancyHeuristic {
    groups: Vec<FaultSet>,
}

impl RedundancyHeuristic {
    pub fn new(groups: Vec<FaultSet>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[FaultSet] {
        &self.groups
    }

    /// Number of faults in `candidate` beyond the first of every group.
    pub fn redundancy(&self, candidate: &FaultSet) -> usize {
        self.groups
            .iter()
            .map(|group| candidate.intersection(group).len().saturating_sub(1))
            .sum()
    }
}

impl Heuristic for RedundancyHeuristic {
    fn name(&self) -> &str {
        "redundancy"
    }

    fn advise(&self, _: &SearchContext<'_>, candidates: &[FaultSet]) -> Advice {
        Advice {
            priorities: Some(candidates.iter().map(|c| self.redundancy(c) as i64).collect()),
            skip: Vec::new(),
        }
    }
}

/// Skips every candidate containing a known critical set.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubsumptionHeuristic;

impl Heuristic for SubsumptionHeuristic {
    fn name(&self) -> &str {
        "subsumption"
    }

    fn advise(&self, context: &SearchContext<'_>, candidates: &[FaultSet]) -> Advice {
        Advice {
            priorities: None,
            skip: candidates
                .iter()
                .filter(|c| context.is_subsumed(c))
                .cloned()
                .collect(),
        }
    }
}

/// Combined advice of all heuristics for one level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Candidates to check, in order.
    pub order: Vec<FaultSet>,
    /// Skipped candidates, with the name of the heuristic that skipped them.
    pub skipped: Vec<(FaultSet, String)>,
}

/// Combine the advice of `heuristics` on `candidates`.
///
/// # Panics
///
/// Panics if a heuristic returns a number of priorities different from the
/// number of candidates.
pub fn plan(
    heuristics: &[Box<dyn Heuristic>],
    context: &SearchContext<'_>,
    candidates: Vec<FaultSet>,
) -> Plan {
    let mut keys: Vec<Vec<i64>> = vec![Vec::new(); candidates.len()];
    let mut skipped: Vec<(FaultSet, String)> = Vec::new();

    for heuristic in heuristics {
        let advice = heuristic.advise(context, &candidates);
        if let Some(priorities) = advice.priorities {
            assert_eq!(
                priorities.len(),
                candidates.len(),
                "Heuristic '{}' returned {} priorities for {} candidates",
                heuristic.name(),
                priorities.len(),
                candidates.len()
            );
            for (key, p) in keys.iter_mut().zip(priorities) {
                key.push(p);
            }
        }
        for set in advice.skip {
            if candidates.contains(&set) && !skipped.iter().any(|(s, _)| *s == set) {
                skipped.push((set, heuristic.name().to_string()));
            }
        }
    }

    let mut order: Vec<(Vec<i64>, FaultSet)> = keys
        .into_iter()
        .zip(candidates)
        .filter(|(_, c)| !skipped.iter().any(|(s, _)| s == c))
        .collect();
    order.sort_by(|(a, _), (b, _)| a.cmp(b));

    Plan {
        order: order.into_iter().map(|(_, c)| c).collect(),
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::fault::FaultId;

    fn set(ids: &[u32]) -> FaultSet {
        ids.iter().copied().map(FaultId::new).collect()
    }

    fn context<'a>(universe: &'a FaultSet, critical: &'a [FaultSet]) -> SearchContext<'a> {
        SearchContext {
            faults: &[],
            universe,
            safe: &[],
            critical,
            level: 2,
            checked: 0,
        }
    }

    #[test]
    fn test_redundancy() {
        let h = RedundancyHeuristic::new(vec![set(&[0, 1, 2]), set(&[3, 4])]);
        assert_eq!(h.redundancy(&set(&[0])), 0);
        assert_eq!(h.redundancy(&set(&[0, 3])), 0);
        assert_eq!(h.redundancy(&set(&[0, 1])), 1);
        assert_eq!(h.redundancy(&set(&[0, 1, 2, 3, 4])), 3);
    }

    #[test]
    fn test_plan_orders_by_redundancy() {
        let universe = FaultSet::full(4);
        let heuristics: Vec<Box<dyn Heuristic>> =
            vec![Box::new(RedundancyHeuristic::new(vec![set(&[0, 1])]))];
        let candidates = vec![set(&[0, 1]), set(&[0, 2]), set(&[1, 2])];
        let plan = plan(&heuristics, &context(&universe, &[]), candidates);
        assert_eq!(plan.order, vec![set(&[0, 2]), set(&[1, 2]), set(&[0, 1])]);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_plan_skips_subsumed() {
        let universe = FaultSet::full(3);
        let critical = vec![set(&[0])];
        let heuristics: Vec<Box<dyn Heuristic>> = vec![
            Box::new(SubsumptionHeuristic),
            Box::new(SubsumptionHeuristic),
        ];
        let candidates = vec![set(&[0, 1]), set(&[0, 2]), set(&[1, 2])];
        let plan = plan(&heuristics, &context(&universe, &critical), candidates);
        assert_eq!(plan.order, vec![set(&[1, 2])]);
        // Each skipped set is reported once.
        assert_eq!(
            plan.skipped,
            vec![
                (set(&[0, 1]), "subsumption".to_string()),
                (set(&[0, 2]), "subsumption".to_string()),
            ]
        );
    }

    #[test]
    fn test_no_heuristics_keeps_order() {
        let universe = FaultSet::full(3);
        let candidates = vec![set(&[0, 1]), set(&[0, 2]), set(&[1, 2])];
        let plan = plan(&[], &context(&universe, &[]), candidates.clone());
        assert_eq!(plan.order, candidates);
    }
}
