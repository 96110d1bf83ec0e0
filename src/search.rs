//! Minimal critical fault sets.
//!
//! [`SafetyAnalysis`] walks the lattice of fault sets over the *universe* (the
//! faults declared [`Nondeterministic`][crate::fault::ActivationMode::Nondeterministic])
//! level by level, in order of increasing cardinality:
//!
//! ```text
//! level 0:                 {}
//! level 1:        {A}      {B}      {C}
//! level 2:     {A,B}    {A,C}    {B,C}
//! level 3:            {A,B,C}
//! ```
//!
//! A candidate containing an already known critical set is *subsumed*: it is
//! critical too, but not minimal, so it is never checked. Every other candidate
//! is checked by a traversal with exactly its faults activated. Since all
//! candidates of a lower level are decided before the next level starts, a set
//! found critical has no critical proper subset and is therefore minimal.
//!
//! Candidates of one level never subsume each other, which is why a level can be
//! checked by several worker slots at once.
//!
//! Checks that fail (exhausted storage, failing model) mark their candidate
//! [`Verdict::Inconclusive`]: it is neither safe nor critical, its supersets are
//! still checked, and the result is flagged as not exhaustive.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use num_bigint::BigUint;
use parking_lot::Mutex;

use crate::activation::Activation;
use crate::config::{validate_model, AnalysisConfiguration, Backend};
use crate::counterexample::CounterExample;
use crate::error::AnalysisError;
use crate::fault::{combinations, ActivationMode, Fault, FaultId, FaultSet};
use crate::heuristics::{plan, Heuristic, SearchContext};
use crate::model::{Hazard, Model};
use crate::optimized::FaultOptimizedChecker;
use crate::traversal::check_reachability;
use crate::utils::{binomial, lattice_size};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Verdict {
    /// Activating the set makes the hazard reachable.
    Critical,
    /// Activating the set never leads to the hazard.
    Safe,
    /// The check failed; see the exceptions of the result.
    Inconclusive,
    /// Not checked: the set contains a known critical set.
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchNode {
    pub faults: FaultSet,
    pub verdict: Verdict,
}

/// A check that failed, with the candidate it was checking.
#[derive(Debug, Clone)]
pub struct AnalysisException {
    pub candidate: FaultSet,
    pub error: AnalysisError,
}

/// Answer of a single candidate check.
#[derive(Debug, Clone)]
pub struct Check {
    pub critical: bool,
    pub counter_example: Option<CounterExample>,
}

/// Decides whether a single fault set is critical.
pub trait CandidateChecker: Sync {
    fn check(&self, candidate: &FaultSet) -> Result<Check, AnalysisError>;
}

/// Checks every candidate with its own traversal, its faults forced.
pub struct ExhaustiveChecker<'a, M: ?Sized> {
    model: &'a M,
    hazard: &'a Hazard,
    config: &'a AnalysisConfiguration,
}

impl<'a, M: Model + ?Sized> ExhaustiveChecker<'a, M> {
    pub fn new(model: &'a M, hazard: &'a Hazard, config: &'a AnalysisConfiguration) -> Self {
        Self { model, hazard, config }
    }
}

impl<M: Model + ?Sized> CandidateChecker for ExhaustiveChecker<'_, M> {
    fn check(&self, candidate: &FaultSet) -> Result<Check, AnalysisError> {
        let activation = Activation::for_candidate(self.model.faults(), candidate, self.config.activation_policy);
        let outcome = check_reachability(self.model, self.hazard, &activation, self.config)?;
        if let Some(activated) = &outcome.activated_faults {
            debug!("{} reached the hazard activating {}", candidate, activated);
        }
        Ok(Check {
            critical: outcome.hazard_found,
            counter_example: outcome.counter_example,
        })
    }
}

/// The search for minimal critical sets.
pub struct SafetyAnalysis {
    config: AnalysisConfiguration,
    heuristics: Vec<Box<dyn Heuristic>>,
}

impl SafetyAnalysis {
    pub fn new(config: AnalysisConfiguration) -> Self {
        Self {
            config,
            heuristics: Vec::new(),
        }
    }

    /// Add a heuristic; heuristics are consulted in the order they were added.
    pub fn with_heuristic(mut self, heuristic: impl Heuristic + 'static) -> Self {
        self.heuristics.push(Box::new(heuristic));
        self
    }

    pub fn configuration(&self) -> &AnalysisConfiguration {
        &self.config
    }

    pub fn heuristics(&self) -> &[Box<dyn Heuristic>] {
        &self.heuristics
    }

    /// Compute the minimal critical sets of `model` for `hazard`.
    ///
    /// Only configuration errors and heuristic contract violations are
    /// returned as errors; failing checks are reported in the result.
    pub fn compute_minimal_critical_sets<M: Model + ?Sized>(
        &self,
        model: &M,
        hazard: &Hazard,
    ) -> Result<SafetyAnalysisResults, AnalysisError> {
        self.config.validate()?;
        validate_model(model.state_vector_size(), model.faults())?;

        match self.config.backend {
            Backend::Exhaustive => {
                let checker = ExhaustiveChecker::new(model, hazard, &self.config);
                self.search(model.faults(), hazard, &checker)
            }
            Backend::FaultOptimized => {
                let checker = FaultOptimizedChecker::new(model, hazard, &self.config);
                self.search(model.faults(), hazard, &checker)
            }
        }
    }

    /// Run the lattice search, asking `checker` for every candidate.
    pub fn search(
        &self,
        faults: &[Fault],
        hazard: &Hazard,
        checker: &dyn CandidateChecker,
    ) -> Result<SafetyAnalysisResults, AnalysisError> {
        let start = Instant::now();
        let with_mode = |mode: ActivationMode| -> FaultSet {
            faults.iter().filter(|f| f.activation() == mode).map(Fault::id).collect()
        };
        let universe = with_mode(ActivationMode::Nondeterministic);
        let forced = with_mode(ActivationMode::Forced);
        let suppressed = with_mode(ActivationMode::Suppressed);
        let ids: Vec<FaultId> = universe.iter().collect();
        let n = ids.len();

        info!(
            "Computing minimal critical sets for '{}': {} faults, {} fault sets",
            hazard.name(),
            n,
            lattice_size(n)
        );
        if !forced.is_empty() {
            info!("Faults always activated: {}", forced);
        }
        if !suppressed.is_empty() {
            info!("Faults never activated: {}", suppressed);
        }

        let budget = self.config.budget;
        if !budget.is_unlimited() {
            info!("Search budget: {:?}", budget);
        }
        let deadline = budget.time_limit.map(|limit| start + limit);
        let state = Mutex::new(SearchState::default());
        let mut stopped = false;

        for level in 0..=n {
            let candidates: Vec<FaultSet> = combinations(&ids, level).collect();

            let mut guard = state.lock();
            let is_subsumed = |c: &FaultSet| guard.critical.iter().any(|k| k.is_subset(c));
            let subsumed: Vec<bool> = candidates.iter().map(is_subsumed).collect();
            let open = subsumed.iter().filter(|&&s| !s).count();

            if open > 0 && budget.max_cardinality.is_some_and(|max| level > max) {
                info!("Stopping at level {}: cardinality limit reached", level);
                stopped = true;
                break;
            }
            info!(
                "Level {}: {} of {} fault sets to check",
                level,
                open,
                binomial(n, level)
            );

            let context = SearchContext {
                faults,
                universe: &universe,
                safe: &guard.safe,
                critical: &guard.critical,
                level,
                checked: guard.checked,
            };
            let plan = plan(&self.heuristics, &context, candidates.clone());

            if cfg!(debug_assertions) {
                for (skipped, heuristic) in &plan.skipped {
                    if !context.is_subsumed(skipped) {
                        return Err(AnalysisError::HeuristicContractViolation {
                            heuristic: heuristic.clone(),
                            candidate: skipped.clone(),
                        });
                    }
                }
            }
            for (skipped, heuristic) in &plan.skipped {
                debug!("{} skipped by heuristic '{}'", skipped, heuristic);
            }

            let order: Vec<FaultSet> = plan
                .order
                .into_iter()
                .filter(|c| !context.is_subsumed(c))
                .collect();
            for (candidate, subsumed) in candidates.into_iter().zip(subsumed) {
                if subsumed || plan.skipped.iter().any(|(s, _)| *s == candidate) {
                    guard.nodes.push(SearchNode {
                        faults: candidate,
                        verdict: Verdict::Unknown,
                    });
                }
            }
            drop(guard);

            if open == 0 {
                // Every set of this level, and so of all higher levels, is subsumed.
                break;
            }

            if self.check_level(&order, checker, &state, deadline)? {
                stopped = true;
                break;
            }
        }

        let state = state.into_inner();
        let elapsed = start.elapsed();
        let results = state.into_results(
            hazard.name(),
            stopped,
            elapsed,
            universe,
            forced,
            suppressed,
            faults,
        );
        info!(
            "Found {} minimal critical sets after checking {} fault sets in {:.3} s",
            results.minimal_critical_sets.len(),
            results.checked_sets_count,
            elapsed.as_secs_f64()
        );
        if !results.is_exhaustive {
            warn!("The analysis is not exhaustive");
        }
        Ok(results)
    }

    /// Check the candidates of one level. Returns whether the budget stopped
    /// the search, or the first error that is not confined to its candidate.
    fn check_level(
        &self,
        candidates: &[FaultSet],
        checker: &dyn CandidateChecker,
        state: &Mutex<SearchState>,
        deadline: Option<Instant>,
    ) -> Result<bool, AnalysisError> {
        let cursor = AtomicUsize::new(0);
        let stopped = AtomicBool::new(false);
        let fatal = Mutex::new(None);
        let max_checked = self.config.budget.max_checked_sets;

        let slot = || loop {
            if stopped.load(Ordering::Acquire) {
                break;
            }
            let i = cursor.fetch_add(1, Ordering::AcqRel);
            let Some(candidate) = candidates.get(i) else {
                break;
            };

            let out_of_time = deadline.is_some_and(|d| Instant::now() >= d);
            {
                let mut state = state.lock();
                if out_of_time || max_checked.is_some_and(|max| state.checked >= max) {
                    info!("Stopping: search budget exhausted after {} checks", state.checked);
                    stopped.store(true, Ordering::Release);
                    break;
                }
                state.checked += 1;
            }

            let result = checker.check(candidate);
            if let Err(error) = state.lock().record(candidate.clone(), result) {
                let mut fatal = fatal.lock();
                if fatal.is_none() {
                    *fatal = Some(error);
                }
                stopped.store(true, Ordering::Release);
                break;
            }
        };

        let slots = self.config.parallel_checks.min(candidates.len()).max(1);
        if slots == 1 {
            slot();
        } else {
            thread::scope(|s| {
                for _ in 0..slots {
                    s.spawn(&slot);
                }
            });
        }

        match fatal.into_inner() {
            Some(error) => Err(error),
            None => Ok(stopped.into_inner()),
        }
    }
}

/// Verdicts collected so far.
#[derive(Debug, Default)]
struct SearchState {
    safe: Vec<FaultSet>,
    critical: Vec<FaultSet>,
    nodes: Vec<SearchNode>,
    exceptions: Vec<AnalysisException>,
    counter_examples: BTreeMap<FaultSet, CounterExample>,
    checked: usize,
}

impl SearchState {
    fn record(&mut self, candidate: FaultSet, result: Result<Check, AnalysisError>) -> Result<(), AnalysisError> {
        let verdict = match result {
            Ok(check) if check.critical => {
                info!("Critical: {}", candidate);
                if let Some(trace) = check.counter_example {
                    self.counter_examples.insert(candidate.clone(), trace);
                }
                self.critical.push(candidate.clone());
                Verdict::Critical
            }
            Ok(_) => {
                debug!("Safe: {}", candidate);
                self.safe.push(candidate.clone());
                Verdict::Safe
            }
            Err(error) if !error.is_recoverable() => return Err(error),
            Err(error) => {
                warn!("Inconclusive: {}: {}", candidate, error);
                self.exceptions.push(AnalysisException {
                    candidate: candidate.clone(),
                    error,
                });
                Verdict::Inconclusive
            }
        };
        self.nodes.push(SearchNode {
            faults: candidate,
            verdict,
        });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn into_results(
        mut self,
        hazard: &str,
        stopped: bool,
        elapsed: Duration,
        universe: FaultSet,
        forced: FaultSet,
        suppressed: FaultSet,
        faults: &[Fault],
    ) -> SafetyAnalysisResults {
        self.critical.sort();
        self.nodes.sort_by(|a, b| a.faults.cmp(&b.faults));
        self.exceptions.sort_by(|a, b| a.candidate.cmp(&b.candidate));

        SafetyAnalysisResults {
            hazard: hazard.to_string(),
            is_exhaustive: !stopped && self.exceptions.is_empty(),
            minimal_critical_sets: self.critical,
            checked_sets_count: self.checked,
            exceptions: self.exceptions,
            counter_examples: self.counter_examples,
            nodes: self.nodes,
            elapsed,
            universe,
            forced,
            suppressed,
            fault_names: faults.iter().map(|f| f.name().to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SafetyAnalysisResults {
    pub hazard: String,
    /// Sorted by cardinality, then by fault ids.
    pub minimal_critical_sets: Vec<FaultSet>,
    pub checked_sets_count: usize,
    pub exceptions: Vec<AnalysisException>,
    /// One trace per minimal critical set, if requested.
    pub counter_examples: BTreeMap<FaultSet, CounterExample>,
    /// Whether every fault set was decided, either by a check or by
    /// subsumption.
    pub is_exhaustive: bool,
    pub nodes: Vec<SearchNode>,
    pub elapsed: Duration,
    pub universe: FaultSet,
    /// Faults activated in every check.
    pub forced: FaultSet,
    /// Faults never activated.
    pub suppressed: FaultSet,
    pub fault_names: Vec<String>,
}

impl SafetyAnalysisResults {
    fn names(&self, set: &FaultSet) -> Vec<String> {
        set.iter()
            .map(|id| {
                self.fault_names
                    .get(id.index())
                    .cloned()
                    .unwrap_or_else(|| id.to_string())
            })
            .collect()
    }

    /// The minimal critical sets as fault names.
    pub fn critical_set_names(&self) -> Vec<Vec<String>> {
        self.minimal_critical_sets.iter().map(|s| self.names(s)).collect()
    }

    /// Verdict of `set`, if the search reached it.
    pub fn verdict(&self, set: &FaultSet) -> Option<Verdict> {
        self.nodes.iter().find(|n| n.faults == *set).map(|n| n.verdict)
    }

    /// Sets that were not checked because they contain a critical set.
    pub fn skipped_sets(&self) -> impl Iterator<Item = &FaultSet> {
        self.nodes
            .iter()
            .filter(|n| n.verdict == Verdict::Unknown)
            .map(|n| &n.faults)
    }

    /// Number of fault sets over the universe.
    pub fn lattice_size(&self) -> BigUint {
        lattice_size(self.universe.len())
    }
}

impl fmt::Display for SafetyAnalysisResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=======================================")?;
        writeln!(f, "Safety analysis of hazard '{}'", self.hazard)?;
        writeln!(f, "=======================================")?;
        writeln!(f, "Faults: {}", self.universe.len())?;
        if !self.forced.is_empty() {
            writeln!(f, "Always activated: {}", self.names(&self.forced).join(", "))?;
        }
        if !self.suppressed.is_empty() {
            writeln!(f, "Never activated: {}", self.names(&self.suppressed).join(", "))?;
        }
        writeln!(
            f,
            "Checked fault sets: {} of {} ({:.3} s)",
            self.checked_sets_count,
            self.lattice_size(),
            self.elapsed.as_secs_f64()
        )?;
        writeln!(f, "Minimal critical sets: {}", self.minimal_critical_sets.len())?;
        for (i, names) in self.critical_set_names().iter().enumerate() {
            writeln!(f, "  ({}) {{ {} }}", i + 1, names.join(", "))?;
        }
        if !self.exceptions.is_empty() {
            writeln!(f, "Exceptions: {}", self.exceptions.len())?;
            for e in &self.exceptions {
                writeln!(f, "  {{ {} }}: {}", self.names(&e.candidate).join(", "), e.error)?;
            }
        }
        if !self.is_exhaustive {
            writeln!(f, "WARNING: the analysis is not exhaustive")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::config::SearchBudget;
    use crate::error::{ConfigError, StorageKind};

    /// Answers checks from a fixed family of critical sets.
    struct Oracle {
        critical: Vec<FaultSet>,
        checked: Mutex<Vec<FaultSet>>,
    }

    impl Oracle {
        fn new(critical: Vec<FaultSet>) -> Self {
            Self {
                critical,
                checked: Mutex::new(Vec::new()),
            }
        }
    }

    impl CandidateChecker for Oracle {
        fn check(&self, candidate: &FaultSet) -> Result<Check, AnalysisError> {
            self.checked.lock().push(candidate.clone());
            Ok(Check {
                critical: self.critical.iter().any(|c| c.is_subset(candidate)),
                counter_example: None,
            })
        }
    }

    fn set(ids: &[u32]) -> FaultSet {
        ids.iter().copied().map(FaultId::new).collect()
    }

    fn faults(n: u32) -> Vec<Fault> {
        (0..n).map(|i| Fault::new(i, format!("f{}", i))).collect()
    }

    fn never() -> Hazard {
        Hazard::new("hazard", |_| false)
    }

    #[test]
    fn test_worked_scenario() {
        let oracle = Oracle::new(vec![set(&[0]), set(&[1, 2])]);
        let analysis = SafetyAnalysis::new(AnalysisConfiguration::default());
        let results = analysis.search(&faults(3), &never(), &oracle).unwrap();

        assert_eq!(results.minimal_critical_sets, vec![set(&[0]), set(&[1, 2])]);
        assert_eq!(results.checked_sets_count, 5);
        assert!(results.is_exhaustive);

        let mut checked = oracle.checked.lock().clone();
        checked.sort();
        assert_eq!(
            checked,
            vec![set(&[]), set(&[0]), set(&[1]), set(&[2]), set(&[1, 2])]
        );
        for skipped in [set(&[0, 1]), set(&[0, 2]), set(&[0, 1, 2])] {
            assert_eq!(results.verdict(&skipped), Some(Verdict::Unknown));
        }
        assert_eq!(results.verdict(&set(&[1])), Some(Verdict::Safe));
        assert_eq!(results.critical_set_names(), vec![vec!["f0"], vec!["f1", "f2"]]);
    }

    #[test]
    fn test_parallel_checks() {
        let oracle = Oracle::new(vec![set(&[0, 3]), set(&[1, 2]), set(&[4])]);
        let config = AnalysisConfiguration::default().with_parallel_checks(4);
        let results = SafetyAnalysis::new(config).search(&faults(6), &never(), &oracle).unwrap();
        assert_eq!(results.minimal_critical_sets, vec![set(&[4]), set(&[0, 3]), set(&[1, 2])]);
        assert!(results.is_exhaustive);
    }

    #[test]
    fn test_empty_set_critical() {
        let oracle = Oracle::new(vec![FaultSet::empty()]);
        let results = SafetyAnalysis::new(AnalysisConfiguration::default())
            .search(&faults(3), &never(), &oracle)
            .unwrap();
        assert_eq!(results.minimal_critical_sets, vec![FaultSet::empty()]);
        assert_eq!(results.checked_sets_count, 1);
        assert!(results.is_exhaustive);
    }

    #[test]
    fn test_declared_modes() {
        let faults = vec![
            Fault::new(0, "a"),
            Fault::new(1, "b").with_activation(ActivationMode::Suppressed),
            Fault::new(2, "c").with_activation(ActivationMode::Forced),
        ];
        let oracle = Oracle::new(vec![set(&[0])]);
        let results = SafetyAnalysis::new(AnalysisConfiguration::default())
            .search(&faults, &never(), &oracle)
            .unwrap();
        assert_eq!(results.universe, set(&[0]));
        assert_eq!(results.forced, set(&[2]));
        assert_eq!(results.suppressed, set(&[1]));
        assert_eq!(results.minimal_critical_sets, vec![set(&[0])]);
        assert_eq!(results.checked_sets_count, 2);
    }

    #[test]
    fn test_budget_checked_sets() {
        let oracle = Oracle::new(vec![set(&[2, 3])]);
        let config = AnalysisConfiguration::default().with_budget(SearchBudget {
            max_checked_sets: Some(3),
            ..SearchBudget::default()
        });
        let results = SafetyAnalysis::new(config).search(&faults(4), &never(), &oracle).unwrap();
        assert_eq!(results.checked_sets_count, 3);
        assert!(!results.is_exhaustive);
        assert!(results.minimal_critical_sets.is_empty());
    }

    #[test]
    fn test_budget_cardinality() {
        let oracle = Oracle::new(vec![set(&[0]), set(&[1, 2])]);
        let config = AnalysisConfiguration::default().with_budget(SearchBudget {
            max_cardinality: Some(1),
            ..SearchBudget::default()
        });
        let results = SafetyAnalysis::new(config).search(&faults(3), &never(), &oracle).unwrap();
        assert_eq!(results.minimal_critical_sets, vec![set(&[0])]);
        assert!(!results.is_exhaustive);

        // Nothing is left to check beyond the limit.
        let oracle = Oracle::new(vec![set(&[0]), set(&[1]), set(&[2])]);
        let config = AnalysisConfiguration::default().with_budget(SearchBudget {
            max_cardinality: Some(1),
            ..SearchBudget::default()
        });
        let results = SafetyAnalysis::new(config).search(&faults(3), &never(), &oracle).unwrap();
        assert!(results.is_exhaustive);
    }

    #[test]
    fn test_budget_time() {
        let oracle = Oracle::new(vec![]);
        let config = AnalysisConfiguration::default().with_budget(SearchBudget {
            time_limit: Some(Duration::ZERO),
            ..SearchBudget::default()
        });
        let results = SafetyAnalysis::new(config).search(&faults(3), &never(), &oracle).unwrap();
        assert_eq!(results.checked_sets_count, 0);
        assert!(!results.is_exhaustive);
    }

    struct Flaky;

    impl CandidateChecker for Flaky {
        fn check(&self, candidate: &FaultSet) -> Result<Check, AnalysisError> {
            if *candidate == set(&[1]) {
                return Err(AnalysisError::ResourceExhausted {
                    kind: StorageKind::States,
                    capacity: 8,
                });
            }
            Ok(Check {
                critical: candidate.contains(FaultId::new(1)),
                counter_example: None,
            })
        }
    }

    #[test]
    fn test_inconclusive() {
        let results = SafetyAnalysis::new(AnalysisConfiguration::default())
            .search(&faults(2), &never(), &Flaky)
            .unwrap();
        assert_eq!(results.verdict(&set(&[1])), Some(Verdict::Inconclusive));
        assert_eq!(results.exceptions.len(), 1);
        assert_eq!(results.exceptions[0].candidate, set(&[1]));
        // The superset is still checked, and found critical.
        assert_eq!(results.minimal_critical_sets, vec![set(&[0, 1])]);
        assert!(!results.is_exhaustive);
        assert!(results.to_string().contains("not exhaustive"));
    }

    struct Misconfigured;

    impl CandidateChecker for Misconfigured {
        fn check(&self, candidate: &FaultSet) -> Result<Check, AnalysisError> {
            if candidate.len() == 1 {
                return Err(ConfigError::InvalidCpuCount(0).into());
            }
            Ok(Check {
                critical: false,
                counter_example: None,
            })
        }
    }

    #[test]
    fn test_fatal_check_error() {
        for parallel_checks in [1, 3] {
            let config = AnalysisConfiguration::default().with_parallel_checks(parallel_checks);
            let err = SafetyAnalysis::new(config)
                .search(&faults(3), &never(), &Misconfigured)
                .unwrap_err();
            assert!(matches!(err, AnalysisError::Config(ConfigError::InvalidCpuCount(0))));
        }
    }

    struct SkipEverything;

    impl Heuristic for SkipEverything {
        fn name(&self) -> &str {
            "skip-everything"
        }

        fn advise(&self, _: &SearchContext<'_>, candidates: &[FaultSet]) -> crate::heuristics::Advice {
            crate::heuristics::Advice {
                priorities: None,
                skip: candidates.to_vec(),
            }
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    fn test_unsound_heuristic() {
        let oracle = Oracle::new(vec![set(&[0])]);
        let analysis = SafetyAnalysis::new(AnalysisConfiguration::default()).with_heuristic(SkipEverything);
        let err = analysis.search(&faults(2), &never(), &oracle).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::HeuristicContractViolation { ref heuristic, .. } if heuristic == "skip-everything"
        ));
    }

    #[test]
    fn test_heuristics_do_not_change_result() {
        use crate::heuristics::{RedundancyHeuristic, SubsumptionHeuristic};

        let family = vec![set(&[0, 1]), set(&[2]), set(&[1, 3, 4])];
        let plain = SafetyAnalysis::new(AnalysisConfiguration::default())
            .search(&faults(5), &never(), &Oracle::new(family.clone()))
            .unwrap();
        let guided = SafetyAnalysis::new(AnalysisConfiguration::default())
            .with_heuristic(RedundancyHeuristic::new(vec![set(&[0, 1]), set(&[3, 4])]))
            .with_heuristic(SubsumptionHeuristic)
            .search(&faults(5), &never(), &Oracle::new(family))
            .unwrap();
        assert_eq!(plain.minimal_critical_sets, guided.minimal_critical_sets);
        assert_eq!(plain.checked_sets_count, guided.checked_sets_count);
    }
}
