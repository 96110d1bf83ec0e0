//! Discrete-time Markov chains.
//!
//! A [`MarkovChain`] is built distribution by distribution:
//!
//! ```
//! use dcca_rs::markov::MarkovChain;
//!
//! let mut chain = MarkovChain::new();
//! chain.start_with_initial_distribution();
//! chain.add_initial_transition(0, 1.0);
//! chain.finish_initial_distribution();
//!
//! chain.start_with_new_distribution(0).unwrap();
//! chain.add_transition(1, 0.6);
//! chain.add_transition(0, 0.4);
//! chain.finish_distribution();
//!
//! chain.set_state_label(1, true);
//! chain.start_with_new_distribution(1).unwrap();
//! chain.add_transition(1, 1.0);
//! chain.finish_distribution();
//!
//! assert!(chain.validate().is_ok());
//! assert_eq!(chain.state_count(), 2);
//! ```
//!
//! States are dense indices; a state exists as soon as a transition, a label or
//! a distribution mentions it. The only label is the hazard label.

use std::collections::VecDeque;

use log::{debug, info};

use crate::activation::Activation;
use crate::config::AnalysisConfiguration;
use crate::error::SolverError;
use crate::model::{Hazard, Model};
use crate::traversal::explore_graph;

/// Tolerance of the probability sums checked by [`MarkovChain::validate`].
pub const TOLERANCE: f64 = 1e-9;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Open {
    Initial,
    State(usize),
}

#[derive(Debug, Clone, Default)]
pub struct MarkovChain {
    initial: Vec<(usize, f64)>,
    distributions: Vec<Option<Vec<(usize, f64)>>>,
    labels: Vec<bool>,
    open: Option<Open>,
}

impl MarkovChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the chain of `model` with every fault occurring with its declared
    /// probability.
    ///
    /// Hazard states and states without successors become absorbing. The
    /// probabilities of the model's initial states must sum up to 1.
    pub fn build<M: Model + ?Sized>(
        model: &M,
        hazard: &Hazard,
        config: &AnalysisConfiguration,
    ) -> Result<Self, SolverError> {
        let activation = Activation::probabilistic(model.faults());
        let graph = explore_graph(model, hazard, &activation, config)?;

        let mut chain = Self::new();
        chain.start_with_initial_distribution();
        for t in graph.initial() {
            chain.add_initial_transition(t.target, t.probability);
        }
        chain.finish_initial_distribution();

        for state in 0..graph.state_count() {
            chain.set_state_label(state, graph.is_hazard(state));
            chain.start_with_new_distribution(state)?;
            let transitions = graph.transitions(state);
            if transitions.is_empty() {
                chain.add_transition(state, 1.0);
            }
            for t in transitions {
                chain.add_transition(t.target, t.probability);
            }
            chain.finish_distribution();
        }

        chain.validate()?;
        info!(
            "Built Markov chain with {} states and {} transitions",
            chain.state_count(),
            chain.transition_count()
        );
        Ok(chain)
    }

    fn ensure(&mut self, state: usize) {
        if state >= self.labels.len() {
            self.labels.resize(state + 1, false);
            self.distributions.resize(state + 1, None);
        }
    }

    /// # Panics
    ///
    /// Panics if another distribution is still open.
    pub fn start_with_initial_distribution(&mut self) {
        assert!(self.open.is_none(), "Distribution {:?} is not finished", self.open);
        self.initial.clear();
        self.open = Some(Open::Initial);
    }

    pub fn add_initial_transition(&mut self, target: usize, probability: f64) {
        assert_eq!(self.open, Some(Open::Initial), "Initial distribution is not open");
        self.ensure(target);
        add_to(&mut self.initial, target, probability);
    }

    pub fn finish_initial_distribution(&mut self) {
        assert_eq!(self.open, Some(Open::Initial), "Initial distribution is not open");
        self.open = None;
    }

    /// Open the outgoing distribution of `state`.
    ///
    /// # Panics
    ///
    /// Panics if another distribution is still open.
    pub fn start_with_new_distribution(&mut self, state: usize) -> Result<(), SolverError> {
        assert!(self.open.is_none(), "Distribution {:?} is not finished", self.open);
        self.ensure(state);
        if self.distributions[state].is_some() {
            return Err(SolverError::DuplicateDistribution(state));
        }
        self.distributions[state] = Some(Vec::new());
        self.open = Some(Open::State(state));
        Ok(())
    }

    /// Add a transition to the open distribution; probabilities of repeated
    /// targets are summed.
    pub fn add_transition(&mut self, target: usize, probability: f64) {
        let Some(Open::State(source)) = self.open else {
            panic!("No state distribution is open");
        };
        self.ensure(target);
        if let Some(distribution) = &mut self.distributions[source] {
            add_to(distribution, target, probability);
        }
    }

    pub fn finish_distribution(&mut self) {
        assert!(
            matches!(self.open, Some(Open::State(_))),
            "No state distribution is open"
        );
        self.open = None;
    }

    /// Mark `state` as hazardous or not.
    pub fn set_state_label(&mut self, state: usize, hazard: bool) {
        self.ensure(state);
        self.labels[state] = hazard;
    }

    pub fn state_count(&self) -> usize {
        self.labels.len()
    }

    pub fn transition_count(&self) -> usize {
        self.distributions.iter().flatten().map(Vec::len).sum()
    }

    pub fn initial_distribution(&self) -> &[(usize, f64)] {
        &self.initial
    }

    /// Outgoing transitions of `state`; empty if it has no distribution.
    pub fn transitions(&self, state: usize) -> &[(usize, f64)] {
        self.distributions
            .get(state)
            .and_then(Option::as_deref)
            .unwrap_or_default()
    }

    /// All `(source, target, probability)` triples, by source.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.state_count())
            .flat_map(move |source| self.transitions(source).iter().map(move |&(t, p)| (source, t, p)))
    }

    pub fn is_labelled(&self, state: usize) -> bool {
        self.labels.get(state).copied().unwrap_or(false)
    }

    pub fn labelled_states(&self) -> impl Iterator<Item = usize> + '_ {
        self.labels.iter().enumerate().filter(|(_, &l)| l).map(|(s, _)| s)
    }

    /// Check that every distribution is a probability distribution.
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.initial.is_empty() {
            return Err(SolverError::NoInitialStates);
        }
        let check = |distribution: &[(usize, f64)]| -> Result<f64, SolverError> {
            let mut sum = 0.0;
            for &(_, p) in distribution {
                if !(0.0..=1.0).contains(&p) {
                    return Err(SolverError::InvalidProbability(p));
                }
                sum += p;
            }
            Ok(sum)
        };

        let sum = check(&self.initial)?;
        if (sum - 1.0).abs() > TOLERANCE {
            return Err(SolverError::InvalidInitialDistribution(sum));
        }
        for (state, distribution) in self.distributions.iter().enumerate() {
            let sum = match distribution {
                Some(d) => check(d)?,
                None => 0.0,
            };
            if (sum - 1.0).abs() > TOLERANCE {
                return Err(SolverError::InvalidDistribution { state, sum });
            }
        }
        debug!("Markov chain with {} states is valid", self.state_count());
        Ok(())
    }

    /// States from which one of `targets` is reachable over transitions of
    /// positive probability, `targets` included.
    pub fn ancestors(&self, targets: &[usize]) -> Vec<bool> {
        let n = self.state_count();
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (source, target, p) in self.iter() {
            if p > 0.0 {
                predecessors[target].push(source);
            }
        }

        let mut reached = vec![false; n];
        let mut queue = VecDeque::new();
        for &t in targets {
            if t < n && !reached[t] {
                reached[t] = true;
                queue.push_back(t);
            }
        }
        while let Some(s) = queue.pop_front() {
            for &p in &predecessors[s] {
                if !reached[p] {
                    reached[p] = true;
                    queue.push_back(p);
                }
            }
        }
        reached
    }
}

fn add_to(distribution: &mut Vec<(usize, f64)>, target: usize, probability: f64) {
    match distribution.iter_mut().find(|(t, _)| *t == target) {
        Some((_, p)) => *p += probability,
        None => distribution.push((target, probability)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn example() -> MarkovChain {
        let mut chain = MarkovChain::new();
        chain.start_with_initial_distribution();
        chain.add_initial_transition(0, 1.0);
        chain.finish_initial_distribution();
        chain.set_state_label(1, true);
        chain.start_with_new_distribution(1).unwrap();
        chain.add_transition(1, 1.0);
        chain.finish_distribution();
        chain.start_with_new_distribution(0).unwrap();
        chain.add_transition(1, 0.6);
        chain.add_transition(0, 0.4);
        chain.finish_distribution();
        chain
    }

    #[test]
    fn test_transitions() {
        let chain = example();
        assert!(chain.validate().is_ok());
        assert_eq!(chain.state_count(), 2);
        assert_eq!(chain.transition_count(), 3);
        let total: f64 = chain.iter().map(|(_, _, p)| p).sum();
        assert!((total - 2.0).abs() < 1e-12);
        assert_eq!(chain.labelled_states().collect::<Vec<_>>(), vec![1]);
        assert_eq!(chain.transitions(0), &[(1, 0.6), (0, 0.4)]);
    }

    #[test]
    fn test_repeated_targets_are_summed() {
        let mut chain = MarkovChain::new();
        chain.start_with_new_distribution(0).unwrap();
        chain.add_transition(0, 0.25);
        chain.add_transition(0, 0.75);
        chain.finish_distribution();
        assert_eq!(chain.transitions(0), &[(0, 1.0)]);
    }

    #[test]
    fn test_missing_mass() {
        let mut chain = MarkovChain::new();
        chain.start_with_initial_distribution();
        chain.add_initial_transition(0, 1.0);
        chain.finish_initial_distribution();
        chain.start_with_new_distribution(0).unwrap();
        chain.add_transition(1, 0.1);
        chain.finish_distribution();
        chain.start_with_new_distribution(1).unwrap();
        chain.add_transition(1, 1.0);
        chain.finish_distribution();
        assert!(matches!(
            chain.validate(),
            Err(SolverError::InvalidDistribution { state: 0, .. })
        ));
    }

    #[test]
    fn test_validate_errors() {
        let chain = MarkovChain::new();
        assert!(matches!(chain.validate(), Err(SolverError::NoInitialStates)));

        let mut chain = example();
        assert!(matches!(
            chain.start_with_new_distribution(0),
            Err(SolverError::DuplicateDistribution(0))
        ));
        // A state mentioned only as a target has no distribution.
        chain.start_with_initial_distribution();
        chain.add_initial_transition(0, 0.5);
        chain.add_initial_transition(2, 0.5);
        chain.finish_initial_distribution();
        assert!(matches!(
            chain.validate(),
            Err(SolverError::InvalidDistribution { state: 2, .. })
        ));
    }

    #[test]
    fn test_ancestors() {
        let chain = example();
        assert_eq!(chain.ancestors(&[1]), vec![true, true]);
        assert_eq!(chain.ancestors(&[0]), vec![true, false]);
        assert_eq!(chain.ancestors(&[]), vec![false, false]);
    }

    #[test]
    #[should_panic(expected = "No state distribution is open")]
    fn test_transition_outside_distribution() {
        let mut chain = MarkovChain::new();
        chain.add_transition(0, 1.0);
    }
}
