//! Probability of reaching a hazard.

use std::fmt;

use log::{debug, info};

use crate::config::AnalysisConfiguration;
use crate::error::SolverError;
use crate::markov::MarkovChain;
use crate::model::{Hazard, Model};

/// A probability in `[0, 1]`.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd)]
pub struct Probability(f64);

impl Probability {
    pub const ZERO: Probability = Probability(0.0);
    pub const ONE: Probability = Probability(1.0);

    pub fn new(value: f64) -> Result<Self, SolverError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(SolverError::InvalidProbability(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn complement(self) -> Self {
        Self(1.0 - self.0)
    }

    /// Whether the probability lies in `[low, high]`.
    pub fn between(self, low: f64, high: f64) -> bool {
        low <= self.0 && self.0 <= high
    }
}

impl fmt::Display for Probability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:e}", self.0)
    }
}

/// Computes the probability of eventually reaching a labelled state.
pub trait ReachabilitySolver {
    fn probability_to_reach(&self, chain: &MarkovChain) -> Result<Probability, SolverError>;
}

/// Gauss-Seidel value iteration.
///
/// States that cannot reach a labelled state are fixed to 0 up front, which
/// makes the iteration converge to the reachability probability rather than to
/// some larger fixed point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ValueIterationSolver {
    /// Stop once no value changes by more than this.
    pub epsilon: f64,
    pub max_iterations: usize,
}

impl Default for ValueIterationSolver {
    fn default() -> Self {
        Self {
            epsilon: 1e-12,
            max_iterations: 100_000,
        }
    }
}

impl ValueIterationSolver {
    pub fn new(epsilon: f64, max_iterations: usize) -> Self {
        Self { epsilon, max_iterations }
    }
}

impl ReachabilitySolver for ValueIterationSolver {
    fn probability_to_reach(&self, chain: &MarkovChain) -> Result<Probability, SolverError> {
        chain.validate()?;

        let targets: Vec<usize> = chain.labelled_states().collect();
        let relevant = chain.ancestors(&targets);
        let n = chain.state_count();

        let mut values: Vec<f64> = (0..n).map(|s| if chain.is_labelled(s) { 1.0 } else { 0.0 }).collect();
        let open: Vec<usize> = (0..n).filter(|&s| relevant[s] && !chain.is_labelled(s)).collect();
        debug!(
            "Value iteration over {} of {} states ({} targets)",
            open.len(),
            n,
            targets.len()
        );

        let mut iterations = 0;
        loop {
            let mut residual: f64 = 0.0;
            for &s in &open {
                let value: f64 = chain.transitions(s).iter().map(|&(t, p)| p * values[t]).sum();
                residual = residual.max((value - values[s]).abs());
                values[s] = value;
            }
            iterations += 1;
            if residual <= self.epsilon {
                break;
            }
            if iterations >= self.max_iterations {
                return Err(SolverError::NotConverged { iterations, residual });
            }
        }
        debug!("Value iteration converged after {} iterations", iterations);

        let result: f64 = chain.initial_distribution().iter().map(|&(s, p)| p * values[s]).sum();
        Probability::new(result.clamp(0.0, 1.0))
    }
}

/// Probability that `model` reaches `hazard`, every fault occurring with its
/// declared probability at each opportunity.
pub fn calculate_probability_of_hazard<M: Model + ?Sized>(
    model: &M,
    hazard: &Hazard,
    config: &AnalysisConfiguration,
    solver: &dyn ReachabilitySolver,
) -> Result<Probability, SolverError> {
    let chain = MarkovChain::build(model, hazard, config)?;
    let probability = solver.probability_to_reach(&chain)?;
    info!("Probability of hazard '{}': {}", hazard.name(), probability);
    Ok(probability)
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    /// Knuth and Yao's die simulated by fair coin flips; states 7..=12 are the
    /// outcomes 1..=6.
    fn die(outcome: usize) -> MarkovChain {
        let mut chain = MarkovChain::new();
        chain.start_with_initial_distribution();
        chain.add_initial_transition(0, 1.0);
        chain.finish_initial_distribution();

        let coin = [(0, 1, 2), (1, 3, 4), (2, 5, 6), (3, 1, 7), (4, 8, 9), (5, 10, 11), (6, 12, 2)];
        for (state, heads, tails) in coin {
            chain.start_with_new_distribution(state).unwrap();
            chain.add_transition(heads, 0.5);
            chain.add_transition(tails, 0.5);
            chain.finish_distribution();
        }
        for state in 7..=12 {
            chain.set_state_label(state, state == outcome + 6);
            chain.start_with_new_distribution(state).unwrap();
            chain.add_transition(state, 1.0);
            chain.finish_distribution();
        }
        chain
    }

    #[test]
    fn test_die() {
        let solver = ValueIterationSolver::default();
        for outcome in 1..=6 {
            let p = solver.probability_to_reach(&die(outcome)).unwrap();
            assert!((p.value() - 1.0 / 6.0).abs() < 1e-9, "P({}) = {}", outcome, p);
            assert!(p.between(0.16, 0.17));
        }
    }

    #[test]
    fn test_unreachable_label() {
        let mut chain = die(1);
        chain.set_state_label(7, false);
        let p = ValueIterationSolver::default().probability_to_reach(&chain).unwrap();
        assert_eq!(p, Probability::ZERO);
    }

    #[test]
    fn test_not_converged() {
        let solver = ValueIterationSolver::new(0.0, 3);
        assert!(matches!(
            solver.probability_to_reach(&die(1)),
            Err(SolverError::NotConverged { iterations: 3, .. })
        ));
    }

    #[test]
    fn test_probability() {
        let p = Probability::new(0.25).unwrap();
        assert_eq!(p.complement().value(), 0.75);
        assert!(p.between(0.25, 0.25));
        assert!(!p.between(0.3, 1.0));
        assert!(Probability::new(1.5).is_err());
        assert!(Probability::new(f64::NAN).is_err());
        assert_eq!(Probability::ONE.to_string(), "1e0");
    }
}
