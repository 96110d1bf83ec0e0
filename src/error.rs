//! Error types of the analysis.
//!
//! Errors fall into two groups. [`ConfigError`] is fatal and reported before any
//! traversal starts. [`AnalysisError`] values raised while checking a single
//! fault set (exhausted storage, failing model steps) are *non-fatal*: the search
//! records them next to the offending candidate and carries on, marking the
//! candidate as inconclusive.

use thiserror::Error;

use crate::fault::FaultSet;
use crate::state::StateIndex;

/// Invalid analysis configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("CPU count must be at least 1, got {0}")]
    InvalidCpuCount(usize),
    #[error("State capacity must be in the range 1..={max}, got {value}")]
    InvalidStateCapacity { value: usize, max: usize },
    #[error("Successor capacity must be positive")]
    InvalidSuccessorCapacity,
    #[error("Number of parallel checks must be at least 1, got {0}")]
    InvalidParallelChecks(usize),
    #[error("Model declares a zero-sized state vector")]
    EmptyStateVector,
    #[error("Fault #{index} has identifier {id}; fault identifiers must be dense and ordered")]
    FaultIdMismatch { index: usize, id: u32 },
    #[error("Fault '{name}' has probability {probability} outside of [0, 1]")]
    InvalidFaultProbability { name: String, probability: f64 },
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Which bounded buffer ran out of space.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StorageKind {
    /// The per-run state storage.
    States,
    /// The per-state successor buffer.
    Successors,
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::States => write!(f, "state storage"),
            StorageKind::Successors => write!(f, "successor storage"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    #[error("Unable to store an additional state: {kind} capacity of {capacity} exhausted")]
    ResourceExhausted { kind: StorageKind, capacity: usize },
    #[error("Model step failed{}: {message}", .state.map(|s| format!(" in state {}", s)).unwrap_or_default())]
    ModelStepFailure {
        state: Option<StateIndex>,
        message: String,
    },
    #[error("Heuristic '{heuristic}' skipped {candidate}, which is not subsumed by a known critical set")]
    HeuristicContractViolation {
        heuristic: String,
        candidate: FaultSet,
    },
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AnalysisError {
    /// Whether the error only invalidates the candidate it was raised for.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AnalysisError::ResourceExhausted { .. } | AnalysisError::ModelStepFailure { .. }
        )
    }
}

/// Failure raised by a model's initial-state or step function.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ModelError {
    pub message: String,
}

impl ModelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors of the probabilistic path.
#[derive(Debug, Clone, Error)]
pub enum SolverError {
    #[error("Outgoing probabilities of state {state} sum up to {sum}, expected 1")]
    InvalidDistribution { state: usize, sum: f64 },
    #[error("Initial distribution sums up to {0}, expected 1")]
    InvalidInitialDistribution(f64),
    #[error("Markov chain has no initial states")]
    NoInitialStates,
    #[error("Distribution for state {0} was already finished")]
    DuplicateDistribution(usize),
    #[error("Solver did not converge within {iterations} iterations (residual {residual:e})")]
    NotConverged { iterations: usize, residual: f64 },
    #[error("Probability {0} is outside of [0, 1]")]
    InvalidProbability(f64),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}
