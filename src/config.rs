use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::activation::ActivationPolicy;
use crate::error::ConfigError;
use crate::fault::Fault;
use crate::storage::MAX_CAPACITY;

/// How candidate fault sets are checked.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize)]
pub enum Backend {
    /// One full traversal per candidate, with the candidate's faults forced.
    #[default]
    Exhaustive,
    /// A single traversal with all faults free; candidates are answered by
    /// restricted reachability over the recorded transitions.
    FaultOptimized,
}

/// Limits after which the search stops and reports a non-exhaustive result.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchBudget {
    /// Maximum number of fault sets to check.
    pub max_checked_sets: Option<usize>,
    /// Maximum wall-clock time of the whole search.
    pub time_limit: Option<Duration>,
    /// Largest cardinality of fault sets to check.
    pub max_cardinality: Option<usize>,
}

impl SearchBudget {
    pub fn is_unlimited(&self) -> bool {
        self.max_checked_sets.is_none() && self.time_limit.is_none() && self.max_cardinality.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfiguration {
    /// Number of worker threads of a single traversal.
    pub cpu_count: usize,
    /// Maximum number of states stored by a single traversal.
    pub state_capacity: usize,
    /// Maximum number of distinct successors of a single state.
    pub successor_capacity: usize,
    pub backend: Backend,
    pub generate_counter_examples: bool,
    pub activation_policy: ActivationPolicy,
    /// Number of fault sets checked concurrently.
    pub parallel_checks: usize,
    pub budget: SearchBudget,
}

impl Default for AnalysisConfiguration {
    fn default() -> Self {
        Self {
            cpu_count: std::thread::available_parallelism().map_or(1, |n| n.get()),
            state_capacity: 1 << 20,
            successor_capacity: 1 << 14,
            backend: Backend::default(),
            generate_counter_examples: false,
            activation_policy: ActivationPolicy::default(),
            parallel_checks: 1,
            budget: SearchBudget::default(),
        }
    }
}

impl AnalysisConfiguration {
    pub fn with_cpu_count(mut self, cpu_count: usize) -> Self {
        self.cpu_count = cpu_count;
        self
    }

    pub fn with_state_capacity(mut self, state_capacity: usize) -> Self {
        self.state_capacity = state_capacity;
        self
    }

    pub fn with_successor_capacity(mut self, successor_capacity: usize) -> Self {
        self.successor_capacity = successor_capacity;
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_counter_examples(mut self, generate: bool) -> Self {
        self.generate_counter_examples = generate;
        self
    }

    pub fn with_activation_policy(mut self, policy: ActivationPolicy) -> Self {
        self.activation_policy = policy;
        self
    }

    pub fn with_parallel_checks(mut self, parallel_checks: usize) -> Self {
        self.parallel_checks = parallel_checks;
        self
    }

    pub fn with_budget(mut self, budget: SearchBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Check the bounds of every setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cpu_count == 0 {
            return Err(ConfigError::InvalidCpuCount(self.cpu_count));
        }
        if self.state_capacity == 0 || self.state_capacity > MAX_CAPACITY {
            return Err(ConfigError::InvalidStateCapacity {
                value: self.state_capacity,
                max: MAX_CAPACITY,
            });
        }
        if self.successor_capacity == 0 {
            return Err(ConfigError::InvalidSuccessorCapacity);
        }
        if self.parallel_checks == 0 {
            return Err(ConfigError::InvalidParallelChecks(self.parallel_checks));
        }
        Ok(())
    }

    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> String {
        // A struct of plain fields always serializes.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Check the shape of a model: a non-empty state vector and dense fault ids
/// with valid probabilities.
pub fn validate_model(state_vector_size: usize, faults: &[Fault]) -> Result<(), ConfigError> {
    if state_vector_size == 0 {
        return Err(ConfigError::EmptyStateVector);
    }
    for (index, fault) in faults.iter().enumerate() {
        if fault.id().index() != index {
            return Err(ConfigError::FaultIdMismatch {
                index,
                id: fault.id().id(),
            });
        }
        let p = fault.probability();
        if !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::InvalidFaultProbability {
                name: fault.name().to_string(),
                probability: p,
            });
        }
    }
    Ok(())
}
