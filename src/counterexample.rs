//! Traces from an initial state to a hazard state.
//!
//! A [`CounterExample`] holds the model's serialized states along the path and,
//! for every step, the choice the model made: the ordinal of the successor among
//! the deduplicated successors of its source state and the faults the transition
//! activated. Replaying a trace only needs the model and these choices.
//!
//! Traces serialize to JSON for persistence:
//!
//! ```json
//! {
//!   "states": ["0000", "0100"],
//!   "steps": [{ "activated": [0], "choice": 1, "probability": 1.0 }]
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fault::FaultSet;
use crate::state::StateVector;

/// The choice taken by one transition of a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    /// Faults activated by the transition.
    pub activated: FaultSet,
    /// Position of the successor among the successors of the source state.
    pub choice: usize,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterExample {
    #[serde(with = "hex_states")]
    states: Vec<StateVector>,
    steps: Vec<TraceStep>,
}

impl CounterExample {
    /// Create a trace; `steps[i]` leads from `states[i]` to `states[i + 1]`.
    ///
    /// # Panics
    ///
    /// Panics if the trace is empty or the number of steps does not match.
    pub fn new(states: Vec<StateVector>, steps: Vec<TraceStep>) -> Self {
        assert!(!states.is_empty(), "Trace must contain at least one state");
        assert_eq!(steps.len() + 1, states.len(), "Trace needs one step between every two states");
        Self { states, steps }
    }

    /// Number of transitions.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn states(&self) -> &[StateVector] {
        &self.states
    }

    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    pub fn initial_state(&self) -> &StateVector {
        &self.states[0]
    }

    pub fn final_state(&self) -> &StateVector {
        &self.states[self.states.len() - 1]
    }

    /// All faults activated somewhere along the trace.
    pub fn activated_faults(&self) -> FaultSet {
        self.steps
            .iter()
            .fold(FaultSet::empty(), |acc, step| acc.union(&step.activated))
    }

    /// Probability of following exactly this trace from its initial state.
    pub fn probability(&self) -> f64 {
        self.steps.iter().map(|step| step.probability).product()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let trace: Self = serde_json::from_str(json)?;
        if trace.states.is_empty() || trace.steps.len() + 1 != trace.states.len() {
            return Err(serde::de::Error::custom(format!(
                "Trace has {} states and {} steps",
                trace.states.len(),
                trace.steps.len()
            )));
        }
        Ok(trace)
    }
}

impl fmt::Display for CounterExample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "0: {}", self.states[0].view())?;
        for (i, (step, state)) in self.steps.iter().zip(&self.states[1..]).enumerate() {
            write!(f, "  --[choice {}", step.choice)?;
            if !step.activated.is_empty() {
                write!(f, ", faults {}", step.activated)?;
            }
            writeln!(f, "]-->")?;
            writeln!(f, "{}: {}", i + 1, state.view())?;
        }
        Ok(())
    }
}

/// States as hex strings, which keeps traces readable and compact.
mod hex_states {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::state::StateVector;

    pub fn serialize<S: Serializer>(states: &[StateVector], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(states.iter().map(|s| s.view().to_string()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<StateVector>, D::Error> {
        let strings = Vec::<String>::deserialize(deserializer)?;
        strings
            .iter()
            .map(|s| decode(s).map(|bytes| StateVector::from_bytes(&bytes)).map_err(D::Error::custom))
            .collect()
    }

    fn decode(s: &str) -> Result<Vec<u8>, String> {
        if s.len() % 2 != 0 {
            return Err(format!("Odd number of hex digits in '{}'", s));
        }
        (0..s.len())
            .step_by(2)
            .map(|i| {
                s.get(i..i + 2)
                    .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                    .ok_or_else(|| format!("Invalid hex digits in '{}'", s))
            })
            .collect()
    }
}
