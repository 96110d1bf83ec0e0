//! The interface between the analysis and the system under analysis.
//!
//! A [`Model`] serializes its states into fixed-length byte vectors and computes
//! successors on demand. The analysis never looks inside a state; it only
//! compares bytes and hands views back to the model (and to the [`Hazard`]).
//!
//! Successors are reported through a [`Successors`] sink. The sink deduplicates
//! what the model emits for a single source state: emitting the same successor
//! twice yields one transition whose probability is the sum of both.

use std::fmt;

use crate::activation::Activation;
use crate::error::{AnalysisError, ModelError};
use crate::fault::{Fault, FaultId, FaultSet};
use crate::state::{StateVector, StateView};
use crate::temporary::TemporaryStateStorage;

/// A state-transition system with faults.
///
/// Implementations must be deterministic: the same state and activation must
/// always produce the same successors in the same order.
pub trait Model: Sync {
    /// Length of a serialized state in bytes.
    fn state_vector_size(&self) -> usize;

    /// The faults of the model. The fault at position `i` must have id `i`.
    fn faults(&self) -> &[Fault];

    /// Emit the initial states.
    fn initial_states(&self, out: &mut Successors) -> Result<(), ModelError>;

    /// Emit the successors of `state`, one per choice permitted by `activation`.
    fn step(
        &self,
        state: StateView<'_>,
        activation: &Activation,
        out: &mut Successors,
    ) -> Result<(), ModelError>;
}

/// What a transition did: how likely it is and which faults it activated.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionLabel {
    pub probability: f64,
    pub activated: FaultSet,
}

impl TransitionLabel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = probability;
        self
    }

    pub fn with_fault(mut self, fault: FaultId) -> Self {
        self.activated.insert(fault);
        self
    }

    pub fn with_faults(mut self, faults: &FaultSet) -> Self {
        self.activated = self.activated.union(faults);
        self
    }
}

impl Default for TransitionLabel {
    fn default() -> Self {
        Self {
            probability: 1.0,
            activated: FaultSet::empty(),
        }
    }
}

/// One deduplicated successor of a state.
#[derive(Debug, Clone)]
pub struct Successor {
    label: TransitionLabel,
    probability: f64,
    activations: Vec<FaultSet>,
}

impl Successor {
    fn new(label: TransitionLabel) -> Self {
        Self {
            probability: label.probability,
            activations: vec![label.activated.clone()],
            label,
        }
    }

    fn merge(&mut self, label: &TransitionLabel) {
        self.probability += label.probability;
        let activated = &label.activated;
        if self.activations.iter().any(|a| a.is_subset(activated)) {
            return;
        }
        self.activations.retain(|a| !activated.is_subset(a));
        self.activations.push(activated.clone());
    }

    /// Label of the first emission of this successor.
    pub fn label(&self) -> &TransitionLabel {
        &self.label
    }

    /// Summed probability of all emissions of this successor.
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Minimal sets of activated faults over all emissions of this successor.
    ///
    /// The successor can be reached while activating only the faults of any
    /// one of these sets.
    pub fn activations(&self) -> &[FaultSet] {
        &self.activations
    }
}

/// Sink for the successors of one state.
pub struct Successors {
    buffer: TemporaryStateStorage,
    entries: Vec<Successor>,
    model_size: usize,
    history_size: usize,
    history: FaultSet,
    scratch: Vec<u8>,
    overflow: Option<AnalysisError>,
}

impl Successors {
    /// Create a sink for states of `model_size` bytes holding at most
    /// `capacity` distinct successors.
    pub fn new(model_size: usize, capacity: usize) -> Self {
        Self::with_history(model_size, 0, capacity)
    }

    /// Like [`Successors::new`], but every stored successor is followed by
    /// `history_size` bytes recording the faults activated so far.
    pub(crate) fn with_history(model_size: usize, history_size: usize, capacity: usize) -> Self {
        let slot_size = model_size + history_size;
        Self {
            buffer: TemporaryStateStorage::new(slot_size, capacity),
            entries: Vec::new(),
            model_size,
            history_size,
            history: FaultSet::empty(),
            scratch: vec![0; slot_size],
            overflow: None,
        }
    }

    /// Drop all successors and start collecting the ones of a state whose
    /// fault history is `history`.
    pub(crate) fn begin(&mut self, history: FaultSet) {
        self.buffer.clear();
        self.entries.clear();
        self.history = history;
        self.overflow = None;
    }

    /// Length of the model's part of a state.
    pub fn model_size(&self) -> usize {
        self.model_size
    }

    /// A zero-filled vector to build a successor in.
    pub fn candidate(&self) -> StateVector {
        StateVector::zeroed(self.model_size)
    }

    /// Report `state` as a successor.
    ///
    /// # Panics
    ///
    /// Panics if `state` does not have the model's state vector size.
    pub fn emit(&mut self, state: &StateVector, label: TransitionLabel) {
        assert_eq!(
            state.len(),
            self.model_size,
            "Successor has {} bytes, expected {}",
            state.len(),
            self.model_size
        );
        if self.overflow.is_some() {
            return;
        }

        self.scratch[..self.model_size].copy_from_slice(state.as_bytes());
        if self.history_size > 0 {
            let history = self.history.union(&label.activated);
            history.write_bytes(&mut self.scratch[self.model_size..]);
        }

        if let Some(i) = self.buffer.try_find(&self.scratch) {
            self.entries[i].merge(&label);
            return;
        }
        match self.buffer.push(&self.scratch) {
            Ok(_) => self.entries.push(Successor::new(label)),
            Err(e) => self.overflow = Some(e),
        }
    }

    /// Number of distinct successors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The successors in order of their first emission.
    pub fn iter(&self) -> impl Iterator<Item = (StateView<'_>, &Successor)> {
        (0..self.len()).map(|i| {
            let bytes = &self.buffer.get(i)[..self.model_size];
            (StateView::new(bytes), &self.entries[i])
        })
    }

    /// Like [`Successors::iter`], but yields the full stored bytes including
    /// the fault history.
    pub(crate) fn raw(&self) -> impl Iterator<Item = (&[u8], &Successor)> {
        (0..self.len()).map(|i| (self.buffer.get(i), &self.entries[i]))
    }

    /// The error raised when the successor capacity was exceeded, if any.
    pub(crate) fn take_overflow(&mut self) -> Option<AnalysisError> {
        self.overflow.take()
    }
}

impl fmt::Debug for Successors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter().map(|(state, _)| state)).finish()
    }
}

type Predicate = dyn Fn(StateView<'_>) -> bool + Send + Sync;

/// A named predicate over states marking the undesired ones.
pub struct Hazard {
    name: String,
    predicate: Box<Predicate>,
}

impl Hazard {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(StateView<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn holds(&self, state: StateView<'_>) -> bool {
        (self.predicate)(state)
    }
}

impl fmt::Debug for Hazard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hazard").field("name", &self.name).finish()
    }
}
