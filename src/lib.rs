//! # dcca-rs: Deductive Cause-Consequence Analysis in Rust
//!
//! **`dcca-rs`** computes the **minimal critical fault sets** of a system model:
//! the smallest combinations of component faults whose occurrence can drive the
//! system into a hazardous state.
//!
//! ## What is DCCA?
//!
//! Deductive Cause-Consequence Analysis is a model-based safety analysis.
//! Given a model of the system, the faults it may suffer and a *hazard* (a
//! predicate over system states), a set of faults is **critical** if the hazard
//! becomes reachable when exactly these faults may occur. Criticality is
//! monotone: every superset of a critical set is critical too. The result of
//! the analysis is therefore the *antichain* of minimal critical sets, which is
//! found by walking the lattice of fault sets by increasing cardinality and
//! never checking a set that contains a known critical one.
//!
//! Every check is an explicit-state reachability analysis: a parallel
//! breadth-first traversal over deduplicated state vectors.
//!
//! ## Key Features
//!
//! - **Opaque models**: anything implementing [`Model`][crate::model::Model] can be
//!   analyzed. A model serializes its state into a fixed-size byte vector and
//!   emits successors into a [`Successors`][crate::model::Successors] sink.
//! - **Parallel traversal**: a level-synchronous BFS over a sharded concurrent
//!   [`StateStorage`][crate::storage::StateStorage], with per-level barriers.
//! - **Subsumption pruning**: supersets of known critical sets are never checked,
//!   and [`heuristics`] may reorder the candidates of a level.
//! - **Counterexamples**: shortest traces to the hazard, exportable as JSON.
//! - **Fault-optimized backend**: one exploration of the model, then every
//!   candidate answered by restricted reachability over the recorded graph.
//! - **Probabilities**: the model as a [`MarkovChain`][crate::markov::MarkovChain]
//!   and the probability of reaching the hazard.
//!
//! ## Basic Usage
//!
//! ```rust
//! use dcca_rs::activation::Activation;
//! use dcca_rs::config::AnalysisConfiguration;
//! use dcca_rs::error::ModelError;
//! use dcca_rs::fault::{Fault, FaultId};
//! use dcca_rs::model::{Hazard, Model, Successors, TransitionLabel};
//! use dcca_rs::search::SafetyAnalysis;
//! use dcca_rs::state::{ReadState, StateView};
//!
//! // A pump that overheats once its thermostat fails.
//! struct Pump {
//!     faults: Vec<Fault>,
//! }
//!
//! impl Model for Pump {
//!     fn state_vector_size(&self) -> usize {
//!         1
//!     }
//!
//!     fn faults(&self) -> &[Fault] {
//!         &self.faults
//!     }
//!
//!     fn initial_states(&self, successors: &mut Successors) -> Result<(), ModelError> {
//!         let state = successors.candidate();
//!         successors.emit(&state, TransitionLabel::default());
//!         Ok(())
//!     }
//!
//!     fn step(
//!         &self,
//!         state: StateView<'_>,
//!         activation: &Activation,
//!         successors: &mut Successors,
//!     ) -> Result<(), ModelError> {
//!         let thermostat = FaultId::new(0);
//!         let mut next = successors.candidate();
//!         for (effect, _) in activation.effects(thermostat) {
//!             next.set_bool(0, state.get_bool(0) || effect.is_overridden());
//!             let mut label = TransitionLabel::new();
//!             if effect.is_overridden() {
//!                 label = label.with_fault(thermostat);
//!             }
//!             successors.emit(&next, label);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let pump = Pump {
//!     faults: vec![Fault::new(0, "thermostat"), Fault::new(1, "display")],
//! };
//! let hazard = Hazard::new("overheated", |s| s.get_bool(0));
//!
//! let results = SafetyAnalysis::new(AnalysisConfiguration::default())
//!     .compute_minimal_critical_sets(&pump, &hazard)?;
//! assert_eq!(results.critical_set_names(), vec![vec!["thermostat"]]);
//! assert!(results.is_exhaustive);
//! # Ok::<(), dcca_rs::error::AnalysisError>(())
//! ```
//!
//! ## Core Components
//!
//! - **[`search`]**: The DCCA driver. Contains [`SafetyAnalysis`][crate::search::SafetyAnalysis].
//! - **[`traversal`]**: Reachability checks and full state graph exploration.
//! - **[`activation`]**: Which faults may occur during a single check.
//! - **[`storage`]**: Deduplicating state storage shared by traversal workers.
//! - **[`probability`]**: Hazard probabilities over the model's Markov chain.
//!
//! The library only logs through the [`log`](https://docs.rs/log) facade; install
//! any logger to see the progress of an analysis.

pub mod activation;
pub mod config;
pub mod counterexample;
pub mod error;
pub mod fault;
pub mod heuristics;
pub mod markov;
pub mod model;
pub mod optimized;
pub mod probability;
pub mod search;
pub mod state;
pub mod storage;
pub mod table;
pub mod temporary;
pub mod traversal;
pub mod utils;
