//! Fault-optimized checking.
//!
//! Instead of one traversal per candidate, the model is explored once with every
//! fault of the universe free to activate. Each recorded transition remembers
//! the minimal fault sets that enable it, so a candidate `F` is critical iff a
//! hazard state is reachable over transitions enabled by `F` together with the
//! faults that are always active.
//!
//! Along such a path every fault of `F` may or may not occur at each step,
//! whereas the exhaustive backend forces it at every opportunity. For models
//! where an occurring fault only adds behavior, both backends agree.

use log::info;

use crate::activation::Activation;
use crate::config::AnalysisConfiguration;
use crate::error::AnalysisError;
use crate::fault::FaultSet;
use crate::model::{Hazard, Model};
use crate::search::{CandidateChecker, Check};
use crate::traversal::{explore_graph, StateGraph};

pub struct FaultOptimizedChecker {
    graph: Result<StateGraph, AnalysisError>,
    forced: FaultSet,
    counter_examples: bool,
}

impl FaultOptimizedChecker {
    /// Explore the state graph of `model` once.
    ///
    /// A failing exploration is not reported here; every later check returns
    /// its error.
    pub fn new<M: Model + ?Sized>(model: &M, hazard: &Hazard, config: &AnalysisConfiguration) -> Self {
        let activation = Activation::unrestricted(model.faults());
        let graph = explore_graph(model, hazard, &activation, config);
        if let Ok(graph) = &graph {
            info!(
                "Explored {} states and {} transitions (depth {})",
                graph.state_count(),
                graph.transition_count(),
                graph.depth()
            );
        }
        Self {
            graph,
            forced: activation.forced(),
            counter_examples: config.generate_counter_examples,
        }
    }

    pub fn graph(&self) -> Result<&StateGraph, &AnalysisError> {
        self.graph.as_ref()
    }
}

impl CandidateChecker for FaultOptimizedChecker {
    fn check(&self, candidate: &FaultSet) -> Result<Check, AnalysisError> {
        let graph = self.graph.as_ref().map_err(Clone::clone)?;
        let faults = candidate.union(&self.forced);
        if self.counter_examples {
            let counter_example = graph.counter_example(&faults);
            Ok(Check {
                critical: counter_example.is_some(),
                counter_example,
            })
        } else {
            Ok(Check {
                critical: graph.hazard_reachable_with(&faults),
                counter_example: None,
            })
        }
    }
}
