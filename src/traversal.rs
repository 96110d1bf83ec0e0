//! Parallel breadth-first reachability.
//!
//! A traversal run explores the states of a [`Model`] under a fixed
//! [`Activation`], level by level:
//!
//! ```text
//!            ┌──────────── level k ────────────┐
//! frontier:  [ s0 s1 s2 | s3 s4 s5 | s6 s7 s8 ]
//!              worker 0   worker 1   worker 2
//!                  │          │          │      (expand, probe shared storage)
//!                  ▼          ▼          ▼
//!             ─────────────── barrier ───────────────
//!                  leader merges the new states
//!             ─────────────── barrier ───────────────
//! frontier:  [ next level, in worker order ]
//! ```
//!
//! Every worker owns a [`Successors`] buffer that deduplicates the successors of
//! the state being expanded; the [`StateStorage`] shared by all workers decides
//! which successors are new. Only new states enter the next frontier, so no
//! state is expanded twice.
//!
//! Hazard states are never expanded. A reachability check stops at the first
//! hazard state it finds. When a counterexample is requested, the hazardous
//! level is completed first and the hazard reached from the earliest frontier
//! position (then the earliest successor) is chosen, which yields a shortest
//! trace that is deterministic for a given frontier order.
//!
//! A failing or panicking model step aborts the run with
//! [`AnalysisError::ModelStepFailure`]; the storage running out of space
//! aborts it with [`AnalysisError::ResourceExhausted`]. A hazard that was
//! already reached takes precedence over such failures.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;

use log::{debug, trace};
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::activation::{Activation, ActivationPolicy};
use crate::config::{validate_model, AnalysisConfiguration};
use crate::counterexample::{CounterExample, TraceStep};
use crate::error::AnalysisError;
use crate::fault::FaultSet;
use crate::model::{Hazard, Model, Successor, Successors};
use crate::state::{StateIndex, StateVector, StateView};
use crate::storage::StateStorage;

/// Result of a reachability check.
#[derive(Debug, Clone)]
pub struct TraversalOutcome {
    pub hazard_found: bool,
    /// Number of distinct states stored.
    pub state_count: usize,
    /// Number of distinct transitions taken, including the initial ones.
    pub transition_count: usize,
    /// Depth of the deepest level reached (initial states are at depth 0).
    pub depth: usize,
    /// Faults activated on the way to the hazard, when fault histories are
    /// tracked (see [`ActivationPolicy::Nondeterministic`]).
    pub activated_faults: Option<FaultSet>,
    pub counter_example: Option<CounterExample>,
}

/// A transition of a [`StateGraph`].
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub target: usize,
    pub probability: f64,
    /// Minimal sets of faults whose activation allows this transition.
    pub activations: Vec<FaultSet>,
}

impl Transition {
    /// Whether the transition can be taken while activating only `faults`.
    pub fn is_enabled_by(&self, faults: &FaultSet) -> bool {
        self.activations.iter().any(|a| a.is_subset(faults))
    }
}

/// The complete reachable state graph of a model.
///
/// States are numbered densely in discovery order. Hazard states carry no
/// outgoing transitions.
#[derive(Debug, Clone)]
pub struct StateGraph {
    states: Vec<StateVector>,
    hazard: Vec<bool>,
    initial: Vec<Transition>,
    transitions: Vec<Vec<Transition>>,
    transition_count: usize,
    depth: usize,
}

impl StateGraph {
    pub fn state_count(&self) -> usize {
        self.states.len()
    }
    pub fn transition_count(&self) -> usize {
        self.transition_count
    }
    pub fn depth(&self) -> usize {
        self.depth
    }
    pub fn state(&self, index: usize) -> &StateVector {
        &self.states[index]
    }
    pub fn is_hazard(&self, index: usize) -> bool {
        self.hazard[index]
    }
    /// Transitions into the initial states.
    pub fn initial(&self) -> &[Transition] {
        &self.initial
    }
    pub fn transitions(&self, index: usize) -> &[Transition] {
        &self.transitions[index]
    }

    /// Whether a hazard state is reachable using only transitions enabled by
    /// `faults`.
    pub fn hazard_reachable_with(&self, faults: &FaultSet) -> bool {
        self.find_hazard(faults).is_some()
    }

    /// A shortest trace to a hazard state using only transitions enabled by
    /// `faults`.
    pub fn counter_example(&self, faults: &FaultSet) -> Option<CounterExample> {
        let (hazard, parents) = self.find_hazard(faults)?;

        let mut states = vec![self.states[hazard].clone()];
        let mut steps = Vec::new();
        let mut current = hazard;
        while let Some((source, choice)) = parents[current] {
            let t = &self.transitions[source][choice];
            steps.push(TraceStep {
                activated: t
                    .activations
                    .iter()
                    .find(|a| a.is_subset(faults))
                    .cloned()
                    .unwrap_or_default(),
                choice,
                probability: t.probability,
            });
            states.push(self.states[source].clone());
            current = source;
        }
        states.reverse();
        steps.reverse();
        Some(CounterExample::new(states, steps))
    }

    /// Breadth-first search for a hazard state; returns it together with the
    /// `(source, choice)` link of every visited state.
    #[allow(clippy::type_complexity)]
    fn find_hazard(&self, faults: &FaultSet) -> Option<(usize, Vec<Option<(usize, usize)>>)> {
        let mut visited = vec![false; self.states.len()];
        let mut parents = vec![None; self.states.len()];
        let mut queue = VecDeque::new();
        for t in self.initial.iter().filter(|t| t.is_enabled_by(faults)) {
            if !visited[t.target] {
                visited[t.target] = true;
                queue.push_back(t.target);
            }
        }
        while let Some(s) = queue.pop_front() {
            if self.hazard[s] {
                return Some((s, parents));
            }
            for (choice, t) in self.transitions[s].iter().enumerate() {
                if !visited[t.target] && t.is_enabled_by(faults) {
                    visited[t.target] = true;
                    parents[t.target] = Some((s, choice));
                    queue.push_back(t.target);
                }
            }
        }
        None
    }
}

/// Check whether a hazard state is reachable under `activation`.
pub fn check_reachability<M: Model + ?Sized>(
    model: &M,
    hazard: &Hazard,
    activation: &Activation,
    config: &AnalysisConfiguration,
) -> Result<TraversalOutcome, AnalysisError> {
    config.validate()?;
    validate_model(model.state_vector_size(), model.faults())?;

    let mode = if config.generate_counter_examples {
        Mode::ShortestTrace
    } else {
        Mode::FirstHazard
    };
    let track_history = config.activation_policy == ActivationPolicy::Nondeterministic;
    debug!(
        "check_reachability(hazard = {}, forced = {}, cpu_count = {})",
        hazard.name(),
        activation.forced(),
        config.cpu_count
    );
    Engine::new(model, hazard, activation, config, mode, track_history).reachability()
}

/// Explore the complete reachable state graph under `activation`.
///
/// Unlike [`check_reachability`], the exploration does not stop at hazard
/// states; it marks them and keeps every transition.
pub fn explore_graph<M: Model + ?Sized>(
    model: &M,
    hazard: &Hazard,
    activation: &Activation,
    config: &AnalysisConfiguration,
) -> Result<StateGraph, AnalysisError> {
    config.validate()?;
    validate_model(model.state_vector_size(), model.faults())?;
    debug!(
        "explore_graph(hazard = {}, cpu_count = {})",
        hazard.name(),
        config.cpu_count
    );
    Engine::new(model, hazard, activation, config, Mode::Graph, false).graph()
}

/// Number of storage shards for `cpu_count` workers.
fn shard_count(cpu_count: usize) -> usize {
    if cpu_count == 1 {
        1
    } else {
        (cpu_count * 4).next_power_of_two().min(64)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Mode {
    /// Stop at the first hazard state found.
    FirstHazard,
    /// Finish the hazardous level and rebuild the trace to the chosen hazard.
    ShortestTrace,
    /// Explore everything, keeping all transitions.
    Graph,
}

#[derive(Debug, Clone)]
struct Parent {
    source: StateIndex,
    step: TraceStep,
}

#[derive(Debug)]
struct HazardHit {
    /// Frontier position of the source state.
    position: usize,
    /// Position of the hazard state among the successors of the source.
    ordinal: usize,
    target: StateIndex,
    /// Source state and step; `None` for initial states.
    via: Option<Parent>,
}

#[derive(Debug)]
struct RawTransition {
    target: StateIndex,
    probability: f64,
    activations: Vec<FaultSet>,
}

/// What a worker produced while expanding its part of a level.
#[derive(Default)]
struct LevelOutput {
    next: Vec<StateIndex>,
    discovered: Vec<StateIndex>,
    hazards: Vec<StateIndex>,
    parents: Vec<(StateIndex, Parent)>,
    hits: Vec<HazardHit>,
    adjacency: Vec<(StateIndex, Vec<RawTransition>)>,
}

/// Data accumulated by the leader across levels.
#[derive(Default)]
struct RunState {
    levels: usize,
    order: Vec<StateIndex>,
    hazards: FxHashSet<StateIndex>,
    parents: FxHashMap<StateIndex, Parent>,
    hits: Vec<HazardHit>,
    initial: Vec<RawTransition>,
    adjacency: FxHashMap<StateIndex, Vec<RawTransition>>,
}

/// State shared by the workers of one run.
struct Shared {
    frontier: RwLock<Vec<StateIndex>>,
    outputs: Mutex<Vec<(usize, LevelOutput)>>,
    run: Mutex<RunState>,
    stop: AtomicBool,
    /// Written only by the merging thread, read by all workers between levels.
    finished: AtomicBool,
    failure: Mutex<Option<AnalysisError>>,
    transitions: AtomicUsize,
}

impl Shared {
    fn new() -> Self {
        Self {
            frontier: RwLock::new(Vec::new()),
            outputs: Mutex::new(Vec::new()),
            run: Mutex::new(RunState::default()),
            stop: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            failure: Mutex::new(None),
            transitions: AtomicUsize::new(0),
        }
    }

    /// Record `error` unless an earlier one was recorded, and stop all workers.
    fn fail(&self, error: AnalysisError) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            debug!("traversal aborted: {}", error);
            *failure = Some(error);
        }
        self.stop.store(true, Ordering::Release);
    }

    fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

/// Per-run context: everything one traversal needs, nothing shared with other
/// runs.
struct Engine<'a, M: ?Sized> {
    model: &'a M,
    hazard: &'a Hazard,
    activation: &'a Activation,
    storage: StateStorage,
    mode: Mode,
    cpu_count: usize,
    successor_capacity: usize,
    model_size: usize,
    history_size: usize,
}

impl<'a, M: Model + ?Sized> Engine<'a, M> {
    fn new(
        model: &'a M,
        hazard: &'a Hazard,
        activation: &'a Activation,
        config: &AnalysisConfiguration,
        mode: Mode,
        track_history: bool,
    ) -> Self {
        let model_size = model.state_vector_size();
        let mut storage = StateStorage::new(
            model_size,
            config.state_capacity,
            shard_count(config.cpu_count),
        );
        let history_size = if track_history {
            FaultSet::encoded_len(model.faults().len())
        } else {
            0
        };
        storage.grow(history_size);

        Self {
            model,
            hazard,
            activation,
            storage,
            mode,
            cpu_count: config.cpu_count,
            successor_capacity: config.successor_capacity,
            model_size,
            history_size,
        }
    }

    fn new_successors(&self) -> Successors {
        Successors::with_history(self.model_size, self.history_size, self.successor_capacity)
    }

    /// The model's part of a stored state.
    fn model_state(&self, index: StateIndex) -> StateVector {
        let vector = self.storage.get(index);
        StateVector::from_bytes(&vector.as_bytes()[..self.model_size])
    }

    fn history(&self, index: StateIndex) -> FaultSet {
        if self.history_size == 0 {
            return FaultSet::empty();
        }
        FaultSet::from_bytes(&self.storage.get(index).as_bytes()[self.model_size..])
    }

    fn reachability(self) -> Result<TraversalOutcome, AnalysisError> {
        let (run, transitions) = self.run()?;

        let hit = run.hits.iter().min_by_key(|h| (h.position, h.ordinal));
        let activated_faults = match hit {
            Some(hit) if self.history_size > 0 => Some(self.history(hit.target)),
            _ => None,
        };
        let counter_example = match hit {
            Some(hit) if self.mode == Mode::ShortestTrace => Some(self.trace(hit, &run.parents)),
            _ => None,
        };

        let outcome = TraversalOutcome {
            hazard_found: hit.is_some(),
            state_count: self.storage.len(),
            transition_count: transitions,
            depth: run.levels.saturating_sub(1),
            activated_faults,
            counter_example,
        };
        debug!(
            "check_reachability: hazard_found = {}, states = {}, transitions = {}, depth = {}",
            outcome.hazard_found, outcome.state_count, outcome.transition_count, outcome.depth
        );
        Ok(outcome)
    }

    fn graph(self) -> Result<StateGraph, AnalysisError> {
        let (mut run, transition_count) = self.run()?;

        let index: FxHashMap<StateIndex, usize> =
            run.order.iter().enumerate().map(|(i, &s)| (s, i)).collect();
        let convert = |raw: RawTransition| Transition {
            target: index[&raw.target],
            probability: raw.probability,
            activations: raw.activations,
        };

        let initial = std::mem::take(&mut run.initial).into_iter().map(convert).collect();
        let transitions = run
            .order
            .iter()
            .map(|s| {
                run.adjacency
                    .remove(s)
                    .unwrap_or_default()
                    .into_iter()
                    .map(convert)
                    .collect()
            })
            .collect();

        let graph = StateGraph {
            states: run.order.iter().map(|&s| self.model_state(s)).collect(),
            hazard: run.order.iter().map(|s| run.hazards.contains(s)).collect(),
            initial,
            transitions,
            transition_count,
            depth: run.levels.saturating_sub(1),
        };
        debug!(
            "explore_graph: states = {}, transitions = {}, hazard states = {}",
            graph.state_count(),
            graph.transition_count(),
            run.hazards.len()
        );
        Ok(graph)
    }

    /// Explore the levels until the frontier empties or the run stops.
    fn run(&self) -> Result<(RunState, usize), AnalysisError> {
        let shared = Shared::new();

        let mut successors = self.new_successors();
        successors.begin(FaultSet::empty());
        let mut initial = LevelOutput::default();
        let result = guarded(None, || {
            self.model
                .initial_states(&mut successors)
                .map_err(|e| model_failure(None, e.message))?;
            if let Some(e) = successors.take_overflow() {
                return Err(e);
            }
            self.visit(None, &successors, &mut initial, &shared)
        });
        match result {
            Ok(transitions) => shared.run.lock().initial = transitions,
            Err(e) => shared.fail(e),
        }
        shared.outputs.lock().push((0, initial));
        self.merge(&shared);

        if !shared.is_finished() {
            let barrier = Barrier::new(self.cpu_count);
            if self.cpu_count == 1 {
                self.worker(0, &shared, &barrier);
            } else {
                thread::scope(|s| {
                    for id in 0..self.cpu_count {
                        let shared = &shared;
                        let barrier = &barrier;
                        s.spawn(move || self.worker(id, shared, barrier));
                    }
                });
            }
        }

        let run = shared.run.into_inner();
        if let Some(error) = shared.failure.into_inner() {
            if run.hits.is_empty() {
                return Err(error);
            }
        }
        Ok((run, shared.transitions.into_inner()))
    }

    fn worker(&self, id: usize, shared: &Shared, barrier: &Barrier) {
        let mut successors = self.new_successors();
        loop {
            // A worker may raise `stop` while others are still waiting here, so
            // only the merged decision of the previous level ends the loop.
            barrier.wait();
            if shared.is_finished() {
                break;
            }

            let mut output = LevelOutput::default();
            {
                let frontier = shared.frontier.read();
                let chunk = frontier.len().div_ceil(self.cpu_count);
                let start = (id * chunk).min(frontier.len());
                let end = (start + chunk).min(frontier.len());
                for (position, &index) in frontier.iter().enumerate().take(end).skip(start) {
                    if shared.is_stopped() {
                        break;
                    }
                    if let Err(e) = self.expand(position, index, &mut successors, &mut output, shared) {
                        shared.fail(e);
                        break;
                    }
                }
            }
            shared.outputs.lock().push((id, output));

            if barrier.wait().is_leader() {
                self.merge(shared);
            }
        }
    }

    fn expand(
        &self,
        position: usize,
        index: StateIndex,
        successors: &mut Successors,
        output: &mut LevelOutput,
        shared: &Shared,
    ) -> Result<(), AnalysisError> {
        let vector = self.storage.get(index);
        let (state, history) = vector.as_bytes().split_at(self.model_size);
        successors.begin(FaultSet::from_bytes(history));

        guarded(Some(index), || {
            self.model
                .step(StateView::new(state), self.activation, successors)
                .map_err(|e| model_failure(Some(index), e.message))?;
            if let Some(e) = successors.take_overflow() {
                return Err(e);
            }
            let transitions = self.visit(Some((position, index)), successors, output, shared)?;
            if self.mode == Mode::Graph {
                output.adjacency.push((index, transitions));
            }
            Ok(())
        })
    }

    /// Probe the successors of one state (or the initial states) against the
    /// storage and sort them into the level output.
    fn visit(
        &self,
        source: Option<(usize, StateIndex)>,
        successors: &Successors,
        output: &mut LevelOutput,
        shared: &Shared,
    ) -> Result<Vec<RawTransition>, AnalysisError> {
        shared.transitions.fetch_add(successors.len(), Ordering::Relaxed);
        let position = source.map_or(0, |(p, _)| p);
        let mut transitions = Vec::new();

        for (ordinal, (bytes, successor)) in successors.raw().enumerate() {
            let added = self.storage.add(bytes)?;
            let target = added.index();

            if self.mode == Mode::Graph {
                transitions.push(RawTransition {
                    target,
                    probability: successor.probability(),
                    activations: successor.activations().to_vec(),
                });
                if added.is_new() {
                    output.discovered.push(target);
                    if self.hazard.holds(StateView::new(bytes).prefix(self.model_size)) {
                        output.hazards.push(target);
                    } else {
                        output.next.push(target);
                    }
                }
                continue;
            }

            // A hazard reached again within the same level may still be the
            // earliest one when a trace is requested.
            if !added.is_new() && self.mode != Mode::ShortestTrace {
                continue;
            }
            let via = source.map(|(_, s)| Parent {
                source: s,
                step: step(ordinal, successor),
            });

            if self.hazard.holds(StateView::new(bytes).prefix(self.model_size)) {
                output.hits.push(HazardHit {
                    position,
                    ordinal,
                    target,
                    via,
                });
                if self.mode == Mode::FirstHazard {
                    shared.stop.store(true, Ordering::Release);
                    break;
                }
            } else if added.is_new() {
                if self.mode == Mode::ShortestTrace {
                    if let Some(parent) = via {
                        output.parents.push((target, parent));
                    }
                }
                output.next.push(target);
            }
        }

        Ok(transitions)
    }

    /// Combine the outputs of all workers into the next frontier.
    fn merge(&self, shared: &Shared) {
        let mut outputs = std::mem::take(&mut *shared.outputs.lock());
        outputs.sort_unstable_by_key(|(id, _)| *id);

        let mut run = shared.run.lock();
        let mut next = Vec::new();
        let mut reached = false;
        for (_, output) in outputs {
            reached |= !output.next.is_empty() || !output.hits.is_empty() || !output.hazards.is_empty();
            next.extend(output.next);
            run.order.extend(output.discovered);
            run.hazards.extend(output.hazards);
            run.parents.extend(output.parents);
            run.hits.extend(output.hits);
            run.adjacency.extend(output.adjacency);
        }
        if reached {
            run.levels += 1;
        }
        if !run.hits.is_empty() {
            shared.stop.store(true, Ordering::Release);
        }

        trace!(
            "level {}: {} new states to expand, {} states stored",
            run.levels,
            next.len(),
            self.storage.len()
        );
        let finished = next.is_empty() || shared.is_stopped();
        *shared.frontier.write() = next;
        shared.finished.store(finished, Ordering::Release);
    }

    /// Rebuild the path from an initial state to `hit`.
    fn trace(&self, hit: &HazardHit, parents: &FxHashMap<StateIndex, Parent>) -> CounterExample {
        let mut states = vec![self.model_state(hit.target)];
        let mut steps = Vec::new();
        let mut link = hit.via.as_ref();
        while let Some(parent) = link {
            steps.push(parent.step.clone());
            states.push(self.model_state(parent.source));
            link = parents.get(&parent.source);
        }
        states.reverse();
        steps.reverse();
        CounterExample::new(states, steps)
    }
}

fn step(ordinal: usize, successor: &Successor) -> TraceStep {
    TraceStep {
        activated: successor.label().activated.clone(),
        choice: ordinal,
        probability: successor.probability(),
    }
}

fn model_failure(state: Option<StateIndex>, message: String) -> AnalysisError {
    AnalysisError::ModelStepFailure { state, message }
}

/// Run `f`, turning a panic into a model failure.
fn guarded<T>(
    state: Option<StateIndex>,
    f: impl FnOnce() -> Result<T, AnalysisError>,
) -> Result<T, AnalysisError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(model_failure(state, panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::error::{ModelError, StorageKind};
    use crate::fault::{Fault, FaultId};
    use crate::model::TransitionLabel;
    use crate::state::ReadState;

    /// A counter from 0 up to `limit`, stepping by 1 or 2. The fault `jump`
    /// lets it jump straight to `limit`.
    struct Counter {
        limit: u32,
        faults: Vec<Fault>,
    }

    impl Counter {
        fn new(limit: u32) -> Self {
            Self {
                limit,
                faults: vec![Fault::new(0, "jump").with_probability(0.5)],
            }
        }
    }

    impl Model for Counter {
        fn state_vector_size(&self) -> usize {
            4
        }

        fn faults(&self) -> &[Fault] {
            &self.faults
        }

        fn initial_states(&self, out: &mut Successors) -> Result<(), ModelError> {
            out.emit(&out.candidate(), TransitionLabel::new());
            Ok(())
        }

        fn step(
            &self,
            state: StateView<'_>,
            activation: &Activation,
            out: &mut Successors,
        ) -> Result<(), ModelError> {
            let value = state.get_u32(0);
            let jump = FaultId::new(0);
            for (effect, weight) in activation.effects(jump) {
                if effect.is_overridden() {
                    let mut next = out.candidate();
                    next.set_u32(0, self.limit);
                    out.emit(&next, TransitionLabel::new().with_probability(weight).with_fault(jump));
                } else {
                    for inc in [1, 2] {
                        let mut next = out.candidate();
                        next.set_u32(0, (value + inc).min(self.limit));
                        out.emit(&next, TransitionLabel::new().with_probability(weight / 2.0));
                    }
                }
            }
            Ok(())
        }
    }

    fn at_limit(limit: u32) -> Hazard {
        Hazard::new("limit", move |s| s.get_u32(0) == limit)
    }

    fn suppressed(model: &Counter) -> Activation {
        Activation::for_candidate(&model.faults, &FaultSet::empty(), ActivationPolicy::ForceOnly)
    }

    fn config(cpu_count: usize) -> AnalysisConfiguration {
        AnalysisConfiguration::default().with_cpu_count(cpu_count)
    }

    #[test]
    fn test_unreachable() {
        let model = Counter::new(10);
        let hazard = Hazard::new("never", |s| s.get_u32(0) > 10);
        let outcome = check_reachability(&model, &hazard, &suppressed(&model), &config(1)).unwrap();
        assert!(!outcome.hazard_found);
        assert_eq!(outcome.state_count, 11);
        // 0 -> 2 -> 4 -> 6 -> 8 -> 10
        assert_eq!(outcome.depth, 5);
        assert!(outcome.counter_example.is_none());
    }

    #[test]
    fn test_reachable() {
        let model = Counter::new(10);
        let outcome = check_reachability(&model, &at_limit(10), &suppressed(&model), &config(1)).unwrap();
        assert!(outcome.hazard_found);
        assert!(outcome.activated_faults.is_none());
    }

    #[test]
    fn test_shortest_counter_example() {
        let model = Counter::new(10);
        let config = config(1).with_counter_examples(true);
        let outcome = check_reachability(&model, &at_limit(10), &suppressed(&model), &config).unwrap();
        let trace = outcome.counter_example.unwrap();
        // 0 -> 2 -> 4 -> 6 -> 8 -> 10
        assert_eq!(trace.len(), 5);
        let values: Vec<u32> = trace.states().iter().map(|s| s.get_u32(0)).collect();
        assert_eq!(values, vec![0, 2, 4, 6, 8, 10]);
        assert!(trace.steps().iter().all(|step| step.choice == 1));
    }

    #[test]
    fn test_forced_fault_history() {
        let model = Counter::new(10);
        let activation = Activation::for_candidate(
            &model.faults,
            &FaultSet::singleton(FaultId::new(0)),
            ActivationPolicy::Nondeterministic,
        );
        let config = config(2)
            .with_counter_examples(true)
            .with_activation_policy(ActivationPolicy::Nondeterministic);
        let outcome = check_reachability(&model, &at_limit(10), &activation, &config).unwrap();
        assert!(outcome.hazard_found);
        assert_eq!(outcome.depth, 1);
        assert_eq!(outcome.activated_faults, Some(FaultSet::singleton(FaultId::new(0))));
        let trace = outcome.counter_example.unwrap();
        assert_eq!(trace.len(), 1);
        assert_eq!(trace.activated_faults(), FaultSet::singleton(FaultId::new(0)));
    }

    #[test]
    fn test_initial_hazard() {
        let model = Counter::new(10);
        let hazard = Hazard::new("zero", |s| s.get_u32(0) == 0);
        let config = config(4).with_counter_examples(true);
        let outcome = check_reachability(&model, &hazard, &suppressed(&model), &config).unwrap();
        assert!(outcome.hazard_found);
        assert_eq!(outcome.state_count, 1);
        assert_eq!(outcome.depth, 0);
        assert!(outcome.counter_example.unwrap().is_empty());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let model = Counter::new(500);
        let hazard = Hazard::new("never", |_| false);
        let activation = suppressed(&model);
        let sequential = check_reachability(&model, &hazard, &activation, &config(1)).unwrap();
        for cpu_count in [2, 3, 8] {
            let parallel = check_reachability(&model, &hazard, &activation, &config(cpu_count)).unwrap();
            assert_eq!(parallel.state_count, sequential.state_count);
            assert_eq!(parallel.transition_count, sequential.transition_count);
            assert_eq!(parallel.depth, sequential.depth);
        }
    }

    #[test]
    fn test_capacity() {
        let model = Counter::new(100);
        let hazard = Hazard::new("never", |_| false);
        let config = config(2).with_state_capacity(10);
        let err = check_reachability(&model, &hazard, &suppressed(&model), &config).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::ResourceExhausted {
                kind: StorageKind::States,
                capacity: 10
            }
        ));
    }

    #[test]
    fn test_successor_capacity() {
        let model = Counter::new(100);
        let hazard = Hazard::new("never", |_| false);
        let config = config(1).with_successor_capacity(1);
        let err = check_reachability(&model, &hazard, &suppressed(&model), &config).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::ResourceExhausted {
                kind: StorageKind::Successors,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_config() {
        let model = Counter::new(1);
        let err = check_reachability(&model, &at_limit(1), &suppressed(&model), &config(0)).unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
    }

    #[test]
    fn test_explore_graph() {
        let model = Counter::new(4);
        let activation = Activation::probabilistic(&model.faults);
        let graph = explore_graph(&model, &at_limit(4), &activation, &config(2)).unwrap();
        assert_eq!(graph.state_count(), 5);
        assert_eq!(graph.initial().len(), 1);
        assert_eq!(graph.state(0).get_u32(0), 0);
        for s in 0..graph.state_count() {
            if graph.is_hazard(s) {
                assert_eq!(graph.state(s).get_u32(0), 4);
                assert!(graph.transitions(s).is_empty());
            } else {
                let total: f64 = graph.transitions(s).iter().map(|t| t.probability).sum();
                assert!((total - 1.0).abs() < 1e-12);
            }
        }
        assert!(graph.hazard_reachable_with(&FaultSet::empty()));
    }

    #[test]
    fn test_restricted_reachability() {
        let model = Counter::new(1000);
        let hazard = at_limit(1000);
        let activation = Activation::unrestricted(&model.faults);
        let graph = explore_graph(&model, &hazard, &activation, &config(1)).unwrap();
        // The jump edge from state 0 carries {jump}; stepping needs no fault.
        let jump = FaultSet::singleton(FaultId::new(0));
        let from_initial = graph.transitions(0);
        assert!(from_initial.iter().any(|t| t.activations == vec![jump.clone()]));
        assert!(graph.hazard_reachable_with(&FaultSet::empty()));
        assert!(graph.hazard_reachable_with(&jump));

        let trace = graph.counter_example(&jump).unwrap();
        assert_eq!(trace.len(), 1);
        assert_eq!(trace.activated_faults(), jump);
        assert_eq!(trace.final_state().get_u32(0), 1000);
        let trace = graph.counter_example(&FaultSet::empty()).unwrap();
        assert_eq!(trace.len(), 500);
        assert!(trace.activated_faults().is_empty());
    }

    struct Failing {
        panic: bool,
    }

    impl Model for Failing {
        fn state_vector_size(&self) -> usize {
            1
        }

        fn faults(&self) -> &[Fault] {
            &[]
        }

        fn initial_states(&self, out: &mut Successors) -> Result<(), ModelError> {
            out.emit(&out.candidate(), TransitionLabel::new());
            Ok(())
        }

        fn step(&self, state: StateView<'_>, _: &Activation, out: &mut Successors) -> Result<(), ModelError> {
            let value = state.get_u8(0);
            if value == 3 {
                if self.panic {
                    panic!("broken invariant");
                }
                return Err(ModelError::new("division by zero"));
            }
            let mut next = out.candidate();
            next.set_u8(0, value + 1);
            out.emit(&next, TransitionLabel::new());
            Ok(())
        }
    }

    #[test]
    fn test_model_failure() {
        let hazard = Hazard::new("never", |_| false);
        for panic in [false, true] {
            for cpu_count in [1, 4] {
                let model = Failing { panic };
                let activation = Activation::unrestricted(&[]);
                let err = check_reachability(&model, &hazard, &activation, &config(cpu_count)).unwrap_err();
                match err {
                    AnalysisError::ModelStepFailure { state, message } => {
                        assert!(state.is_some());
                        if panic {
                            assert_eq!(message, "panicked: broken invariant");
                        } else {
                            assert_eq!(message, "division by zero");
                        }
                    }
                    other => panic!("unexpected error: {}", other),
                }
            }
        }
    }

    /// One initial state fanning out to `width` states, each of which steps
    /// to a state of its own one level further.
    struct Fan {
        width: u16,
        fail_at: Option<(u16, bool)>,
    }

    impl Fan {
        fn new(width: u16) -> Self {
            Self { width, fail_at: None }
        }
    }

    impl Model for Fan {
        fn state_vector_size(&self) -> usize {
            3
        }

        fn faults(&self) -> &[Fault] {
            &[]
        }

        fn initial_states(&self, out: &mut Successors) -> Result<(), ModelError> {
            out.emit(&out.candidate(), TransitionLabel::new());
            Ok(())
        }

        fn step(&self, state: StateView<'_>, _: &Activation, out: &mut Successors) -> Result<(), ModelError> {
            let layer = state.get_u8(0);
            let value = state.get_u16(1);
            match layer {
                0 => {
                    for value in 0..self.width {
                        let mut next = out.candidate();
                        next.set_u8(0, 1);
                        next.set_u16(1, value);
                        out.emit(&next, TransitionLabel::new());
                    }
                }
                1 => {
                    if let Some((at, panic)) = self.fail_at {
                        if value == at {
                            if panic {
                                panic!("lost track of {}", value);
                            }
                            return Err(ModelError::new(format!("cannot step {}", value)));
                        }
                    }
                    let mut next = out.candidate();
                    next.set_u8(0, 2);
                    next.set_u16(1, value);
                    out.emit(&next, TransitionLabel::new());
                }
                _ => out.emit(&state.to_vector(), TransitionLabel::new()),
            }
            Ok(())
        }
    }

    /// Run `f` on its own thread, failing the test if it does not return in time.
    fn within_timeout<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
        let (sender, receiver) = std::sync::mpsc::channel();
        thread::spawn(move || {
            let _ = sender.send(f());
        });
        receiver
            .recv_timeout(std::time::Duration::from_secs(60))
            .expect("traversal did not terminate")
    }

    #[test]
    fn test_wide_level_hazard() {
        for _ in 0..20 {
            let outcome = within_timeout(|| {
                let model = Fan::new(4096);
                let hazard = Hazard::new("second layer", |s| s.get_u8(0) == 2);
                let activation = Activation::unrestricted(&[]);
                check_reachability(&model, &hazard, &activation, &config(4))
            })
            .unwrap();
            assert!(outcome.hazard_found);
            assert_eq!(outcome.depth, 2);
        }
    }

    #[test]
    fn test_wide_level_counter_example() {
        let trace = within_timeout(|| {
            let model = Fan::new(1024);
            let hazard = Hazard::new("second layer", |s| s.get_u8(0) == 2);
            let activation = Activation::unrestricted(&[]);
            let config = config(4).with_counter_examples(true);
            check_reachability(&model, &hazard, &activation, &config)
        })
        .unwrap()
        .counter_example
        .unwrap();
        assert_eq!(trace.len(), 2);
    }

    #[test]
    fn test_wide_level_capacity() {
        for _ in 0..20 {
            let err = within_timeout(|| {
                let model = Fan::new(512);
                let hazard = Hazard::new("never", |_| false);
                let activation = Activation::unrestricted(&[]);
                check_reachability(&model, &hazard, &activation, &config(4).with_state_capacity(600))
            })
            .unwrap_err();
            assert!(matches!(
                err,
                AnalysisError::ResourceExhausted {
                    kind: StorageKind::States,
                    capacity: 600
                }
            ));
        }

        let err = within_timeout(|| {
            let model = Fan::new(512);
            let hazard = Hazard::new("never", |_| false);
            let activation = Activation::unrestricted(&[]);
            explore_graph(&model, &hazard, &activation, &config(4).with_state_capacity(600))
        })
        .unwrap_err();
        assert!(matches!(err, AnalysisError::ResourceExhausted { .. }));
    }

    #[test]
    fn test_wide_level_model_failure() {
        for panic in [false, true] {
            for _ in 0..10 {
                let err = within_timeout(move || {
                    let model = Fan {
                        width: 2048,
                        fail_at: Some((1500, panic)),
                    };
                    let hazard = Hazard::new("never", |_| false);
                    let activation = Activation::unrestricted(&[]);
                    check_reachability(&model, &hazard, &activation, &config(4))
                })
                .unwrap_err();
                match err {
                    AnalysisError::ModelStepFailure { message, .. } => {
                        if panic {
                            assert_eq!(message, "panicked: lost track of 1500");
                        } else {
                            assert_eq!(message, "cannot step 1500");
                        }
                    }
                    other => panic!("unexpected error: {}", other),
                }
            }
        }
    }
}
