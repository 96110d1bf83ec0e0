use clap::{Parser, ValueEnum};
use log::info;

use dcca_rs::activation::Activation;
use dcca_rs::config::{AnalysisConfiguration, Backend, SearchBudget};
use dcca_rs::error::ModelError;
use dcca_rs::fault::{Fault, FaultId, FaultSet};
use dcca_rs::heuristics::{RedundancyHeuristic, SubsumptionHeuristic};
use dcca_rs::model::{Hazard, Model, Successors, TransitionLabel};
use dcca_rs::probability::{calculate_probability_of_hazard, ValueIterationSolver};
use dcca_rs::search::SafetyAnalysis;
use dcca_rs::state::{ReadState, StateView};

#[derive(Debug, Copy, Clone, ValueEnum)]
enum BackendArg {
    Exhaustive,
    Optimized,
}

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Pressure at which the tank ruptures.
    #[arg(value_name = "INT", default_value = "60")]
    max_pressure: u8,

    /// Number of worker threads per traversal.
    #[clap(long, value_name = "INT", default_value = "1")]
    cpus: usize,

    /// Number of fault sets checked concurrently.
    #[clap(long, value_name = "INT", default_value = "1")]
    parallel_checks: usize,

    #[clap(long, value_enum, default_value = "exhaustive")]
    backend: BackendArg,

    /// Print a trace for every minimal critical set.
    #[clap(long)]
    counter_examples: bool,

    /// Also compute the probability of a rupture.
    #[clap(long)]
    probability: bool,

    /// Stop after checking this many fault sets.
    #[clap(long, value_name = "INT")]
    max_checks: Option<usize>,
}

const PRESSURE: usize = 0;
const FILLING: usize = 1;
const TIMER: usize = 2;

const SUPPRESS_IS_FULL: FaultId = FaultId::new(0);
const SUPPRESS_IS_EMPTY: FaultId = FaultId::new(1);
const SUPPRESS_TIMEOUT: FaultId = FaultId::new(2);
const SUPPRESS_PUMPING: FaultId = FaultId::new(3);

/// A pump filling a tank. The controller stops the pump when the sensor
/// reports the tank full, or when the timer runs out; it restarts the pump
/// once the tank is empty again.
struct PressureTank {
    max_pressure: u8,
    trigger_pressure: u8,
    timeout: u8,
    faults: Vec<Fault>,
}

impl PressureTank {
    fn new(max_pressure: u8) -> Self {
        Self {
            max_pressure,
            trigger_pressure: max_pressure.saturating_sub(2),
            timeout: max_pressure.saturating_sub(1),
            faults: vec![
                Fault::new(0, "SuppressIsFull").with_probability(1e-4),
                Fault::new(1, "SuppressIsEmpty").with_probability(1e-4),
                Fault::new(2, "SuppressTimeout").with_probability(1e-5),
                Fault::new(3, "SuppressPumping").with_probability(1e-3),
            ],
        }
    }
}

impl Model for PressureTank {
    fn state_vector_size(&self) -> usize {
        3
    }

    fn faults(&self) -> &[Fault] {
        &self.faults
    }

    fn initial_states(&self, successors: &mut Successors) -> Result<(), ModelError> {
        let mut state = successors.candidate();
        state.set_bool(FILLING, true);
        state.set_u8(TIMER, self.timeout);
        successors.emit(&state, TransitionLabel::default());
        Ok(())
    }

    fn step(
        &self,
        state: StateView<'_>,
        activation: &Activation,
        successors: &mut Successors,
    ) -> Result<(), ModelError> {
        let pressure = state.get_u8(PRESSURE);
        let filling = state.get_bool(FILLING);
        let timer = state.get_u8(TIMER);
        if pressure > self.max_pressure {
            return Err(ModelError::new(format!("pressure {} exceeds the tank's limit", pressure)));
        }

        let faults = [SUPPRESS_IS_FULL, SUPPRESS_IS_EMPTY, SUPPRESS_TIMEOUT, SUPPRESS_PUMPING];
        for (active, weight) in activation.combinations(&faults) {
            let is_full = pressure >= self.trigger_pressure && !active.contains(SUPPRESS_IS_FULL);
            let is_empty = pressure == 0 && !active.contains(SUPPRESS_IS_EMPTY);
            let timeout = timer == 0 && !active.contains(SUPPRESS_TIMEOUT);

            let mut next = successors.candidate();
            if filling {
                if is_full || timeout {
                    next.set_u8(PRESSURE, pressure);
                    next.set_bool(FILLING, false);
                } else {
                    let pumped = if active.contains(SUPPRESS_PUMPING) { 0 } else { 1 };
                    next.set_u8(PRESSURE, (pressure + pumped).min(self.max_pressure));
                    next.set_bool(FILLING, true);
                    next.set_u8(TIMER, timer.saturating_sub(1));
                }
            } else if is_empty {
                next.set_bool(FILLING, true);
                next.set_u8(TIMER, self.timeout);
            } else {
                next.set_u8(PRESSURE, pressure.saturating_sub(1));
            }

            let label = TransitionLabel::new().with_faults(&active).with_probability(weight);
            successors.emit(&next, label);
        }
        Ok(())
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let model = PressureTank::new(args.max_pressure);
    let max_pressure = args.max_pressure;
    let hazard = Hazard::new("tank rupture", move |s| s.get_u8(PRESSURE) >= max_pressure);

    let config = AnalysisConfiguration::default()
        .with_cpu_count(args.cpus)
        .with_parallel_checks(args.parallel_checks)
        .with_counter_examples(args.counter_examples)
        .with_backend(match args.backend {
            BackendArg::Exhaustive => Backend::Exhaustive,
            BackendArg::Optimized => Backend::FaultOptimized,
        })
        .with_budget(SearchBudget {
            max_checked_sets: args.max_checks,
            ..SearchBudget::default()
        });
    info!("config = {}", config.to_json());

    // Both sensor faults concern the same pressure reading.
    let analysis = SafetyAnalysis::new(config.clone())
        .with_heuristic(RedundancyHeuristic::new(vec![FaultSet::from(vec![
            SUPPRESS_IS_FULL,
            SUPPRESS_IS_EMPTY,
        ])]))
        .with_heuristic(SubsumptionHeuristic);
    let results = analysis.compute_minimal_critical_sets(&model, &hazard)?;
    println!("{}", results);

    if args.counter_examples {
        for (set, trace) in &results.counter_examples {
            println!("Trace for {} ({} steps):", set, trace.len());
            println!("{}", trace);
        }
    }

    if args.probability {
        let solver = ValueIterationSolver::default();
        let probability = calculate_probability_of_hazard(&model, &hazard, &config, &solver)?;
        println!("P(tank rupture) = {}", probability);
    }

    println!("Total time: {:.3} s", time_total.elapsed().as_secs_f64());

    Ok(())
}
