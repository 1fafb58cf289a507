//! # ASP Log Generator
//!
//! Orchestrates a generation run: plans the trace-length histogram,
//! translates the model (twice when negative traces are requested), drives
//! the solver once per trace slot with a fresh seed, and lifts the answer
//! sets into a labelled [`EventLog`].
//!
//! The parsed model stays immutable across the run; each pass works on its
//! own deep copy and per-run state lives in a [`RunContext`] rather than on
//! the generator. A run is cancellable between solver invocations through a
//! shared [`CancelFlag`]; cancellation discards partial results.

mod lifter;

use crate::ast::DeclareModel;
use crate::config::{ActivationBound, ConfigError, GeneratorConfig};
use crate::distribution::plan_distribution;
use crate::event_log::{EventLog, TraceLabel};
use crate::solver::{AspSolver, ClingoSolver, SolveOutcome, SolverError};
use crate::translator::{self, AspProgram, ViolationDirectives};
use chrono::{DateTime, FixedOffset, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Cooperative cancellation handle. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Fatal generation failures. Unsatisfiable slots are not fatal: they are
/// logged and skipped, and the run may deliver fewer traces than requested.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("failed to write the translated program: {0}")]
    ProgramExport(#[from] std::io::Error),

    #[error("generation cancelled")]
    Cancelled,
}

/// Per-run mutable state, reset on every call to [`AspGenerator::generate`].
struct RunContext {
    trace_counter: usize,
    rng: StdRng,
    timestamp: DateTime<FixedOffset>,
}

/// Generates event logs from a Declare model by reduction to ASP.
pub struct AspGenerator {
    model: DeclareModel,
    config: GeneratorConfig,
    solver: Box<dyn AspSolver>,
    clock: Option<DateTime<FixedOffset>>,
    cancel: CancelFlag,
    /// When set, the translated program is written here (the negative pass
    /// appends `.neg.lp`).
    program_export: Option<PathBuf>,
}

impl AspGenerator {
    /// Build a generator with the default clingo driver. The configuration
    /// is validated up front; an invalid one is fatal before any solver
    /// work.
    pub fn new(model: DeclareModel, config: GeneratorConfig) -> Result<Self, ConfigError> {
        Self::with_solver(model, config, Box::new(ClingoSolver::new()))
    }

    /// Build a generator around a specific solver implementation.
    pub fn with_solver(
        model: DeclareModel,
        config: GeneratorConfig,
        solver: Box<dyn AspSolver>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(AspGenerator {
            model,
            config,
            solver,
            clock: None,
            cancel: CancelFlag::new(),
            program_export: None,
        })
    }

    /// All events of a run share one timestamp (a deliberate placeholder in
    /// the log format); by default the generator stamps the wall clock at
    /// +01:00. Override it here for reproducible output.
    pub fn set_timestamp(&mut self, timestamp: DateTime<FixedOffset>) {
        self.clock = Some(timestamp);
    }

    /// Write the translated program(s) next to the run: `<path>` for the
    /// positive pass and `<path>.neg.lp` for the negative one.
    pub fn export_program_to(&mut self, path: impl Into<PathBuf>) {
        self.program_export = Some(path.into());
    }

    /// Handle for cancelling the run from another vantage point.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Observe an externally owned cancellation flag instead of the
    /// generator's own.
    pub fn set_cancel_flag(&mut self, flag: CancelFlag) {
        self.cancel = flag;
    }

    /// Declare how many negative traces to generate and which constraints
    /// are eligible for violation.
    pub fn set_constraints_to_violate(
        &mut self,
        negative_traces: u32,
        violate_all: bool,
        raw_lines: Vec<String>,
    ) {
        self.config.negative_traces = negative_traces;
        self.config.violate_all_constraints = violate_all;
        self.config.violatable_constraints = raw_lines;
    }

    /// Same as [`Self::set_constraints_to_violate`], addressing constraints
    /// by template index instead of raw line.
    pub fn set_constraints_to_violate_by_template_index(
        &mut self,
        negative_traces: u32,
        violate_all: bool,
        indices: &[usize],
    ) {
        let raw_lines = indices
            .iter()
            .filter_map(|&i| self.model.templates.get(i))
            .map(|t| t.raw_line.clone())
            .collect();
        self.set_constraints_to_violate(negative_traces, violate_all, raw_lines);
    }

    /// Bound the number of activations per constraint, keyed by raw line.
    pub fn set_activation_conditions(&mut self, bounds: BTreeMap<String, ActivationBound>) {
        self.config.activation_conditions = bounds;
    }

    /// Same as [`Self::set_activation_conditions`], keyed by template index.
    pub fn set_activation_conditions_by_template_index(
        &mut self,
        bounds: BTreeMap<usize, ActivationBound>,
    ) {
        let by_line = bounds
            .into_iter()
            .filter_map(|(i, bound)| {
                self.model
                    .templates
                    .get(i)
                    .map(|t| (t.raw_line.clone(), bound))
            })
            .collect();
        self.config.activation_conditions = by_line;
    }

    /// Number of traces sharing each generated activity skeleton.
    pub fn set_repetitions_per_trace(&mut self, repetitions: u32) {
        self.config.repetitions_per_trace = repetitions;
    }

    /// The positive-pass logic program, for inspection or export.
    pub fn asp_program(&self) -> String {
        let mut model = self.model.clone();
        translator::translate(
            &mut model,
            self.config.encode_model,
            None,
            &self.config.activation_conditions,
        )
        .to_program_string()
    }

    /// Run the full generation: negative pass first (when requested), then
    /// the positive pass. Unsatisfiable slots are skipped with a warning,
    /// so the log may hold fewer traces than requested.
    pub fn generate(&mut self) -> Result<EventLog, GeneratorError> {
        self.config.validate()?;
        let mut ctx = RunContext {
            trace_counter: 0,
            rng: StdRng::from_entropy(),
            timestamp: self.run_timestamp(),
        };
        let mut log = EventLog::new();

        let positive_traces = self.config.num_traces - self.config.negative_traces;
        let negative_traces = self.config.negative_traces;

        if negative_traces > 0 {
            debug!(negative_traces, "generating negative traces");
            let mut negated = self.model.with_violations(
                self.config.violate_all_constraints,
                &self.config.violatable_constraints,
            );
            let program = translator::translate(
                &mut negated,
                self.config.encode_model,
                Some(ViolationDirectives {
                    violate_all: self.config.violate_all_constraints,
                }),
                &self.config.activation_conditions,
            );
            self.export_program(&program, true)?;
            let histogram = plan_distribution(&self.config, negative_traces, &mut ctx.rng);
            self.generate_pass(&program, &negated, TraceLabel::Negative, &histogram, &mut ctx, &mut log)?;
        }

        debug!(positive_traces, "generating traces");
        let mut positive_model = self.model.clone();
        let program = translator::translate(
            &mut positive_model,
            self.config.encode_model,
            None,
            &self.config.activation_conditions,
        );
        self.export_program(&program, false)?;
        let histogram = plan_distribution(&self.config, positive_traces, &mut ctx.rng);
        self.generate_pass(
            &program,
            &positive_model,
            TraceLabel::Positive,
            &histogram,
            &mut ctx,
            &mut log,
        )?;

        log.sort_by_name();
        let multiplier = self.config.repetitions_per_trace.max(1) as usize;
        let expected = self.config.num_traces as usize * multiplier;
        if log.len() < expected {
            warn!(
                produced = log.len(),
                expected, "log generated with fewer traces than requested"
            );
        }
        Ok(log)
    }

    fn run_timestamp(&self) -> DateTime<FixedOffset> {
        self.clock.unwrap_or_else(|| {
            let offset = FixedOffset::east_opt(3600).expect("one hour east is a valid offset");
            Utc::now().with_timezone(&offset)
        })
    }

    fn export_program(&self, program: &AspProgram, negative: bool) -> Result<(), GeneratorError> {
        if let Some(base) = &self.program_export {
            let path = if negative {
                let mut os = base.clone().into_os_string();
                os.push(".neg.lp");
                PathBuf::from(os)
            } else {
                base.clone()
            };
            fs::write(&path, program.to_program_string())?;
            debug!(path = %path.display(), "translated program exported");
        }
        Ok(())
    }

    /// One pass over a histogram: solve each `(length, index)` slot with a
    /// fresh seed, lift satisfiable outcomes, and chase variations.
    fn generate_pass(
        &self,
        program: &AspProgram,
        model: &DeclareModel,
        label: TraceLabel,
        histogram: &BTreeMap<u32, u32>,
        ctx: &mut RunContext,
        log: &mut EventLog,
    ) -> Result<(), GeneratorError> {
        let program_text = program.to_program_string();
        for (&length, &count) in histogram {
            debug!(length, count, "generating traces for length bucket");
            for index in 0..count {
                if self.cancel.is_cancelled() {
                    return Err(GeneratorError::Cancelled);
                }
                let seed: u32 = ctx.rng.gen();
                debug!(length, index, seed, "invoking solver");
                match self.solver.solve(&program_text, length, seed)? {
                    SolveOutcome::Unsatisfiable => {
                        warn!(
                            length,
                            index, "cannot generate a trace with this many events for this model"
                        );
                    }
                    SolveOutcome::Satisfiable(symbols) => {
                        let base_name = format!("trace_{}", ctx.trace_counter);
                        ctx.trace_counter += 1;
                        log.traces.push(lifter::lift_trace(
                            base_name.clone(),
                            label,
                            &symbols,
                            model,
                            ctx.timestamp,
                        ));
                        self.generate_variations(
                            &program_text,
                            &symbols,
                            &base_name,
                            model,
                            label,
                            length,
                            ctx,
                            log,
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Re-solve with the base trace's activity skeleton pinned, producing
    /// traces that differ only in attribute assignments.
    #[allow(clippy::too_many_arguments)]
    fn generate_variations(
        &self,
        program_text: &str,
        base_symbols: &[String],
        base_name: &str,
        model: &DeclareModel,
        label: TraceLabel,
        length: u32,
        ctx: &mut RunContext,
        log: &mut EventLog,
    ) -> Result<(), GeneratorError> {
        if self.config.repetitions_per_trace <= 1 {
            return Ok(());
        }
        let mut pinned = String::from(program_text);
        pinned.push('\n');
        for fact in lifter::trace_facts(base_symbols) {
            pinned.push_str(&fact);
            pinned.push('\n');
        }
        for variation in 0..self.config.repetitions_per_trace - 1 {
            if self.cancel.is_cancelled() {
                return Err(GeneratorError::Cancelled);
            }
            let seed: u32 = ctx.rng.gen();
            debug!(base = base_name, variation, seed, "generating trace variation");
            match self.solver.solve(&pinned, length, seed)? {
                SolveOutcome::Unsatisfiable => {
                    warn!(base = base_name, variation, "failed to generate trace variation");
                }
                SolveOutcome::Satisfiable(symbols) => {
                    log.traces.push(lifter::lift_trace(
                        format!("{base_name}_variation_{variation}"),
                        label,
                        &symbols,
                        model,
                        ctx.timestamp,
                    ));
                }
            }
        }
        Ok(())
    }
}
