//! # Declaro - Declarative Process Mining Toolkit
//!
//! Declaro works with **Declare** models: LTL-derived constraint templates
//! (existence, response, precedence, chain, choice and their negations)
//! over the activities of a business process. It supports three activities:
//!
//! 1. **Parsing** textual Declare models into a typed in-memory
//!    representation,
//! 2. **Generating** synthetic event logs (positive and negative) by
//!    reduction to Answer Set Programming, driving an external solver,
//! 3. **Conformance checking** traces against a model with activation,
//!    correlation and time predicates.
//!
//! ## Pipeline Architecture
//!
//! ```text
//! Declare Source Text
//!     ↓
//! [parser]            → DeclareModel (AST)
//!     ↓
//! [translator]        → ASP program string
//!     ↓                      ↑ histogram from [distribution]
//! [solver]            → answer-set symbols (one invocation per trace slot)
//!     ↓
//! [generator::lifter] → EventLog (typed, labelled traces)
//!
//! independently:
//! (DeclareModel, Trace) → [checker] → raw_line → Verdict
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use declaro::{parse_model, AspGenerator, GeneratorConfig};
//!
//! let model = parse_model("activity a\nactivity b\nResponse[a, b]\n");
//! let config = GeneratorConfig::new(10, 3, 6);
//! let mut generator = AspGenerator::new(model, config)?;
//! let log = generator.generate()?;
//! log.to_xes_file("generated.xes")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Checking a trace:
//!
//! ```rust
//! use declaro::{check_trace_conformance, parse_model};
//! # use declaro::{Event, Trace, TraceLabel};
//! # use chrono::{FixedOffset, TimeZone};
//! # let ts = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! # let trace = Trace { name: "t".into(), label: TraceLabel::Positive, events: vec![
//! #     Event { activity: "a".into(), position: 1, resources: Default::default(), timestamp: ts },
//! # ] };
//!
//! let model = parse_model("activity a\nInit[a]\n");
//! let verdicts = check_trace_conformance(&model, &trace, false);
//! ```
//!
//! The ASP solver itself is an external dependency (`clingo` on the path by
//! default); the crate owns the translation, the invocation contract and
//! the result lifting. Tests substitute the [`AspSolver`] trait with
//! scripted implementations.

pub mod ast;
pub mod checker;
pub mod conditions;
pub mod config;
pub mod distribution;
pub mod event_log;
pub mod generator;
pub mod parser;
pub mod solver;
pub mod translator;

pub use ast::{
    Activity, Attribute, AttributeDomain, AttributeValueType, ConstraintTemplate, DeclareModel,
    EncodingTable, TemplateKind,
};
pub use checker::{check_log_conformance, check_trace_conformance, Verdict};
pub use conditions::{Condition, ConditionSyntaxError, TimeInterval, TimeUnit};
pub use config::{ActivationBound, ConfigError, DistributorType, GeneratorConfig};
pub use distribution::plan_distribution;
pub use event_log::{Event, EventLog, Trace, TraceLabel};
pub use generator::{AspGenerator, CancelFlag, GeneratorError};
pub use parser::{classify_line, parse_model, parse_model_file, LineKind};
pub use solver::{AspSolver, ClingoSolver, SolveOutcome, SolverError};
pub use translator::{translate, AspProgram, ViolationDirectives};
