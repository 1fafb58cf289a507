//! # Conformance Checker
//!
//! Per-template verdict engine over a single trace. Each constraint of the
//! model is checked independently and linearly in the trace length,
//! honouring activation, correlation and time predicates:
//!
//! - an event *activates* a constraint when it matches the activation
//!   operand and the activation predicate;
//! - a *target* event additionally satisfies the correlation predicate and
//!   the time interval relative to its activation.
//!
//! A constraint with no activation in the trace is vacuously satisfied;
//! with `consider_vacuity = false` vacuous cases are folded into
//! [`Verdict::Satisfied`]. A constraint whose predicates fail to parse is
//! reported once per raw line and omitted from the verdict map.

use crate::ast::{ConstraintTemplate, DeclareModel, TemplateKind};
use crate::conditions::{
    parse_condition, parse_time_interval, Condition, ConditionSyntaxError, TimeInterval,
};
use crate::event_log::{Event, Trace};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// Outcome of checking one constraint against one trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Satisfied,
    Violated,
    VacuouslySatisfied,
}

/// Internal checker outcome before vacuity folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Satisfied,
    Violated,
    Vacuous,
}

impl Outcome {
    fn into_verdict(self, consider_vacuity: bool) -> Verdict {
        match self {
            Outcome::Satisfied => Verdict::Satisfied,
            Outcome::Violated => Verdict::Violated,
            Outcome::Vacuous => {
                if consider_vacuity {
                    Verdict::VacuouslySatisfied
                } else {
                    Verdict::Satisfied
                }
            }
        }
    }
}

/// Check every constraint of the model against a trace. The result maps
/// each constraint's raw line to its verdict; constraints with malformed
/// predicates are omitted.
pub fn check_trace_conformance(
    model: &DeclareModel,
    trace: &Trace,
    consider_vacuity: bool,
) -> BTreeMap<String, Verdict> {
    let mut verdicts = BTreeMap::new();
    let mut errored: HashSet<&str> = HashSet::new();
    for template in &model.templates {
        match compile_conditions(template) {
            Ok(conditions) => {
                let outcome = check_template(template, &conditions, &trace.events);
                verdicts.insert(
                    template.raw_line.clone(),
                    outcome.into_verdict(consider_vacuity),
                );
            }
            Err(err) => {
                if errored.insert(template.raw_line.as_str()) {
                    warn!(
                        constraint = template.raw_line.as_str(),
                        %err,
                        "condition not properly formatted, constraint skipped"
                    );
                }
            }
        }
    }
    verdicts
}

/// Check every trace of a log against the model, keyed by trace name.
pub fn check_log_conformance(
    model: &DeclareModel,
    traces: &[Trace],
    consider_vacuity: bool,
) -> BTreeMap<String, BTreeMap<String, Verdict>> {
    traces
        .iter()
        .map(|trace| {
            (
                trace.name.clone(),
                check_trace_conformance(model, trace, consider_vacuity),
            )
        })
        .collect()
}

/// Parsed activation / correlation / time predicates of one constraint.
struct CompiledConditions {
    activation: Option<Condition>,
    correlation: Option<Condition>,
    time: Option<TimeInterval>,
}

fn compile_conditions(
    template: &ConstraintTemplate,
) -> Result<CompiledConditions, ConditionSyntaxError> {
    Ok(CompiledConditions {
        activation: parse_condition(template.activation_condition())?,
        correlation: parse_condition(template.correlation_condition())?,
        time: parse_time_interval(template.time_condition())?,
    })
}

impl CompiledConditions {
    /// Does this event activate the constraint (activity plus activation
    /// predicate)?
    fn activates(&self, event: &Event, operand: &str) -> bool {
        event.activity == operand
            && self
                .activation
                .as_ref()
                .is_none_or(|cond| cond.eval(event, None))
    }

    /// Is this event a valid target for the given activation (activity,
    /// correlation predicate, time interval)?
    fn targets(&self, activation: &Event, candidate: &Event, operand: &str) -> bool {
        candidate.activity == operand
            && self
                .correlation
                .as_ref()
                .is_none_or(|cond| cond.eval(activation, Some(candidate)))
            && self
                .time
                .is_none_or(|interval| interval.contains(candidate.timestamp - activation.timestamp))
    }

    /// Does this event match the second operand plus the correlation
    /// predicate? Choice-family templates have no activation to pair a
    /// target with, so the predicate is evaluated against the occurrence
    /// itself.
    fn correlated_occurrence(&self, event: &Event, operand: &str) -> bool {
        event.activity == operand
            && self
                .correlation
                .as_ref()
                .is_none_or(|cond| cond.eval(event, Some(event)))
    }
}

fn check_template(
    template: &ConstraintTemplate,
    conditions: &CompiledConditions,
    events: &[Event],
) -> Outcome {
    let a = template.activities[0].as_str();
    let b = template.activities.get(1).map_or("", String::as_str);
    let n = template.cardinality as usize;
    match template.kind {
        TemplateKind::Existence => check_existence(events, conditions, a, n),
        TemplateKind::Absence => check_absence(events, conditions, a, n),
        TemplateKind::Exactly => check_exactly(events, conditions, a, n),
        TemplateKind::Init => check_init(events, conditions, a),
        TemplateKind::Choice => check_choice(events, conditions, a, b),
        TemplateKind::ExclusiveChoice => check_exclusive_choice(events, conditions, a, b),
        TemplateKind::RespondedExistence => check_responded_existence(events, conditions, a, b),
        TemplateKind::Response => check_response(events, conditions, a, b),
        TemplateKind::AlternateResponse => check_alternate_response(events, conditions, a, b),
        TemplateKind::ChainResponse => check_chain_response(events, conditions, a, b),
        TemplateKind::Precedence => check_precedence(events, conditions, a, b),
        TemplateKind::AlternatePrecedence => check_alternate_precedence(events, conditions, a, b),
        TemplateKind::ChainPrecedence => check_chain_precedence(events, conditions, a, b),
        TemplateKind::NotRespondedExistence => {
            check_not_responded_existence(events, conditions, a, b)
        }
        TemplateKind::NotResponse => check_not_response(events, conditions, a, b),
        TemplateKind::NotChainResponse => check_not_chain_response(events, conditions, a, b),
        TemplateKind::NotPrecedence => check_not_precedence(events, conditions, a, b),
        TemplateKind::NotChainPrecedence => check_not_chain_precedence(events, conditions, a, b),
    }
}

fn activation_count(events: &[Event], conditions: &CompiledConditions, a: &str) -> usize {
    events.iter().filter(|e| conditions.activates(e, a)).count()
}

// ---------------------------------------------------------------------------
// existence family
// ---------------------------------------------------------------------------

fn check_existence(events: &[Event], conditions: &CompiledConditions, a: &str, n: usize) -> Outcome {
    if activation_count(events, conditions, a) >= n {
        Outcome::Satisfied
    } else {
        Outcome::Violated
    }
}

fn check_absence(events: &[Event], conditions: &CompiledConditions, a: &str, n: usize) -> Outcome {
    if activation_count(events, conditions, a) < n {
        Outcome::Satisfied
    } else {
        Outcome::Violated
    }
}

fn check_exactly(events: &[Event], conditions: &CompiledConditions, a: &str, n: usize) -> Outcome {
    if activation_count(events, conditions, a) == n {
        Outcome::Satisfied
    } else {
        Outcome::Violated
    }
}

fn check_init(events: &[Event], conditions: &CompiledConditions, a: &str) -> Outcome {
    match events.first() {
        None => Outcome::Vacuous,
        Some(first) if conditions.activates(first, a) => Outcome::Satisfied,
        Some(_) => Outcome::Violated,
    }
}

// ---------------------------------------------------------------------------
// choice family
// ---------------------------------------------------------------------------

fn check_choice(events: &[Event], conditions: &CompiledConditions, a: &str, b: &str) -> Outcome {
    let a_occurs = events.iter().any(|e| conditions.activates(e, a));
    let b_occurs = events
        .iter()
        .any(|e| conditions.correlated_occurrence(e, b));
    if a_occurs || b_occurs {
        Outcome::Satisfied
    } else {
        Outcome::Violated
    }
}

fn check_exclusive_choice(
    events: &[Event],
    conditions: &CompiledConditions,
    a: &str,
    b: &str,
) -> Outcome {
    let a_occurs = events.iter().any(|e| conditions.activates(e, a));
    let b_occurs = events
        .iter()
        .any(|e| conditions.correlated_occurrence(e, b));
    match (a_occurs, b_occurs) {
        (true, true) => Outcome::Violated,
        (false, false) => Outcome::Vacuous,
        _ => Outcome::Satisfied,
    }
}

// ---------------------------------------------------------------------------
// relation family
// ---------------------------------------------------------------------------

fn check_responded_existence(
    events: &[Event],
    conditions: &CompiledConditions,
    a: &str,
    b: &str,
) -> Outcome {
    relation_outcome(events, conditions, a, |activation| {
        events
            .iter()
            .any(|candidate| conditions.targets(activation, candidate, b))
    })
}

fn check_response(events: &[Event], conditions: &CompiledConditions, a: &str, b: &str) -> Outcome {
    relation_outcome(events, conditions, a, |activation| {
        events
            .iter()
            .filter(|candidate| candidate.position > activation.position)
            .any(|candidate| conditions.targets(activation, candidate, b))
    })
}

fn check_alternate_response(
    events: &[Event],
    conditions: &CompiledConditions,
    a: &str,
    b: &str,
) -> Outcome {
    relation_outcome(events, conditions, a, |activation| {
        // a target must appear before the next activation
        for candidate in events
            .iter()
            .filter(|e| e.position > activation.position)
        {
            if conditions.targets(activation, candidate, b) {
                return true;
            }
            if conditions.activates(candidate, a) {
                return false;
            }
        }
        false
    })
}

fn check_chain_response(
    events: &[Event],
    conditions: &CompiledConditions,
    a: &str,
    b: &str,
) -> Outcome {
    relation_outcome_indexed(events, conditions, a, |idx, activation| {
        events
            .get(idx + 1)
            .is_some_and(|next| conditions.targets(activation, next, b))
    })
}

fn check_precedence(events: &[Event], conditions: &CompiledConditions, a: &str, b: &str) -> Outcome {
    // activations are occurrences of the second operand
    relation_outcome(events, conditions, b, |activation| {
        events
            .iter()
            .filter(|candidate| candidate.position < activation.position)
            .any(|candidate| conditions.targets(activation, candidate, a))
    })
}

fn check_alternate_precedence(
    events: &[Event],
    conditions: &CompiledConditions,
    a: &str,
    b: &str,
) -> Outcome {
    relation_outcome(events, conditions, b, |activation| {
        // scanning backwards: a target must appear before any earlier
        // activation does
        for candidate in events
            .iter()
            .rev()
            .filter(|e| e.position < activation.position)
        {
            if conditions.targets(activation, candidate, a) {
                return true;
            }
            if conditions.activates(candidate, b) {
                return false;
            }
        }
        false
    })
}

fn check_chain_precedence(
    events: &[Event],
    conditions: &CompiledConditions,
    a: &str,
    b: &str,
) -> Outcome {
    relation_outcome_indexed(events, conditions, b, |idx, activation| {
        idx > 0
            && events
                .get(idx - 1)
                .is_some_and(|prev| conditions.targets(activation, prev, a))
    })
}

// ---------------------------------------------------------------------------
// negative relation family: same activations, forbidden targets,
// short-circuiting on the first violating event
// ---------------------------------------------------------------------------

fn check_not_responded_existence(
    events: &[Event],
    conditions: &CompiledConditions,
    a: &str,
    b: &str,
) -> Outcome {
    negative_relation_outcome(events, conditions, a, |activation| {
        events
            .iter()
            .any(|candidate| conditions.targets(activation, candidate, b))
    })
}

fn check_not_response(
    events: &[Event],
    conditions: &CompiledConditions,
    a: &str,
    b: &str,
) -> Outcome {
    negative_relation_outcome(events, conditions, a, |activation| {
        events
            .iter()
            .filter(|candidate| candidate.position > activation.position)
            .any(|candidate| conditions.targets(activation, candidate, b))
    })
}

fn check_not_chain_response(
    events: &[Event],
    conditions: &CompiledConditions,
    a: &str,
    b: &str,
) -> Outcome {
    negative_relation_outcome_indexed(events, conditions, a, |idx, activation| {
        events
            .get(idx + 1)
            .is_some_and(|next| conditions.targets(activation, next, b))
    })
}

fn check_not_precedence(
    events: &[Event],
    conditions: &CompiledConditions,
    a: &str,
    b: &str,
) -> Outcome {
    negative_relation_outcome(events, conditions, b, |activation| {
        events
            .iter()
            .filter(|candidate| candidate.position < activation.position)
            .any(|candidate| conditions.targets(activation, candidate, a))
    })
}

fn check_not_chain_precedence(
    events: &[Event],
    conditions: &CompiledConditions,
    a: &str,
    b: &str,
) -> Outcome {
    negative_relation_outcome_indexed(events, conditions, b, |idx, activation| {
        idx > 0
            && events
                .get(idx - 1)
                .is_some_and(|prev| conditions.targets(activation, prev, a))
    })
}

// ---------------------------------------------------------------------------
// shared walking logic
// ---------------------------------------------------------------------------

/// Positive relation: every activation needs a fulfilment; vacuous without
/// activations.
fn relation_outcome<F>(
    events: &[Event],
    conditions: &CompiledConditions,
    activation_operand: &str,
    fulfilled: F,
) -> Outcome
where
    F: Fn(&Event) -> bool,
{
    let mut activated = false;
    for event in events {
        if conditions.activates(event, activation_operand) {
            activated = true;
            if !fulfilled(event) {
                return Outcome::Violated;
            }
        }
    }
    if activated {
        Outcome::Satisfied
    } else {
        Outcome::Vacuous
    }
}

fn relation_outcome_indexed<F>(
    events: &[Event],
    conditions: &CompiledConditions,
    activation_operand: &str,
    fulfilled: F,
) -> Outcome
where
    F: Fn(usize, &Event) -> bool,
{
    let mut activated = false;
    for (idx, event) in events.iter().enumerate() {
        if conditions.activates(event, activation_operand) {
            activated = true;
            if !fulfilled(idx, event) {
                return Outcome::Violated;
            }
        }
    }
    if activated {
        Outcome::Satisfied
    } else {
        Outcome::Vacuous
    }
}

/// Negative relation: any fulfilled activation violates; vacuous without
/// activations.
fn negative_relation_outcome<F>(
    events: &[Event],
    conditions: &CompiledConditions,
    activation_operand: &str,
    forbidden: F,
) -> Outcome
where
    F: Fn(&Event) -> bool,
{
    let mut activated = false;
    for event in events {
        if conditions.activates(event, activation_operand) {
            activated = true;
            if forbidden(event) {
                return Outcome::Violated;
            }
        }
    }
    if activated {
        Outcome::Satisfied
    } else {
        Outcome::Vacuous
    }
}

fn negative_relation_outcome_indexed<F>(
    events: &[Event],
    conditions: &CompiledConditions,
    activation_operand: &str,
    forbidden: F,
) -> Outcome
where
    F: Fn(usize, &Event) -> bool,
{
    let mut activated = false;
    for (idx, event) in events.iter().enumerate() {
        if conditions.activates(event, activation_operand) {
            activated = true;
            if forbidden(idx, event) {
                return Outcome::Violated;
            }
        }
    }
    if activated {
        Outcome::Satisfied
    } else {
        Outcome::Vacuous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::TraceLabel;
    use crate::parser::parse_model;
    use chrono::{DateTime, FixedOffset, TimeZone};
    use std::collections::BTreeMap as Map;

    fn stamp() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .expect("offset")
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .expect("timestamp")
    }

    fn trace_of(activities: &[&str]) -> Trace {
        Trace {
            name: "t".to_string(),
            label: TraceLabel::Positive,
            events: activities
                .iter()
                .enumerate()
                .map(|(i, activity)| Event {
                    activity: (*activity).to_string(),
                    position: i + 1,
                    resources: Map::new(),
                    timestamp: stamp(),
                })
                .collect(),
        }
    }

    fn verdict(model_text: &str, activities: &[&str], vacuity: bool) -> Verdict {
        let model = parse_model(model_text);
        let raw_line = model.templates[0].raw_line.clone();
        let verdicts = check_trace_conformance(&model, &trace_of(activities), vacuity);
        verdicts[&raw_line]
    }

    #[test]
    fn test_init_scenarios() {
        let model = "activity a\nactivity b\nInit[a]";
        assert_eq!(verdict(model, &["a", "b", "a"], true), Verdict::Satisfied);
        assert_eq!(verdict(model, &["b", "a"], true), Verdict::Violated);
        assert_eq!(verdict(model, &[], true), Verdict::VacuouslySatisfied);
        assert_eq!(verdict(model, &[], false), Verdict::Satisfied);
    }

    #[test]
    fn test_chain_response_scenarios() {
        let model = "activity a\nactivity b\nactivity c\nChain Response[a, b]";
        assert_eq!(verdict(model, &["a", "b", "a", "b"], true), Verdict::Satisfied);
        assert_eq!(verdict(model, &["a", "b", "a"], true), Verdict::Violated);
        assert_eq!(verdict(model, &["c", "c"], true), Verdict::VacuouslySatisfied);
    }

    #[test]
    fn test_existence_cardinality() {
        let model = "activity a\nactivity b\nExistence3[a]";
        assert_eq!(verdict(model, &["a", "a", "a", "b"], true), Verdict::Satisfied);
        assert_eq!(verdict(model, &["a", "a", "b"], true), Verdict::Violated);
    }

    #[test]
    fn test_exclusive_choice_scenarios() {
        let model = "activity a\nactivity b\nactivity c\nExclusive Choice[a, b]";
        assert_eq!(verdict(model, &["a", "c", "a"], true), Verdict::Satisfied);
        assert_eq!(verdict(model, &["a", "b"], true), Verdict::Violated);
        assert_eq!(verdict(model, &["c"], true), Verdict::VacuouslySatisfied);
    }

    #[test]
    fn test_empty_trace_boundaries() {
        assert_eq!(
            verdict("activity a\nExistence[a]", &[], true),
            Verdict::Violated
        );
        assert_eq!(
            verdict("activity a\nAbsence[a]", &[], true),
            Verdict::Satisfied
        );
        assert_eq!(
            verdict("activity a\nactivity b\nResponse[a, b]", &[], true),
            Verdict::VacuouslySatisfied
        );
        assert_eq!(
            verdict("activity a\nactivity b\nPrecedence[a, b]", &[], true),
            Verdict::VacuouslySatisfied
        );
    }

    #[test]
    fn test_malformed_condition_omits_constraint() {
        let model = parse_model("activity a\nactivity b\nResponse[a, b] | A.grade > | |");
        let verdicts = check_trace_conformance(&model, &trace_of(&["a", "b"]), false);
        assert!(verdicts.is_empty());
    }
}
