//! Lifting answer-set symbols back into typed traces.
//!
//! An answer set arrives as a flat list of shown atoms. The lifter extracts
//! the `trace(Activity, Position)` sequence and the
//! `assigned_value(Attribute, Value, Position)` resource bindings, decodes
//! every identifier through the model's encoding table, and rescales float
//! attributes by their range precision.

use crate::ast::DeclareModel;
use crate::event_log::{Event, Trace, TraceLabel};
use chrono::{DateTime, FixedOffset};
use std::collections::BTreeMap;
use tracing::warn;

/// Split an atom like `trace(a,3)` into its name and arguments. Quoted
/// arguments are unquoted.
pub(crate) fn parse_symbol(symbol: &str) -> Option<(&str, Vec<&str>)> {
    let open = symbol.find('(')?;
    let name = &symbol[..open];
    let inner = symbol[open + 1..].strip_suffix(')')?;
    let args = inner
        .split(',')
        .map(|a| a.trim().trim_matches('"'))
        .collect();
    Some((name, args))
}

/// The `trace/2` atoms of an answer set, as solver-side facts. Used to pin
/// a base trace's activity skeleton when generating variations.
pub(crate) fn trace_facts(symbols: &[String]) -> Vec<String> {
    symbols
        .iter()
        .filter(|s| parse_symbol(s).is_some_and(|(name, args)| name == "trace" && args.len() == 2))
        .map(|s| format!("{s}."))
        .collect()
}

/// Decode one answer set into a labelled trace. Events come out sorted by
/// position and share the run timestamp.
pub(crate) fn lift_trace(
    name: String,
    label: TraceLabel,
    symbols: &[String],
    model: &DeclareModel,
    timestamp: DateTime<FixedOffset>,
) -> Trace {
    let mut activities: BTreeMap<usize, String> = BTreeMap::new();
    let mut resources: BTreeMap<usize, BTreeMap<String, String>> = BTreeMap::new();

    for symbol in symbols {
        let Some((atom, args)) = parse_symbol(symbol) else {
            continue;
        };
        match (atom, args.as_slice()) {
            ("trace", [activity, position]) => match position.parse::<usize>() {
                Ok(position) => {
                    activities.insert(position, model.encoding.decode(activity).to_string());
                }
                Err(_) => warn!(symbol = symbol.as_str(), "unreadable trace position"),
            },
            ("assigned_value", [attribute, value, position]) => {
                match position.parse::<usize>() {
                    Ok(position) => {
                        let attribute = model.encoding.decode(attribute).to_string();
                        let value = rescale_value(model, &attribute, model.encoding.decode(value));
                        resources.entry(position).or_default().insert(attribute, value);
                    }
                    Err(_) => warn!(symbol = symbol.as_str(), "unreadable value position"),
                }
            }
            _ => {}
        }
    }

    let events = activities
        .into_iter()
        .map(|(position, activity)| Event {
            activity,
            position,
            resources: resources.remove(&position).unwrap_or_default(),
            timestamp,
        })
        .collect();

    Trace {
        name,
        label,
        events,
    }
}

/// Float-typed attributes were projected into integers for the solver;
/// divide back by the precision. Everything else passes through.
fn rescale_value(model: &DeclareModel, attribute: &str, value: &str) -> String {
    let Some(attr) = model.attribute(attribute) else {
        return value.to_string();
    };
    if !attr.domain.needs_rescaling() {
        return value.to_string();
    }
    match value.parse::<i64>() {
        Ok(scaled) => {
            let rescaled = scaled as f64 / attr.domain.range_precision() as f64;
            format!("{rescaled}")
        }
        Err(_) => value.to_string(),
    }
}
