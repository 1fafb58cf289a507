//! # Declare Model Parser
//!
//! Line-oriented parser for textual Declare models. Recognises the four line
//! kinds (event declaration, event binding, attribute values, constraint
//! template), detects attribute value types, and populates a
//! [`DeclareModel`].
//!
//! Malformed lines never abort the parse: they are logged as warnings and
//! skipped, so a partial model is a valid output.

use crate::ast::{AttributeDomain, AttributeValueType, DeclareModel, TemplateKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

static EVENT_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+ [\w ]+$").unwrap());
static EVENT_BIND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^bind .+$").unwrap());
// The bind prefix is excluded by an explicit check in `classify_line`; the
// regex crate has no negative lookahead.
static ATTR_VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_,0-9.?: ]+ *: *[-+\w,.? ]+$").unwrap());
static TEMPLATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*)\[(.*)\]\s*(.*)$").unwrap());
static TEMPLATE_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+?)(\d*)$").unwrap());
static CONDITION_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+\|").unwrap());
static RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:integer|float)\s+between\s+([+-]?\d+(?:\.\d+)?)\s+and\s+([+-]?\d+(?:\.\d+)?)$")
        .unwrap()
});
static INTEGER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").unwrap());
static FLOAT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+\.\d+$").unwrap());

/// The four line kinds of Declare syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// `<typeTag> <name>`
    EventDeclaration,
    /// `bind <name>: <attr>[, <attr>]*`
    EventBinding,
    /// `<attrOrCsv>: <valueSpec>`
    AttributeValues,
    /// `<TemplateName><digits?>[<op>(,<op>)?] (|<cond>)*`
    TemplateInstance,
}

/// Classify a stripped, non-empty, non-comment line. First matching rule
/// wins; `bind` lines are tested before attribute values because the
/// attribute pattern would otherwise swallow them.
pub fn classify_line(line: &str) -> Option<LineKind> {
    if EVENT_NAME_RE.is_match(line) {
        Some(LineKind::EventDeclaration)
    } else if EVENT_BIND_RE.is_match(line) {
        Some(LineKind::EventBinding)
    } else if !line.starts_with("bind") && ATTR_VALUE_RE.is_match(line) {
        Some(LineKind::AttributeValues)
    } else if TEMPLATE_RE.is_match(line) {
        Some(LineKind::TemplateInstance)
    } else {
        None
    }
}

/// Detect the value type of the right-hand side of an attribute-values line.
pub fn detect_value_type(value: &str) -> AttributeValueType {
    let value = value.trim();
    let squeezed = value.replace("  ", " ").to_lowercase();
    if INTEGER_RE.is_match(value) {
        AttributeValueType::Integer
    } else if FLOAT_RE.is_match(value) {
        AttributeValueType::Float
    } else if squeezed.starts_with("integer between") {
        AttributeValueType::IntegerRange
    } else if squeezed.starts_with("float between") {
        AttributeValueType::FloatRange
    } else {
        AttributeValueType::Enumeration
    }
}

/// Number of fractional digits in a decimal literal (`"0.25"` -> 2).
fn fractional_digits(literal: &str) -> u32 {
    literal
        .split_once('.')
        .map_or(0, |(_, frac)| frac.len() as u32)
}

/// Parse a value specification into a domain. Returns `None` (after logging)
/// when a range spec is malformed or inverted.
fn parse_value_spec(value: &str) -> Option<AttributeDomain> {
    let value = value.trim();
    match detect_value_type(value) {
        AttributeValueType::Integer => value.parse::<i64>().ok().map(AttributeDomain::Integer),
        AttributeValueType::Float => {
            let parsed = value.parse::<f64>().ok()?;
            let precision = 10_i64.pow(fractional_digits(value));
            Some(AttributeDomain::Float {
                value: parsed,
                precision,
            })
        }
        AttributeValueType::IntegerRange => {
            let caps = RANGE_RE.captures(value)?;
            let lower = caps[1].parse::<i64>().ok()?;
            let upper = caps[2].parse::<i64>().ok()?;
            if lower > upper {
                warn!(spec = value, "range lower bound exceeds upper bound");
                return None;
            }
            Some(AttributeDomain::IntegerRange { lower, upper })
        }
        AttributeValueType::FloatRange => {
            let caps = RANGE_RE.captures(value)?;
            let lower = caps[1].parse::<f64>().ok()?;
            let upper = caps[2].parse::<f64>().ok()?;
            if lower > upper {
                warn!(spec = value, "range lower bound exceeds upper bound");
                return None;
            }
            let digits = fractional_digits(&caps[1]).max(fractional_digits(&caps[2]));
            Some(AttributeDomain::FloatRange {
                lower,
                upper,
                precision: 10_i64.pow(digits),
            })
        }
        AttributeValueType::Enumeration => Some(AttributeDomain::Enumeration(
            value
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        )),
    }
}

/// Parse a Declare model from text. Never fails: malformed lines are logged
/// and skipped, so the result may be partial.
pub fn parse_model(content: &str) -> DeclareModel {
    let mut model = DeclareModel::new();
    for raw in content.lines() {
        let line = raw.trim();
        // lines starting with # are comments
        if line.len() <= 1 || line.starts_with('#') {
            continue;
        }
        match classify_line(line) {
            Some(LineKind::EventDeclaration) => parse_event_declaration(&mut model, line),
            Some(LineKind::EventBinding) => parse_event_binding(&mut model, line),
            Some(LineKind::AttributeValues) => parse_attribute_values(&mut model, line),
            Some(LineKind::TemplateInstance) => parse_template_instance(&mut model, line),
            None => warn!(line, "unrecognised declare line, skipping"),
        }
    }
    model
}

/// Parse a Declare model from a file.
pub fn parse_model_file<P: AsRef<Path>>(path: P) -> io::Result<DeclareModel> {
    let content = fs::read_to_string(path)?;
    Ok(parse_model(&content))
}

fn parse_event_declaration(model: &mut DeclareModel, line: &str) {
    // first token is the type tag, the remainder (spaces included) the name
    if let Some((tag, name)) = line.split_once(char::is_whitespace) {
        let name = name.trim();
        if name.is_empty() {
            warn!(line, "event declaration without a name, skipping");
            return;
        }
        model.add_activity(name, tag);
    }
}

fn parse_event_binding(model: &mut DeclareModel, line: &str) {
    let Some((head, attrs)) = line.split_once(": ") else {
        warn!(line, "malformed bind line, skipping");
        return;
    };
    let Some((_, activity)) = head.split_once(' ') else {
        warn!(line, "bind line without an activity, skipping");
        return;
    };
    let activity = activity.trim();
    for attr in attrs.split(',') {
        let attr = attr.trim();
        if attr.is_empty() {
            continue;
        }
        if !model.bind_attribute(activity, attr) {
            warn!(activity, attribute = attr, "bind references undeclared activity");
        }
    }
}

fn parse_attribute_values(model: &mut DeclareModel, line: &str) {
    let Some((attrs, value)) = line.split_once(": ") else {
        warn!(line, "malformed attribute-values line, skipping");
        return;
    };
    let Some(domain) = parse_value_spec(value) else {
        warn!(line, "malformed value specification, skipping");
        return;
    };
    for attr in attrs.split(',') {
        let attr = attr.trim();
        if attr.is_empty() {
            continue;
        }
        model.set_attribute_domain(attr, domain.clone());
    }
}

fn parse_template_instance(model: &mut DeclareModel, line: &str) {
    let Some(caps) = TEMPLATE_RE.captures(line) else {
        warn!(line, "malformed template line, skipping");
        return;
    };
    let head = caps[1].trim().to_string();
    let operand_str = caps[2].to_string();

    let Some(name_caps) = TEMPLATE_NAME_RE.captures(&head) else {
        warn!(line, "malformed template name, skipping");
        return;
    };
    let Some(kind) = TemplateKind::parse(&name_caps[1]) else {
        warn!(template = &name_caps[1], "unknown template name, skipping");
        return;
    };
    let cardinality = if kind.supports_cardinality() {
        name_caps[2].parse::<u32>().unwrap_or(1)
    } else {
        1
    };

    let operands: Vec<String> = operand_str
        .split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();
    let activities = if kind.is_binary() {
        if operands.len() < 2 {
            warn!(line, "binary template with fewer than two operands, skipping");
            return;
        }
        operands[..2].to_vec()
    } else {
        // unary templates silently ignore a second operand
        match operands.first() {
            Some(first) => vec![first.clone()],
            None => {
                warn!(line, "template without operands, skipping");
                return;
            }
        }
    };
    for operand in &activities {
        if model.activity(operand).is_none() {
            warn!(line, operand = operand.as_str(), "operand is not a declared activity");
        }
    }

    let conditions: Vec<String> = CONDITION_SPLIT_RE
        .split(line)
        .skip(1)
        .map(|c| c.trim().to_string())
        .collect();

    model.add_template(kind, activities, cardinality, conditions, line);
}

/// Serialise a model back to Declare text. Templates are emitted via their
/// `raw_line`, so parse -> serialise -> parse is lossless.
pub fn to_declare_string(model: &DeclareModel) -> String {
    let mut out = String::new();
    for activity in &model.activities {
        out.push_str(&format!("{} {}\n", activity.type_tag, activity.name));
    }
    for activity in &model.activities {
        if !activity.attributes.is_empty() {
            out.push_str(&format!(
                "bind {}: {}\n",
                activity.name,
                activity.attributes.join(", ")
            ));
        }
    }
    for attribute in &model.attributes {
        out.push_str(&format!(
            "{}: {}\n",
            attribute.name,
            domain_to_spec(&attribute.domain)
        ));
    }
    for template in &model.templates {
        out.push_str(&template.raw_line);
        out.push('\n');
    }
    out
}

fn domain_to_spec(domain: &AttributeDomain) -> String {
    match domain {
        AttributeDomain::Integer(v) => v.to_string(),
        AttributeDomain::Float { value, .. } => format!("{value:?}"),
        AttributeDomain::IntegerRange { lower, upper } => {
            format!("integer between {lower} and {upper}")
        }
        AttributeDomain::FloatRange { lower, upper, .. } => {
            format!("float between {lower:?} and {upper:?}")
        }
        AttributeDomain::Enumeration(values) => values.join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_event_declaration() {
        assert_eq!(classify_line("activity a"), Some(LineKind::EventDeclaration));
        assert_eq!(
            classify_line("activity Apply for loan"),
            Some(LineKind::EventDeclaration)
        );
    }

    #[test]
    fn test_classify_bind_before_attribute_values() {
        // `bind a: grade` also matches the attribute-values shape; the bind
        // rule must win
        assert_eq!(classify_line("bind a: grade"), Some(LineKind::EventBinding));
    }

    #[test]
    fn test_classify_attribute_values() {
        assert_eq!(
            classify_line("grade: integer between 0 and 100"),
            Some(LineKind::AttributeValues)
        );
        assert_eq!(
            classify_line("org:resource: 10"),
            Some(LineKind::AttributeValues)
        );
        assert_eq!(
            classify_line("categorical: c1, c2, c3"),
            Some(LineKind::AttributeValues)
        );
    }

    #[test]
    fn test_classify_template_instance() {
        assert_eq!(
            classify_line("Response[a, b] | | |"),
            Some(LineKind::TemplateInstance)
        );
        assert_eq!(classify_line("Existence3[a]"), Some(LineKind::TemplateInstance));
    }

    #[test]
    fn test_detect_value_types() {
        assert_eq!(detect_value_type("10"), AttributeValueType::Integer);
        assert_eq!(detect_value_type("-3"), AttributeValueType::Integer);
        assert_eq!(detect_value_type("3.5"), AttributeValueType::Float);
        assert_eq!(
            detect_value_type("integer between 0 and 100"),
            AttributeValueType::IntegerRange
        );
        assert_eq!(
            detect_value_type("float between 0.5 and 2.5"),
            AttributeValueType::FloatRange
        );
        assert_eq!(detect_value_type("c1, c2, c3"), AttributeValueType::Enumeration);
    }

    #[test]
    fn test_float_range_precision() {
        let domain = parse_value_spec("float between 0.5 and 99.99");
        assert_eq!(
            domain,
            Some(AttributeDomain::FloatRange {
                lower: 0.5,
                upper: 99.99,
                precision: 100,
            })
        );
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        assert_eq!(parse_value_spec("integer between 10 and 0"), None);
    }

    #[test]
    fn test_unknown_template_is_skipped() {
        let model = parse_model("activity a\nEventually[a]\nInit[a]\n");
        assert_eq!(model.templates.len(), 1);
        assert_eq!(model.templates[0].kind, TemplateKind::Init);
        assert_eq!(model.templates[0].index, 0);
    }

    #[test]
    fn test_cardinality_default_and_suffix() {
        let model = parse_model("activity a\nExistence[a]\nExistence3[a]\n");
        assert_eq!(model.templates[0].cardinality, 1);
        assert_eq!(model.templates[1].cardinality, 3);
    }

    #[test]
    fn test_conditions_split() {
        let model = parse_model("activity a\nResponse[a, a] | A.grade > 50 | | ");
        let template = &model.templates[0];
        assert_eq!(template.activation_condition(), "A.grade > 50");
        assert_eq!(template.correlation_condition(), "");
        assert_eq!(template.time_condition(), "");
    }

    #[test]
    fn test_multi_word_activity_name() {
        let model = parse_model("activity Apply for loan\n");
        let activity = model.activity("Apply for loan").expect("activity parsed");
        assert_eq!(activity.type_tag, "activity");
    }

    #[test]
    fn test_comment_and_blank_lines_ignored() {
        let model = parse_model("# a comment\n\n  \nactivity a\n");
        assert_eq!(model.activities.len(), 1);
    }
}
