//! # Declare Model AST
//!
//! In-memory representation of a parsed Declare model: activities, typed
//! attributes with value domains, constraint templates with operands and
//! conditions, and the identifier encoding table used when the ASP solver
//! rejects a raw name.
//!
//! The model is built once by [`crate::parser`] and is immutable afterwards,
//! except for the deep-cloned copy produced by the negative-generation path
//! which flips `violate` on selected templates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Templates
// ============================================================================

/// The closed set of Declare constraint templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateKind {
    Existence,
    Absence,
    Init,
    Exactly,
    Choice,
    ExclusiveChoice,
    RespondedExistence,
    Response,
    AlternateResponse,
    ChainResponse,
    Precedence,
    AlternatePrecedence,
    ChainPrecedence,
    NotRespondedExistence,
    NotResponse,
    NotChainResponse,
    NotPrecedence,
    NotChainPrecedence,
}

impl TemplateKind {
    /// Parse a template name as it appears in Declare text (`Chain Response`,
    /// `Exclusive Choice`, ...). Matching is case-insensitive.
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase();
        match normalized.as_str() {
            "existence" => Some(TemplateKind::Existence),
            "absence" => Some(TemplateKind::Absence),
            "init" => Some(TemplateKind::Init),
            "exactly" => Some(TemplateKind::Exactly),
            "choice" => Some(TemplateKind::Choice),
            "exclusive choice" => Some(TemplateKind::ExclusiveChoice),
            "responded existence" => Some(TemplateKind::RespondedExistence),
            "response" => Some(TemplateKind::Response),
            "alternate response" => Some(TemplateKind::AlternateResponse),
            "chain response" => Some(TemplateKind::ChainResponse),
            "precedence" => Some(TemplateKind::Precedence),
            "alternate precedence" => Some(TemplateKind::AlternatePrecedence),
            "chain precedence" => Some(TemplateKind::ChainPrecedence),
            "not responded existence" => Some(TemplateKind::NotRespondedExistence),
            "not response" => Some(TemplateKind::NotResponse),
            "not chain response" => Some(TemplateKind::NotChainResponse),
            "not precedence" => Some(TemplateKind::NotPrecedence),
            "not chain precedence" => Some(TemplateKind::NotChainPrecedence),
            _ => None,
        }
    }

    /// The textual form used in Declare model files.
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Existence => "Existence",
            TemplateKind::Absence => "Absence",
            TemplateKind::Init => "Init",
            TemplateKind::Exactly => "Exactly",
            TemplateKind::Choice => "Choice",
            TemplateKind::ExclusiveChoice => "Exclusive Choice",
            TemplateKind::RespondedExistence => "Responded Existence",
            TemplateKind::Response => "Response",
            TemplateKind::AlternateResponse => "Alternate Response",
            TemplateKind::ChainResponse => "Chain Response",
            TemplateKind::Precedence => "Precedence",
            TemplateKind::AlternatePrecedence => "Alternate Precedence",
            TemplateKind::ChainPrecedence => "Chain Precedence",
            TemplateKind::NotRespondedExistence => "Not Responded Existence",
            TemplateKind::NotResponse => "Not Response",
            TemplateKind::NotChainResponse => "Not Chain Response",
            TemplateKind::NotPrecedence => "Not Precedence",
            TemplateKind::NotChainPrecedence => "Not Chain Precedence",
        }
    }

    /// The lowercase token naming this family in the generated logic program.
    pub fn asp_name(&self) -> &'static str {
        match self {
            TemplateKind::Existence => "existence",
            TemplateKind::Absence => "absence",
            TemplateKind::Init => "init",
            TemplateKind::Exactly => "exactly",
            TemplateKind::Choice => "choice",
            TemplateKind::ExclusiveChoice => "exclusive_choice",
            TemplateKind::RespondedExistence => "responded_existence",
            TemplateKind::Response => "response",
            TemplateKind::AlternateResponse => "alternate_response",
            TemplateKind::ChainResponse => "chain_response",
            TemplateKind::Precedence => "precedence",
            TemplateKind::AlternatePrecedence => "alternate_precedence",
            TemplateKind::ChainPrecedence => "chain_precedence",
            TemplateKind::NotRespondedExistence => "not_responded_existence",
            TemplateKind::NotResponse => "not_response",
            TemplateKind::NotChainResponse => "not_chain_response",
            TemplateKind::NotPrecedence => "not_precedence",
            TemplateKind::NotChainPrecedence => "not_chain_precedence",
        }
    }

    /// Binary templates take two ordered operands; unary templates take one.
    pub fn is_binary(&self) -> bool {
        !matches!(
            self,
            TemplateKind::Existence
                | TemplateKind::Absence
                | TemplateKind::Init
                | TemplateKind::Exactly
        )
    }

    /// Whether a trailing integer on the template name is meaningful
    /// (`Existence3[a]`).
    pub fn supports_cardinality(&self) -> bool {
        matches!(
            self,
            TemplateKind::Existence | TemplateKind::Absence | TemplateKind::Exactly
        )
    }

    /// Negative templates invert the satisfaction predicate of their
    /// positive counterpart.
    pub fn is_negative(&self) -> bool {
        matches!(
            self,
            TemplateKind::NotRespondedExistence
                | TemplateKind::NotResponse
                | TemplateKind::NotChainResponse
                | TemplateKind::NotPrecedence
                | TemplateKind::NotChainPrecedence
        )
    }

    /// Whether a correlation predicate is meaningful for this template.
    /// Correlation links the activation event with a target event, so it
    /// only exists for binary templates.
    pub fn has_correlation(&self) -> bool {
        self.is_binary()
    }

    /// Index (into `activities`) of the operand whose occurrences activate
    /// the constraint. For precedence-family templates the activation is the
    /// second operand; everywhere else it is the first.
    pub fn activation_operand(&self) -> usize {
        match self {
            TemplateKind::Precedence
            | TemplateKind::AlternatePrecedence
            | TemplateKind::ChainPrecedence
            | TemplateKind::NotPrecedence
            | TemplateKind::NotChainPrecedence => 1,
            _ => 0,
        }
    }
}

// ============================================================================
// Attributes
// ============================================================================

/// Value type of an attribute, detected from the right-hand side of an
/// attribute-values line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeValueType {
    Integer,
    Float,
    IntegerRange,
    FloatRange,
    Enumeration,
}

/// Value domain carried by an attribute.
///
/// Range domains keep a `precision` multiplier used to project floats into
/// integers for the solver (`10^k` where `k` is the maximum number of
/// fractional digits in either bound).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeDomain {
    /// Single integer constant: `org:resource: 10`
    Integer(i64),
    /// Single float constant: `price: 12.5`
    Float { value: f64, precision: i64 },
    /// `grade: integer between 0 and 100`
    IntegerRange { lower: i64, upper: i64 },
    /// `amount: float between 0.5 and 99.99`
    FloatRange {
        lower: f64,
        upper: f64,
        precision: i64,
    },
    /// Ordered set of literal tokens: `category: c1, c2, c3`
    Enumeration(Vec<String>),
}

impl AttributeDomain {
    pub fn value_type(&self) -> AttributeValueType {
        match self {
            AttributeDomain::Integer(_) => AttributeValueType::Integer,
            AttributeDomain::Float { .. } => AttributeValueType::Float,
            AttributeDomain::IntegerRange { .. } => AttributeValueType::IntegerRange,
            AttributeDomain::FloatRange { .. } => AttributeValueType::FloatRange,
            AttributeDomain::Enumeration(_) => AttributeValueType::Enumeration,
        }
    }

    /// Multiplier projecting this domain's values into solver integers.
    /// Non-float domains use 1.
    pub fn range_precision(&self) -> i64 {
        match self {
            AttributeDomain::Float { precision, .. }
            | AttributeDomain::FloatRange { precision, .. } => *precision,
            _ => 1,
        }
    }

    /// Whether lifted solver values must be divided back by the precision.
    pub fn needs_rescaling(&self) -> bool {
        matches!(
            self,
            AttributeDomain::Float { .. } | AttributeDomain::FloatRange { .. }
        )
    }
}

/// Named variable bound to zero or more activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub domain: AttributeDomain,
}

// ============================================================================
// Activities
// ============================================================================

/// Named action, grouped under a type tag (the first whitespace-delimited
/// token of its declaration line, `activity` in standard Declare text).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    pub type_tag: String,
    /// Names of the attributes bound to this activity via `bind` lines.
    pub attributes: Vec<String>,
}

// ============================================================================
// Constraint templates
// ============================================================================

/// One constraint instance: a template applied to concrete operands, with
/// optional activation / correlation / time conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintTemplate {
    pub kind: TemplateKind,
    /// One operand for unary templates, two (ordered) for binary ones.
    pub activities: Vec<String>,
    /// Meaningful iff `kind.supports_cardinality()`; defaults to 1.
    pub cardinality: u32,
    /// Raw condition segments in declaration order: activation, correlation
    /// (binary templates only), time. Entries may be empty strings.
    pub conditions: Vec<String>,
    /// Dense index `0..k-1` in declaration order; the template's identifier
    /// in the generated logic program.
    pub index: usize,
    /// When true the translator asserts the negation of this constraint.
    pub violate: bool,
    /// Original textual form; identity key for violation and
    /// activation-bound directives.
    pub raw_line: String,
}

impl ConstraintTemplate {
    /// Activation predicate source, or `""` when absent.
    pub fn activation_condition(&self) -> &str {
        self.conditions.first().map_or("", String::as_str)
    }

    /// Correlation predicate source. Only meaningful for binary templates.
    pub fn correlation_condition(&self) -> &str {
        if !self.kind.is_binary() {
            return "";
        }
        self.conditions.get(1).map_or("", String::as_str)
    }

    /// Time condition source; by convention the last segment.
    pub fn time_condition(&self) -> &str {
        if self.conditions.len() < 2 {
            return "";
        }
        self.conditions.last().map_or("", String::as_str)
    }
}

// ============================================================================
// Identifier encoding
// ============================================================================

/// Bijective map from raw identifiers to solver-safe tokens.
///
/// The solver rejects names starting with a non-lowercase letter or carrying
/// a colon; such names get a synthesised lowercase token from a stable
/// counter. Decoding a token that was never encoded yields it unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncodingTable {
    forward: HashMap<String, String>,
    reverse: HashMap<String, String>,
    counter: usize,
}

impl EncodingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a raw identifier must be substituted before it can appear in
    /// the logic program.
    pub fn needs_encoding(raw: &str) -> bool {
        let starts_lower = raw.chars().next().is_some_and(|c| c.is_ascii_lowercase());
        !starts_lower || raw.contains(':') || raw.contains(char::is_whitespace)
    }

    /// Encode a raw identifier, registering a fresh token on first sight.
    /// Clean identifiers pass through untouched.
    pub fn encode(&mut self, raw: &str) -> String {
        if !Self::needs_encoding(raw) {
            return raw.to_string();
        }
        if let Some(token) = self.forward.get(raw) {
            return token.clone();
        }
        let token = loop {
            let candidate = format!("enc{}", self.counter);
            self.counter += 1;
            if !self.reverse.contains_key(&candidate) {
                break candidate;
            }
        };
        self.forward.insert(raw.to_string(), token.clone());
        self.reverse.insert(token.clone(), raw.to_string());
        token
    }

    /// Decode a token back to its raw identifier. Unknown tokens come back
    /// unchanged.
    pub fn decode<'a>(&'a self, token: &'a str) -> &'a str {
        self.reverse.get(token).map_or(token, String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }
}

// ============================================================================
// Parsed model
// ============================================================================

/// A parsed Declare model: flat containers for activities, attributes and
/// templates, with lookup by name. Templates reference activities and
/// attributes by name, never by owning reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclareModel {
    pub activities: Vec<Activity>,
    pub attributes: Vec<Attribute>,
    pub templates: Vec<ConstraintTemplate>,
    pub encoding: EncodingTable,
}

impl DeclareModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activity(&self, name: &str) -> Option<&Activity> {
        self.activities.iter().find(|a| a.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn template_by_raw_line(&self, raw_line: &str) -> Option<&ConstraintTemplate> {
        let raw_line = raw_line.trim();
        self.templates.iter().find(|t| t.raw_line == raw_line)
    }

    /// Register an activity. Re-declaring an existing name is a no-op.
    pub fn add_activity(&mut self, name: &str, type_tag: &str) {
        if self.activity(name).is_some() {
            return;
        }
        self.activities.push(Activity {
            name: name.to_string(),
            type_tag: type_tag.to_string(),
            attributes: Vec::new(),
        });
    }

    /// Bind an attribute name to an activity, creating a placeholder
    /// enumeration domain if the attribute has not been seen yet. Returns
    /// false when the activity is undeclared.
    pub fn bind_attribute(&mut self, activity: &str, attribute: &str) -> bool {
        if self.attribute(attribute).is_none() {
            self.attributes.push(Attribute {
                name: attribute.to_string(),
                domain: AttributeDomain::Enumeration(Vec::new()),
            });
        }
        match self.activities.iter_mut().find(|a| a.name == activity) {
            Some(act) => {
                if !act.attributes.iter().any(|a| a == attribute) {
                    act.attributes.push(attribute.to_string());
                }
                true
            }
            None => false,
        }
    }

    /// Assign a value domain to an attribute, creating it if unseen.
    pub fn set_attribute_domain(&mut self, attribute: &str, domain: AttributeDomain) {
        match self.attributes.iter_mut().find(|a| a.name == attribute) {
            Some(attr) => attr.domain = domain,
            None => self.attributes.push(Attribute {
                name: attribute.to_string(),
                domain,
            }),
        }
    }

    /// Append a template; its index is assigned densely in declaration order.
    pub fn add_template(
        &mut self,
        kind: TemplateKind,
        activities: Vec<String>,
        cardinality: u32,
        conditions: Vec<String>,
        raw_line: &str,
    ) {
        let index = self.templates.len();
        self.templates.push(ConstraintTemplate {
            kind,
            activities,
            cardinality,
            conditions,
            index,
            violate: false,
            raw_line: raw_line.trim().to_string(),
        });
    }

    /// Deep-cloned copy with `violate` flipped on the selected templates.
    /// With `all` set, every template is marked; otherwise only those whose
    /// `raw_line` appears in `raw_lines`.
    pub fn with_violations(&self, all: bool, raw_lines: &[String]) -> DeclareModel {
        let mut clone = self.clone();
        for template in &mut clone.templates {
            if all || raw_lines.iter().any(|l| l.trim() == template.raw_line) {
                template.violate = true;
            }
        }
        clone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_kind_parses_all_names() {
        for (name, kind) in [
            ("Existence", TemplateKind::Existence),
            ("Chain Response", TemplateKind::ChainResponse),
            ("Exclusive Choice", TemplateKind::ExclusiveChoice),
            ("Not Chain Precedence", TemplateKind::NotChainPrecedence),
            ("responded existence", TemplateKind::RespondedExistence),
        ] {
            assert_eq!(TemplateKind::parse(name), Some(kind));
        }
        assert_eq!(TemplateKind::parse("Eventually"), None);
    }

    #[test]
    fn test_template_kind_metadata() {
        assert!(TemplateKind::Existence.supports_cardinality());
        assert!(!TemplateKind::Init.supports_cardinality());
        assert!(!TemplateKind::Exactly.is_binary());
        assert!(TemplateKind::Response.is_binary());
        assert!(TemplateKind::NotResponse.is_negative());
        assert_eq!(TemplateKind::Precedence.activation_operand(), 1);
        assert_eq!(TemplateKind::Response.activation_operand(), 0);
    }

    #[test]
    fn test_encoding_table_round_trip() {
        let mut table = EncodingTable::new();
        let token = table.encode("Driving_Test");
        assert_ne!(token, "Driving_Test");
        assert_eq!(table.decode(&token), "Driving_Test");
        // stable on repeated encoding
        assert_eq!(table.encode("Driving_Test"), token);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_encoding_table_passes_clean_names() {
        let mut table = EncodingTable::new();
        assert_eq!(table.encode("drive"), "drive");
        assert!(table.is_empty());
        assert_eq!(table.decode("never_seen"), "never_seen");
    }

    #[test]
    fn test_encoding_detects_unsafe_names() {
        assert!(EncodingTable::needs_encoding("Apply"));
        assert!(EncodingTable::needs_encoding("org:resource"));
        assert!(EncodingTable::needs_encoding("apply loan"));
        assert!(!EncodingTable::needs_encoding("apply_loan"));
    }

    #[test]
    fn test_with_violations_flips_selected() {
        let mut model = DeclareModel::new();
        model.add_activity("a", "activity");
        model.add_template(
            TemplateKind::Existence,
            vec!["a".to_string()],
            1,
            vec![],
            "Existence[a]",
        );
        model.add_template(
            TemplateKind::Init,
            vec!["a".to_string()],
            1,
            vec![],
            "Init[a]",
        );

        let partial = model.with_violations(false, &["Init[a]".to_string()]);
        assert!(!partial.templates[0].violate);
        assert!(partial.templates[1].violate);
        // source model untouched
        assert!(model.templates.iter().all(|t| !t.violate));

        let full = model.with_violations(true, &[]);
        assert!(full.templates.iter().all(|t| t.violate));
    }

    #[test]
    fn test_template_indexes_are_dense() {
        let mut model = DeclareModel::new();
        for i in 0..4 {
            model.add_template(
                TemplateKind::Existence,
                vec!["a".to_string()],
                1,
                vec![],
                &format!("Existence[a{i}]"),
            );
        }
        for (i, t) in model.templates.iter().enumerate() {
            assert_eq!(t.index, i);
        }
    }
}
