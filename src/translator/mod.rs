//! # ASP Translator
//!
//! Lowers a [`DeclareModel`] (plus violation directives and activation
//! bounds) into a logic program for the answer-set solver. The emitted
//! program has four ordered sections:
//!
//! 1. model facts (activities, attribute domains, template instances) and
//!    the per-instance activation / correlation rules,
//! 2. activation-count directives,
//! 3. the static encoding preamble,
//! 4. the static template rule blocks.
//!
//! Identifiers the solver would reject (capitalised, colon-bearing or
//! multi-word names) are substituted through the model's [`EncodingTable`]
//! when encoding is enabled.
//!
//! Data conditions are lowered to ASP body literals in disjunctive normal
//! form. Time conditions are not lowered (all solver events share one
//! timestamp); they surface only in the conformance checker.

pub mod encoding;

use crate::ast::{AttributeDomain, DeclareModel, EncodingTable};
use crate::conditions::{self, CmpOp, Condition, EventRef};
use crate::config::ActivationBound;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// How the negative pass wants violations asserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViolationDirectives {
    /// Violate every flagged constraint, or let the solver pick a non-empty
    /// subset of them.
    pub violate_all: bool,
}

/// The translated logic program, split into its dynamic sections. The
/// static encoding is appended on rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AspProgram {
    /// Facts and per-instance condition rules derived from the model.
    pub model_lines: Vec<String>,
    /// Activation-count directives.
    pub directives: Vec<String>,
}

impl AspProgram {
    pub fn add_line(&mut self, line: String) {
        self.model_lines.push(line);
    }

    pub fn add_directive(&mut self, line: String) {
        self.directives.push(line);
    }

    /// Render the full program: facts, directives, encoding preamble,
    /// template rules.
    pub fn to_program_string(&self) -> String {
        let mut out = String::from("% ---- model facts ----\n");
        for line in &self.model_lines {
            out.push_str(line);
            out.push('\n');
        }
        if !self.directives.is_empty() {
            out.push_str("% ---- activation directives ----\n");
            for line in &self.directives {
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push_str(encoding::ENCODING_PREAMBLE);
        out.push_str(encoding::TEMPLATE_RULES);
        out
    }
}

impl fmt::Display for AspProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_program_string())
    }
}

/// Translate a model into a logic program.
///
/// The model's encoding table is populated as a side effect so that results
/// can be decoded after solving. `violation` is set by the negative pass;
/// `bounds` carries the activation-count intervals keyed by constraint raw
/// line.
pub fn translate(
    model: &mut DeclareModel,
    encode: bool,
    violation: Option<ViolationDirectives>,
    bounds: &BTreeMap<String, ActivationBound>,
) -> AspProgram {
    let mut table = std::mem::take(&mut model.encoding);
    let program = {
        let mut translator = Translator {
            model,
            encode,
            table: &mut table,
            program: AspProgram::default(),
        };
        translator.emit_activities();
        translator.emit_attributes();
        translator.emit_templates(violation);
        translator.emit_condition_rules();
        translator.emit_activation_bounds(bounds);
        translator.program
    };
    model.encoding = table;
    debug!(
        facts = program.model_lines.len(),
        directives = program.directives.len(),
        "declare model translated to ASP"
    );
    program
}

struct Translator<'a> {
    model: &'a DeclareModel,
    encode: bool,
    table: &'a mut EncodingTable,
    program: AspProgram,
}

impl<'a> Translator<'a> {
    fn name(&mut self, raw: &str) -> String {
        if self.encode {
            self.table.encode(raw)
        } else {
            raw.to_string()
        }
    }

    fn emit_activities(&mut self) {
        let model = self.model;
        for activity in &model.activities {
            let name = self.name(&activity.name);
            self.program.add_line(format!("activity({name})."));
        }
        for activity in &model.activities {
            let act = self.name(&activity.name);
            for attribute in &activity.attributes {
                let attr = self.name(attribute);
                self.program
                    .add_line(format!("has_attribute({act}, {attr})."));
            }
        }
    }

    fn emit_attributes(&mut self) {
        let model = self.model;
        for attribute in &model.attributes {
            let attr = self.name(&attribute.name);
            match &attribute.domain {
                AttributeDomain::Integer(v) => {
                    self.program.add_line(format!("value({attr}, {v})."));
                }
                AttributeDomain::Float { value, precision } => {
                    let scaled = (value * *precision as f64).round() as i64;
                    self.program.add_line(format!("value({attr}, {scaled})."));
                }
                AttributeDomain::IntegerRange { lower, upper } => {
                    self.program
                        .add_line(format!("value({attr}, {lower}..{upper})."));
                }
                AttributeDomain::FloatRange {
                    lower,
                    upper,
                    precision,
                } => {
                    let lo = (lower * *precision as f64).round() as i64;
                    let hi = (upper * *precision as f64).round() as i64;
                    self.program.add_line(format!("value({attr}, {lo}..{hi})."));
                }
                AttributeDomain::Enumeration(values) => {
                    for value in values {
                        let token = self.name(value);
                        self.program.add_line(format!("value({attr}, {token})."));
                    }
                }
            }
        }
    }

    fn emit_templates(&mut self, violation: Option<ViolationDirectives>) {
        let model = self.model;
        let mut violatable = Vec::new();
        for template in &model.templates {
            let idx = template.index;
            let family = template.kind.asp_name();
            let operands: Vec<String> = template
                .activities
                .iter()
                .map(|a| self.name(a))
                .collect();
            self.program.add_line(format!(
                "template({idx}, {family}, {}).",
                operands.join(", ")
            ));
            if template.kind.supports_cardinality() {
                self.program
                    .add_line(format!("cardinality({idx}, {}).", template.cardinality));
            }
            if template.violate {
                if let Some(directives) = violation {
                    if directives.violate_all {
                        self.program.add_line(format!("violated({idx})."));
                    } else {
                        violatable.push(idx);
                    }
                }
            }
        }
        if !violatable.is_empty() {
            for idx in &violatable {
                self.program.add_line(format!("violatable({idx})."));
            }
            // the solver picks a non-empty subset of constraints to break
            self.program
                .add_line("{ violated(I) : violatable(I) }.".to_string());
            self.program
                .add_line(":- #count{ I : violated(I) } = 0.".to_string());
        }
    }

    fn emit_condition_rules(&mut self) {
        let model = self.model;
        for template in &model.templates {
            let idx = template.index;
            let Some(activation_op) = template
                .activities
                .get(template.kind.activation_operand())
            else {
                continue;
            };

            self.emit_condition_rule(
                "activation_condition",
                idx,
                activation_op,
                template.activation_condition(),
                EventRef::Activation,
                &template.raw_line,
            );

            if template.kind.has_correlation() {
                let target_idx = 1 - template.kind.activation_operand();
                if let Some(target_op) = template.activities.get(target_idx) {
                    self.emit_condition_rule(
                        "correlation_condition",
                        idx,
                        target_op,
                        template.correlation_condition(),
                        EventRef::Target,
                        &template.raw_line,
                    );
                }
            }

            if !template.time_condition().is_empty() {
                warn!(
                    constraint = template.raw_line.as_str(),
                    "time conditions are not lowered to ASP; enforced only by the checker"
                );
            }
        }
    }

    /// Emit one rule per DNF conjunct of the condition:
    /// `head(I,T) :- trace(op,T), <atoms>.`
    fn emit_condition_rule(
        &mut self,
        head: &str,
        idx: usize,
        operand: &str,
        condition_src: &str,
        expected: EventRef,
        raw_line: &str,
    ) {
        let operand_token = self.name(operand);
        let condition = match conditions::parse_condition(condition_src) {
            Ok(cond) => cond,
            Err(err) => {
                warn!(constraint = raw_line, %err, "condition not lowered to ASP");
                None
            }
        };
        let Some(condition) = condition else {
            self.program
                .add_line(format!("{head}({idx},T) :- trace({operand_token},T)."));
            return;
        };

        let mut emitted = false;
        for conjunct in expand_in(condition).to_dnf() {
            if let Some(atoms) = self.lower_conjunct(&conjunct, expected, operand, raw_line) {
                self.program.add_line(format!(
                    "{head}({idx},T) :- trace({operand_token},T){atoms}."
                ));
                emitted = true;
            }
        }
        if !emitted {
            // nothing lowerable: fall back to the unconditioned rule so the
            // count directives still have a subject
            self.program
                .add_line(format!("{head}({idx},T) :- trace({operand_token},T)."));
        }
    }

    /// Lower one conjunction of leaf predicates into body atoms. Returns
    /// `None` when a leaf cannot be expressed positionally.
    fn lower_conjunct(
        &mut self,
        conjunct: &[Condition],
        expected: EventRef,
        operand: &str,
        raw_line: &str,
    ) -> Option<String> {
        let mut atoms = String::new();
        let mut var_counter = 0;
        for leaf in conjunct {
            match leaf {
                Condition::Compare {
                    event,
                    attribute,
                    op,
                    value,
                } => {
                    if *event != expected {
                        warn!(
                            constraint = raw_line,
                            "cross-event condition cannot be lowered to ASP"
                        );
                        return None;
                    }
                    self.check_condition_attribute(attribute, operand, raw_line);
                    let attr = self.name(attribute);
                    if let Ok(number) = value.parse::<f64>() {
                        let scaled = self.scale_literal(attribute, number);
                        let var = format!("V{var_counter}");
                        var_counter += 1;
                        atoms.push_str(&format!(
                            ", assigned_value({attr}, {var}, T), {var} {} {scaled}",
                            op.as_str()
                        ));
                    } else {
                        let token = self.name(value);
                        match op {
                            CmpOp::Eq => {
                                atoms.push_str(&format!(", assigned_value({attr}, {token}, T)"));
                            }
                            CmpOp::Ne => {
                                atoms.push_str(&format!(
                                    ", not assigned_value({attr}, {token}, T)"
                                ));
                            }
                            _ => {
                                warn!(
                                    constraint = raw_line,
                                    "ordering on a non-numeric literal cannot be lowered"
                                );
                                return None;
                            }
                        }
                    }
                }
                Condition::Is {
                    event,
                    attribute,
                    value,
                    negated,
                } => {
                    if *event != expected {
                        warn!(
                            constraint = raw_line,
                            "cross-event condition cannot be lowered to ASP"
                        );
                        return None;
                    }
                    self.check_condition_attribute(attribute, operand, raw_line);
                    let attr = self.name(attribute);
                    let token = match value.parse::<f64>() {
                        Ok(number) => self.scale_literal(attribute, number).to_string(),
                        Err(_) => self.name(value),
                    };
                    if *negated {
                        atoms.push_str(&format!(", not assigned_value({attr}, {token}, T)"));
                    } else {
                        atoms.push_str(&format!(", assigned_value({attr}, {token}, T)"));
                    }
                }
                other => {
                    warn!(constraint = raw_line, ?other, "condition leaf not lowerable");
                    return None;
                }
            }
        }
        Some(atoms)
    }

    /// Numeric literals are projected into solver integers with the
    /// attribute's range precision.
    fn scale_literal(&self, attribute: &str, value: f64) -> i64 {
        let precision = self
            .model
            .attribute(attribute)
            .map_or(1, |a| a.domain.range_precision());
        (value * precision as f64).round() as i64
    }

    /// The parser does not verify condition attributes; the translator
    /// reports unresolved or unbound ones.
    fn check_condition_attribute(&self, attribute: &str, operand: &str, raw_line: &str) {
        if self.model.attribute(attribute).is_none() {
            warn!(
                constraint = raw_line,
                attribute, "condition references an undeclared attribute"
            );
            return;
        }
        let bound = self
            .model
            .activity(operand)
            .is_some_and(|a| a.attributes.iter().any(|x| x == attribute));
        if !bound {
            warn!(
                constraint = raw_line,
                attribute,
                activity = operand,
                "condition attribute is not bound to the activity"
            );
        }
    }

    fn emit_activation_bounds(&mut self, bounds: &BTreeMap<String, ActivationBound>) {
        let model = self.model;
        for (raw_line, bound) in bounds {
            let Some(template) = model.template_by_raw_line(raw_line) else {
                warn!(
                    constraint = raw_line.as_str(),
                    "activation bound references an unknown constraint"
                );
                continue;
            };
            let idx = template.index;
            let has_correlation = template.kind.has_correlation();
            let mut targets = vec!["activation_condition"];
            if has_correlation {
                targets.push("correlation_condition");
            }
            for predicate in targets {
                match (bound.lower, bound.upper) {
                    (0, None) => {}
                    (0, Some(upper)) => {
                        self.program.add_directive(format!(
                            ":- #count{{T: trace(A,T), {predicate}({idx},T)}} < {upper}."
                        ));
                    }
                    (lower, None) => {
                        self.program.add_directive(format!(
                            ":- #count{{T: trace(A,T), {predicate}({idx},T)}} > {lower}."
                        ));
                    }
                    (lower, Some(upper)) => {
                        self.program.add_directive(format!(
                            ":- #count{{T: trace(A,T), {predicate}({idx},T)}} < {lower}."
                        ));
                        self.program.add_directive(format!(
                            ":- #count{{T: trace(A,T), {predicate}({idx},T)}} > {upper}."
                        ));
                    }
                }
            }
        }
    }
}

/// Replace `in {…}` leaves by `is` chains so the DNF only carries leaves
/// with a direct ASP form.
fn expand_in(condition: Condition) -> Condition {
    match condition {
        Condition::In {
            event,
            attribute,
            values,
            negated,
        } => {
            let mut leaves = values.into_iter().map(|value| Condition::Is {
                event,
                attribute: attribute.clone(),
                value,
                negated,
            });
            let Some(first) = leaves.next() else {
                // empty set: reported at lowering time
                return Condition::In {
                    event,
                    attribute,
                    values: Vec::new(),
                    negated,
                };
            };
            leaves.fold(first, |acc, leaf| {
                if negated {
                    Condition::And(Box::new(acc), Box::new(leaf))
                } else {
                    Condition::Or(Box::new(acc), Box::new(leaf))
                }
            })
        }
        Condition::And(l, r) => Condition::And(Box::new(expand_in(*l)), Box::new(expand_in(*r))),
        Condition::Or(l, r) => Condition::Or(Box::new(expand_in(*l)), Box::new(expand_in(*r))),
        Condition::Not(inner) => Condition::Not(Box::new(expand_in(*inner))),
        leaf => leaf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_model;

    fn program_for(model_text: &str) -> (DeclareModel, AspProgram) {
        let mut model = parse_model(model_text);
        let program = translate(&mut model, true, None, &BTreeMap::new());
        (model, program)
    }

    #[test]
    fn test_basic_facts() {
        let (_, program) = program_for("activity a\nactivity b\nResponse[a, b]\n");
        let text = program.to_program_string();
        assert!(text.contains("activity(a)."));
        assert!(text.contains("activity(b)."));
        assert!(text.contains("template(0, response, a, b)."));
        assert!(text.contains("activation_condition(0,T) :- trace(a,T)."));
        assert!(text.contains("correlation_condition(0,T) :- trace(b,T)."));
        assert!(text.contains("time(1..t)."));
    }

    #[test]
    fn test_cardinality_fact() {
        let (_, program) = program_for("activity a\nExistence2[a]\n");
        assert!(program.to_program_string().contains("cardinality(0, 2)."));
    }

    #[test]
    fn test_precedence_activation_is_second_operand() {
        let (_, program) = program_for("activity a\nactivity b\nPrecedence[a, b]\n");
        let text = program.to_program_string();
        assert!(text.contains("activation_condition(0,T) :- trace(b,T)."));
        assert!(text.contains("correlation_condition(0,T) :- trace(a,T)."));
    }

    #[test]
    fn test_identifier_encoding() {
        let (model, program) = program_for("activity Apply\nInit[Apply]\n");
        let text = program.to_program_string();
        assert!(!text.contains("activity(Apply)."));
        assert_eq!(model.encoding.decode("enc0"), "Apply");
        assert!(text.contains("activity(enc0)."));
        assert!(text.contains("template(0, init, enc0)."));
    }

    #[test]
    fn test_range_scaling() {
        let (_, program) =
            program_for("activity a\nbind a: price\nprice: float between 0.5 and 2.25\n");
        let text = program.to_program_string();
        assert!(text.contains("value(price, 50..225)."));
        assert!(text.contains("has_attribute(a, price)."));
    }

    #[test]
    fn test_enumeration_values() {
        let (_, program) = program_for("activity a\nbind a: cat\ncat: c1, c2\n");
        let text = program.to_program_string();
        assert!(text.contains("value(cat, c1)."));
        assert!(text.contains("value(cat, c2)."));
    }

    #[test]
    fn test_activation_condition_lowering() {
        let (_, program) = program_for(
            "activity a\nactivity b\nbind a: grade\ngrade: integer between 0 and 100\nResponse[a, b] | A.grade > 50 | |",
        );
        let text = program.to_program_string();
        assert!(text.contains(
            "activation_condition(0,T) :- trace(a,T), assigned_value(grade, V0, T), V0 > 50."
        ));
    }

    #[test]
    fn test_disjunctive_condition_becomes_two_rules() {
        let (_, program) = program_for(
            "activity a\nactivity b\nbind a: cat\ncat: c1, c2, c3\nResponse[a, b] | A.cat is c1 or A.cat is c2 | |",
        );
        let text = program.to_program_string();
        assert!(
            text.contains("activation_condition(0,T) :- trace(a,T), assigned_value(cat, c1, T).")
        );
        assert!(
            text.contains("activation_condition(0,T) :- trace(a,T), assigned_value(cat, c2, T).")
        );
    }

    #[test]
    fn test_choice_family_reads_condition_predicates() {
        let (_, program) = program_for(
            "activity a\nactivity b\nbind a: grade\ngrade: integer between 0 and 100\nChoice[a, b] | A.grade > 50 | |",
        );
        let text = program.to_program_string();
        assert!(text.contains(
            "activation_condition(0,T) :- trace(a,T), assigned_value(grade, V0, T), V0 > 50."
        ));
        assert!(text.contains("correlation_condition(0,T) :- trace(b,T)."));
        // the static choice rules are gated on the condition predicates,
        // never on raw trace occurrence
        assert!(text
            .contains("choice_ok(I) :- template(I, choice, A, B), activation_condition(I,T)."));
        assert!(text
            .contains("choice_ok(I) :- template(I, choice, A, B), correlation_condition(I,T)."));
        assert!(text.contains("bad(I) :- template(I, choice, A, B), not choice_ok(I)."));
        assert!(text.contains(
            "bad(I) :- template(I, exclusive_choice, A, B), activation_condition(I,T1), correlation_condition(I,T2)."
        ));
        assert!(!text.contains("occurs("));
    }

    #[test]
    fn test_violate_all_emits_violated_facts() {
        let model = parse_model("activity a\nExistence[a]\nInit[a]\n");
        let mut negated = model.with_violations(true, &[]);
        let program = translate(
            &mut negated,
            true,
            Some(ViolationDirectives { violate_all: true }),
            &BTreeMap::new(),
        );
        let text = program.to_program_string();
        assert!(text.contains("violated(0)."));
        assert!(text.contains("violated(1)."));
    }

    #[test]
    fn test_partial_violation_uses_choice_rule() {
        let model = parse_model("activity a\nExistence[a]\nInit[a]\n");
        let mut negated = model.with_violations(false, &["Init[a]".to_string()]);
        let program = translate(
            &mut negated,
            true,
            Some(ViolationDirectives { violate_all: false }),
            &BTreeMap::new(),
        );
        let text = program.to_program_string();
        assert!(text.contains("violatable(1)."));
        assert!(text.contains("{ violated(I) : violatable(I) }."));
        assert!(text.contains(":- #count{ I : violated(I) } = 0."));
        assert!(!text.contains("violated(0)."));
    }

    #[test]
    fn test_activation_bounds_corrected_interval() {
        let mut model = parse_model("activity a\nactivity b\nResponse[a, b]\n");
        let bounds = BTreeMap::from([(
            "Response[a, b]".to_string(),
            ActivationBound {
                lower: 2,
                upper: Some(4),
            },
        )]);
        let program = translate(&mut model, true, None, &bounds);
        let directives = program.directives.join("\n");
        assert!(directives.contains(":- #count{T: trace(A,T), activation_condition(0,T)} < 2."));
        assert!(directives.contains(":- #count{T: trace(A,T), activation_condition(0,T)} > 4."));
        assert!(directives.contains(":- #count{T: trace(A,T), correlation_condition(0,T)} < 2."));
        assert!(directives.contains(":- #count{T: trace(A,T), correlation_condition(0,T)} > 4."));
    }

    #[test]
    fn test_activation_bound_unbounded_upper() {
        let mut model = parse_model("activity a\nExistence[a]\n");
        let bounds = BTreeMap::from([(
            "Existence[a]".to_string(),
            ActivationBound {
                lower: 3,
                upper: None,
            },
        )]);
        let program = translate(&mut model, true, None, &bounds);
        let directives = program.directives.join("\n");
        assert!(directives.contains(":- #count{T: trace(A,T), activation_condition(0,T)} > 3."));
        // unary template: no correlation directive
        assert!(!directives.contains("correlation_condition"));
    }
}
