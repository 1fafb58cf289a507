//! # Constraint Condition Predicates
//!
//! Small boolean expression language used by the activation, correlation and
//! time segments of a constraint template:
//!
//! ```text
//! A.grade > 50
//! A.category in {c1, c2} and not T.org:group is admin
//! T.points <= 3.5 or A.mark != 10
//! ```
//!
//! `A.` refers to the activation event, `T.` to the correlated target event
//! of a binary template. Comparisons are numeric when both sides parse as
//! numbers and lexical otherwise. The time segment uses its own interval
//! form `lo,hi,unit` bounding the gap between activation and target.
//!
//! A condition that fails to parse raises [`ConditionSyntaxError`]; the
//! checker reports it once per constraint and drops the constraint from the
//! verdict map.

use crate::event_log::Event;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Condition parse failure. Carries the offending source so the checker can
/// report it once per distinct constraint line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("condition '{condition}' is not properly formatted: {message}")]
pub struct ConditionSyntaxError {
    pub condition: String,
    pub message: String,
}

impl ConditionSyntaxError {
    fn new(condition: &str, message: impl Into<String>) -> Self {
        Self {
            condition: condition.to_string(),
            message: message.into(),
        }
    }
}

/// Which event a predicate inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventRef {
    /// `A.` - the activation event.
    Activation,
    /// `T.` - the target event of a binary template.
    Target,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// Logical complement, used when pushing `not` down to the leaves.
    pub fn inverted(self) -> Self {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Ge => CmpOp::Lt,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// Parsed condition expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// `A.attr <op> literal`
    Compare {
        event: EventRef,
        attribute: String,
        op: CmpOp,
        value: String,
    },
    /// `A.attr in {v1, v2}` / `A.attr not in {v1, v2}`
    In {
        event: EventRef,
        attribute: String,
        values: Vec<String>,
        negated: bool,
    },
    /// `A.attr is literal` / `A.attr is not literal`
    Is {
        event: EventRef,
        attribute: String,
        value: String,
        negated: bool,
    },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    /// Evaluate against an activation event and (for correlation predicates)
    /// the target event. A reference to a missing event or attribute makes
    /// the predicate false.
    pub fn eval(&self, activation: &Event, target: Option<&Event>) -> bool {
        match self {
            Condition::Compare {
                event,
                attribute,
                op,
                value,
            } => resolve(*event, attribute, activation, target)
                .is_some_and(|actual| compare(actual, *op, value)),
            Condition::In {
                event,
                attribute,
                values,
                negated,
            } => {
                let matched = resolve(*event, attribute, activation, target)
                    .is_some_and(|actual| values.iter().any(|v| v == actual));
                matched != *negated
            }
            Condition::Is {
                event,
                attribute,
                value,
                negated,
            } => {
                let matched = resolve(*event, attribute, activation, target)
                    .is_some_and(|actual| actual == value);
                matched != *negated
            }
            Condition::And(left, right) => {
                left.eval(activation, target) && right.eval(activation, target)
            }
            Condition::Or(left, right) => {
                left.eval(activation, target) || right.eval(activation, target)
            }
            Condition::Not(inner) => !inner.eval(activation, target),
        }
    }

    /// Disjunctive normal form: a list of conjunctions of leaf predicates.
    /// `not` is pushed down to the leaves via De Morgan.
    pub fn to_dnf(&self) -> Vec<Vec<Condition>> {
        match self {
            Condition::And(left, right) => {
                let lhs = left.to_dnf();
                let rhs = right.to_dnf();
                let mut out = Vec::with_capacity(lhs.len() * rhs.len());
                for l in &lhs {
                    for r in &rhs {
                        let mut conj = l.clone();
                        conj.extend(r.iter().cloned());
                        out.push(conj);
                    }
                }
                out
            }
            Condition::Or(left, right) => {
                let mut out = left.to_dnf();
                out.extend(right.to_dnf());
                out
            }
            Condition::Not(inner) => match inner.as_ref() {
                Condition::Not(nested) => nested.to_dnf(),
                Condition::And(left, right) => Condition::Or(
                    Box::new(Condition::Not(left.clone())),
                    Box::new(Condition::Not(right.clone())),
                )
                .to_dnf(),
                Condition::Or(left, right) => Condition::And(
                    Box::new(Condition::Not(left.clone())),
                    Box::new(Condition::Not(right.clone())),
                )
                .to_dnf(),
                leaf => vec![vec![leaf.clone().inverted_leaf()]],
            },
            leaf => vec![vec![leaf.clone()]],
        }
    }

    fn inverted_leaf(self) -> Condition {
        match self {
            Condition::Compare {
                event,
                attribute,
                op,
                value,
            } => Condition::Compare {
                event,
                attribute,
                op: op.inverted(),
                value,
            },
            Condition::In {
                event,
                attribute,
                values,
                negated,
            } => Condition::In {
                event,
                attribute,
                values,
                negated: !negated,
            },
            Condition::Is {
                event,
                attribute,
                value,
                negated,
            } => Condition::Is {
                event,
                attribute,
                value,
                negated: !negated,
            },
            other => other,
        }
    }
}

fn resolve<'a>(
    event: EventRef,
    attribute: &str,
    activation: &'a Event,
    target: Option<&'a Event>,
) -> Option<&'a str> {
    match event {
        EventRef::Activation => activation.resource(attribute),
        EventRef::Target => target.and_then(|t| t.resource(attribute)),
    }
}

fn compare(actual: &str, op: CmpOp, expected: &str) -> bool {
    if let (Ok(a), Ok(b)) = (actual.parse::<f64>(), expected.parse::<f64>()) {
        return match op {
            CmpOp::Eq => (a - b).abs() < f64::EPSILON,
            CmpOp::Ne => (a - b).abs() >= f64::EPSILON,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        };
    }
    match op {
        CmpOp::Eq => actual == expected,
        CmpOp::Ne => actual != expected,
        // ordering over non-numeric operands never holds
        _ => false,
    }
}

// ============================================================================
// Time intervals
// ============================================================================

/// Granularity of a time condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn seconds(self) -> i64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => 60,
            TimeUnit::Hours => 3600,
            TimeUnit::Days => 86_400,
        }
    }
}

/// Bound on the temporal gap between an activation and its target:
/// `lo,hi,unit`, e.g. `0,10,m` for "within ten minutes".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub lower: i64,
    pub upper: i64,
    pub unit: TimeUnit,
}

impl TimeInterval {
    /// Whether the (absolute) gap lies inside the interval.
    pub fn contains(&self, gap: Duration) -> bool {
        let seconds = gap.num_seconds().abs();
        let scale = self.unit.seconds();
        seconds >= self.lower * scale && seconds <= self.upper * scale
    }
}

/// Parse a time condition segment. Empty input means "no time constraint".
pub fn parse_time_interval(source: &str) -> Result<Option<TimeInterval>, ConditionSyntaxError> {
    let source = source.trim();
    if source.is_empty() {
        return Ok(None);
    }
    let parts: Vec<&str> = source.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(ConditionSyntaxError::new(
            source,
            "expected 'lower,upper,unit'",
        ));
    }
    let lower = parts[0]
        .parse::<i64>()
        .map_err(|_| ConditionSyntaxError::new(source, "lower bound is not an integer"))?;
    let upper = parts[1]
        .parse::<i64>()
        .map_err(|_| ConditionSyntaxError::new(source, "upper bound is not an integer"))?;
    let unit = match parts[2] {
        "s" => TimeUnit::Seconds,
        "m" => TimeUnit::Minutes,
        "h" => TimeUnit::Hours,
        "d" => TimeUnit::Days,
        other => {
            return Err(ConditionSyntaxError::new(
                source,
                format!("unknown time unit '{other}'"),
            ))
        }
    };
    if lower < 0 || upper < lower {
        return Err(ConditionSyntaxError::new(source, "empty time interval"));
    }
    Ok(Some(TimeInterval { lower, upper, unit }))
}

// ============================================================================
// Parsing
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Op(CmpOp),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    And,
    Or,
    Not,
    In,
    Is,
}

/// Parse a condition segment. Empty input yields `Ok(None)` (no predicate).
pub fn parse_condition(source: &str) -> Result<Option<Condition>, ConditionSyntaxError> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let tokens = tokenize(trimmed)?;
    let mut parser = Parser {
        source: trimmed,
        tokens,
        pos: 0,
    };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(ConditionSyntaxError::new(trimmed, "trailing input"));
    }
    Ok(Some(expr))
}

fn tokenize(source: &str) -> Result<Vec<Token>, ConditionSyntaxError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '{' => {
                tokens.push(Token::LBrace);
                i += 1;
            }
            '}' => {
                tokens.push(Token::RBrace);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' | '!' | '<' | '>' => {
                let next = chars.get(i + 1).copied();
                let (op, len) = match (c, next) {
                    ('=', Some('=')) => (CmpOp::Eq, 2),
                    ('!', Some('=')) => (CmpOp::Ne, 2),
                    ('<', Some('=')) => (CmpOp::Le, 2),
                    ('>', Some('=')) => (CmpOp::Ge, 2),
                    ('<', _) => (CmpOp::Lt, 1),
                    ('>', _) => (CmpOp::Gt, 1),
                    _ => {
                        return Err(ConditionSyntaxError::new(
                            source,
                            format!("unexpected character '{c}'"),
                        ))
                    }
                };
                tokens.push(Token::Op(op));
                i += len;
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Token::Number(chars[start..i].iter().collect()));
            }
            c if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric()
                        || chars[i] == '_'
                        || chars[i] == '.'
                        || chars[i] == ':')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.to_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "is" => Token::Is,
                    _ => Token::Ident(word),
                });
            }
            other => {
                return Err(ConditionSyntaxError::new(
                    source,
                    format!("unexpected character '{other}'"),
                ))
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> ConditionSyntaxError {
        ConditionSyntaxError::new(self.source, message)
    }

    fn parse_or(&mut self) -> Result<Condition, ConditionSyntaxError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Condition, ConditionSyntaxError> {
        let mut left = self.parse_unary()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Condition, ConditionSyntaxError> {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                let inner = self.parse_unary()?;
                Ok(Condition::Not(Box::new(inner)))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.error("missing closing parenthesis")),
                }
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Result<Condition, ConditionSyntaxError> {
        let Some(Token::Ident(qualified)) = self.next() else {
            return Err(self.error("expected an attribute reference"));
        };
        let (event, attribute) = split_event_ref(&qualified)
            .ok_or_else(|| self.error(format!("'{qualified}' is not an A./T. reference")))?;

        match self.next() {
            Some(Token::Op(op)) => {
                let value = self.parse_literal()?;
                Ok(Condition::Compare {
                    event,
                    attribute,
                    op,
                    value,
                })
            }
            Some(Token::Is) => {
                let negated = if matches!(self.peek(), Some(Token::Not)) {
                    self.pos += 1;
                    true
                } else {
                    false
                };
                let value = self.parse_literal()?;
                Ok(Condition::Is {
                    event,
                    attribute,
                    value,
                    negated,
                })
            }
            Some(Token::Not) if matches!(self.peek(), Some(Token::In)) => {
                self.pos += 1;
                let values = self.parse_literal_set()?;
                Ok(Condition::In {
                    event,
                    attribute,
                    values,
                    negated: true,
                })
            }
            Some(Token::In) => {
                let values = self.parse_literal_set()?;
                Ok(Condition::In {
                    event,
                    attribute,
                    values,
                    negated: false,
                })
            }
            _ => Err(self.error("expected a comparison operator, 'is' or 'in'")),
        }
    }

    fn parse_literal(&mut self) -> Result<String, ConditionSyntaxError> {
        match self.next() {
            Some(Token::Ident(v) | Token::Number(v)) => Ok(v),
            _ => Err(self.error("expected a literal")),
        }
    }

    fn parse_literal_set(&mut self) -> Result<Vec<String>, ConditionSyntaxError> {
        let closing = match self.next() {
            Some(Token::LBrace) => Token::RBrace,
            Some(Token::LParen) => Token::RParen,
            _ => return Err(self.error("expected '{' or '(' after 'in'")),
        };
        let mut values = Vec::new();
        loop {
            match self.next() {
                Some(Token::Ident(v) | Token::Number(v)) => values.push(v),
                Some(token) if token == closing && values.is_empty() => break,
                _ => return Err(self.error("expected a literal in value set")),
            }
            match self.next() {
                Some(Token::Comma) => {}
                Some(token) if token == closing => break,
                _ => return Err(self.error("expected ',' or closing bracket")),
            }
        }
        Ok(values)
    }
}

fn split_event_ref(qualified: &str) -> Option<(EventRef, String)> {
    let (prefix, attribute) = qualified.split_once('.')?;
    let event = match prefix {
        "A" | "a" => EventRef::Activation,
        "T" | "t" => EventRef::Target,
        _ => return None,
    };
    if attribute.is_empty() {
        return None;
    }
    Some((event, attribute.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn event(attrs: &[(&str, &str)]) -> Event {
        Event {
            activity: "a".to_string(),
            position: 1,
            resources: attrs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            timestamp: FixedOffset::east_opt(3600)
                .expect("offset")
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .expect("timestamp"),
        }
    }

    #[test]
    fn test_empty_condition_is_none() {
        assert_eq!(parse_condition("   ").expect("parse"), None);
    }

    #[test]
    fn test_numeric_comparison() {
        let cond = parse_condition("A.grade > 50").expect("parse").expect("some");
        assert!(cond.eval(&event(&[("grade", "57")]), None));
        assert!(!cond.eval(&event(&[("grade", "50")]), None));
        assert!(!cond.eval(&event(&[]), None));
    }

    #[test]
    fn test_is_and_in() {
        let cond = parse_condition("A.cat is c1").expect("parse").expect("some");
        assert!(cond.eval(&event(&[("cat", "c1")]), None));
        assert!(!cond.eval(&event(&[("cat", "c2")]), None));

        let cond = parse_condition("A.cat in {c1, c2}")
            .expect("parse")
            .expect("some");
        assert!(cond.eval(&event(&[("cat", "c2")]), None));
        assert!(!cond.eval(&event(&[("cat", "c3")]), None));

        let cond = parse_condition("A.cat not in {c1, c2}")
            .expect("parse")
            .expect("some");
        assert!(cond.eval(&event(&[("cat", "c3")]), None));
    }

    #[test]
    fn test_boolean_connectives() {
        let cond = parse_condition("A.grade > 50 and T.mark <= 3 or A.cat is c1")
            .expect("parse")
            .expect("some");
        let activation = event(&[("grade", "60")]);
        let target = event(&[("mark", "2")]);
        assert!(cond.eval(&activation, Some(&target)));
        // missing target: first conjunct fails, fallback disjunct decides
        assert!(!cond.eval(&activation, None));
    }

    #[test]
    fn test_not_pushdown_in_dnf() {
        let cond = parse_condition("not (A.grade > 50 or A.cat is c1)")
            .expect("parse")
            .expect("some");
        let dnf = cond.to_dnf();
        assert_eq!(dnf.len(), 1);
        assert_eq!(dnf[0].len(), 2);
        assert!(matches!(
            &dnf[0][0],
            Condition::Compare { op: CmpOp::Le, .. }
        ));
        assert!(matches!(&dnf[0][1], Condition::Is { negated: true, .. }));
    }

    #[test]
    fn test_colon_qualified_attribute() {
        let cond = parse_condition("A.org:resource is clerk")
            .expect("parse")
            .expect("some");
        assert!(cond.eval(&event(&[("org:resource", "clerk")]), None));
    }

    #[test]
    fn test_syntax_error() {
        let err = parse_condition("A.grade >").expect_err("must fail");
        assert!(err.message.contains("literal"));
        assert!(parse_condition("grade > 5").is_err());
        assert!(parse_condition("A.grade > 5 extra garbage ?").is_err());
    }

    #[test]
    fn test_time_interval() {
        let interval = parse_time_interval("0,10,m").expect("parse").expect("some");
        assert!(interval.contains(Duration::minutes(5)));
        assert!(interval.contains(Duration::minutes(10)));
        assert!(!interval.contains(Duration::minutes(11)));
        assert_eq!(parse_time_interval("").expect("parse"), None);
        assert!(parse_time_interval("1,2").is_err());
        assert!(parse_time_interval("5,1,s").is_err());
        assert!(parse_time_interval("1,5,w").is_err());
    }
}
