//! The boolean predicate kernel (spec §4.D.1): one predicate evaluates
//! against a single upstream field value; a combining operator folds the
//! per-source results of a `BooleanExpr`/`ElapsedTime`/`OnCounter` field.

use crate::error::ExprError;
use logic_core::{Value, ValueType};
use regex::Regex;

/// A typed literal used as the right-hand side of a comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// The right-hand side of a comparison: either a literal or a reference
/// to another source in the same field's `sources` list.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Literal(Literal),
    FieldRef(usize),
}

/// A single comparison, evaluated against the subject value (coerced from
/// the operand) and optionally inverted by `negate`.
#[derive(Clone, Debug, PartialEq)]
pub enum Comparison {
    Equal(Operand),
    NotEqual(Operand),
    Less(Operand),
    Greater(Operand),
    LessOrEqual(Operand),
    GreaterOrEqual(Operand),
    MatchesRegex(String),
    WithinRange(Operand, Operand),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub comparison: Comparison,
    pub negate: bool,
}

/// How the per-source boolean results of a `BooleanExpr`/`ElapsedTime`/
/// `OnCounter` field are folded into one value (spec §4.D.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Combiner {
    And,
    Or,
    Xor,
    Nand,
    Nor,
    Xnor,
}

impl Predicate {
    pub fn new(comparison: Comparison) -> Self {
        Self { comparison, negate: false }
    }

    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    /// Evaluates this predicate against `subject` (the upstream field's
    /// current value) using `sources` to resolve any `Operand::FieldRef`.
    pub fn eval(&self, subject: &Value, sources: &[Value]) -> Result<bool, ExprError> {
        if subject.is_error() {
            return Err(ExprError::UpstreamError);
        }
        let raw = match &self.comparison {
            Comparison::Equal(op) => compare_eq(subject, op, sources)?,
            Comparison::NotEqual(op) => !compare_eq(subject, op, sources)?,
            Comparison::Less(op) => compare_ord(subject, op, sources)?.is_lt(),
            Comparison::Greater(op) => compare_ord(subject, op, sources)?.is_gt(),
            Comparison::LessOrEqual(op) => compare_ord(subject, op, sources)?.is_le(),
            Comparison::GreaterOrEqual(op) => compare_ord(subject, op, sources)?.is_ge(),
            Comparison::MatchesRegex(pattern) => matches_regex(subject, pattern)?,
            Comparison::WithinRange(low, high) => within_range(subject, low, high, sources)?,
        };
        Ok(raw ^ self.negate)
    }
}

fn resolve(op: &Operand, sources: &[Value]) -> Result<Literal, ExprError> {
    match op {
        Operand::Literal(lit) => Ok(lit.clone()),
        Operand::FieldRef(idx) => {
            let v = sources.get(*idx).ok_or(ExprError::LiteralCoercion)?;
            if v.is_error() {
                return Err(ExprError::UpstreamError);
            }
            value_to_literal(v)
        }
    }
}

fn value_to_literal(v: &Value) -> Result<Literal, ExprError> {
    Ok(match v.value_type() {
        ValueType::Bool => Literal::Bool(v.as_bool().map_err(|_| ExprError::LiteralCoercion)?),
        ValueType::U32 => Literal::Int(v.as_u32().map_err(|_| ExprError::LiteralCoercion)? as i64),
        ValueType::I32 => Literal::Int(v.as_i32().map_err(|_| ExprError::LiteralCoercion)? as i64),
        ValueType::F64 => Literal::Float(v.as_f64().map_err(|_| ExprError::LiteralCoercion)?),
        ValueType::String => {
            Literal::Str(v.as_str().map_err(|_| ExprError::LiteralCoercion)?.to_string())
        }
        ValueType::StringList | ValueType::Instant => return Err(ExprError::LiteralCoercion),
    })
}

/// Coerces `subject` and a literal into a common comparable form. Numeric
/// subjects coerce string literals by parsing; string subjects coerce
/// numeric literals via display formatting.
fn compare_eq(subject: &Value, op: &Operand, sources: &[Value]) -> Result<bool, ExprError> {
    let lit = resolve(op, sources)?;
    Ok(match subject.value_type() {
        ValueType::Bool => subject.as_bool().unwrap() == as_bool(&lit)?,
        ValueType::U32 => subject.as_u32().unwrap() as i64 == as_int(&lit)?,
        ValueType::I32 => subject.as_i32().unwrap() as i64 == as_int(&lit)?,
        ValueType::F64 => (subject.as_f64().unwrap() - as_float(&lit)?).abs() < f64::EPSILON,
        ValueType::String => subject.as_str().unwrap() == as_str(&lit),
        ValueType::StringList | ValueType::Instant => return Err(ExprError::LiteralCoercion),
    })
}

fn compare_ord(
    subject: &Value,
    op: &Operand,
    sources: &[Value],
) -> Result<std::cmp::Ordering, ExprError> {
    let lit = resolve(op, sources)?;
    Ok(match subject.value_type() {
        ValueType::U32 => (subject.as_u32().unwrap() as i64).cmp(&as_int(&lit)?),
        ValueType::I32 => (subject.as_i32().unwrap() as i64).cmp(&as_int(&lit)?),
        ValueType::F64 => subject
            .as_f64()
            .unwrap()
            .partial_cmp(&as_float(&lit)?)
            .ok_or(ExprError::LiteralCoercion)?,
        ValueType::String => subject.as_str().unwrap().cmp(as_str(&lit)),
        ValueType::Bool | ValueType::StringList | ValueType::Instant => {
            return Err(ExprError::LiteralCoercion)
        }
    })
}

fn within_range(
    subject: &Value,
    low: &Operand,
    high: &Operand,
    sources: &[Value],
) -> Result<bool, ExprError> {
    let low_ord = compare_ord(subject, low, sources)?;
    let high_ord = compare_ord(subject, high, sources)?;
    Ok(!low_ord.is_lt() && !high_ord.is_gt())
}

fn matches_regex(subject: &Value, pattern: &str) -> Result<bool, ExprError> {
    if subject.value_type() != ValueType::String {
        return Err(ExprError::RegexRequiresString);
    }
    let re = Regex::new(pattern).map_err(|e| ExprError::InvalidRegex(e.to_string()))?;
    Ok(re.is_match(subject.as_str().unwrap()))
}

fn as_bool(lit: &Literal) -> Result<bool, ExprError> {
    match lit {
        Literal::Bool(b) => Ok(*b),
        _ => Err(ExprError::LiteralCoercion),
    }
}

fn as_int(lit: &Literal) -> Result<i64, ExprError> {
    match lit {
        Literal::Int(v) => Ok(*v),
        Literal::Float(v) => Ok(*v as i64),
        _ => Err(ExprError::LiteralCoercion),
    }
}

fn as_float(lit: &Literal) -> Result<f64, ExprError> {
    match lit {
        Literal::Int(v) => Ok(*v as f64),
        Literal::Float(v) => Ok(*v),
        _ => Err(ExprError::LiteralCoercion),
    }
}

fn as_str(lit: &Literal) -> &str {
    match lit {
        Literal::Str(s) => s.as_str(),
        _ => "",
    }
}

impl Combiner {
    /// Folds per-source predicate results. Any `Err` propagates — the
    /// combiner never "votes around" an errored source (spec §4.D.1: "If
    /// any source's predicate errored, the combined result is an error").
    pub fn combine(self, results: &[Result<bool, ExprError>]) -> Result<bool, ExprError> {
        let mut bools = Vec::with_capacity(results.len());
        for r in results {
            bools.push(*r.as_ref().map_err(|e| e.clone())?);
        }
        Ok(match self {
            Combiner::And => bools.iter().all(|b| *b),
            Combiner::Or => bools.iter().any(|b| *b),
            Combiner::Xor => bools.iter().filter(|b| **b).count() == 1,
            Combiner::Nand => !bools.iter().all(|b| *b),
            Combiner::Nor => !bools.iter().any(|b| *b),
            Combiner::Xnor => bools.iter().all(|b| *b == bools[0]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_value(s: &str) -> Value {
        let mut v = Value::new_for_type(ValueType::String);
        v.set_string(s).unwrap();
        v
    }

    #[test]
    fn equal_literal_string() {
        let subject = string_value("open");
        let pred = Predicate::new(Comparison::Equal(Operand::Literal(Literal::Str(
            "open".into(),
        ))));
        assert!(pred.eval(&subject, &[]).unwrap());
    }

    #[test]
    fn negate_flips_result() {
        let subject = string_value("open");
        let pred = Predicate::new(Comparison::Equal(Operand::Literal(Literal::Str(
            "closed".into(),
        ))))
        .negated();
        assert!(pred.eval(&subject, &[]).unwrap());
    }

    #[test]
    fn errored_subject_is_an_error() {
        let mut subject = string_value("open");
        subject.set_error(true);
        let pred = Predicate::new(Comparison::Equal(Operand::Literal(Literal::Str(
            "open".into(),
        ))));
        assert!(matches!(pred.eval(&subject, &[]), Err(ExprError::UpstreamError)));
    }

    #[test]
    fn and_requires_all_true() {
        let results = [Ok(true), Ok(true), Ok(false)];
        assert!(!Combiner::And.combine(&results).unwrap());
    }

    #[test]
    fn xor_requires_exactly_one() {
        assert!(Combiner::Xor.combine(&[Ok(true), Ok(false), Ok(false)]).unwrap());
        assert!(!Combiner::Xor.combine(&[Ok(true), Ok(true), Ok(false)]).unwrap());
    }

    #[test]
    fn combiner_propagates_error_from_any_source() {
        let results = [Ok(true), Err(ExprError::UpstreamError)];
        assert!(matches!(Combiner::Or.combine(&results), Err(ExprError::UpstreamError)));
    }

    #[test]
    fn within_range_numeric() {
        let mut subject = Value::new_for_type(ValueType::I32);
        subject.set_i32(5).unwrap();
        let pred = Predicate::new(Comparison::WithinRange(
            Operand::Literal(Literal::Int(0)),
            Operand::Literal(Literal::Int(10)),
        ));
        assert!(pred.eval(&subject, &[]).unwrap());

        let mut out_of_range = Value::new_for_type(ValueType::I32);
        out_of_range.set_i32(20).unwrap();
        assert!(!pred.eval(&out_of_range, &[]).unwrap());
    }
}
