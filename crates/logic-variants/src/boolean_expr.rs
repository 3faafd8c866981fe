use logic_cache::Snapshot;
use logic_core::Value;
use logic_events::Timestamp;
use logic_expr::{Combiner, Predicate};

use crate::contract::{eval_predicates, EvalResult};

/// Combines N per-source predicates via a logic operator (spec §3,
/// §4.D.1, §4.E "BooleanExpr").
#[derive(Clone, Debug)]
pub struct BooleanExprVariant {
    pub combiner: Combiner,
    pub predicates: Vec<Predicate>,
}

impl BooleanExprVariant {
    pub fn evaluate(&self, sources: &[Snapshot], out: &mut Value, _now: Timestamp) -> EvalResult {
        match resolve(self.combiner, &self.predicates, sources) {
            Ok(state) => write_bool(out, state),
            Err(_) => EvalResult::Error,
        }
    }
}

/// Shared by [`BooleanExprVariant`] and the boolean half of `ElapsedTime`.
pub(crate) fn resolve(
    combiner: Combiner,
    predicates: &[Predicate],
    sources: &[Snapshot],
) -> Result<bool, logic_expr::ExprError> {
    let results = eval_predicates(predicates, sources);
    combiner.combine(&results)
}

pub(crate) fn write_bool(out: &mut Value, state: bool) -> EvalResult {
    let previous = out.as_bool().ok();
    out.set_bool(state).expect("BooleanExpr descriptor must declare value_type Bool");
    if previous == Some(state) {
        EvalResult::Unchanged
    } else {
        EvalResult::NewValue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logic_core::ValueType;
    use logic_expr::{Comparison, Literal, Operand};

    fn open_snapshot(open: bool) -> Snapshot {
        let mut v = Value::new_for_type(ValueType::String);
        v.set_string(if open { "open" } else { "closed" }).unwrap();
        Snapshot { value: Some(v), timestamp: None, error: false, changed_this_tick: true }
    }

    #[test]
    fn and_of_two_open_doors() {
        let variant = BooleanExprVariant {
            combiner: Combiner::And,
            predicates: vec![
                Predicate::new(Comparison::Equal(Operand::Literal(Literal::Str("open".into())))),
                Predicate::new(Comparison::Equal(Operand::Literal(Literal::Str("open".into())))),
            ],
        };
        let mut out = Value::new_for_type(ValueType::Bool);
        let sources = [open_snapshot(true), open_snapshot(true)];
        assert_eq!(variant.evaluate(&sources, &mut out, Timestamp::ZERO), EvalResult::NewValue);
        assert!(out.as_bool().unwrap());

        let sources = [open_snapshot(true), open_snapshot(false)];
        let result = variant.evaluate(&sources, &mut out, Timestamp::ZERO);
        assert_eq!(result, EvalResult::NewValue);
        assert!(!out.as_bool().unwrap());
    }

    #[test]
    fn errored_source_propagates_as_error() {
        let variant = BooleanExprVariant {
            combiner: Combiner::And,
            predicates: vec![
                Predicate::new(Comparison::Equal(Operand::Literal(Literal::Str("open".into())))),
                Predicate::new(Comparison::Equal(Operand::Literal(Literal::Str("open".into())))),
            ],
        };
        let mut out = Value::new_for_type(ValueType::Bool);
        let sources =
            [open_snapshot(true), Snapshot { value: None, timestamp: None, error: true, changed_this_tick: true }];
        assert_eq!(variant.evaluate(&sources, &mut out, Timestamp::ZERO), EvalResult::Error);
    }
}
