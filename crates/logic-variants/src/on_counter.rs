use logic_cache::Snapshot;
use logic_core::Value;
use logic_events::Timestamp;
use logic_expr::Predicate;

use crate::contract::{eval_predicates, EvalResult};

/// Counts sources whose predicate is true, optionally inverted (spec §3,
/// §4.E "OnCounter").
#[derive(Clone, Debug)]
pub struct OnCounterVariant {
    pub predicates: Vec<Predicate>,
    pub invert: bool,
}

impl OnCounterVariant {
    pub fn evaluate(&self, sources: &[Snapshot], out: &mut Value, _now: Timestamp) -> EvalResult {
        let results = eval_predicates(&self.predicates, sources);
        let mut true_count = 0u32;
        for result in &results {
            match result {
                Ok(true) => true_count += 1,
                Ok(false) => {}
                Err(_) => return EvalResult::Error,
            }
        }
        let count = if self.invert { self.predicates.len() as u32 - true_count } else { true_count };

        let previous = out.as_u32().ok();
        out.set_u32(count).expect("OnCounter descriptor must declare value_type U32");
        if previous == Some(count) {
            EvalResult::Unchanged
        } else {
            EvalResult::NewValue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logic_core::ValueType;
    use logic_expr::{Comparison, Literal, Operand};

    fn bool_snapshot(v: bool) -> Snapshot {
        let mut value = Value::new_for_type(ValueType::Bool);
        value.set_bool(v).unwrap();
        Snapshot { value: Some(value), timestamp: None, error: false, changed_this_tick: true }
    }

    #[test]
    fn counts_true_predicates() {
        let variant = OnCounterVariant {
            predicates: vec![
                Predicate::new(Comparison::Equal(Operand::Literal(Literal::Bool(true)))),
                Predicate::new(Comparison::Equal(Operand::Literal(Literal::Bool(true)))),
                Predicate::new(Comparison::Equal(Operand::Literal(Literal::Bool(true)))),
            ],
            invert: false,
        };
        let mut out = Value::new_for_type(ValueType::U32);
        let sources = [bool_snapshot(true), bool_snapshot(false), bool_snapshot(true)];
        variant.evaluate(&sources, &mut out, Timestamp::ZERO);
        assert_eq!(out.as_u32().unwrap(), 2);
    }

    #[test]
    fn invert_counts_false_instead() {
        let variant = OnCounterVariant {
            predicates: vec![
                Predicate::new(Comparison::Equal(Operand::Literal(Literal::Bool(true)))),
                Predicate::new(Comparison::Equal(Operand::Literal(Literal::Bool(true)))),
            ],
            invert: true,
        };
        let mut out = Value::new_for_type(ValueType::U32);
        let sources = [bool_snapshot(true), bool_snapshot(false)];
        variant.evaluate(&sources, &mut out, Timestamp::ZERO);
        assert_eq!(out.as_u32().unwrap(), 1);
    }
}
