use std::time::Duration;

use logic_cache::Snapshot;
use logic_core::Value;
use logic_events::Timestamp;
use logic_expr::{Combiner, Predicate};

use crate::boolean_expr::resolve;
use crate::contract::EvalResult;

/// `BooleanExpr` plus an accumulator that runs while the combined
/// predicate is true (spec §3, §4.E "ElapsedTime").
#[derive(Clone, Debug)]
pub struct ElapsedTimeVariant {
    pub combiner: Combiner,
    pub predicates: Vec<Predicate>,
    pub auto_reset: bool,
    pub accumulated: Duration,
    pub last_tick_timestamp: Option<Timestamp>,
    pub previous_state: bool,
}

impl ElapsedTimeVariant {
    /// Zeroes the accumulator, for the `ResetElapsed` client command
    /// (spec §6).
    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
    }

    pub fn evaluate(&mut self, sources: &[Snapshot], out: &mut Value, now: Timestamp) -> EvalResult {
        let state = match resolve(self.combiner, &self.predicates, sources) {
            Ok(state) => state,
            Err(_) => return EvalResult::Error,
        };

        if state {
            if self.auto_reset && !self.previous_state {
                // The false->true transition restarts both the
                // accumulator and its time anchor, so this tick
                // contributes zero elapsed time rather than the span
                // since the last (false) tick.
                self.accumulated = Duration::ZERO;
                self.last_tick_timestamp = Some(now);
            }
            let elapsed_nanos = self
                .last_tick_timestamp
                .map(|prev| now.saturating_since(prev))
                .unwrap_or(0);
            self.accumulated += Duration::from_nanos(elapsed_nanos);
        }
        self.last_tick_timestamp = Some(now);
        self.previous_state = state;

        let previous = out.as_instant().ok();
        out.set_instant(self.accumulated)
            .expect("ElapsedTime descriptor must declare value_type Instant");
        if previous == Some(self.accumulated) {
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

    fn state_snapshot(on: bool) -> Snapshot {
        let mut v = Value::new_for_type(ValueType::Bool);
        v.set_bool(on).unwrap();
        Snapshot { value: Some(v), timestamp: None, error: false, changed_this_tick: true }
    }

    #[test]
    fn auto_reset_zeroes_on_false_to_true_transition() {
        let mut variant = ElapsedTimeVariant {
            combiner: Combiner::And,
            predicates: vec![Predicate::new(Comparison::Equal(Operand::Literal(Literal::Bool(
                true,
            ))))],
            auto_reset: true,
            accumulated: Duration::ZERO,
            last_tick_timestamp: None,
            previous_state: false,
        };
        let mut out = Value::new_for_type(ValueType::Instant);

        // true 0..30s
        variant.evaluate(&[state_snapshot(true)], &mut out, Timestamp(0));
        variant.evaluate(&[state_snapshot(true)], &mut out, Timestamp(30_000_000_000));
        // false at 30s
        variant.evaluate(&[state_snapshot(false)], &mut out, Timestamp(30_000_000_000));
        // true again at 60s for 10s
        variant.evaluate(&[state_snapshot(true)], &mut out, Timestamp(60_000_000_000));
        variant.evaluate(&[state_snapshot(true)], &mut out, Timestamp(70_000_000_000));

        assert_eq!(out.as_instant().unwrap(), Duration::from_secs(10));
    }
}
