//! The shared evaluation contract every variant implements (spec §4.E).

use logic_cache::Snapshot;
use logic_core::{Value, ValueType};
use logic_expr::{ExprError, Predicate};

/// Outcome of one `evaluate` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvalResult {
    Error,
    NewValue,
    Unchanged,
}

/// Builds one [`Value`] per snapshot, suitable as the `sources` context
/// passed to [`logic_expr::Predicate::eval`]. An errored or missing
/// snapshot becomes a placeholder in the error state — any `FieldRef`
/// resolving to it trips `ExprError::UpstreamError` before its payload
/// is ever inspected.
pub fn subject_values(snapshots: &[Snapshot]) -> Vec<Value> {
    snapshots
        .iter()
        .map(|s| match (&s.value, s.error) {
            (Some(v), false) => v.clone(),
            _ => {
                let mut placeholder = Value::new_for_type(ValueType::Bool);
                placeholder.set_error(true);
                placeholder
            }
        })
        .collect()
}

/// Coerces a snapshot's value to `f64` for arithmetic variants. Returns
/// `None` on an errored snapshot or a non-numeric value type.
pub fn numeric_of(snapshot: &Snapshot) -> Option<f64> {
    if snapshot.error {
        return None;
    }
    let v = snapshot.value.as_ref()?;
    match v.value_type() {
        ValueType::U32 => v.as_u32().ok().map(|x| x as f64),
        ValueType::I32 => v.as_i32().ok().map(|x| x as f64),
        ValueType::F64 => v.as_f64().ok(),
        ValueType::Bool => v.as_bool().ok().map(|b| if b { 1.0 } else { 0.0 }),
        ValueType::String | ValueType::StringList | ValueType::Instant => None,
    }
}

/// Evaluates one predicate per snapshot against the full set of subject
/// values (so `Operand::FieldRef` can compare sibling sources). Shared by
/// `BooleanExpr`, `ElapsedTime`, and `OnCounter` (spec §4.D.1, §4.E).
pub fn eval_predicates(
    predicates: &[Predicate],
    snapshots: &[Snapshot],
) -> Vec<Result<bool, ExprError>> {
    let values = subject_values(snapshots);
    predicates
        .iter()
        .zip(values.iter())
        .map(|(pred, subject)| pred.eval(subject, &values))
        .collect()
}
