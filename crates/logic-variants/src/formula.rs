use logic_cache::Snapshot;
use logic_core::{Value, ValueType};
use logic_events::Timestamp;
use logic_expr::{Formula, NumValue};

use crate::contract::{numeric_of, EvalResult};

/// A compiled arithmetic formula, rebuilt whenever `source_text` changes
/// (spec §3, §4.D.2, §4.E "Formula").
#[derive(Clone, Debug)]
pub struct FormulaVariant {
    pub formula: Formula,
    pub result_type: ValueType,
}

impl FormulaVariant {
    pub fn evaluate(&self, sources: &[Snapshot], out: &mut Value, _now: Timestamp) -> EvalResult {
        let mut refs = Vec::with_capacity(sources.len());
        for snapshot in sources {
            match numeric_of(snapshot) {
                Some(v) => refs.push(v),
                None => return EvalResult::Error,
            }
        }

        match self.formula.eval(&refs, self.result_type) {
            Ok(value) => write_numeric(out, self.result_type, value),
            Err(_) => EvalResult::Error,
        }
    }
}

pub(crate) fn write_numeric(out: &mut Value, result_type: ValueType, value: NumValue) -> EvalResult {
    match result_type {
        ValueType::U32 => {
            let v = value.as_f64() as u32;
            let previous = out.as_u32().ok();
            out.set_u32(v).expect("numeric variant's out must match its declared value_type");
            if previous == Some(v) { EvalResult::Unchanged } else { EvalResult::NewValue }
        }
        ValueType::I32 => {
            let v = value.as_f64() as i32;
            let previous = out.as_i32().ok();
            out.set_i32(v).expect("numeric variant's out must match its declared value_type");
            if previous == Some(v) { EvalResult::Unchanged } else { EvalResult::NewValue }
        }
        ValueType::F64 => {
            let v = value.as_f64();
            let previous = out.as_f64().ok();
            out.set_f64(v).expect("numeric variant's out must match its declared value_type");
            if previous == Some(v) { EvalResult::Unchanged } else { EvalResult::NewValue }
        }
        _ => EvalResult::Error,
    }
}
