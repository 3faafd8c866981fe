use logic_cache::Snapshot;
use logic_core::{Value, ValueType};
use logic_events::Timestamp;

use crate::contract::numeric_of;
use crate::contract::EvalResult;
use crate::formula::write_numeric;
use logic_expr::NumValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MinMaxMode {
    Min,
    Max,
    Avg,
}

/// Folds numeric snapshots of matching type via `mode` (spec §3, §4.E
/// "MinMaxAvg").
#[derive(Clone, Debug)]
pub struct MinMaxAvgVariant {
    pub mode: MinMaxMode,
    pub result_type: ValueType,
}

impl MinMaxAvgVariant {
    pub fn evaluate(&self, sources: &[Snapshot], out: &mut Value, _now: Timestamp) -> EvalResult {
        let mut values = Vec::with_capacity(sources.len());
        for snapshot in sources {
            match numeric_of(snapshot) {
                Some(v) => values.push(v),
                None => return EvalResult::Error,
            }
        }
        if values.is_empty() {
            return EvalResult::Error;
        }

        let folded = match self.mode {
            MinMaxMode::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            MinMaxMode::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            MinMaxMode::Avg => values.iter().sum::<f64>() / values.len() as f64,
        };

        write_numeric(out, self.result_type, NumValue::Float(folded))
    }
}
