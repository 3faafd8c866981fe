use logic_cache::Snapshot;
use logic_core::Value;
use logic_events::Timestamp;
use logic_graph::GraphSampler;

use crate::contract::{numeric_of, EvalResult};

/// Drives a [`GraphSampler`] each tick. Graph fields have no scalar
/// output — `evaluate` always returns `Unchanged` (spec §4.E "Graph").
#[derive(Clone, Debug)]
pub struct GraphVariant {
    pub sampler: GraphSampler,
}

impl GraphVariant {
    pub fn evaluate(&mut self, sources: &[Snapshot], _out: &mut Value, now: Timestamp) -> EvalResult {
        let reading = sources
            .first()
            .and_then(numeric_of)
            .map(|v| v as f32)
            .ok_or(());
        self.sampler.tick(now, reading);
        EvalResult::Unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logic_core::ValueType;
    use logic_graph::SUB_SAMPLE_SECONDS;

    fn numeric_snapshot(v: f64) -> Snapshot {
        let mut value = Value::new_for_type(ValueType::F64);
        value.set_f64(v).unwrap();
        Snapshot { value: Some(value), timestamp: None, error: false, changed_this_tick: true }
    }

    #[test]
    fn graph_variant_always_reports_unchanged() {
        let mut variant =
            GraphVariant { sampler: GraphSampler::new(1, Timestamp::ZERO).unwrap() };
        let mut out = Value::new_for_type(ValueType::F64);
        let now = Timestamp(SUB_SAMPLE_SECONDS * 1_000_000_000);
        let result = variant.evaluate(&[numeric_snapshot(5.0)], &mut out, now);
        assert_eq!(result, EvalResult::Unchanged);
    }
}
