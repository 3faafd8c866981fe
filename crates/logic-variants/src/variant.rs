use logic_cache::Snapshot;
use logic_core::Value;
use logic_events::Timestamp;

use crate::boolean_expr::BooleanExprVariant;
use crate::contract::EvalResult;
use crate::elapsed_time::ElapsedTimeVariant;
use crate::formula::FormulaVariant;
use crate::graph::GraphVariant;
use crate::min_max_avg::MinMaxAvgVariant;
use crate::on_counter::OnCounterVariant;
use crate::pattern_format::PatternFormatVariant;
use crate::running_avg::RunningAvgVariant;

/// The tagged union standing in for the source's variant class hierarchy
/// (spec §9, "Polymorphism without inheritance"). Each case owns both its
/// configuration and its runtime state; `evaluate` is the one shared
/// method every case implements (spec §4.E).
#[derive(Clone, Debug)]
pub enum FieldVariant {
    BooleanExpr(BooleanExprVariant),
    ElapsedTime(ElapsedTimeVariant),
    Formula(FormulaVariant),
    MinMaxAvg(MinMaxAvgVariant),
    OnCounter(OnCounterVariant),
    PatternFormat(PatternFormatVariant),
    RunningAvg(RunningAvgVariant),
    Graph(GraphVariant),
}

impl FieldVariant {
    pub fn evaluate(&mut self, sources: &[Snapshot], out: &mut Value, now: Timestamp) -> EvalResult {
        match self {
            FieldVariant::BooleanExpr(v) => v.evaluate(sources, out, now),
            FieldVariant::ElapsedTime(v) => v.evaluate(sources, out, now),
            FieldVariant::Formula(v) => v.evaluate(sources, out, now),
            FieldVariant::MinMaxAvg(v) => v.evaluate(sources, out, now),
            FieldVariant::OnCounter(v) => v.evaluate(sources, out, now),
            FieldVariant::PatternFormat(v) => v.evaluate(sources, out, now),
            FieldVariant::RunningAvg(v) => v.evaluate(sources, out, now),
            FieldVariant::Graph(v) => v.evaluate(sources, out, now),
        }
    }

    /// Whether the dispatcher must call `evaluate` every tick regardless
    /// of upstream change (spec §3: "Graph, ElapsedTime set this").
    pub fn requires_always_evaluate(&self) -> bool {
        matches!(self, FieldVariant::Graph(_) | FieldVariant::ElapsedTime(_))
    }

    /// Graph fields are reachable only through the graph query, not the
    /// driver façade (spec §3, `normally_exposed`).
    pub fn is_normally_exposed(&self) -> bool {
        !matches!(self, FieldVariant::Graph(_))
    }
}
