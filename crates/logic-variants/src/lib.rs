//! Virtual-field variant strategies (spec §4.E): the seven concrete
//! evaluators that consume poll-cache snapshots, drive the expression
//! kernel and graph sampler, and produce a descriptor's current value.

pub mod boolean_expr;
pub mod contract;
pub mod elapsed_time;
pub mod formula;
pub mod graph;
pub mod min_max_avg;
pub mod on_counter;
pub mod pattern_format;
pub mod running_avg;
pub mod variant;

pub use boolean_expr::BooleanExprVariant;
pub use contract::EvalResult;
pub use elapsed_time::ElapsedTimeVariant;
pub use formula::FormulaVariant;
pub use graph::GraphVariant;
pub use min_max_avg::{MinMaxAvgVariant, MinMaxMode};
pub use on_counter::OnCounterVariant;
pub use pattern_format::PatternFormatVariant;
pub use running_avg::RunningAvgVariant;
pub use variant::FieldVariant;
