//! The expression kernel (spec §4.D): the boolean predicate evaluator used
//! by `BooleanExpr`/`ElapsedTime`/`OnCounter` fields, and the arithmetic
//! formula parser/evaluator used by `Formula` fields.

pub mod error;
pub mod formula;
pub mod predicate;
pub mod wire;

pub use error::{ExprError, ParseError};
pub use formula::{Ast, BinOp, Formula, NodeId, NumValue, UnaryFn};
pub use predicate::{Combiner, Comparison, Literal, Operand, Predicate};
pub use wire::WireError;
