//! Small platform/formatting helpers with no dependency on the rest of the
//! workspace: a monotonic clock reader for the scheduler, and numeric
//! helpers for `limits` parsing and sample display.

pub mod numeric;
pub mod timestamp;

pub use numeric::{format_sample, parse_numeric_range};
pub use timestamp::now_ns;
