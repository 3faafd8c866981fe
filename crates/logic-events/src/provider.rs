use std::fmt;

/// A monotonic timestamp, in nanoseconds since some unspecified epoch.
///
/// Production code obtains these from `std::time::Instant`; tests inject
/// deterministic sequences (see `SPEC_FULL.md`, "Time"). Kept as a bare
/// newtype over `u64` rather than `Instant` directly so it stays `Copy`,
/// comparable, and constructible in tests without a wall-clock dependency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    /// Saturating elapsed duration `self - earlier`, in nanoseconds.
    pub fn saturating_since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// A transient failure reading or writing a driver field through the
/// provider collaborator (§6). Never fatal to a tick; the poll cache
/// records it as a per-source error flag.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("field '{0}' is not known to the provider")]
    UnknownField(String),

    #[error("provider timed out reading '{0}'")]
    Timeout(String),

    #[error("provider read of '{0}' failed: {1}")]
    ReadFailed(String, String),

    #[error("provider rejected command on '{0}': {1}")]
    CommandRejected(String, String),
}
