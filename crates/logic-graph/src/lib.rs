//! The graph sampling subsystem (spec §4.F): sub-samples collected every
//! `sub_sample_seconds`, averaged into a fixed-capacity circular buffer
//! every `sample_period_minutes`, delivered to clients incrementally by
//! comparing a known serial against the buffer's monotonic push count.

use logic_events::Timestamp;
use std::collections::VecDeque;

/// Samples per buffer. Oldest sample is dropped once the buffer is full.
pub const GRAPH_CAPACITY: usize = 60;

/// Fixed sub-sampling cadence (spec §3: "sub_sample_seconds: 10").
pub const SUB_SAMPLE_SECONDS: u64 = 10;

/// Upper bound on buffered sub-samples: the longest period (8 minutes) at
/// the fixed 10s cadence yields 48 sub-samples per emitted sample.
pub const MAX_SUB_SAMPLES: usize = 48;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Marks "upstream error at this sample" in a [`GraphBuffer`] (spec §3:
/// "A reserved float sentinel marks 'upstream error at this sample'").
pub const ERROR_SENTINEL: f32 = f32::MIN;

#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphConfigError {
    #[error("sample_period_minutes must be within 1..=8, got {0}")]
    PeriodOutOfRange(u32),
}

/// A fixed-capacity circular buffer of averaged graph samples.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphBuffer {
    samples: VecDeque<f32>,
    serial: u64,
}

impl GraphBuffer {
    pub fn new() -> Self {
        Self { samples: VecDeque::with_capacity(GRAPH_CAPACITY), serial: 0 }
    }

    /// Appends `sample`, dropping the oldest entry once at capacity, and
    /// bumps the serial. Spec invariant: `serial == pre + 1` and
    /// `len == min(pre_len + 1, capacity)` after every push.
    pub fn push(&mut self, sample: f32) {
        if self.samples.len() == GRAPH_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.serial += 1;
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The most recent `n` samples, oldest first, capped at the buffer's
    /// current length.
    pub fn latest_n(&self, n: usize) -> Vec<f32> {
        let n = n.min(self.samples.len());
        self.samples.iter().rev().take(n).rev().copied().collect()
    }

    /// Samples pushed since `known_serial`, for incremental delivery
    /// (spec §6: `FetchGraph`). Returns the full buffer if the client's
    /// serial predates everything still held (it fell behind capacity).
    pub fn since(&self, known_serial: u64) -> Vec<f32> {
        if known_serial >= self.serial {
            return Vec::new();
        }
        let missed = (self.serial - known_serial) as usize;
        self.latest_n(missed)
    }
}

impl Default for GraphBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives a single `Graph` field's sub-sampling and periodic averaging
/// (spec §3, `Graph` payload; §7.E, Graph evaluation rule).
#[derive(Clone, Debug)]
pub struct GraphSampler {
    sample_period_minutes: u32,
    sub_samples: Vec<f32>,
    samples: GraphBuffer,
    next_sample_at: Timestamp,
    next_sub_at: Timestamp,
}

impl GraphSampler {
    pub fn new(sample_period_minutes: u32, now: Timestamp) -> Result<Self, GraphConfigError> {
        if !(1..=8).contains(&sample_period_minutes) {
            return Err(GraphConfigError::PeriodOutOfRange(sample_period_minutes));
        }
        Ok(Self {
            sample_period_minutes,
            sub_samples: Vec::with_capacity(MAX_SUB_SAMPLES),
            samples: GraphBuffer::new(),
            next_sample_at: Timestamp(now.0 + sample_period_minutes as u64 * 60 * NANOS_PER_SEC),
            next_sub_at: Timestamp(now.0 + SUB_SAMPLE_SECONDS * NANOS_PER_SEC),
        })
    }

    pub fn buffer(&self) -> &GraphBuffer {
        &self.samples
    }

    pub fn sample_period_minutes(&self) -> u32 {
        self.sample_period_minutes
    }

    /// Advances the sampler by one scheduler tick at time `now`, reading
    /// `source` at most once. Every `sub_sample_seconds`, a successful
    /// read is buffered; an errored read is dropped from the sub-sample
    /// set entirely (it contributes nothing to the eventual average).
    /// When a full sample period elapses, the buffered sub-samples are
    /// averaged into the buffer, or the error sentinel is pushed if none
    /// were collected (spec §7.E, §8 example 5).
    pub fn tick(&mut self, now: Timestamp, source: Result<f32, ()>) {
        if now >= self.next_sub_at {
            if let Ok(value) = source {
                if self.sub_samples.len() == MAX_SUB_SAMPLES {
                    self.sub_samples.remove(0);
                }
                self.sub_samples.push(value);
            }
            self.next_sub_at =
                Timestamp(self.next_sub_at.0 + SUB_SAMPLE_SECONDS * NANOS_PER_SEC);
        }

        if now >= self.next_sample_at {
            let emitted = if self.sub_samples.is_empty() {
                ERROR_SENTINEL
            } else {
                self.sub_samples.iter().sum::<f32>() / self.sub_samples.len() as f32
            };
            self.samples.push(emitted);
            self.sub_samples.clear();
            self.next_sample_at = Timestamp(
                self.next_sample_at.0 + self.sample_period_minutes as u64 * 60 * NANOS_PER_SEC,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_drops_oldest_once_full() {
        let mut buf = GraphBuffer::new();
        for i in 0..GRAPH_CAPACITY + 5 {
            buf.push(i as f32);
        }
        assert_eq!(buf.len(), GRAPH_CAPACITY);
        assert_eq!(buf.serial(), (GRAPH_CAPACITY + 5) as u64);
        assert_eq!(buf.latest_n(1), vec![(GRAPH_CAPACITY + 4) as f32]);
    }

    #[test]
    fn since_returns_only_new_pushes() {
        let mut buf = GraphBuffer::new();
        for i in 0..5 {
            buf.push(i as f32);
        }
        assert_eq!(buf.since(3), vec![3.0, 4.0]);
        assert_eq!(buf.since(5), Vec::<f32>::new());
    }

    #[test]
    fn since_caps_at_capacity_when_client_fell_far_behind() {
        let mut buf = GraphBuffer::new();
        for i in 0..(GRAPH_CAPACITY + 10) {
            buf.push(i as f32);
        }
        assert_eq!(buf.since(0).len(), GRAPH_CAPACITY);
    }

    #[test]
    fn sampler_rejects_period_out_of_range() {
        assert!(GraphSampler::new(0, Timestamp::ZERO).is_err());
        assert!(GraphSampler::new(9, Timestamp::ZERO).is_err());
    }

    #[test]
    fn one_minute_period_averages_six_sub_samples_of_ten() {
        let mut sampler = GraphSampler::new(1, Timestamp::ZERO).unwrap();
        let mut now = Timestamp::ZERO;
        for _ in 0..6 {
            now = Timestamp(now.0 + SUB_SAMPLE_SECONDS * NANOS_PER_SEC);
            sampler.tick(now, Ok(10.0));
        }
        assert_eq!(sampler.buffer().serial(), 1);
        assert_eq!(sampler.buffer().latest_n(1), vec![10.0]);
    }

    #[test]
    fn all_errors_in_period_emits_sentinel() {
        let mut sampler = GraphSampler::new(1, Timestamp::ZERO).unwrap();
        let mut now = Timestamp::ZERO;
        for _ in 0..6 {
            now = Timestamp(now.0 + SUB_SAMPLE_SECONDS * NANOS_PER_SEC);
            sampler.tick(now, Err(()));
        }
        assert_eq!(sampler.buffer().latest_n(1), vec![ERROR_SENTINEL]);
    }
}
