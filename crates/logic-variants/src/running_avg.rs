use logic_cache::Snapshot;
use logic_core::Value;
use logic_events::Timestamp;

use crate::contract::{numeric_of, EvalResult};

const NANOS_PER_MINUTE: u64 = 60 * 1_000_000_000;
const NANOS_PER_HOUR: u64 = 60 * NANOS_PER_MINUTE;
const MAX_MINUTE_SAMPLES: usize = 60;

/// Maintains per-minute sub-samples and `hours` per-hour averages; output
/// is the average of the hour averages currently populated (spec §3,
/// §4.E "RunningAvg"). Both buffers are fixed-size ring buffers with a
/// populated-count rather than growable lists, mirroring
/// `CQLogicSh_RunAvgFld.hpp`'s `TSampleList` so "average of populated
/// slots" stays well-defined before either buffer wraps once.
#[derive(Clone, Debug)]
pub struct RunningAvgVariant {
    hours: usize,
    minute_samples: [f32; MAX_MINUTE_SAMPLES],
    minute_populated: usize,
    next_minute_slot: usize,
    hour_averages: Vec<f32>,
    populated: usize,
    next_hour_slot: usize,
    last_minute_bucket: Option<u64>,
    last_hour_bucket: Option<u64>,
}

impl RunningAvgVariant {
    pub fn new(hours: u8) -> Self {
        let hours = hours.clamp(1, 24) as usize;
        Self {
            hours,
            minute_samples: [0.0; MAX_MINUTE_SAMPLES],
            minute_populated: 0,
            next_minute_slot: 0,
            hour_averages: vec![0.0; hours],
            populated: 0,
            next_hour_slot: 0,
            last_minute_bucket: None,
            last_hour_bucket: None,
        }
    }

    /// The configured number of per-hour averages (spec §3, `hours: 1..24`).
    pub fn hours(&self) -> u8 {
        self.hours as u8
    }

    pub fn evaluate(&mut self, sources: &[Snapshot], out: &mut Value, now: Timestamp) -> EvalResult {
        let Some(snapshot) = sources.first() else {
            return EvalResult::Error;
        };
        let Some(value) = numeric_of(snapshot) else {
            return EvalResult::Error;
        };

        let minute_bucket = now.0 / NANOS_PER_MINUTE;
        let hour_bucket = now.0 / NANOS_PER_HOUR;

        // Roll the previous hour's minute samples into the hour buffer
        // before folding in this tick's reading, which belongs to the
        // new hour.
        match self.last_hour_bucket {
            None => self.last_hour_bucket = Some(hour_bucket),
            Some(prev) if prev != hour_bucket => {
                let avg = if self.minute_populated == 0 {
                    0.0
                } else {
                    self.minute_samples[..self.minute_populated].iter().sum::<f32>()
                        / self.minute_populated as f32
                };
                self.hour_averages[self.next_hour_slot] = avg;
                self.next_hour_slot = (self.next_hour_slot + 1) % self.hours;
                self.populated = (self.populated + 1).min(self.hours);
                self.minute_populated = 0;
                self.next_minute_slot = 0;
                self.last_hour_bucket = Some(hour_bucket);
            }
            _ => {}
        }

        if self.last_minute_bucket != Some(minute_bucket) {
            self.minute_samples[self.next_minute_slot] = value as f32;
            self.next_minute_slot = (self.next_minute_slot + 1) % MAX_MINUTE_SAMPLES;
            self.minute_populated = (self.minute_populated + 1).min(MAX_MINUTE_SAMPLES);
            self.last_minute_bucket = Some(minute_bucket);
        }

        if self.populated == 0 {
            return EvalResult::Unchanged;
        }
        let avg: f32 =
            self.hour_averages[..self.populated].iter().sum::<f32>() / self.populated as f32;

        let previous = out.as_f64().ok();
        out.set_f64(avg as f64).expect("RunningAvg descriptor must declare value_type F64");
        if previous == Some(avg as f64) {
            EvalResult::Unchanged
        } else {
            EvalResult::NewValue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logic_core::ValueType;

    fn numeric_snapshot(v: f64) -> Snapshot {
        let mut value = Value::new_for_type(ValueType::F64);
        value.set_f64(v).unwrap();
        Snapshot { value: Some(value), timestamp: None, error: false, changed_this_tick: true }
    }

    #[test]
    fn hours_one_averages_immediately_on_hour_roll() {
        let mut variant = RunningAvgVariant::new(1);
        let mut out = Value::new_for_type(ValueType::F64);

        variant.evaluate(&[numeric_snapshot(10.0)], &mut out, Timestamp(0));
        variant.evaluate(
            &[numeric_snapshot(20.0)],
            &mut out,
            Timestamp(NANOS_PER_MINUTE),
        );
        // crossing into the next hour rolls the minute buffer into hour_averages[0]
        variant.evaluate(
            &[numeric_snapshot(30.0)],
            &mut out,
            Timestamp(NANOS_PER_HOUR),
        );

        assert_eq!(out.as_f64().unwrap(), 15.0);
    }

    #[test]
    fn minute_buffer_wraps_past_sixty_samples_without_panicking() {
        let mut variant = RunningAvgVariant::new(1);
        let mut out = Value::new_for_type(ValueType::F64);

        for minute in 0..70u64 {
            variant.evaluate(
                &[numeric_snapshot(5.0)],
                &mut out,
                Timestamp(minute * NANOS_PER_MINUTE),
            );
        }
        variant.evaluate(&[numeric_snapshot(5.0)], &mut out, Timestamp(NANOS_PER_HOUR));

        assert_eq!(out.as_f64().unwrap(), 5.0);
    }
}
