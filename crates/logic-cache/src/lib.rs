//! The polling cache (spec §4.C): one record per distinct upstream field
//! referenced anywhere in the catalogue, refreshed once per scheduler
//! tick so every virtual field reads a snapshot instead of going over the
//! wire to the field provider repeatedly.

use std::collections::HashMap;

use logic_core::Value;
use logic_events::{FieldId, ProviderError, Timestamp};

/// The driver runtime collaborator (spec §6): an opaque source of current
/// field values, polled once per distinct upstream field per tick, plus
/// the one write path the protocol surface needs for `Write`/`ReadWrite`
/// descriptors.
pub trait FieldProvider {
    fn read(&self, field_id: &FieldId) -> Result<(Value, Timestamp), ProviderError>;

    fn send_command(&self, field_id: &FieldId, command: &str) -> Result<(), ProviderError>;
}

/// O(1) lookup key handed back by [`PollCache::register`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PollHandle(usize);

#[derive(Clone, Debug)]
struct PollRecord {
    field_id: FieldId,
    last_known_value: Option<Value>,
    last_known_timestamp: Option<Timestamp>,
    last_known_error: bool,
    changed_this_tick: bool,
    refcount: usize,
}

/// A point-in-time read of one upstream field.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub value: Option<Value>,
    pub timestamp: Option<Timestamp>,
    pub error: bool,
    pub changed_this_tick: bool,
}

/// Holds one [`PollRecord`] per distinct upstream field. `tick` is called
/// from the single scheduler context; `snapshot` observes the results of
/// the most recently completed `tick` (spec §4.C, "Ordering").
#[derive(Default)]
pub struct PollCache {
    records: Vec<PollRecord>,
    by_field: HashMap<FieldId, PollHandle>,
}

impl PollCache {
    pub fn new() -> Self {
        Self { records: Vec::new(), by_field: HashMap::new() }
    }

    /// Deduplicates `sources` against fields already known to the cache,
    /// returning one handle per input in the same order (spec §4.C).
    pub fn register(&mut self, sources: &[FieldId]) -> Vec<PollHandle> {
        sources
            .iter()
            .map(|field_id| {
                if let Some(handle) = self.by_field.get(field_id) {
                    self.records[handle.0].refcount += 1;
                    *handle
                } else {
                    let handle = PollHandle(self.records.len());
                    self.records.push(PollRecord {
                        field_id: field_id.clone(),
                        last_known_value: None,
                        last_known_timestamp: None,
                        last_known_error: false,
                        changed_this_tick: false,
                        refcount: 1,
                    });
                    self.by_field.insert(field_id.clone(), handle);
                    handle
                }
            })
            .collect()
    }

    /// Polls every record through `provider`, once each, and updates
    /// `changed_this_tick` per spec §4.C: set when the value changed or
    /// the error flag flipped; on read failure the snapshot is cleared
    /// and the error flag is set.
    pub fn tick(&mut self, provider: &dyn FieldProvider) {
        for record in &mut self.records {
            match provider.read(&record.field_id) {
                Ok((new_value, timestamp)) => {
                    let changed = record.last_known_error
                        || !matches!(&record.last_known_value, Some(old) if old.equals(&new_value));
                    record.last_known_value = Some(new_value);
                    record.last_known_timestamp = Some(timestamp);
                    record.last_known_error = false;
                    record.changed_this_tick = changed;
                }
                Err(err) => {
                    tracing::debug!(field = %record.field_id, error = %err, "poll cache read failed");
                    let changed = !record.last_known_error;
                    record.last_known_value = None;
                    record.last_known_timestamp = None;
                    record.last_known_error = true;
                    record.changed_this_tick = changed;
                }
            }
        }
    }

    pub fn snapshot(&self, handle: PollHandle) -> Snapshot {
        let record = &self.records[handle.0];
        Snapshot {
            value: record.last_known_value.clone(),
            timestamp: record.last_known_timestamp,
            error: record.last_known_error,
            changed_this_tick: record.changed_this_tick,
        }
    }

    /// Drops the refcount for every record in `sources`; records that
    /// reach zero references are removed entirely. Run after a catalogue
    /// mutation drops a descriptor (spec §4.C).
    pub fn release(&mut self, sources: &[FieldId]) {
        for field_id in sources {
            if let Some(handle) = self.by_field.get(field_id).copied() {
                if self.records[handle.0].refcount > 0 {
                    self.records[handle.0].refcount -= 1;
                }
            }
        }
        self.forget_unused();
    }

    /// Sweeps any record with a zero refcount, compacting storage and
    /// reassigning handles. Callers must re-`register` after this runs.
    pub fn forget_unused(&mut self) {
        let kept: Vec<PollRecord> =
            self.records.drain(..).filter(|r| r.refcount > 0).collect();
        self.records = kept;
        self.by_field.clear();
        for (idx, record) in self.records.iter().enumerate() {
            self.by_field.insert(record.field_id.clone(), PollHandle(idx));
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
