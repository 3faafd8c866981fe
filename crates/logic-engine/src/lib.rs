//! The scheduler tick and the catalogue+poll-cache wiring (spec §5): a
//! single `Engine` handle owns a `RwLock`-guarded catalogue and poll cache,
//! ticked from one scheduler thread while client-handler threads read
//! through the same lock. No module-level state — every operation goes
//! through an explicit handle (spec §9, "Global state").

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use logic_cache::{FieldProvider, PollCache, Snapshot};
use logic_catalogue::{AccessMode, Catalogue, CatalogueError, Direction};
use logic_events::{ProviderError, Timestamp};
use logic_variants::{EvalResult, FieldVariant};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no field named '{0}' in the catalogue")]
    UnknownField(String),

    #[error("field '{0}' is not an ElapsedTime field")]
    NotElapsedTime(String),

    #[error("field '{0}' is read-only")]
    NotWritable(String),

    #[error(transparent)]
    Catalogue(#[from] CatalogueError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// The catalogue and poll cache guarded as a single unit, so a client
/// handler's read lock always observes a self-consistent pair (spec §5:
/// "Catalogue + values: single reader-writer lock").
pub struct EngineState {
    pub catalogue: Catalogue,
    pub cache: PollCache,
}

impl EngineState {
    fn register_descriptor(&mut self, index: usize) {
        let descriptor = self.catalogue.get_mut(index).expect("index just inserted");
        let handles = self.cache.register(descriptor.sources());
        descriptor.set_poll_handles(handles);
    }
}

/// Owns the scheduler's only mutable access to the catalogue. Constructed
/// once at startup and passed to every collaborator that needs it (spec
/// §9).
pub struct Engine {
    state: RwLock<EngineState>,
    provider: Box<dyn FieldProvider + Send + Sync>,
}

impl Engine {
    pub fn new(catalogue: Catalogue, provider: Box<dyn FieldProvider + Send + Sync>) -> Self {
        let mut state = EngineState { catalogue, cache: PollCache::new() };
        for index in 0..state.catalogue.len() {
            state.register_descriptor(index);
        }
        Self { state: RwLock::new(state), provider }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().expect("engine lock poisoned")
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().expect("engine lock poisoned")
    }

    /// Runs one scheduler tick (spec §5, steps 1-4): refresh every poll
    /// record, re-evaluate every descriptor whose inputs changed or that
    /// always evaluates, and install any new value.
    pub fn tick(&self, now: Timestamp) {
        let mut state = self.write();
        state.cache.tick(self.provider.as_ref());

        for index in 0..state.catalogue.len() {
            let (should_evaluate, snapshots) = {
                let descriptor = state.catalogue.get(index).expect("index in range");
                let snapshots: Vec<Snapshot> = descriptor
                    .poll_handles()
                    .iter()
                    .map(|handle| state.cache.snapshot(*handle))
                    .collect();
                let should_evaluate =
                    descriptor.always_evaluate() || snapshots.iter().any(|s| s.changed_this_tick);
                (should_evaluate, snapshots)
            };
            if !should_evaluate {
                continue;
            }

            let descriptor = state.catalogue.get_mut(index).expect("index in range");
            let mut out = descriptor.current_value().clone();
            let name = descriptor.name().to_string();
            match descriptor.variant_mut().evaluate(&snapshots, &mut out, now) {
                EvalResult::NewValue => descriptor.install_value(out),
                EvalResult::Error => descriptor.set_error(true),
                EvalResult::Unchanged => {}
            }
            tracing::trace!(field = %name, "evaluated tick");
        }
    }

    /// Registers `descriptor`'s sources with the poll cache and appends it
    /// to the catalogue (spec §5, "Mutators ... mutate, bump
    /// `catalogue_serial`, and release").
    pub fn add_descriptor(
        &self,
        descriptor: logic_catalogue::Descriptor,
    ) -> Result<usize, EngineError> {
        Catalogue::validate_descriptor(&descriptor, self.provider.as_ref())?;
        let mut state = self.write();
        let index = state.catalogue.add(descriptor)?;
        state.register_descriptor(index);
        Ok(index)
    }

    /// Removes the descriptor at `index`, releasing its poll-cache
    /// references (spec §4.C, "sweep after catalogue mutation").
    pub fn remove_descriptor(&self, index: usize) -> Result<(), EngineError> {
        let mut state = self.write();
        let removed = state.catalogue.remove_at(index)?;
        state.cache.release(removed.sources());
        Ok(())
    }

    pub fn move_descriptor(&self, index: usize, direction: Direction) -> Result<(), EngineError> {
        let mut state = self.write();
        state.catalogue.move_descriptor(index, direction)?;
        Ok(())
    }

    /// Zeroes an `ElapsedTime` field's accumulator (spec §6, `ResetElapsed`).
    pub fn reset_elapsed(&self, field_name: &str) -> Result<(), EngineError> {
        let mut state = self.write();
        let index = state
            .catalogue
            .find_by_name(field_name)
            .ok_or_else(|| EngineError::UnknownField(field_name.to_string()))?;
        let descriptor = state.catalogue.get_mut(index).expect("index just resolved");
        match descriptor.variant_mut() {
            FieldVariant::ElapsedTime(v) => {
                v.reset();
                Ok(())
            }
            _ => Err(EngineError::NotElapsedTime(field_name.to_string())),
        }
    }

    /// Forwards `command` to the single upstream source of a `Write`/
    /// `ReadWrite` descriptor (spec §6, `FieldProvider::send_command`).
    pub fn send_command(&self, field_name: &str, command: &str) -> Result<(), EngineError> {
        let state = self.read();
        let index = state
            .catalogue
            .find_by_name(field_name)
            .ok_or_else(|| EngineError::UnknownField(field_name.to_string()))?;
        let descriptor = state.catalogue.get(index).expect("index just resolved");
        if !matches!(descriptor.access(), AccessMode::Write | AccessMode::ReadWrite) {
            return Err(EngineError::NotWritable(field_name.to_string()));
        }
        let source = descriptor
            .sources()
            .first()
            .ok_or_else(|| EngineError::NotWritable(field_name.to_string()))?;
        Ok(self.provider.send_command(source, command)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logic_catalogue::{AccessMode, Descriptor, SemanticType};
    use logic_core::{Value, ValueType};
    use logic_events::{FieldId, ProviderError};
    use logic_expr::{Combiner, Comparison, Literal, Operand, Predicate};
    use logic_variants::BooleanExprVariant;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeProvider {
        values: RefCell<HashMap<String, Result<Value, ProviderError>>>,
    }

    impl FieldProvider for FakeProvider {
        fn read(&self, field_id: &FieldId) -> Result<(Value, Timestamp), ProviderError> {
            self.values
                .borrow()
                .get(&field_id.to_string())
                .cloned()
                .unwrap_or(Err(ProviderError::UnknownField(field_id.to_string())))
                .map(|v| (v, Timestamp::ZERO))
        }

        fn send_command(&self, _field_id: &FieldId, _command: &str) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn string_value(s: &str) -> Value {
        let mut v = Value::new_for_type(ValueType::String);
        v.set_string(s).unwrap();
        v
    }

    fn door_descriptor() -> Descriptor {
        Descriptor::new(
            "door-open",
            ValueType::Bool,
            AccessMode::Read,
            SemanticType::Generic,
            "",
            vec![FieldId::new("gw", "Door1").unwrap()],
            FieldVariant::BooleanExpr(BooleanExprVariant {
                combiner: Combiner::And,
                predicates: vec![Predicate::new(Comparison::Equal(Operand::Literal(
                    Literal::Str("open".into()),
                )))],
            }),
        )
        .unwrap()
    }

    #[test]
    fn tick_installs_new_value_from_provider() {
        let mut catalogue = Catalogue::new("srv");
        catalogue.add(door_descriptor()).unwrap();
        let provider = FakeProvider {
            values: RefCell::new(HashMap::from([("gw.Door1".to_string(), Ok(string_value("open")))])),
        };
        let engine = Engine::new(catalogue, Box::new(provider));

        engine.tick(Timestamp::ZERO);

        let state = engine.read();
        assert!(state.catalogue.get(0).unwrap().current_value().as_bool().unwrap());
    }

    #[test]
    fn reset_elapsed_rejects_non_elapsed_field() {
        let mut catalogue = Catalogue::new("srv");
        catalogue.add(door_descriptor()).unwrap();
        let provider = FakeProvider { values: RefCell::new(HashMap::new()) };
        let engine = Engine::new(catalogue, Box::new(provider));

        assert!(matches!(
            engine.reset_elapsed("door-open"),
            Err(EngineError::NotElapsedTime(_))
        ));
    }

    #[test]
    fn send_command_rejects_a_read_only_field() {
        let mut catalogue = Catalogue::new("srv");
        catalogue.add(door_descriptor()).unwrap();
        let provider = FakeProvider { values: RefCell::new(HashMap::new()) };
        let engine = Engine::new(catalogue, Box::new(provider));

        assert!(matches!(
            engine.send_command("door-open", "open"),
            Err(EngineError::NotWritable(_))
        ));
    }

    #[test]
    fn add_descriptor_rejects_an_unknown_source() {
        let engine = Engine::new(Catalogue::new("srv"), Box::new(FakeProvider {
            values: RefCell::new(HashMap::new()),
        }));

        assert!(matches!(
            engine.add_descriptor(door_descriptor()),
            Err(EngineError::Catalogue(CatalogueError::UnknownSource(_)))
        ));
    }

    #[test]
    fn remove_descriptor_releases_poll_cache_records() {
        let mut catalogue = Catalogue::new("srv");
        catalogue.add(door_descriptor()).unwrap();
        let provider = FakeProvider { values: RefCell::new(HashMap::new()) };
        let engine = Engine::new(catalogue, Box::new(provider));

        engine.remove_descriptor(0).unwrap();
        assert!(engine.read().cache.is_empty());
    }
}
