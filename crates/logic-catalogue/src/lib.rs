//! The field catalogue (spec §4.B): an ordered, serial-stamped sequence
//! of virtual-field descriptors, addressable by index or by name.

pub mod descriptor;

use std::collections::HashMap;

pub use descriptor::{AccessMode, Descriptor, DescriptorError, SemanticType};
use logic_cache::FieldProvider;
use logic_core::ValueType;
use logic_events::{FieldId, ProviderError};

#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogueError {
    #[error("a descriptor named '{0}' already exists")]
    DuplicateName(String),

    #[error("index {0} is out of range")]
    IndexOutOfRange(usize),

    #[error("source field '{0}' is not known to the provider")]
    UnknownSource(String),

    #[error("source field '{field}' is {actual:?}, but the descriptor declares {expected:?}")]
    SourceTypeMismatch { field: String, expected: ValueType, actual: ValueType },

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// Which direction [`Catalogue::move_descriptor`] shifts an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// An ordered collection of descriptors. `serial` strictly increases on
/// every successful mutation of the list or of a contained descriptor
/// (spec §3, "Invariants"; §8, invariant 2).
///
/// `moniker` is this server's own namespace, used to resolve
/// [`Catalogue::find_by_id`] against a virtual field's implied `FieldId`.
pub struct Catalogue {
    moniker: String,
    descriptors: Vec<Descriptor>,
    by_name: HashMap<String, usize>,
    serial: u64,
}

impl Catalogue {
    pub fn new(moniker: impl Into<String>) -> Self {
        Self {
            moniker: moniker.into(),
            descriptors: Vec::new(),
            by_name: HashMap::new(),
            serial: 0,
        }
    }

    pub fn moniker(&self) -> &str {
        &self.moniker
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Descriptor> {
        self.descriptors.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Descriptor> {
        self.descriptors.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.iter()
    }

    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn find_by_id(&self, field_id: &FieldId) -> Option<usize> {
        if field_id.moniker != self.moniker {
            return None;
        }
        self.find_by_name(&field_id.field)
    }

    /// Checks that every field `descriptor` references resolves through
    /// `provider`, before the mutation that would add it is accepted
    /// (supplement from `original_source`'s `bValidate`/`TCQCFldCache`:
    /// sources are checked against a live field snapshot at commit time,
    /// not only once the scheduler starts polling them).
    pub fn validate_descriptor(
        descriptor: &Descriptor,
        provider: &dyn FieldProvider,
    ) -> Result<(), CatalogueError> {
        for source in descriptor.sources() {
            match provider.read(source) {
                Ok((value, _timestamp)) => {
                    let actual = value.value_type();
                    if actual != descriptor.value_type() {
                        return Err(CatalogueError::SourceTypeMismatch {
                            field: source.to_string(),
                            expected: descriptor.value_type(),
                            actual,
                        });
                    }
                }
                Err(ProviderError::UnknownField(_)) => {
                    return Err(CatalogueError::UnknownSource(source.to_string()));
                }
                Err(_) => {}
            }
        }
        Ok(())
    }

    /// Appends `descriptor`, rejecting a name collision (spec §4.B).
    pub fn add(&mut self, descriptor: Descriptor) -> Result<usize, CatalogueError> {
        if self.by_name.contains_key(descriptor.name()) {
            return Err(CatalogueError::DuplicateName(descriptor.name().to_string()));
        }
        let index = self.descriptors.len();
        self.by_name.insert(descriptor.name().to_string(), index);
        self.descriptors.push(descriptor);
        self.serial += 1;
        Ok(index)
    }

    /// Removes the descriptor at `index`, reindexing the name table.
    pub fn remove_at(&mut self, index: usize) -> Result<Descriptor, CatalogueError> {
        if index >= self.descriptors.len() {
            return Err(CatalogueError::IndexOutOfRange(index));
        }
        let removed = self.descriptors.remove(index);
        self.reindex();
        self.serial += 1;
        Ok(removed)
    }

    /// Swaps the descriptor at `index` with its neighbor in `direction`.
    /// A no-op at either boundary (spec §4.B); still bumps `serial` only
    /// when a swap actually occurred.
    pub fn move_descriptor(
        &mut self,
        index: usize,
        direction: Direction,
    ) -> Result<(), CatalogueError> {
        if index >= self.descriptors.len() {
            return Err(CatalogueError::IndexOutOfRange(index));
        }
        let swap_with = match direction {
            Direction::Up if index > 0 => Some(index - 1),
            Direction::Down if index + 1 < self.descriptors.len() => Some(index + 1),
            _ => None,
        };
        if let Some(other) = swap_with {
            self.descriptors.swap(index, other);
            self.reindex();
            self.serial += 1;
        }
        Ok(())
    }

    /// Drops every descriptor, for a full catalogue reload.
    pub fn reset(&mut self) {
        self.descriptors.clear();
        self.by_name.clear();
        self.serial += 1;
    }

    fn reindex(&mut self) {
        self.by_name.clear();
        for (idx, d) in self.descriptors.iter().enumerate() {
            self.by_name.insert(d.name().to_string(), idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logic_core::ValueType;
    use logic_variants::{BooleanExprVariant, FieldVariant};
    use logic_expr::{Combiner, Comparison, Literal, Operand, Predicate};

    fn always_true_predicate() -> Predicate {
        Predicate::new(Comparison::Equal(Operand::Literal(Literal::Bool(true))))
    }

    fn bool_descriptor(name: &str) -> Descriptor {
        Descriptor::new(
            name,
            ValueType::Bool,
            AccessMode::Read,
            SemanticType::Generic,
            "",
            Vec::new(),
            FieldVariant::BooleanExpr(BooleanExprVariant {
                combiner: Combiner::And,
                predicates: Vec::new(),
            }),
        )
        .unwrap()
    }

    #[test]
    fn add_bumps_serial_and_rejects_duplicates() {
        let mut cat = Catalogue::new("srv");
        cat.add(bool_descriptor("a")).unwrap();
        assert_eq!(cat.serial(), 1);
        assert!(matches!(cat.add(bool_descriptor("a")), Err(CatalogueError::DuplicateName(_))));
    }

    #[test]
    fn move_up_then_down_is_a_no_op_on_order() {
        let mut cat = Catalogue::new("srv");
        cat.add(bool_descriptor("a")).unwrap();
        cat.add(bool_descriptor("b")).unwrap();
        let before: Vec<String> = cat.iter().map(|d| d.name().to_string()).collect();

        cat.move_descriptor(1, Direction::Up).unwrap();
        cat.move_descriptor(0, Direction::Down).unwrap();

        let after: Vec<String> = cat.iter().map(|d| d.name().to_string()).collect();
        assert_eq!(before, after);
        assert_eq!(cat.serial(), 4);
    }

    #[test]
    fn move_at_boundary_is_a_no_op() {
        let mut cat = Catalogue::new("srv");
        cat.add(bool_descriptor("a")).unwrap();
        let serial_before = cat.serial();
        cat.move_descriptor(0, Direction::Up).unwrap();
        assert_eq!(cat.serial(), serial_before);
    }

    #[test]
    fn find_by_id_matches_own_moniker() {
        let mut cat = Catalogue::new("srv");
        cat.add(bool_descriptor("lamp")).unwrap();
        let id = FieldId::new("srv", "lamp").unwrap();
        assert_eq!(cat.find_by_id(&id), Some(0));

        let other = FieldId::new("other", "lamp").unwrap();
        assert_eq!(cat.find_by_id(&other), None);
    }

    struct StubProvider {
        known: Vec<FieldId>,
        value_type: ValueType,
    }

    impl logic_cache::FieldProvider for StubProvider {
        fn read(
            &self,
            field_id: &FieldId,
        ) -> Result<(logic_core::Value, logic_events::Timestamp), logic_events::ProviderError> {
            if self.known.contains(field_id) {
                Ok((logic_core::Value::new_for_type(self.value_type), logic_events::Timestamp::ZERO))
            } else {
                Err(logic_events::ProviderError::UnknownField(field_id.to_string()))
            }
        }

        fn send_command(
            &self,
            _field_id: &FieldId,
            _command: &str,
        ) -> Result<(), logic_events::ProviderError> {
            Ok(())
        }
    }

    #[test]
    fn validate_descriptor_rejects_unknown_sources() {
        let descriptor = Descriptor::new(
            "lamp-on",
            ValueType::Bool,
            AccessMode::Read,
            SemanticType::Generic,
            "",
            vec![FieldId::new("gw", "Lamp1").unwrap()],
            FieldVariant::BooleanExpr(BooleanExprVariant {
                combiner: Combiner::And,
                predicates: vec![always_true_predicate()],
            }),
        )
        .unwrap();

        let empty = StubProvider { known: Vec::new(), value_type: ValueType::Bool };
        assert!(matches!(
            Catalogue::validate_descriptor(&descriptor, &empty),
            Err(CatalogueError::UnknownSource(_))
        ));

        let known =
            StubProvider { known: vec![FieldId::new("gw", "Lamp1").unwrap()], value_type: ValueType::Bool };
        assert!(Catalogue::validate_descriptor(&descriptor, &known).is_ok());
    }

    #[test]
    fn validate_descriptor_rejects_a_type_mismatch() {
        let descriptor = Descriptor::new(
            "lamp-on",
            ValueType::Bool,
            AccessMode::Read,
            SemanticType::Generic,
            "",
            vec![FieldId::new("gw", "Lamp1").unwrap()],
            FieldVariant::BooleanExpr(BooleanExprVariant {
                combiner: Combiner::And,
                predicates: vec![always_true_predicate()],
            }),
        )
        .unwrap();

        let mismatched = StubProvider {
            known: vec![FieldId::new("gw", "Lamp1").unwrap()],
            value_type: ValueType::String,
        };
        assert!(matches!(
            Catalogue::validate_descriptor(&descriptor, &mismatched),
            Err(CatalogueError::SourceTypeMismatch {
                expected: ValueType::Bool,
                actual: ValueType::String,
                ..
            })
        ));
    }

    #[test]
    fn cmp_by_name_is_case_insensitive() {
        let a = bool_descriptor("Alpha");
        let b = bool_descriptor("beta");
        assert_eq!(a.cmp_by_name(&b), std::cmp::Ordering::Less);
    }
}
