use logic_cache::PollHandle;
use logic_core::{Value, ValueType};
use logic_events::{field_id::validate_field_name, FieldId};
use logic_expr::ParseError;
use logic_variants::FieldVariant;

/// Read, write, or both (spec §3, `access`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

/// An optional domain tag. Missing-from-persistence defaults to
/// `Generic` (spec §6).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SemanticType {
    Generic,
    Other(String),
}

impl Default for SemanticType {
    fn default() -> Self {
        SemanticType::Generic
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DescriptorError {
    #[error("descriptor name '{0}' is invalid: {1}")]
    InvalidName(String, logic_events::FieldIdError),

    #[error("descriptor has {0} sources, maximum is 16")]
    TooManySources(usize),

    #[error("auxiliary list length {actual} does not match sources.len() ({expected})")]
    SourceAuxMismatch { expected: usize, actual: usize },

    #[error("formula does not parse: {0}")]
    ParseFailure(#[from] ParseError),

    #[error("current_value's type {actual:?} does not match declared value_type {expected:?}")]
    ValueTypeMismatch { expected: ValueType, actual: ValueType },

    #[error("formula field reference %({index}) is out of range ({sources} source(s) configured)")]
    FormulaFieldRefOutOfRange { index: usize, sources: usize },
}

pub const MAX_SOURCES: usize = 16;

/// `BooleanExpr`/`ElapsedTime`/`OnCounter` carry one predicate per source;
/// the list must stay exactly `sources.len()` long at every observable
/// point (spec §3).
fn check_aux_lengths(variant: &FieldVariant, sources: usize) -> Result<(), DescriptorError> {
    let predicates = match variant {
        FieldVariant::BooleanExpr(v) => v.predicates.len(),
        FieldVariant::ElapsedTime(v) => v.predicates.len(),
        FieldVariant::OnCounter(v) => v.predicates.len(),
        _ => return Ok(()),
    };
    if predicates != sources {
        return Err(DescriptorError::SourceAuxMismatch { expected: sources, actual: predicates });
    }
    Ok(())
}

/// A `Formula`'s `%(n)` references are checked against `sources.len()` at
/// commit time, not only lazily during `eval` (spec §4.D.2, §8 invariant 4).
fn check_formula_field_refs(variant: &FieldVariant, sources: usize) -> Result<(), DescriptorError> {
    if let FieldVariant::Formula(v) = variant {
        if let Some(max) = v.formula.max_field_ref() {
            if max >= sources {
                return Err(DescriptorError::FormulaFieldRefOutOfRange { index: max, sources });
            }
        }
    }
    Ok(())
}

/// The envelope record wrapping a variant payload (spec §9): identity,
/// wiring to the poll cache, and the live value cell are shared across
/// every variant kind.
#[derive(Clone, Debug)]
pub struct Descriptor {
    name: String,
    value_type: ValueType,
    access: AccessMode,
    semantic_type: SemanticType,
    limits: String,
    sources: Vec<FieldId>,
    poll_handles: Vec<PollHandle>,
    always_evaluate: bool,
    normally_exposed: bool,
    variant: FieldVariant,
    current_value: Value,
    value_serial: u64,
}

impl Descriptor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        value_type: ValueType,
        access: AccessMode,
        semantic_type: SemanticType,
        limits: impl Into<String>,
        sources: Vec<FieldId>,
        variant: FieldVariant,
    ) -> Result<Self, DescriptorError> {
        let name = name.into();
        validate_field_name(&name)
            .map_err(|e| DescriptorError::InvalidName(name.clone(), e))?;
        if sources.len() > MAX_SOURCES {
            return Err(DescriptorError::TooManySources(sources.len()));
        }
        check_aux_lengths(&variant, sources.len())?;
        check_formula_field_refs(&variant, sources.len())?;

        let always_evaluate = variant.requires_always_evaluate();
        let normally_exposed = variant.is_normally_exposed();
        let current_value = Value::new_for_type(value_type);

        Ok(Self {
            name,
            value_type,
            access,
            semantic_type,
            limits: limits.into(),
            sources,
            poll_handles: Vec::new(),
            always_evaluate,
            normally_exposed,
            variant,
            current_value,
            value_serial: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn access(&self) -> AccessMode {
        self.access
    }

    pub fn semantic_type(&self) -> &SemanticType {
        &self.semantic_type
    }

    pub fn limits(&self) -> &str {
        &self.limits
    }

    pub fn sources(&self) -> &[FieldId] {
        &self.sources
    }

    pub fn poll_handles(&self) -> &[PollHandle] {
        &self.poll_handles
    }

    pub fn set_poll_handles(&mut self, handles: Vec<PollHandle>) {
        self.poll_handles = handles;
    }

    pub fn always_evaluate(&self) -> bool {
        self.always_evaluate
    }

    pub fn normally_exposed(&self) -> bool {
        self.normally_exposed
    }

    pub fn variant(&self) -> &FieldVariant {
        &self.variant
    }

    pub fn variant_mut(&mut self) -> &mut FieldVariant {
        &mut self.variant
    }

    pub fn current_value(&self) -> &Value {
        &self.current_value
    }

    pub fn value_serial(&self) -> u64 {
        self.value_serial
    }

    /// Installs `value` as the new `current_value` and bumps
    /// `value_serial` (spec §5, scheduler tick step 3-4).
    pub fn install_value(&mut self, value: Value) {
        self.current_value = value;
        self.value_serial += 1;
    }

    pub fn set_error(&mut self, error: bool) {
        self.current_value.set_error(error);
        self.value_serial += 1;
    }

    /// Case-insensitive name ordering, for client-side list display
    /// (the original CQC client sorts its field list this way via
    /// `eComp`; kept here as ambient catalogue API even though the list
    /// widget itself is out of scope).
    pub fn cmp_by_name(&self, other: &Descriptor) -> std::cmp::Ordering {
        self.name.to_lowercase().cmp(&other.name.to_lowercase())
    }
}
