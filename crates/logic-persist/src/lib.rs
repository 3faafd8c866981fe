//! Catalogue binary persistence (spec §6, "Catalogue persistence"): a
//! versioned header, a polymorphic list of descriptors (variant tag plus
//! body), and version-tolerant reading that defaults absent fields.
//!
//! Readers accept any descriptor/catalogue version up to
//! [`CURRENT_CATALOGUE_VERSION`]/[`CURRENT_DESCRIPTOR_VERSION`] and reject
//! anything newer outright (spec §9, open question: "reject unknown
//! versions explicitly rather than guess").

use std::io::{self, Read, Write};

use logic_catalogue::{AccessMode, Catalogue, CatalogueError, Descriptor, DescriptorError, SemanticType};
use logic_core::ValueType;
use logic_events::{FieldId, Timestamp};
use logic_expr::{Combiner, Formula, Predicate, WireError};
use logic_graph::GraphSampler;
use logic_variants::{
    BooleanExprVariant, ElapsedTimeVariant, FieldVariant, FormulaVariant, GraphVariant,
    MinMaxAvgVariant, MinMaxMode, OnCounterVariant, PatternFormatVariant, RunningAvgVariant,
};

const START_OBJECT_MARKER: u32 = 0xC0_1A_70_BE;
const END_OBJECT_MARKER: u32 = 0xC0_1A_70_ED;
const START_DESCRIPTOR_MARKER: u16 = 0xBEEF;
const END_DESCRIPTOR_MARKER: u16 = 0xFEED;

pub const CURRENT_CATALOGUE_VERSION: u16 = 1;
pub const CURRENT_DESCRIPTOR_VERSION: u16 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("i/o error reading catalogue blob")]
    Io(#[from] io::Error),

    #[error("catalogue blob is missing its {0} marker")]
    MissingMarker(&'static str),

    #[error("catalogue version {found} is newer than this reader supports ({max})")]
    UnsupportedCatalogueVersion { found: u16, max: u16 },

    #[error("descriptor version {found} is newer than this reader supports ({max})")]
    UnsupportedDescriptorVersion { found: u16, max: u16 },

    #[error("unknown variant tag {0}")]
    UnknownVariantTag(u8),

    #[error("malformed predicate/formula payload: {0}")]
    Wire(#[from] WireError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Catalogue(#[from] CatalogueError),

    #[error("source field reference did not parse: {0}")]
    BadFieldId(#[from] logic_events::FieldIdError),

    #[error("blob is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

fn write_str<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    let bytes = s.as_bytes();
    w.write_all(&(bytes.len() as u32).to_le_bytes())?;
    w.write_all(bytes)
}

fn read_str<R: Read>(r: &mut R) -> Result<String, PersistError> {
    let len = read_u32(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}

fn read_u8<R: Read>(r: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u16<R: Read>(r: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn value_type_tag(vt: ValueType) -> u8 {
    match vt {
        ValueType::Bool => 0,
        ValueType::U32 => 1,
        ValueType::I32 => 2,
        ValueType::F64 => 3,
        ValueType::String => 4,
        ValueType::StringList => 5,
        ValueType::Instant => 6,
    }
}

fn value_type_from_tag(tag: u8) -> Result<ValueType, PersistError> {
    Ok(match tag {
        0 => ValueType::Bool,
        1 => ValueType::U32,
        2 => ValueType::I32,
        3 => ValueType::F64,
        4 => ValueType::String,
        5 => ValueType::StringList,
        6 => ValueType::Instant,
        tag => return Err(PersistError::UnknownVariantTag(tag)),
    })
}

fn access_tag(access: AccessMode) -> u8 {
    match access {
        AccessMode::Read => 0,
        AccessMode::Write => 1,
        AccessMode::ReadWrite => 2,
    }
}

fn access_from_tag(tag: u8) -> AccessMode {
    match tag {
        1 => AccessMode::Write,
        2 => AccessMode::ReadWrite,
        _ => AccessMode::Read,
    }
}

fn write_predicates<W: Write>(w: &mut W, predicates: &[Predicate]) -> io::Result<()> {
    w.write_all(&(predicates.len() as u32).to_le_bytes())?;
    for p in predicates {
        p.stream_out(w)?;
    }
    Ok(())
}

fn read_predicates<R: Read>(r: &mut R) -> Result<Vec<Predicate>, PersistError> {
    let count = read_u32(r)?;
    (0..count).map(|_| Ok(Predicate::stream_in(r)?)).collect()
}

/// Writes `catalogue` as a versioned binary blob (spec §6).
pub fn write_catalogue<W: Write>(catalogue: &Catalogue, w: &mut W) -> Result<(), PersistError> {
    w.write_all(&START_OBJECT_MARKER.to_le_bytes())?;
    w.write_all(&CURRENT_CATALOGUE_VERSION.to_le_bytes())?;
    write_str(w, catalogue.moniker())?;
    w.write_all(&(catalogue.len() as u32).to_le_bytes())?;
    for descriptor in catalogue.iter() {
        write_descriptor(descriptor, w)?;
    }
    w.write_all(&END_OBJECT_MARKER.to_le_bytes())?;
    Ok(())
}

fn write_descriptor<W: Write>(descriptor: &Descriptor, w: &mut W) -> Result<(), PersistError> {
    w.write_all(&START_DESCRIPTOR_MARKER.to_le_bytes())?;
    w.write_all(&CURRENT_DESCRIPTOR_VERSION.to_le_bytes())?;

    write_str(w, descriptor.name())?;
    w.write_all(&[value_type_tag(descriptor.value_type())])?;
    w.write_all(&[access_tag(descriptor.access())])?;
    match descriptor.semantic_type() {
        SemanticType::Generic => w.write_all(&[0])?,
        SemanticType::Other(name) => {
            w.write_all(&[1])?;
            write_str(w, name)?;
        }
    }
    write_str(w, descriptor.limits())?;

    w.write_all(&(descriptor.sources().len() as u8).to_le_bytes())?;
    for source in descriptor.sources() {
        write_str(w, &source.to_string())?;
    }

    write_variant(descriptor.variant(), w)?;

    w.write_all(&END_DESCRIPTOR_MARKER.to_le_bytes())?;
    Ok(())
}

fn write_variant<W: Write>(variant: &FieldVariant, w: &mut W) -> Result<(), PersistError> {
    match variant {
        FieldVariant::BooleanExpr(v) => {
            w.write_all(&[0])?;
            v.combiner.stream_out(w)?;
            write_predicates(w, &v.predicates)?;
        }
        FieldVariant::ElapsedTime(v) => {
            w.write_all(&[1])?;
            v.combiner.stream_out(w)?;
            write_predicates(w, &v.predicates)?;
            w.write_all(&[v.auto_reset as u8])?;
        }
        FieldVariant::Formula(v) => {
            w.write_all(&[2])?;
            v.formula.stream_out(v.result_type, w)?;
        }
        FieldVariant::MinMaxAvg(v) => {
            w.write_all(&[3])?;
            let mode: u8 = match v.mode {
                MinMaxMode::Min => 0,
                MinMaxMode::Max => 1,
                MinMaxMode::Avg => 2,
            };
            w.write_all(&[mode])?;
            w.write_all(&[value_type_tag(v.result_type)])?;
        }
        FieldVariant::OnCounter(v) => {
            w.write_all(&[4])?;
            write_predicates(w, &v.predicates)?;
            w.write_all(&[v.invert as u8])?;
        }
        FieldVariant::PatternFormat(v) => {
            w.write_all(&[5])?;
            write_str(w, &v.pattern)?;
        }
        FieldVariant::RunningAvg(v) => {
            w.write_all(&[6])?;
            w.write_all(&[v.hours() as u8])?;
        }
        FieldVariant::Graph(v) => {
            w.write_all(&[7])?;
            w.write_all(&[v.sampler.sample_period_minutes() as u8])?;
        }
    }
    Ok(())
}

/// Reads a catalogue blob, reconstructing runtime state (poll handles,
/// accumulators, sample buffers) fresh rather than deserializing it — only
/// configuration survives a reload (spec §3: descriptors are "created by
/// configuration load"). `now` seeds timer-driven variants (Graph).
pub fn read_catalogue<R: Read>(r: &mut R, now: Timestamp) -> Result<Catalogue, PersistError> {
    let marker = read_u32(r)?;
    if marker != START_OBJECT_MARKER {
        return Err(PersistError::MissingMarker("start-object"));
    }
    let version = read_u16(r)?;
    if version > CURRENT_CATALOGUE_VERSION {
        return Err(PersistError::UnsupportedCatalogueVersion {
            found: version,
            max: CURRENT_CATALOGUE_VERSION,
        });
    }
    let moniker = read_str(r)?;
    let count = read_u32(r)?;

    let mut catalogue = Catalogue::new(moniker);
    for _ in 0..count {
        let descriptor = read_descriptor(r, now)?;
        catalogue.add(descriptor)?;
    }

    let marker = read_u32(r)?;
    if marker != END_OBJECT_MARKER {
        return Err(PersistError::MissingMarker("end-object"));
    }
    Ok(catalogue)
}

fn read_descriptor<R: Read>(r: &mut R, now: Timestamp) -> Result<Descriptor, PersistError> {
    let marker = read_u16(r)?;
    if marker != START_DESCRIPTOR_MARKER {
        return Err(PersistError::MissingMarker("start-descriptor"));
    }
    let version = read_u16(r)?;
    if version > CURRENT_DESCRIPTOR_VERSION {
        return Err(PersistError::UnsupportedDescriptorVersion {
            found: version,
            max: CURRENT_DESCRIPTOR_VERSION,
        });
    }

    let name = read_str(r)?;
    let value_type = value_type_from_tag(read_u8(r)?)?;
    let access = access_from_tag(read_u8(r)?);
    let semantic_type = match read_u8(r)? {
        1 => SemanticType::Other(read_str(r)?),
        _ => SemanticType::Generic,
    };
    let limits = read_str(r)?;

    let source_count = read_u8(r)?;
    let mut sources = Vec::with_capacity(source_count as usize);
    for _ in 0..source_count {
        let raw = read_str(r)?;
        sources.push(raw.parse::<FieldId>()?);
    }

    let variant = read_variant(r, now)?;

    let marker = read_u16(r)?;
    if marker != END_DESCRIPTOR_MARKER {
        return Err(PersistError::MissingMarker("end-descriptor"));
    }

    Ok(Descriptor::new(name, value_type, access, semantic_type, limits, sources, variant)?)
}

fn read_variant<R: Read>(r: &mut R, now: Timestamp) -> Result<FieldVariant, PersistError> {
    Ok(match read_u8(r)? {
        0 => {
            let combiner = Combiner::stream_in(r)?;
            let predicates = read_predicates(r)?;
            FieldVariant::BooleanExpr(BooleanExprVariant { combiner, predicates })
        }
        1 => {
            let combiner = Combiner::stream_in(r)?;
            let predicates = read_predicates(r)?;
            let auto_reset = read_u8(r)? != 0;
            FieldVariant::ElapsedTime(ElapsedTimeVariant {
                combiner,
                predicates,
                auto_reset,
                accumulated: std::time::Duration::ZERO,
                last_tick_timestamp: None,
                previous_state: false,
            })
        }
        2 => {
            let (formula, result_type) = Formula::stream_in(r)?;
            FieldVariant::Formula(FormulaVariant { formula, result_type })
        }
        3 => {
            let mode = match read_u8(r)? {
                1 => MinMaxMode::Max,
                2 => MinMaxMode::Avg,
                _ => MinMaxMode::Min,
            };
            let result_type = value_type_from_tag(read_u8(r)?)?;
            FieldVariant::MinMaxAvg(MinMaxAvgVariant { mode, result_type })
        }
        4 => {
            let predicates = read_predicates(r)?;
            let invert = read_u8(r)? != 0;
            FieldVariant::OnCounter(OnCounterVariant { predicates, invert })
        }
        5 => {
            let pattern = read_str(r)?;
            FieldVariant::PatternFormat(PatternFormatVariant { pattern })
        }
        6 => {
            let hours = read_u8(r)?;
            FieldVariant::RunningAvg(RunningAvgVariant::new(hours))
        }
        7 => {
            let sample_period_minutes = read_u8(r)? as u32;
            let sampler = GraphSampler::new(sample_period_minutes, now)
                .map_err(|_| PersistError::MissingMarker("graph sample_period_minutes"))?;
            FieldVariant::Graph(GraphVariant { sampler })
        }
        tag => return Err(PersistError::UnknownVariantTag(tag)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use logic_catalogue::AccessMode;
    use logic_core::ValueType;
    use logic_expr::{Comparison, Literal, Operand};

    fn sample_catalogue() -> Catalogue {
        let mut cat = Catalogue::new("srv");
        cat.add(
            Descriptor::new(
                "front-door-open",
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
            .unwrap(),
        )
        .unwrap();
        cat.add(
            Descriptor::new(
                "sum",
                ValueType::F64,
                AccessMode::Read,
                SemanticType::Generic,
                "",
                vec![FieldId::new("gw", "A").unwrap(), FieldId::new("gw", "B").unwrap()],
                FieldVariant::Formula(FormulaVariant {
                    formula: Formula::parse("(%(0) + %(1))").unwrap(),
                    result_type: ValueType::F64,
                }),
            )
            .unwrap(),
        )
        .unwrap();
        cat.add(
            Descriptor::new(
                "outdoor-temp-graph",
                ValueType::F64,
                AccessMode::Read,
                SemanticType::Generic,
                "",
                vec![FieldId::new("gw", "Temp").unwrap()],
                FieldVariant::Graph(GraphVariant {
                    sampler: GraphSampler::new(5, Timestamp::ZERO).unwrap(),
                }),
            )
            .unwrap(),
        )
        .unwrap();
        cat
    }

    #[test]
    fn catalogue_round_trips_by_descriptor_equality() {
        let original = sample_catalogue();
        let mut bytes = Vec::new();
        write_catalogue(&original, &mut bytes).unwrap();

        let restored = read_catalogue(&mut &bytes[..], Timestamp::ZERO).unwrap();
        assert_eq!(restored.len(), original.len());
        for (a, b) in original.iter().zip(restored.iter()) {
            assert_eq!(a.name(), b.name());
            assert_eq!(a.value_type(), b.value_type());
            assert_eq!(a.sources(), b.sources());
        }
    }

    #[test]
    fn future_catalogue_version_is_rejected() {
        let original = sample_catalogue();
        let mut bytes = Vec::new();
        write_catalogue(&original, &mut bytes).unwrap();
        // Overwrite the version field (bytes 4..6, right after the marker) with something newer.
        bytes[4..6].copy_from_slice(&(CURRENT_CATALOGUE_VERSION + 1).to_le_bytes());

        let err = read_catalogue(&mut &bytes[..], Timestamp::ZERO).unwrap_err();
        assert!(matches!(err, PersistError::UnsupportedCatalogueVersion { .. }));
    }

    #[test]
    fn missing_descriptor_fields_default_on_load() {
        // auto_reset defaults to false and semantic_type defaults to
        // Generic when a descriptor round-trips through an older writer
        // that never set them explicitly (spec §6).
        let variant = FieldVariant::ElapsedTime(ElapsedTimeVariant {
            combiner: Combiner::Or,
            predicates: vec![Predicate::new(Comparison::Equal(Operand::Literal(Literal::Bool(
                true,
            ))))],
            auto_reset: false,
            accumulated: std::time::Duration::ZERO,
            last_tick_timestamp: None,
            previous_state: false,
        });
        let descriptor = Descriptor::new(
            "motion-elapsed",
            ValueType::Instant,
            AccessMode::Read,
            SemanticType::Generic,
            "",
            vec![FieldId::new("gw", "Motion").unwrap()],
            variant,
        )
        .unwrap();

        let mut bytes = Vec::new();
        write_descriptor(&descriptor, &mut bytes).unwrap();
        let restored = read_descriptor(&mut &bytes[..], Timestamp::ZERO).unwrap();
        assert_eq!(*restored.semantic_type(), SemanticType::Generic);
        match restored.variant() {
            FieldVariant::ElapsedTime(v) => assert!(!v.auto_reset),
            _ => panic!("expected ElapsedTime variant"),
        }
    }
}
