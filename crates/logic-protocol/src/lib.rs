//! The client protocol surface (spec §4.E "state machine", §6): config
//! fetch, incremental delta fetch, graph sample fetch, and the
//! `ResetElapsed` command, plus the client-side connection state machine.
//! The RPC transport framing itself is a deliberate non-goal (spec §1) —
//! this crate defines the request/response shapes and the one binary
//! encoding the spec pins down (the delta stream), leaving how bytes
//! reach the wire to the enclosing service.

use std::io::Write;

use logic_catalogue::{AccessMode, Descriptor};
use logic_core::ValueType;
use logic_engine::{Engine, EngineError};
use logic_variants::FieldVariant;

/// Frames one record in a [`FetchDeltasResult::Delta`] byte stream (spec
/// §6: "Delta encoding: concatenated records of `[frame-marker]...`").
const DELTA_FRAME_MARKER: u8 = 0xD3;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("no graph field named '{0}'")]
    UnknownGraphField(String),

    #[error("'{0}' is not a Graph field")]
    NotAGraphField(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A read-only projection of a descriptor's identity, sent to clients on
/// `FetchConfig` (spec §6: `(Catalogue, catalogue_serial)`).
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorSnapshot {
    pub name: String,
    pub value_type: ValueType,
    pub access: AccessMode,
    pub sources: Vec<String>,
}

impl DescriptorSnapshot {
    fn from_descriptor(descriptor: &Descriptor) -> Self {
        Self {
            name: descriptor.name().to_string(),
            value_type: descriptor.value_type(),
            access: descriptor.access(),
            sources: descriptor.sources().iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    pub catalogue_serial: u64,
    pub descriptors: Vec<DescriptorSnapshot>,
}

/// Answers `FetchConfig`: every `normally_exposed` descriptor plus the
/// catalogue's serial (spec §3: Graph fields "are not exposed through the
/// driver façade").
pub fn fetch_config(engine: &Engine) -> ConfigSnapshot {
    let state = engine.read();
    ConfigSnapshot {
        catalogue_serial: state.catalogue.serial(),
        descriptors: state
            .catalogue
            .iter()
            .filter(|d| d.normally_exposed())
            .map(DescriptorSnapshot::from_descriptor)
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchDeltasResult {
    Delta(Vec<u8>),
    OutOfSync,
}

/// Answers `FetchDeltas`. A stale `known_catalogue_serial`, or a
/// `known_value_serials` vector whose length no longer matches the
/// catalogue, forces `OutOfSync` rather than risk indexing into a
/// catalogue the client hasn't seen (spec §5: "fetch_deltas(known_
/// catalogue_serial, known_value_serials)"; §6: "OutOfSync if serial
/// stale").
pub fn fetch_deltas(
    engine: &Engine,
    known_catalogue_serial: u64,
    known_value_serials: &[u64],
) -> FetchDeltasResult {
    let state = engine.read();
    if state.catalogue.serial() != known_catalogue_serial
        || known_value_serials.len() != state.catalogue.len()
    {
        return FetchDeltasResult::OutOfSync;
    }

    let mut bytes = Vec::new();
    for (index, descriptor) in state.catalogue.iter().enumerate() {
        if descriptor.value_serial() <= known_value_serials[index] {
            continue;
        }
        bytes.push(DELTA_FRAME_MARKER);
        bytes.extend_from_slice(&(index as u32).to_le_bytes());
        let value = descriptor.current_value();
        bytes.push(value.is_error() as u8);
        if !value.is_error() {
            // stream_out never fails writing into a Vec<u8>.
            value.stream_out(&mut bytes).expect("in-memory write cannot fail");
        }
    }
    FetchDeltasResult::Delta(bytes)
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchGraphResult {
    NewSamples(Vec<f32>),
    NoNewSamples,
    Error,
}

/// Answers `FetchGraph`. A stale `known_cfg_serial` or a name that isn't a
/// currently-configured `Graph` field both answer `Error`, forcing the
/// client back through `FetchConfig` (spec §6).
pub fn fetch_graph(
    engine: &Engine,
    graph_name: &str,
    known_cfg_serial: u64,
    known_sample_serial: u64,
) -> FetchGraphResult {
    let state = engine.read();
    if state.catalogue.serial() != known_cfg_serial {
        return FetchGraphResult::Error;
    }
    let Some(index) = state.catalogue.find_by_name(graph_name) else {
        return FetchGraphResult::Error;
    };
    let descriptor = state.catalogue.get(index).expect("index just resolved");
    let FieldVariant::Graph(graph) = descriptor.variant() else {
        return FetchGraphResult::Error;
    };

    let samples = graph.sampler.buffer().since(known_sample_serial);
    if samples.is_empty() {
        FetchGraphResult::NoNewSamples
    } else {
        FetchGraphResult::NewSamples(samples)
    }
}

/// Answers `ResetElapsed`.
pub fn reset_elapsed(engine: &Engine, field_name: &str) -> Result<(), ProtocolError> {
    Ok(engine.reset_elapsed(field_name)?)
}

/// The client-side connection lifecycle (spec §4.E, "State machine").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    FetchingConfig,
    Steady { catalogue_serial: u64 },
    Resyncing,
}

impl ConnectionState {
    pub fn new() -> Self {
        ConnectionState::Disconnected
    }

    pub fn begin_fetching_config(self) -> Self {
        ConnectionState::FetchingConfig
    }

    /// Entry to `Steady` requires recording the catalogue serial the
    /// config snapshot was taken at (spec §4.E).
    pub fn config_received(self, catalogue_serial: u64) -> Self {
        ConnectionState::Steady { catalogue_serial }
    }

    /// A protocol-level `OutOfSync` forces `Resyncing`; no retry on the
    /// original delta is attempted (spec §4.E, "Failure semantics").
    pub fn delta_out_of_sync(self) -> Self {
        ConnectionState::Resyncing
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}
