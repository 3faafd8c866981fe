//! Ambient on-disk configuration for the server binary (spec §5/§6's
//! external environment, not the virtual-field catalogue itself).

pub mod config;

pub use config::{ConfigError, LogicServerConfig};
