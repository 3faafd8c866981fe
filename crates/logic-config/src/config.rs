use serde::Deserialize;
use std::path::Path;

/// On-disk TOML configuration for the server binary (spec §5/§6): the
/// scheduler's tick cadence, where the catalogue blob lives, where the
/// protocol surface binds, and the logging level.
#[derive(Deserialize, Debug)]
pub struct LogicServerConfig {
    #[serde(default = "defaults::catalogue_path")]
    pub catalogue_path: String,
    #[serde(default = "defaults::tick_period_ms")]
    pub tick_period_ms: u64,
    #[serde(default = "defaults::bind_address")]
    pub bind_address: String,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
}

mod defaults {
    pub fn catalogue_path() -> String {
        "/etc/logic-server/catalogue.bin".into()
    }

    /// Matches the ~500ms scheduler cadence (spec §5).
    pub fn tick_period_ms() -> u64 {
        500
    }

    pub fn bind_address() -> String {
        "127.0.0.1:8900".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

impl LogicServerConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: LogicServerConfig = toml::from_str(&raw)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_documented_defaults() {
        let config: LogicServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.catalogue_path, defaults::catalogue_path());
        assert_eq!(config.tick_period_ms, 500);
        assert_eq!(config.bind_address, "127.0.0.1:8900");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn explicit_values_override_defaults() {
        let toml_src = r#"
            catalogue_path = "/var/lib/logic-server/catalogue.bin"
            tick_period_ms = 250
            bind_address = "0.0.0.0:9000"
            log_level = "debug"
        "#;
        let config: LogicServerConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.catalogue_path, "/var/lib/logic-server/catalogue.bin");
        assert_eq!(config.tick_period_ms, 250);
    }
}
