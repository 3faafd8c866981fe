use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use logic_cache::FieldProvider;
use logic_catalogue::Catalogue;
use logic_config::LogicServerConfig;
use logic_core::Value;
use logic_engine::Engine;
use logic_events::{FieldId, ProviderError, Timestamp};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "/etc/logic-server/config.toml";

/// Stands in for the home-automation driver runtime, which spec.md §1
/// treats as an opaque external collaborator ("the underlying driver
/// runtime"). A real deployment replaces this with a provider wired to
/// that runtime's field bus.
struct UnconnectedProvider;

impl FieldProvider for UnconnectedProvider {
    fn read(&self, field_id: &FieldId) -> Result<(Value, Timestamp), ProviderError> {
        Err(ProviderError::UnknownField(field_id.to_string()))
    }

    fn send_command(&self, field_id: &FieldId, _command: &str) -> Result<(), ProviderError> {
        Err(ProviderError::UnknownField(field_id.to_string()))
    }
}

fn load_catalogue(path: &Path) -> anyhow::Result<Catalogue> {
    match File::open(path) {
        Ok(file) => {
            let mut reader = BufReader::new(file);
            Ok(logic_persist::read_catalogue(&mut reader, Timestamp::ZERO)?)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "no catalogue on disk, starting empty");
            Ok(Catalogue::new("logic-server"))
        }
        Err(e) => Err(e.into()),
    }
}

fn main() -> anyhow::Result<()> {
    let config_path =
        std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = LogicServerConfig::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let catalogue = load_catalogue(Path::new(&config.catalogue_path))?;
    info!(
        fields = catalogue.len(),
        bind = %config.bind_address,
        tick_ms = config.tick_period_ms,
        "logic-server starting"
    );

    let engine = Arc::new(Engine::new(catalogue, Box::new(UnconnectedProvider)));
    run_scheduler(engine, Duration::from_millis(config.tick_period_ms));

    Ok(())
}

/// Ticks the engine on a fixed period (spec §5). If a tick overruns its
/// period the next one is skipped rather than queued — the scheduler
/// never falls into a backlog.
fn run_scheduler(engine: Arc<Engine>, period: Duration) {
    let mut next_tick = Instant::now();
    loop {
        next_tick += period;
        engine.tick(Timestamp(logic_util::now_ns()));

        let now = Instant::now();
        if next_tick <= now {
            warn!("tick overran its period; skipping ahead instead of queueing");
            next_tick = now;
        } else {
            std::thread::sleep(next_tick - now);
        }
    }
}
