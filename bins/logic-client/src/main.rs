use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use logic_cache::FieldProvider;
use logic_catalogue::{AccessMode, Catalogue, Descriptor, SemanticType};
use logic_core::{Value, ValueType};
use logic_engine::Engine;
use logic_events::{FieldId, ProviderError, Timestamp};
use logic_expr::{Combiner, Comparison, Literal, Operand, Predicate};
use logic_protocol::{fetch_config, fetch_deltas, FetchDeltasResult};
use logic_variants::{BooleanExprVariant, FieldVariant};
use tracing_subscriber::EnvFilter;

/// Stands in for a real driver field bus — spec.md §1 treats the driver
/// runtime as an opaque external collaborator, and the RPC transport that
/// would carry a real server's deltas to this client is likewise out of
/// scope. Flips "demo.Switch" every few reads so there is something for
/// the delta loop below to report.
struct DemoProvider {
    calls: AtomicU64,
}

impl FieldProvider for DemoProvider {
    fn read(&self, field_id: &FieldId) -> Result<(Value, Timestamp), ProviderError> {
        if field_id.moniker != "demo" || field_id.field != "Switch" {
            return Err(ProviderError::UnknownField(field_id.to_string()));
        }
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        let mut value = Value::new_for_type(ValueType::String);
        let text = if (n / 5) % 2 == 0 { "open" } else { "closed" };
        value.set_string(text).expect("String descriptor accepts set_string");
        Ok((value, Timestamp::ZERO))
    }

    fn send_command(&self, field_id: &FieldId, _command: &str) -> Result<(), ProviderError> {
        if field_id.moniker != "demo" || field_id.field != "Switch" {
            return Err(ProviderError::UnknownField(field_id.to_string()));
        }
        Ok(())
    }
}

fn demo_engine() -> anyhow::Result<Engine> {
    let mut catalogue = Catalogue::new("logic-client-demo");
    catalogue.add(Descriptor::new(
        "door-open",
        ValueType::Bool,
        AccessMode::Read,
        SemanticType::Generic,
        "",
        vec![FieldId::new("demo", "Switch")?],
        FieldVariant::BooleanExpr(BooleanExprVariant {
            combiner: Combiner::And,
            predicates: vec![Predicate::new(Comparison::Equal(Operand::Literal(
                Literal::Str("open".into()),
            )))],
        }),
    )?)?;
    let provider = DemoProvider { calls: AtomicU64::new(0) };
    Ok(Engine::new(catalogue, Box::new(provider)))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let engine = demo_engine()?;
    eprintln!("logic-client: attached to an in-process demo engine. Polling...");

    let config = fetch_config(&engine);
    let mut known_serials = vec![0u64; config.descriptors.len()];

    let mut last_report = Instant::now();
    let mut tick_count: u64 = 0;

    loop {
        engine.tick(Timestamp(0));
        tick_count += 1;

        match fetch_deltas(&engine, config.catalogue_serial, &known_serials) {
            FetchDeltasResult::Delta(bytes) => {
                if !bytes.is_empty() {
                    let state = engine.read();
                    for (index, descriptor) in state.catalogue.iter().enumerate() {
                        known_serials[index] = descriptor.value_serial();
                        eprintln!(
                            "logic-client: {} = {:?}",
                            descriptor.name(),
                            descriptor.current_value()
                        );
                    }
                }
            }
            FetchDeltasResult::OutOfSync => {
                eprintln!("logic-client: out of sync, refetching config");
            }
        }

        if last_report.elapsed() >= Duration::from_secs(1) {
            eprintln!("logic-client: {tick_count} ticks/s");
            tick_count = 0;
            last_report = Instant::now();
        }

        std::thread::sleep(Duration::from_millis(200));
    }
}
