//! Ramen Bridge — replays a JSON-lines analytics event log through the
//! Ramen adaptor and prints every published settings object to stdout.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};

use ramen_core::config::{AppConfig, LogConfig};
use ramen_core::error::BridgeError;
use ramen_core::types::SettingsObject;
use ramen_core::widget::Widget;
use ramen_web_sdk::{Destination, Event, EventKind, EventRouter, RamenAdaptor};

#[derive(Parser, Debug)]
#[command(name = "ramen-bridge")]
#[command(about = "Replay analytics events into Ramen widget settings")]
#[command(version)]
struct Cli {
    /// JSON-lines event log, or `-` for stdin
    #[arg(long, default_value = "-")]
    events: PathBuf,

    /// Ramen organization id (overrides config)
    #[arg(long, env = "RAMEN_BRIDGE__RAMEN__ORGANIZATION_ID")]
    organization_id: Option<String>,

    /// Optional TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Human-readable logs instead of JSON
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

/// Widget stand-in that writes each published settings object as one JSON
/// line on stdout.
struct StdoutWidget;

impl Widget for StdoutWidget {
    fn is_loaded(&self) -> bool {
        true
    }

    fn publish(&self, settings: &SettingsObject) {
        let mut out = io::stdout().lock();
        let written = serde_json::to_writer(&mut out, settings)
            .map_err(BridgeError::from)
            .and_then(|()| writeln!(out).map_err(BridgeError::from));
        if let Err(e) = written {
            warn!(error = %e, "failed to write settings");
        }
    }

    fn go(&self) {
        debug!("Ramen.go()");
    }

    fn track_named(&self, event: &str) {
        info!(event, "Ramen.Api.track_named()");
    }
}

fn init_tracing(log: &LogConfig, pretty: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log.filter.clone().into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if pretty || !log.json {
        builder.pretty().init();
    } else {
        builder.json().init();
    }
}

fn open_events(path: &Path) -> anyhow::Result<Box<dyn BufRead>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path)
        .with_context(|| format!("failed to open event log {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config =
        AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(organization_id) = cli.organization_id {
        config.ramen.organization_id = organization_id;
    }

    init_tracing(&config.log, cli.pretty);

    let adaptor = RamenAdaptor::new(config.ramen.clone()).with_widget(Arc::new(StdoutWidget));
    adaptor.validate_config()?;

    info!(
        organization_id = %config.ramen.organization_id,
        integration = %config.ramen.integration_name,
        "Configuration loaded"
    );

    let mut router = EventRouter::new().with_destination(Box::new(adaptor));
    router.initialize();

    let mut rejected = 0u64;
    for (index, line) in open_events(&cli.events)?.lines().enumerate() {
        let line = line.map_err(BridgeError::from)?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Event>(&line) {
            Ok(event) => {
                router.ingest(&event);
            }
            Err(e) => {
                rejected += 1;
                let err = BridgeError::InvalidEvent {
                    line: index + 1,
                    reason: e.to_string(),
                };
                warn!(error = %err, "skipping event");
            }
        }
    }

    for kind in [
        EventKind::Identify,
        EventKind::Group,
        EventKind::Page,
        EventKind::Track,
    ] {
        let metrics = router.metrics(kind);
        info!(
            kind = kind.as_str(),
            received = metrics.received,
            dispatched = metrics.dispatched,
            skipped = metrics.skipped,
            "replay summary"
        );
    }
    info!(
        total = router.total_received(),
        rejected,
        "Replay complete"
    );

    Ok(())
}
