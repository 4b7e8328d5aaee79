use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gsi_digest_lib::replay::{
    summary_sidecar_path, write_replay_summary, ReplaySession, ReplaySettings,
    DEFAULT_MAX_BUFFERED_KILLS,
};
use gsi_digest_lib::{EventKind, GsiEngine, IdentityRegistry};

const LOG_ENV_VAR: &str = "GSI_LOG";

/// Replays recorded game-state snapshots and kill records (one JSON object
/// per line) through the event engine.
#[derive(Parser, Debug)]
#[command(name = "gsi-replay", version)]
struct Cli {
    /// NDJSON capture to replay
    input: PathBuf,

    /// JSON file with team and player identity extensions
    #[arg(long)]
    identity: Option<PathBuf>,

    /// Print every derived event (except `data`) as a JSON line
    #[arg(long)]
    events: bool,

    /// Write the summary next to the input instead of printing it
    #[arg(long)]
    write_summary: bool,

    /// Maximum number of kill events kept in the summary
    #[arg(long, default_value_t = DEFAULT_MAX_BUFFERED_KILLS)]
    max_kills: usize,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let registry = match cli.identity.as_deref() {
        Some(path) => IdentityRegistry::load(path)
            .with_context(|| format!("loading identity file '{}'", path.display()))?,
        None => IdentityRegistry::default(),
    };

    let settings = ReplaySettings {
        max_buffered_kills: cli.max_kills,
    };
    let mut session = ReplaySession::new(GsiEngine::with_registry(registry), &settings);

    if cli.events {
        register_event_printer(session.engine_mut());
    }

    let file = File::open(&cli.input)
        .with_context(|| format!("opening capture '{}'", cli.input.display()))?;
    session
        .replay(BufReader::new(file), &cli.input)
        .context("replaying capture")?;

    let summary = session.summary(Some(&cli.input));
    tracing::info!(
        total_lines = summary.total_lines,
        snapshots = summary.snapshots,
        rejected_lines = summary.rejected_lines,
        "Replay finished"
    );

    if cli.write_summary {
        let sidecar_path = summary_sidecar_path(&cli.input);
        write_replay_summary(&sidecar_path, &summary)
            .with_context(|| format!("writing summary '{}'", sidecar_path.display()))?;
        tracing::info!(summary_path = %sidecar_path.display(), "Wrote replay summary");
    } else {
        let serialized = serde_json::to_string_pretty(&summary).context("serializing summary")?;
        println!("{serialized}");
    }

    Ok(())
}

fn register_event_printer(engine: &mut GsiEngine) {
    let printed_kinds = [
        EventKind::RoundEnd,
        EventKind::MatchEnd,
        EventKind::BombPlantStart,
        EventKind::BombPlant,
        EventKind::BombExplode,
        EventKind::BombDefuse,
        EventKind::DefuseStart,
        EventKind::DefuseStop,
        EventKind::Kill,
    ];

    for kind in printed_kinds {
        engine.on(kind, |event| {
            let line = serde_json::to_string(event)?;
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{line}")?;
            Ok(())
        });
    }
}
