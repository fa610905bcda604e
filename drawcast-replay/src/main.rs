//! drawcast-replay: entry point.
//!
//! ```text
//! drawcast-replay SCRIPT                   Replay a drawing script
//! drawcast-replay --config <path> SCRIPT   Load a custom config TOML
//! drawcast-replay --gen-config             Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use drawcast_replay::config::ReplayConfig;
use drawcast_replay::runner::Replay;
use drawcast_replay::script::Script;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "drawcast-replay", about = "Replay a drawing script through the order encoder")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "drawcast-replay.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Drawing script to replay.
    #[arg(required_unless_present = "gen_config")]
    script: Option<PathBuf>,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&ReplayConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let config = ReplayConfig::load(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("drawcast-replay v{}", env!("CARGO_PKG_VERSION"));

    let Some(path) = cli.script else {
        return Err("no script given".into());
    };
    let script = Script::load(&path)?;
    info!("{}: {} ops", path.display(), script.ops.len());

    let replay = Replay::new(&config);

    // Ctrl-C handler.
    let stop = replay.stop_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received; stopping replay");
        stop.stop();
    });

    let report = replay.run(script).await?;

    if config.output.summary {
        println!(
            "{} commands ({} rejected), {} pdus, {} orders, {} bytes",
            report.session.commands,
            report.session.rejected,
            report.pdus,
            report.orders,
            report.bytes
        );
    }

    Ok(())
}
