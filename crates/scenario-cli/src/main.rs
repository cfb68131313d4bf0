//! scenario-run - Plays an MME scenario list from the command line
//!
//! Messages sent by the scenarios are written to stdout, one per line, as
//! `<destination> <payload>`. Messages from the system under test are read
//! from stdin, one per line, as `[<origin>] <message file>`.

use anyhow::{bail, Context, Result};
use clap::Parser;
use scenario_core::ScenarioStatus;
use scenario_player::{
    ChannelBus, Outbound, Player, PlayerConfig, PlayerHandle, PlayerReport, Playlist,
};
use scenario_script::{Loader, RonMessageCodec};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "scenario-run", version, about = "Play MME test scenarios")]
struct Cli {
    /// Player configuration file (RON)
    #[arg(long, conflicts_with = "scenarios")]
    config: Option<PathBuf>,

    /// Scenario list to play, without a configuration file
    #[arg(long)]
    scenarios: Option<PathBuf>,

    /// Where to write the report, overriding the configuration
    #[arg(long)]
    results: Option<PathBuf>,

    /// Load the scenarios and report load failures without playing
    #[arg(long)]
    check: bool,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let code = match run(cli).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            error!("{:#}", e);
            2
        }
    };
    // stdin may still be blocked in a read
    std::process::exit(code);
}

/// Log to stderr; stdout carries the outbound messages
fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn load_config(cli: &Cli) -> Result<PlayerConfig> {
    let mut config = match (&cli.config, &cli.scenarios) {
        (Some(path), _) => PlayerConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        (None, Some(list)) => PlayerConfig::new(list),
        (None, None) => bail!("either --config or --scenarios is required"),
    };
    if let Some(results) = &cli.results {
        config.result_file = Some(results.clone());
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<bool> {
    let config = load_config(&cli)?;
    if cli.check {
        return check(&config);
    }

    let (bus, outbound) = ChannelBus::new();
    let player = Player::from_config(&config, Box::new(RonMessageCodec), Box::new(bus))
        .with_context(|| format!("loading {}", config.scenario_list.display()))?;
    let printer = tokio::spawn(print_outbound(outbound));
    let reader = tokio::spawn(read_inbound(player.handle()));

    let report = player.run().await?;
    reader.abort();
    // ends once the player's bus is dropped
    printer.await??;

    eprint!("{}", report);
    if let Some(path) = &config.result_file {
        report.write_to(path)?;
        info!("Report written to {}", path.display());
    }
    Ok(report.all_passed())
}

fn check(config: &PlayerConfig) -> Result<bool> {
    let scenarios = Loader::new(&RonMessageCodec)
        .continue_on_error(config.continue_on_load_error)
        .load_playlist(&config.scenario_list)?;
    let report = PlayerReport::from_playlist(&Playlist::new(scenarios));
    eprint!("{}", report);
    Ok(report.count(ScenarioStatus::LoadFailed) == 0)
}

async fn print_outbound(mut outbound: UnboundedReceiver<Outbound>) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(Outbound {
        destination,
        message,
    }) = outbound.recv().await
    {
        let line = format!(
            "{} {}\n",
            destination,
            String::from_utf8_lossy(&message.payload)
        );
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}

async fn read_inbound(handle: PlayerHandle) -> Result<()> {
    let codec = RonMessageCodec;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        let (origin, file) = match line.split_once(char::is_whitespace) {
            Some((origin, file)) => (Some(origin), file.trim()),
            None => (None, line),
        };
        match codec.read_wire(Path::new(file)) {
            Ok(wire) => {
                let wire = match origin {
                    Some(origin) => wire.from_task(origin),
                    None => wire,
                };
                handle.deliver(wire)?;
            }
            Err(e) => warn!("Skipping {}: {}", file, e),
        }
    }
    Ok(())
}
