use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

use voice_gate::router::parse_event_line;
use voice_gate::{Config, Daemon, intent};

/// Voice Gate - confirmation gate for cloud-agent voice assistants
#[derive(Parser)]
#[command(name = "voice-gate", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/voice-gate/config.toml)
    #[arg(short, long, env = "VOICE_GATE_CONFIG")]
    config: Option<PathBuf>,

    /// Port for the HTTP event API
    #[arg(long)]
    port: Option<u16>,

    /// Do not start the HTTP event API
    #[arg(long)]
    no_server: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gate, reading events from stdin and HTTP (default)
    Run,
    /// Decode one agent reply and print the result
    Parse {
        /// File holding the reply body, or "-" for stdin
        #[arg(default_value = "-")]
        input: PathBuf,
    },
    /// Replay a newline-delimited event script and print each outcome
    Simulate {
        /// Event script, one JSON event per line
        script: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voice_gate=info",
        1 => "info,voice_gate=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(Command::Parse { input }) = &cli.command {
        return parse_reply(input);
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.no_server {
        config.server.enabled = false;
    }

    match cli.command {
        Some(Command::Simulate { script }) => simulate(config, &script).await,
        Some(Command::Parse { .. } | Command::Run) | None => {
            tracing::info!(
                dispatch = %config.dispatch.mode,
                server = config.server.enabled,
                "starting voice gate"
            );
            Daemon::new(config).run().await?;
            Ok(())
        }
    }
}

/// Decode one reply and print it as JSON
fn parse_reply(input: &Path) -> anyhow::Result<()> {
    let raw = if input == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        buf
    } else {
        std::fs::read(input)?
    };

    let reply = intent::parse(&raw)?;
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

/// Replay an event script through a fresh router
async fn simulate(config: Config, script: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(script)?;
    let mut router = Daemon::new(config).build_router()?;

    for (n, line) in content.lines().enumerate() {
        let Some(event) = parse_event_line(line)
            .map_err(|e| anyhow::anyhow!("{}:{}: {e}", script.display(), n + 1))?
        else {
            continue;
        };

        let kind = event.kind();
        let outcome = router.on_event(event).await;
        println!("{:>3} {kind:<22} {outcome}", n + 1);
    }

    let snapshot = router.gate().snapshot(Instant::now());
    println!("{}", serde_json::to_string(&snapshot)?);
    Ok(())
}
