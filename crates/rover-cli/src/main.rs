//! `rover` – teleoperation server for a small differential-drive robot.
//!
//! Waits for one client on the control port, reads the wheel geometry
//! handshake, then executes the client's commands while streaming pose and
//! video telemetry back over the same connection.
//!
//! Exit status is `0` after an end-of-program command or Ctrl-C, and `1` when
//! the server cannot start or the control channel is lost.

mod config;
mod session;
mod telemetry;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use rover_middleware::CommandReader;
use rover_types::RoverError;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::session::Session;

#[derive(Debug, Parser)]
#[command(name = "rover", version, about = "Robot teleoperation server")]
struct Args {
    /// Control channel port (overrides the config file and ROVER_PORT).
    #[arg(long)]
    port: Option<u16>,

    /// Config file to use instead of ~/.rover/config.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    write_config: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _tracing = telemetry::init_tracing("rover");

    print_banner();

    let config_path = args.config.clone().unwrap_or_else(config::config_path);
    let cfg = resolve_config(&args, &config_path);

    if args.write_config {
        return match config::save_to(&cfg, &config_path) {
            Ok(()) => {
                println!("  Config written to {}", config_path.display().to_string().bold());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {e}", "Config error".red());
                ExitCode::FAILURE
            }
        };
    }

    // ── Shutdown token ────────────────────────────────────────────────────
    let shutdown = CancellationToken::new();
    let on_ctrlc = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received, stopping the robot …".yellow().bold());
        on_ctrlc.cancel();
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start the async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(cfg, shutdown)) {
        Ok(()) => {
            println!("{}", "  ✓ Session closed.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "rover stopped with an error");
            eprintln!("{}: {e}", "Error".red().bold());
            ExitCode::FAILURE
        }
    }
}

/// File (if any), then environment, then command line.  A broken file is
/// reported and replaced by defaults.
fn resolve_config(args: &Args, path: &Path) -> Config {
    let mut cfg = match config::load_from(path) {
        Ok(Some(cfg)) => {
            info!(path = %path.display(), "config loaded");
            cfg
        }
        Ok(None) => Config::default(),
        Err(e) => {
            warn!(error = %e, "using default configuration");
            Config::default()
        }
    };
    config::apply_env_overrides(&mut cfg);
    if let Some(port) = args.port {
        cfg.port = port;
    }
    cfg
}

/// Accept one client and run its session to the end.
async fn serve(cfg: Config, shutdown: CancellationToken) -> Result<(), RoverError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "waiting for client");
    println!("  Listening on {}", addr.to_string().bold());

    let (stream, peer) = tokio::select! {
        accepted = listener.accept() => accepted?,
        _ = shutdown.cancelled() => {
            info!("shutdown before any client connected");
            return Ok(());
        }
    };
    stream.set_nodelay(true)?;
    info!(%peer, "client connected");

    let (read_half, write_half) = stream.into_split();
    let mut commands = CommandReader::new(BufReader::new(read_half));
    let geometry = tokio::select! {
        geometry = commands.read_handshake() => geometry,
        _ = shutdown.cancelled() => return Ok(()),
    };

    Session::start(&cfg, geometry, write_half, shutdown)
        .run(commands)
        .await
}

fn print_banner() {
    println!();
    println!("{}", "  ┌──────────────────────────────┐".bold().cyan());
    println!("{}", "  │        rover teleop          │".bold().cyan());
    println!("{}", "  └──────────────────────────────┘".bold().cyan());
    println!();
}
