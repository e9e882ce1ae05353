//! `facetrack` – face-tracking head controller.
//!
//! 1. Loads `~/.facetrack/config.toml` (or `--config`), applying
//!    `FACETRACK_*` overrides.
//! 2. Connects to the motor server (and, optionally, the vision server) over
//!    HTTP, or to in-process simulators with `--dry-run`.
//! 3. Starts the controller tasks and serves the HTTP interface.
//! 4. Shuts everything down on Ctrl-C.

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use tracing::{info, warn};

use facetrack_cockpit::CockpitServer;
use facetrack_hal::{
    Actuator, HttpActuator, HttpVisionSource, RecordingActuator, ScriptedVision, VisionSource,
};
use facetrack_runtime::{Controller, init_tracing};

use crate::config::Config;

/// Commands kept by the dry-run actuator.
const DRY_RUN_HISTORY: usize = 1024;

#[derive(Debug, Parser)]
#[command(name = "facetrack", version, about = "Face-tracking head controller")]
struct Cli {
    /// Configuration file (default: ~/.facetrack/config.toml).
    #[arg(long, env = "FACETRACK_CONFIG")]
    config: Option<PathBuf>,

    /// Use simulated hardware instead of the motor and vision servers.
    #[arg(long)]
    dry_run: bool,

    /// Override the listening port.
    #[arg(long)]
    port: Option<u16>,

    /// Write a default configuration file and exit.
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _tracing = init_tracing("facetrack");

    let path = cli.config.clone().unwrap_or_else(config::config_path);

    if cli.init_config {
        config::save_to(&Config::default(), &path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("  Wrote default configuration to {}", path.display().to_string().bold());
        return Ok(());
    }

    let mut cfg = config::load(&path).context("loading configuration")?;
    if cli.dry_run {
        cfg.dry_run = true;
    }
    if let Some(port) = cli.port {
        cfg.listen_port = port;
    }
    cfg.validate().context("invalid configuration")?;

    print_banner(&cfg, &path);

    let (actuator, vision) = collaborators(&cfg)?;
    let controller = Controller::start(cfg.runtime_config()?, actuator, vision)?;

    let served = CockpitServer::new(controller.handle())
        .with_port(cfg.listen_port)
        .run_until(shutdown_signal())
        .await;

    controller.shutdown().await;
    served.context("HTTP server failed")?;
    info!("facetrack stopped");
    Ok(())
}

type Collaborators = (Arc<dyn Actuator>, Option<Arc<dyn VisionSource>>);

fn collaborators(cfg: &Config) -> anyhow::Result<Collaborators> {
    if cfg.dry_run {
        let actuator = RecordingActuator::new()
            .with_history_limit(DRY_RUN_HISTORY)
            .with_logging();
        let vision = cfg
            .vision
            .poll_enabled
            .then(|| Arc::new(ScriptedVision::centered()) as Arc<dyn VisionSource>);
        return Ok((Arc::new(actuator), vision));
    }

    let actuator = HttpActuator::new(&cfg.actuator.motor_url, cfg.actuator.request_timeout())
        .context("building motor client")?;
    let vision = if cfg.vision.poll_enabled {
        let source = HttpVisionSource::new(&cfg.vision.vision_url, cfg.vision.request_timeout())
            .context("building vision client")?;
        Some(Arc::new(source) as Arc<dyn VisionSource>)
    } else {
        None
    };
    Ok((Arc::new(actuator), vision))
}

/// Resolves on Ctrl-C.  If the handler cannot be installed the server runs
/// until killed.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            println!();
            println!("{}", "  Ctrl-C received – shutting down …".yellow().bold());
        }
        Err(e) => {
            warn!(error = %e, "failed to install Ctrl-C handler; graceful shutdown unavailable");
            std::future::pending::<()>().await;
        }
    }
}

fn print_banner(cfg: &Config, path: &Path) {
    println!();
    println!(
        "  {} {}",
        "facetrack".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  config   {}", path.display().to_string().dimmed());
    if cfg.dry_run {
        println!("  motor    {}", "simulated (dry run)".yellow());
    } else {
        println!("  motor    {}", cfg.actuator.motor_url.bold());
    }
    if cfg.vision.poll_enabled {
        println!("  vision   {}", cfg.vision.vision_url.bold());
    } else {
        println!("  vision   {}", "push only (GET /face)".dimmed());
    }
    println!(
        "  listen   {}",
        format!("http://0.0.0.0:{}", cfg.listen_port).green()
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "facetrack",
            "--config",
            "/tmp/ft.toml",
            "--dry-run",
            "--port",
            "4444",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/ft.toml")));
        assert!(cli.dry_run);
        assert_eq!(cli.port, Some(4444));
        assert!(!cli.init_config);
    }

    #[tokio::test]
    async fn dry_run_uses_simulators() {
        let mut cfg = Config::default();
        cfg.dry_run = true;
        cfg.vision.poll_enabled = true;
        let (actuator, vision) = collaborators(&cfg).unwrap();
        assert!(actuator.trigger_preset("nod").await.is_ok());
        assert_eq!(
            vision.unwrap().face_position().await.unwrap(),
            facetrack_types::RawFacePosition::CENTER
        );
    }

    #[test]
    fn vision_is_optional() {
        let cfg = Config::default();
        let (_, vision) = collaborators(&cfg).unwrap();
        assert!(vision.is_none());
    }
}
