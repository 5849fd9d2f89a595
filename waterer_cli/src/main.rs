#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod dose;
mod error_fmt;
mod stdio;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Layer, Registry, fmt};
use waterer_config::{Calibration, Config};
use waterer_core::error::{Result as CoreResult, WatererError};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(e) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        tracing::error!(error = %format!("{e:#}"), "exiting with error");
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> CoreResult<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging)?;

    let calib = match &cli.calibration {
        Some(path) => Some(load_calibration(path)?),
        None => None,
    };
    let simulate = cli.simulate || cfg.simulation.enabled;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .wrap_err("install Ctrl-C handler")?;
    }

    match cli.cmd {
        Commands::Run => {
            tracing::info!(simulate, "station starting");
            dose::run_station(&cfg, calib.as_ref(), simulate, &shutdown)
        }
        Commands::Dose { ml } => {
            let started = Instant::now();
            let result = dose::run_dose(&cfg, calib.as_ref(), ml, simulate, &shutdown);
            let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            if cli.json {
                let (dispensed, reason) = match &result {
                    Ok(v) => (Some(*v), None),
                    Err(e) => (None, Some(dose::abort_reason_name(e))),
                };
                let line = serde_json::json!({
                    "timestamp": unix_ms(),
                    "target_ml": ml,
                    "dispensed_ml": dispensed,
                    "duration_ms": duration_ms,
                    "simulated": simulate || !dose::hardware_available(),
                    "abort_reason": reason,
                });
                println!("{line}");
            } else if let Ok(v) = &result {
                println!("dose complete: {v:.1} ml");
            }
            result.map(|_| ())
        }
        Commands::SelfCheck => {
            // opening the outputs proves the pins are usable
            let _hw = dose::make_hardware(&cfg, simulate)?;
            println!("ok");
            Ok(())
        }
    }
}

fn config_err(msg: String) -> eyre::Report {
    eyre::Report::new(WatererError::Config(msg))
}

fn load_config(path: &Path) -> CoreResult<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| config_err(format!("read {}: {e}", path.display())))?;
    let cfg = waterer_config::load_toml(&text)
        .map_err(|e| config_err(format!("parse {}: {e}", path.display())))?;
    cfg.validate().map_err(|e| config_err(format!("{e:#}")))?;
    Ok(cfg)
}

fn load_calibration(path: &Path) -> CoreResult<Calibration> {
    let calib = waterer_config::load_calibration_csv(path).map_err(|e| config_err(format!("{e:#}")))?;
    tracing::info!(
        pulses_per_liter = calib.pulses_per_liter,
        path = %path.display(),
        "calibration loaded"
    );
    Ok(calib)
}

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Console logs go to stderr so stdout stays reserved for link/JSON output.
fn init_tracing(
    json: bool,
    cli_level: &str,
    logging: &waterer_config::Logging,
) -> CoreResult<()> {
    let console_filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else if logging.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(cli_level).wrap_err_with(|| format!("bad --log-level {cli_level:?}"))?
    };

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let console = fmt::layer().with_writer(std::io::stderr).with_target(false);
    if json {
        layers.push(console.json().with_filter(console_filter).boxed());
    } else {
        layers.push(console.with_filter(console_filter).boxed());
    }

    if let Some(file) = &logging.file {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| config_err(format!("logging.file {file:?} has no file name")))?;
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let level = logging.level.as_deref().unwrap_or("info");
        let file_filter =
            EnvFilter::try_new(level).wrap_err_with(|| format!("bad logging.level {level:?}"))?;
        layers.push(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(file_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}
