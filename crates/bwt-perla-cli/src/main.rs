//! Command-line interface for BWT Perla water softeners.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use bwt_perla_core::config::env_vars;
use bwt_perla_core::sensors::SensorKind;
use bwt_perla_core::{
    catalogue, setup_entry, ConfigEntry, DeviceModel, ModelDetector, PerlaConfig, SensorSet,
    SnapshotSubscriber, UpdateStatus,
};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

/// BWT Perla - Read water softener data on the local network.
#[derive(Parser, Debug)]
#[command(name = "bwt-perla")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Configuration file (TOML).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Detect which firmware a device runs.
    Detect {
        /// Device host name or IP.
        #[arg(long)]
        host: Option<String>,
        /// Write the configuration with the detected model to this file.
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Poll a device and print sensor updates.
    Poll {
        /// Device host name or IP.
        #[arg(long)]
        host: Option<String>,
        /// User code of the local API.
        #[arg(long)]
        code: Option<String>,
        /// Skip detection (perla_local_api, perla_silk, perla_silk_registers).
        #[arg(short, long)]
        model: Option<DeviceModel>,
        /// Refresh once and exit.
        #[arg(long)]
        once: bool,
    },
    /// List the sensors exposed for a model.
    Sensors {
        /// Firmware model.
        #[arg(short, long)]
        model: DeviceModel,
        /// Number of softening columns (local API only).
        #[arg(long, default_value_t = 1)]
        columns: u8,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };

    // Check if JSON logging is requested (for unattended runs)
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("bwt_perla={}", log_level))
            .add_directive(tracing::Level::WARN.into())
    });

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }

    match args.command {
        Command::Detect { host, save } => run_detect(args.config.as_deref(), host, save).await,
        Command::Poll {
            host,
            code,
            model,
            once,
        } => {
            let mut config = load_config(args.config.as_deref(), host)?;
            if let Some(code) = code {
                config.code = Some(code);
            }
            if let Some(model) = model {
                config.model = Some(model);
            }
            run_poll(config, once).await
        }
        Command::Sensors {
            model,
            columns,
            json,
        } => list_sensors(model, columns, json),
    }
}

/// Read the config file if given, apply environment overrides and the
/// `--host` flag.
fn load_config(path: Option<&Path>, host: Option<String>) -> Result<PerlaConfig> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            PerlaConfig::from_toml_str(&content)?
        }
        None => PerlaConfig::new(""),
    };
    config.apply_env()?;
    if let Some(host) = host {
        config.host = host;
    }
    if config.host.trim().is_empty() {
        return Err(anyhow!(
            "No host given: pass --host, set {} or use --config",
            env_vars::HOST
        ));
    }
    Ok(config)
}

async fn run_detect(path: Option<&Path>, host: Option<String>, save: Option<PathBuf>) -> Result<()> {
    let config = load_config(path, host)?;
    config.validate()?;

    let model = ModelDetector::new(config.endpoints(), config.probe_timeout())
        .detect()
        .await?;
    println!("{}", model);

    if let Some(save) = save {
        let config = config.with_model(model);
        std::fs::write(&save, config.to_toml_string()?)
            .with_context(|| format!("Failed to write {}", save.display()))?;
        info!(path = %save.display(), "Saved configuration");
    }
    Ok(())
}

async fn run_poll(config: PerlaConfig, once: bool) -> Result<()> {
    config.validate()?;
    let loaded = setup_entry(ConfigEntry::for_config(config)).await?;

    let mut sensors = loaded.sensors.clone();
    println!(
        "{} ({}, firmware {})",
        sensors.device.name, sensors.device.model, sensors.device.sw_version
    );
    print_sensors(&sensors, None);

    if once {
        return Ok(loaded.unload().await?);
    }

    let mut subscription = loaded.subscribe();
    let mut outcome = Ok(());
    loop {
        tokio::select! {
            state = subscription.changed() => {
                let Some(state) = state else { break };
                match &state.status {
                    UpdateStatus::Available => {
                        let before = sensors.clone();
                        sensors.on_update(&state);
                        print_sensors(&sensors, Some(&before));
                    }
                    UpdateStatus::Unavailable(reason) => {
                        sensors.on_update(&state);
                        warn!("Device unavailable: {}", reason);
                    }
                    UpdateStatus::AuthFailed(reason) => {
                        outcome = Err(anyhow!("Authentication failed: {}", reason));
                        break;
                    }
                    UpdateStatus::Pending => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    drop(subscription);
    loaded.unload().await?;
    outcome
}

/// Print every sensor, or only those that changed since `before`.
fn print_sensors(sensors: &SensorSet, before: Option<&SensorSet>) {
    let stamp = chrono::Local::now().format("%H:%M:%S");
    for sensor in sensors.sensors() {
        let previous = before.and_then(|b| b.value(sensor.key()));
        if previous == Some(&sensor.value) {
            continue;
        }
        let unit = sensor.description.unit.unwrap_or("");
        println!("{} {:<28} {} {}", stamp, sensor.key(), sensor.value, unit);
    }
}

fn list_sensors(model: DeviceModel, columns: u8, json: bool) -> Result<()> {
    let sensors = catalogue(model, columns);

    if json {
        let list: Vec<serde_json::Value> = sensors
            .iter()
            .map(|s| {
                serde_json::json!({
                    "key": s.key,
                    "kind": s.kind,
                    "unit": s.unit,
                    "device_class": s.device_class,
                    "state_class": s.state_class,
                    "options": s.options,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    println!("Sensors for {} ({} total)", model, sensors.len());
    for sensor in &sensors {
        let kind = match sensor.kind {
            SensorKind::Sensor => "",
            SensorKind::BinarySensor => " [binary]",
        };
        println!(
            "  {:<28} {}{}",
            sensor.key,
            sensor.unit.unwrap_or("-"),
            kind
        );
    }
    Ok(())
}
