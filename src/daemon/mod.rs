//! Daemon implementation for the fan control application

pub mod control_loop;
pub mod lifecycle;

use crate::{
    actuator::{ShellActuator, SshShell},
    errors::Result,
    profile::JsonConfigFile,
    settings::Settings,
    telemetry::RedfishClient,
};
use control_loop::{ControlLoop, TokioClock};
use lifecycle::{handle_signals, shutdown_channel, PidLock};
use log::{error, info};

pub use control_loop::{ControlState, CycleOutcome, Phase, CONFIG_RETRY_INTERVAL};

/// Run the daemon until SIGINT/SIGTERM/SIGHUP.
///
/// Fails with `AlreadyRunning` when another live instance holds the pid file.
pub async fn run(settings: &Settings) -> Result<()> {
    let lock = PidLock::acquire(&settings.pid_file)?;

    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        if let Err(e) = handle_signals(trigger).await {
            error!("Failed to install signal handlers: {}", e);
        }
    });

    let telemetry = RedfishClient::new(settings)?;
    let actuator = ShellActuator::new(SshShell::new(settings), settings);
    let config = JsonConfigFile::new(&settings.control_config);

    info!("=== Fan Control Daemon Started ===");
    info!("PID: {}", std::process::id());
    info!("Pid file: {}", lock.path().display());
    info!("Config file: {}", config.path().display());
    info!("iLO host: {} ({})", settings.host, telemetry.url());
    info!("Minimum fan speed: {}%", actuator.minimum_speed());

    let mut control = ControlLoop::new(config, telemetry, actuator, TokioClock);
    let cycles = control.run(&shutdown).await;

    info!("Daemon exited from loop after {} cycles", cycles);
    drop(lock);
    Ok(())
}
