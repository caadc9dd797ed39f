//! One-shot command handlers for the fan control application

use crate::{
    actuator::{percent_to_pwm, FanActuator, ShellActuator, SshShell},
    args::Commands,
    daemon::lifecycle::PidLock,
    errors::{FanControlError, Result},
    planner::plan,
    profile::ControlConfig,
    safety::apply_override,
    settings::Settings,
    telemetry::{RedfishClient, TelemetrySnapshot, TelemetrySource},
    zones,
};
use log::{debug, info};

/// Client for interactive commands
pub struct FanControlClient {
    settings: Settings,
}

impl FanControlClient {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Handle CLI commands
    pub async fn handle(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Daemon => Err(FanControlError::Unknown(
                "Daemon command should not be handled by client".to_string(),
            )),
            Commands::Status => self.status(),
            Commands::Sensors => self.sensors().await,
            Commands::Fans => self.fans().await,
            Commands::Plan => self.plan().await,
            Commands::Set { percent } => self.set(percent).await,
            Commands::InitConfig { force } => self.init_config(force),
        }
    }

    async fn fetch(&self) -> Result<TelemetrySnapshot> {
        self.settings.validate()?;
        let client = RedfishClient::new(&self.settings)?;
        debug!("Fetching {}", client.url());
        client.fetch().await
    }

    fn status(&self) -> Result<()> {
        match PidLock::running_pid(&self.settings.pid_file) {
            Some(pid) => println!("Daemon: running (PID {})", pid),
            None => println!("Daemon: not running"),
        }

        let path = &self.settings.control_config;
        if !path.exists() {
            println!("Auto-control: no configuration at {}", path.display());
            return Ok(());
        }

        let config = ControlConfig::load_from_file(path)?;
        println!(
            "Auto-control: {}",
            if config.enabled { "enabled" } else { "disabled" }
        );
        println!("Active profile: {}", config.active_profile_key);
        println!("Check interval: {}s", config.check_interval);
        println!("Profiles:");
        for (key, profile) in &config.profiles {
            println!(
                "  {:<10} {:<10} {:>3}-{:>3}%  target {}°C  max {}°C",
                key,
                profile.label,
                profile.min_speed,
                profile.max_speed,
                profile.target_temp,
                profile.max_temp
            );
        }
        Ok(())
    }

    async fn sensors(&self) -> Result<()> {
        let snapshot = self.fetch().await?;

        for zone in zones::summarize(&snapshot) {
            println!(
                "{} ({}): avg {}°C, min {}°C, max {}°C, critical {}°C",
                zone.zone.label(),
                zone.count(),
                zone.avg,
                zone.min,
                zone.max,
                zone.max_critical
            );
            for sensor in &zone.sensors {
                match sensor.critical {
                    Some(critical) => {
                        println!("    {:<24} {:>5}°C  (critical {}°C)", sensor.name, sensor.reading, critical)
                    }
                    None => println!("    {:<24} {:>5}°C", sensor.name, sensor.reading),
                }
            }
        }
        Ok(())
    }

    async fn fans(&self) -> Result<()> {
        let snapshot = self.fetch().await?;

        for fan in &snapshot.fans {
            let reading = fan
                .reading
                .map_or_else(|| "-".to_string(), |r| format!("{}%", r));
            let state = if fan.enabled { "enabled" } else { "disabled" };
            println!("{:<12} {:>5}  {}", fan.name, reading, state);
        }
        println!(
            "{} enabled fans, {} will be addressed",
            snapshot.enabled_fan_count(),
            snapshot.fan_count()
        );
        Ok(())
    }

    async fn plan(&self) -> Result<()> {
        let config = ControlConfig::load_from_file(&self.settings.control_config)?;
        let snapshot = self.fetch().await?;

        let (key, selected) = config.resolve_active()?;
        let effective = apply_override(snapshot.ambient_temperature(), key, selected, &config);
        let speed = plan(&snapshot.cpu_temperatures(), effective.profile);
        let applied = speed.clamp(self.settings.minimum_fan_speed.min(100), 100);

        println!("Profile: {}", effective.label);
        if let Some(ambient) = snapshot.ambient_temperature() {
            println!("Ambient: {}°C", ambient);
        }
        match snapshot.max_cpu_temperature() {
            Some(t) => println!("Max CPU temp: {}°C", t),
            None => println!("Max CPU temp: unknown"),
        }
        println!(
            "Speed: {}% (PWM {}) on {} fans{}",
            applied,
            percent_to_pwm(applied),
            snapshot.fan_count(),
            if config.enabled { "" } else { " [auto-control disabled]" }
        );
        Ok(())
    }

    async fn set(&self, percent: u8) -> Result<()> {
        let minimum = self.settings.minimum_fan_speed;
        if percent < minimum || percent > 100 {
            return Err(FanControlError::InvalidSpeed {
                speed: percent,
                minimum,
            });
        }

        let snapshot = self.fetch().await?;
        let actuator = ShellActuator::new(SshShell::new(&self.settings), &self.settings);
        let report = actuator.apply(percent, snapshot.fan_count()).await?;

        info!("Manual speed applied");
        println!(
            "Fans set to {}% (PWM {}) on {} fans",
            report.speed, report.pwm, report.fans
        );
        if report.failed_commands > 0 {
            println!("{} fan commands reported errors", report.failed_commands);
        }
        Ok(())
    }

    fn init_config(&self, force: bool) -> Result<()> {
        let path = &self.settings.control_config;
        if path.exists() && !force {
            return Err(FanControlError::Config(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }

        ControlConfig::default().save_to_file(path)?;
        println!("Wrote default auto-control configuration to {}", path.display());
        Ok(())
    }
}
