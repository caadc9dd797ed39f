//! Command line argument parsing for the fan control application

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// iLO Fan Control
///
/// Keeps HPE server fans at the lowest speed the selected profile allows.
#[derive(Parser, Debug)]
#[command(name = "ilo-fan-control")]
#[command(about = "Temperature-driven fan control for HPE iLO servers")]
#[command(version)]
pub struct Args {
    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file (defaults to /etc/ilo-fan-control/settings.json)
    #[arg(long, value_name = "FILE", global = true)]
    pub settings: Option<PathBuf>,

    /// iLO host, overrides the settings file
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// iLO user name, overrides the settings file
    #[arg(long, global = true)]
    pub username: Option<String>,

    /// Also append log output to this file
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the control daemon
    Daemon,
    /// Show daemon liveness and the auto-control configuration
    Status,
    /// Print temperatures grouped by zone
    Sensors,
    /// Print fan readings
    Fans,
    /// Compute the speed the daemon would apply right now, without applying it
    Plan,
    /// Set every fan to a fixed speed once
    Set {
        /// Fan speed in percent
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },
    /// Write the default auto-control configuration
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "ilo-fan-control",
            "daemon",
            "-vv",
            "--settings",
            "/tmp/settings.json",
        ])
        .unwrap();
        assert_eq!(args.command, Commands::Daemon);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.settings, Some(PathBuf::from("/tmp/settings.json")));
    }

    #[test]
    fn set_rejects_out_of_range() {
        assert!(Args::try_parse_from(["ilo-fan-control", "set", "101"]).is_err());
        let args = Args::try_parse_from(["ilo-fan-control", "set", "45"]).unwrap();
        assert_eq!(args.command, Commands::Set { percent: 45 });
    }

    #[test]
    fn init_config_force_flag() {
        let args = Args::try_parse_from(["ilo-fan-control", "init-config", "--force"]).unwrap();
        assert_eq!(args.command, Commands::InitConfig { force: true });
    }
}
