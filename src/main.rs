//! Main entry point for the fan control application

use anyhow::Context;
use clap::Parser;
use ilo_fan_control::{
    args::{Args, Commands},
    client::FanControlClient,
    daemon, logging, Settings,
};
use log::error;
use std::process;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Print version and build metadata for binary identity verification
    let pkg_version = env!("CARGO_PKG_VERSION");
    let git_hash = option_env!("GIT_HASH").unwrap_or("unknown");
    let git_desc = option_env!("GIT_DESC").unwrap_or("unknown");
    let build_time = option_env!("BUILD_TIME").unwrap_or("unknown");
    eprintln!(
        "ilo-fan-control v{} (git {} / {}) built {}",
        pkg_version, git_hash, git_desc, build_time
    );

    let args = Args::parse();

    logging::setup(
        logging::level_for(args.verbose, args.quiet),
        args.log_file.as_deref(),
    )
    .context("failed to set up logging")?;

    let settings = Settings::locate(args.settings.as_deref())
        .context("failed to load settings")?
        .with_overrides(args.host, args.username);

    match args.command {
        Commands::Daemon => {
            settings.validate().context("invalid settings")?;
            match daemon::run(&settings).await {
                Ok(()) => {}
                Err(e) if !e.is_recoverable() => {
                    error!("{}", e);
                    process::exit(1);
                }
                Err(e) => return Err(e).context("daemon failed"),
            }
        }
        command => {
            FanControlClient::new(settings).handle(command).await?;
        }
    }

    Ok(())
}
