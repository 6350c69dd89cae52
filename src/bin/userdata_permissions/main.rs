mod cli;
mod logging;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;
use log::info;
use std::process::exit;
use userdata_permissions::config::{self, DEFAULT_CONFIG_FILE_NAME};
use userdata_permissions::termination::Fatal;

fn main() {
    let args = cli::Args::parse();
    let logger = match logging::init(args.log_specification(), args.log_path.clone()) {
        Ok(handle) => handle,
        Err(error) => {
            eprintln!("Failed to set up logging: {error}");
            exit(1)
        }
    };
    info!("Program started and logging set up");

    if let Err(fatal) = run(args) {
        let exit_code = logging::log_fatal(&fatal);
        logger.flush();
        exit(exit_code);
    }
}

fn run(args: cli::Args) -> Result<(), Fatal> {
    let config_path = match args.config_path {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = config::load(&config_path)?;
    info!("Configuration loaded from {config_path}");
    migrate(&config)
}

fn default_config_path() -> anyhow::Result<Utf8PathBuf> {
    let executable = std::env::current_exe().context("Failed to determine executable path")?;
    let executable = Utf8PathBuf::try_from(executable).context("Executable path is not UTF-8")?;
    Ok(executable
        .parent()
        .map(|directory| directory.join(DEFAULT_CONFIG_FILE_NAME))
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE_NAME.into()))
}

#[cfg(windows)]
fn migrate(config: &config::Config) -> Result<(), Fatal> {
    use userdata_permissions::migration::Migration;
    use userdata_permissions::windows_security::WindowsSecurity;

    Migration::new(config, &WindowsSecurity).run().map(|_| ())
}

#[cfg(not(windows))]
fn migrate(config: &config::Config) -> Result<(), Fatal> {
    config.validate()?;
    Err(anyhow::anyhow!(
        "Changing ownership and access control lists is only supported on Windows"
    )
    .into())
}
