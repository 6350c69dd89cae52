use camino::Utf8PathBuf;
use clap::{ArgAction, Parser};
use flexi_logger::LogSpecification;

#[derive(Parser)]
#[command(
    about = "Resets owner and permissions of user data directories to the user they are named after.",
    version
)]
pub struct Args {
    /// Configuration file path. If left unspecified, UserDataPermissions.json next to the
    /// executable is used.
    #[arg(name = "CONFIG_PATH")]
    pub config_path: Option<Utf8PathBuf>,

    /// Log file path. If left unspecified, the program will log to standard error.
    #[arg(long, name = "LOG_PATH")]
    pub log_path: Option<Utf8PathBuf>,

    /// Enable verbose output (logging level DEBUG).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    pub fn log_specification(&self) -> LogSpecification {
        match self.verbose {
            1.. => LogSpecification::debug(),
            _ => LogSpecification::info(),
        }
    }
}
