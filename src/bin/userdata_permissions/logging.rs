use camino::Utf8PathBuf;
use flexi_logger::{
    Age, Cleanup, Criterion, DeferredNow, FileSpec, FlexiLoggerError, LogSpecification, Logger,
    LoggerHandle, Naming, Record,
};
use log::error;
use userdata_permissions::termination::Fatal;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H.%M.%S%.f%z";

pub fn format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "[{}] {} [{}] {}:{}: {}",
        now.now_utc_owned().format(TIMESTAMP_FORMAT),
        record.level(),
        record.module_path().unwrap_or("<unnamed>"),
        record.file().unwrap_or("<unnamed>"),
        record.line().unwrap_or(0),
        &record.args()
    )
}

pub fn init(
    specification: LogSpecification,
    path: Option<Utf8PathBuf>,
) -> Result<LoggerHandle, FlexiLoggerError> {
    let logger = Logger::with(specification);
    match path {
        Some(path) => logger.log_to_file(FileSpec::try_from(path)?),
        None => logger.log_to_stderr(),
    }
    .format(format)
    .rotate(
        Criterion::Age(Age::Day),
        Naming::Numbers,
        Cleanup::KeepLogFiles(14),
    )
    .start()
}

pub fn log_fatal(fatal: &Fatal) -> i32 {
    let exit_code = fatal.exit_code();
    error!("{fatal} -> exiting with code {exit_code}");
    let mut source = std::error::Error::source(fatal);
    while let Some(cause) = source {
        error!("Caused by: {cause}");
        source = cause.source();
    }
    exit_code
}
