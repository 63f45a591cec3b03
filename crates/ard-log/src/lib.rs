use std::path::PathBuf;

// Re-export logging functions for convenience.
pub use log::*;
use log4rs::{
    append::{console::ConsoleAppender, file::FileAppender},
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    Config,
};
use thiserror::Error;

/// Describes where log output should go.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Logs below this level are discarded.
    pub filter: LevelFilter,
    /// Folder to write log files into. `None` disables file logging.
    pub log_dir: Option<PathBuf>,
    /// Echo logs to stdout.
    pub console: bool,
}

#[derive(Debug, Error)]
pub enum LogInitError {
    #[error("unable to create log file: {0}")]
    File(#[from] std::io::Error),
    #[error("invalid logging configuration: {0}")]
    Config(#[from] log4rs::config::runtime::ConfigErrors),
    #[error("a logger has already been installed")]
    AlreadyInitialized(#[from] SetLoggerError),
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: LevelFilter::Info,
            log_dir: Some(PathBuf::from("./logs")),
            console: true,
        }
    }
}

/// Initializes logging. Should be called before any other logging functions. Provided
/// `LevelFilter` will remove all logs below the provided level.
pub fn init(filter: LevelFilter) -> Result<(), LogInitError> {
    init_with(LogConfig {
        filter,
        ..Default::default()
    })
}

/// Initializes logging with full control over the outputs.
pub fn init_with(config: LogConfig) -> Result<(), LogInitError> {
    let mut builder = Config::builder();
    let mut root = Root::builder();

    if config.console {
        let stdout = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new("[{l}] {t} - {m}{n}")))
            .build();
        builder = builder.appender(Appender::builder().build("stdout", Box::new(stdout)));
        root = root.appender("stdout");
    }

    // Name of the log file is based on the current time.
    if let Some(log_dir) = &config.log_dir {
        let now = chrono::Local::now();
        let log_file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{d} [{l}] {t} - {m}{n}")))
            .build(log_dir.join(format!("{}.txt", now.format("%Y-%m-%d %H-%M-%S"))))?;
        builder = builder.appender(Appender::builder().build("log_file", Box::new(log_file)));
        root = root.appender("log_file");
    }

    let config = builder.build(root.build(config.filter))?;
    log4rs::init_config(config)?;
    log_panics::init();

    Ok(())
}
