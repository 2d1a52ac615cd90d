use chrono::Local;
use log::LevelFilter;
use std::io::{self, Write};

use env_logger::{Builder, Target};

pub const LOG_FILE_ENV: &str = "HMS_SPACESTATUS_LOG_FILE";

/// Multi-writer for logging to both file and stdout
struct DualWriter {
    file: std::fs::File,
    stdout: io::Stdout,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        self.stdout.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.stdout.flush()?;
        Ok(())
    }
}

fn builder() -> Builder {
    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .filter_level(LevelFilter::Info)
        .parse_default_env();
    builder
}

/// Install the global logger.
///
/// With a log file (argument, else `HMS_SPACESTATUS_LOG_FILE`) every line goes
/// to the file and to stdout. A file that cannot be opened falls back to
/// stdout only.
pub fn init_logger(log_file: Option<&str>) {
    let path = log_file
        .map(str::to_string)
        .or_else(|| std::env::var(LOG_FILE_ENV).ok());

    let mut builder = builder();
    let mut open_error = None;

    if let Some(path) = &path {
        match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                let dual_writer = DualWriter {
                    file,
                    stdout: io::stdout(),
                };
                builder.target(Target::Pipe(Box::new(dual_writer)));
            }
            Err(err) => open_error = Some(err),
        }
    }

    builder.init();

    match (path, open_error) {
        (Some(path), Some(err)) => {
            log::error!("Failed to open log file '{path}': {err}, logging to stdout only")
        }
        (Some(path), None) => log::info!("Logger initialized - logging to {path} and terminal"),
        (None, _) => log::debug!("Logger initialized"),
    }
}
