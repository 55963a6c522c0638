use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;

/// Logger for the host side of the engine.
///
/// Renders to stderr so that guest console output on stdout stays
/// clean. The field is the hard ceiling; the effective level is the
/// global filter passed to [`VmLogger::install`].
#[derive(Debug)]
pub struct VmLogger {
    pub max_log_level: Level,
}

impl VmLogger {
    pub const fn new(max_log_level: Level) -> VmLogger {
        VmLogger { max_log_level }
    }

    pub fn install(&'static self, filter: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_logger(self).map(|()| log::set_max_level(filter))
    }
}

impl Log for VmLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_log_level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "{} - {}: {}",
                record.level(),
                record.target(),
                record.args(),
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}
