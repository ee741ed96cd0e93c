use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Stderr logger holding its level filter in an atomic.
struct CloudSetupLogger {
    level: AtomicUsize,
}

impl CloudSetupLogger {
    const fn new() -> Self {
        Self {
            level: AtomicUsize::new(LevelFilter::Info as usize),
        }
    }

    fn current_level(&self) -> LevelFilter {
        level_filter_from_usize(self.level.load(Ordering::Relaxed))
    }
}

fn level_filter_from_usize(value: usize) -> LevelFilter {
    LevelFilter::iter()
        .find(|lf| *lf as usize == value)
        .unwrap_or(LevelFilter::Trace)
}

// Targets are only shown at debug and trace, where messages from several
// modules interleave.
fn format_record(record: &Record) -> String {
    if record.level() >= Level::Debug {
        format!(
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        )
    } else {
        format!("[{}] {}", record.level(), record.args())
    }
}

impl Log for CloudSetupLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.current_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = writeln!(io::stderr(), "{}", format_record(record));
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

static LOGGER: CloudSetupLogger = CloudSetupLogger::new();

pub fn init_logger(level: Level) -> Result<(), log::SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(LevelFilter::Trace);
    set_log_level(level);
    Ok(())
}

fn set_log_level(level: Level) {
    LOGGER
        .level
        .store(level.to_level_filter() as usize, Ordering::Relaxed);
}
