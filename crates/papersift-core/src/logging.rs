//! Logging setup: env_logger, routed through indicatif on a TTY

use indicatif::MultiProgress;

/// Crates whose info-level chatter drowns out our own lines.
const NOISY_TARGETS: &[&str] = &["reqwest", "hyper", "hyper_util", "rustls", "native_tls"];

/// ANSI color code and padded label for a log level.
fn level_style(level: log::Level, color: bool) -> (&'static str, &'static str, &'static str) {
    let label = match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    };
    if !color {
        return ("", label, "");
    }
    let ansi = match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    };
    (ansi, label, "\x1b[0m")
}

/// Logger that prints above the active spinners instead of through them.
pub struct IndicatifLogger {
    inner: env_logger::Logger,
    multi: MultiProgress,
    with_target: bool,
}

impl IndicatifLogger {
    pub fn new(inner: env_logger::Logger, multi: MultiProgress, with_target: bool) -> Self {
        Self {
            inner,
            multi,
            with_target,
        }
    }
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !self.inner.enabled(record.metadata()) {
            return;
        }
        let (pre, label, post) = level_style(record.level(), true);
        let line = if self.with_target {
            format!("[{pre}{label}{post}] {}: {}", record.target(), record.args())
        } else {
            format!("[{pre}{label}{post}] {}", record.args())
        };
        self.multi.suspend(|| eprintln!("{line}"));
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

fn builder(default_level: &str) -> env_logger::Builder {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));
    // Cap noisy HTTP crates; RUST_LOG is applied again last so it can override
    for target in NOISY_TARGETS {
        builder.filter_module(target, log::LevelFilter::Warn);
    }
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    builder
}

/// Initialize logging.
///
/// `quiet` drops the default level to warn, `debug` raises it to debug and
/// prefixes lines with the module path. With `multi` set (TTY), lines are
/// printed through the progress bars.
pub fn init_logging(quiet: bool, debug: bool, multi: Option<&MultiProgress>) {
    use std::io::Write;

    let default_level = if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };

    let mut builder = builder(default_level);

    if let Some(multi) = multi {
        let logger = builder.build();
        let max_level = logger.filter();
        if log::set_boxed_logger(Box::new(IndicatifLogger::new(logger, multi.clone(), debug)))
            .is_ok()
        {
            log::set_max_level(max_level);
        }
    } else {
        // Non-TTY: plain labels, no ANSI colors
        let _ = builder
            .format(move |buf, record| {
                let (_, label, _) = level_style(record.level(), false);
                if debug {
                    writeln!(buf, "[{label}] {}: {}", record.target(), record.args())
                } else {
                    writeln!(buf, "[{label}] {}", record.args())
                }
            })
            .try_init();
    }
}
