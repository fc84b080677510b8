//! Process-wide tracing setup for registry services.
//!
//! Settings come from the environment:
//!
//! - `REGISTRY_LOG_LEVEL`: default filter directive when `RUST_LOG` is unset (`info`)
//! - `REGISTRY_LOG_FORMAT`: `human` or `json`
//! - `REGISTRY_LOG_OUTPUT`: `console`, `file`, `both` or `none`
//! - `REGISTRY_LOG_FILE`: path of the daily rolling log file

use std::{
    env,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::Directive, fmt::MakeWriter, prelude::*, registry, EnvFilter};

const DEFAULT_LOG_FILE: &str = "/tmp/registry.log";

/// Writes every record to the console and the log file. Both sinks always
/// receive the full record; the first failure is reported after both ran.
struct Tee<C, F> {
    console: C,
    file: F,
}

impl<C: Write, F: Write> Write for Tee<C, F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let console = self.console.write_all(buf);
        let file = self.file.write_all(buf);
        console.and(file).map(|()| buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let console = self.console.flush();
        let file = self.file.flush();
        console.and(file)
    }
}

#[derive(Clone)]
struct MakeTee<C, F> {
    console: C,
    file: F,
}

impl<'a, C, F> MakeWriter<'a> for MakeTee<C, F>
where
    C: MakeWriter<'a>,
    F: MakeWriter<'a>,
{
    type Writer = Tee<C::Writer, F::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        Tee {
            console: self.console.make_writer(),
            file: self.file.make_writer(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
    None,
}

impl LogOutput {
    fn console(self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    fn file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    pub file: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Human,
            output: LogOutput::Console,
            file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unknown values fall back to the defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let format = match lookup("REGISTRY_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Human,
        };
        let output = match lookup("REGISTRY_LOG_OUTPUT").as_deref() {
            Some("file") => LogOutput::File,
            Some("both") => LogOutput::Both,
            Some("none") => LogOutput::None,
            _ => LogOutput::Console,
        };
        Self {
            level: lookup("REGISTRY_LOG_LEVEL")
                .filter(|level| !level.trim().is_empty())
                .unwrap_or(defaults.level),
            format,
            output,
            file: lookup("REGISTRY_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.file),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        ["tokio=warn", "hyper=warn"]
            .into_iter()
            .filter_map(|directive| directive.parse::<Directive>().ok())
            .fold(filter, |filter, directive| filter.add_directive(directive))
    }
}

/// Initializes the global tracing subscriber from the environment.
///
/// The returned guard must be held for as long as file logging should flush.
pub fn init_subscriber() -> Option<WorkerGuard> {
    init_with(&LogSettings::from_env())
}

pub fn init_with(settings: &LogSettings) -> Option<WorkerGuard> {
    let subscriber = registry().with(settings.env_filter());
    let is_json = settings.format == LogFormat::Json;

    let log_dir = settings.file.parent().unwrap_or_else(|| Path::new("/tmp"));
    let log_filename = settings
        .file
        .file_name()
        .unwrap_or("registry.log".as_ref());

    let output = settings.output;
    if output.console() && output.file() {
        let file_appender = tracing_appender::rolling::daily(log_dir, log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let tee_writer = MakeTee {
            console: std::io::stdout,
            file: non_blocking,
        };
        let fmt_layer = tracing_subscriber::fmt::layer().with_writer(tee_writer);
        if is_json {
            subscriber.with(fmt_layer.json()).init();
        } else {
            subscriber.with(fmt_layer.pretty()).init();
        }
        Some(guard)
    } else if output.console() {
        let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);
        if is_json {
            subscriber.with(fmt_layer.json()).init();
        } else {
            subscriber.with(fmt_layer.pretty()).init();
        }
        None
    } else if output.file() {
        let file_appender = tracing_appender::rolling::daily(log_dir, log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let fmt_layer = tracing_subscriber::fmt::layer().with_writer(non_blocking);
        if is_json {
            subscriber.with(fmt_layer.json()).init();
        } else {
            subscriber.with(fmt_layer.pretty()).init();
        }
        Some(guard)
    } else {
        subscriber.init();
        None
    }
}
