//! # Logging & Tracing Infrastructure
//!
//! Structured logging for the player core, built on `tracing`.
//!
//! Output goes to stderr as pretty, compact or JSON lines. When a
//! [`LoggerSink`] is configured, every record that passes the filter is also
//! mirrored to the host as a [`LogEntry`], with track locations reduced to
//! their file name and credential-like fields replaced.
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::time::{ConsoleLogger, LogLevel};
//! use std::sync::Arc;
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_level(LogLevel::Debug)
//!         .with_logger_sink(Arc::new(ConsoleLogger::default())),
//! )?;
//! tracing::info!("Player core started");
//! ```

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::sync::Arc;

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::error::{Error, Result};

/// Crates whose level follows [`LoggingConfig::level`] in the default filter.
const WORKSPACE_TARGETS: &[&str] = &[
    "music_player_core",
    "core_runtime",
    "core_player",
    "bridge_traits",
];

/// Field names whose values never leave the process.
const SECRET_FIELDS: &[&str] = &["token", "password", "secret", "api_key", "authorization"];

/// Field names carrying file paths; only the file name is kept.
const PATH_FIELDS: &[&str] = &["location", "path", "url", "file"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human oriented.
    Pretty,
    /// One JSON object per line.
    Json,
    /// One short line per record.
    Compact,
}

impl Default for LogFormat {
    /// Pretty in debug builds, JSON in release builds.
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level applied to the workspace crates when no custom filter is set.
    pub level: LogLevel,
    /// `EnvFilter` directives replacing the default filter,
    /// e.g. `"core_player::driver=trace,warn"`.
    pub filter: Option<String>,
    /// Mask sensitive field values before they reach the host sink.
    pub redact: bool,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Log span open and close events.
    pub enable_spans: bool,
    pub display_target: bool,
    pub display_thread_ids: bool,
    /// Include source file and line numbers.
    pub display_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            redact: true,
            logger_sink: None,
            enable_spans: false,
            display_target: true,
            display_thread_ids: false,
            display_location: false,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("filter", &self.filter)
            .field("redact", &self.redact)
            .field("logger_sink", &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"))
            .field("enable_spans", &self.enable_spans)
            .finish_non_exhaustive()
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_redaction(mut self, redact: bool) -> Self {
        self.redact = redact;
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    pub fn with_thread_ids(mut self, display: bool) -> Self {
        self.display_thread_ids = display;
        self
    }

    pub fn with_source_location(mut self, display: bool) -> Self {
        self.display_location = display;
        self
    }
}

/// Installs the global `tracing` subscriber. Call once at startup.
///
/// # Errors
///
/// Returns [`Error::Config`] if the filter is invalid or a global subscriber
/// is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;

    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let base = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(config.display_target)
        .with_thread_ids(config.display_thread_ids)
        .with_file(config.display_location)
        .with_line_number(config.display_location);

    let fmt_layer = match config.format {
        LogFormat::Pretty => base.pretty().with_span_events(span_events).boxed(),
        LogFormat::Compact => base.compact().with_span_events(span_events).boxed(),
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(config.enable_spans)
            .with_span_list(config.enable_spans)
            .boxed(),
    };

    let sink_layer = config
        .logger_sink
        .clone()
        .map(|sink| LoggerSinkLayer::new(sink, config.redact));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(sink_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {e}")))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = match &config.filter {
        Some(custom) => custom.clone(),
        // Workspace crates at the configured level, dependencies at warn.
        None => WORKSPACE_TARGETS.iter().fold("warn".to_string(), |mut acc, target| {
            acc.push_str(&format!(",{target}={}", config.level));
            acc
        }),
    };

    EnvFilter::try_new(directives).map_err(|e| Error::Config(format!("Invalid log filter: {e}")))
}

// ============================================================================
// Host sink bridge
// ============================================================================

/// Mirrors `tracing` events to a host [`LoggerSink`].
struct LoggerSinkLayer {
    sink: Arc<dyn LoggerSink>,
    redact: bool,
}

impl LoggerSinkLayer {
    fn new(sink: Arc<dyn LoggerSink>, redact: bool) -> Self {
        Self { sink, redact }
    }

    fn deliver(&self, entry: LogEntry) {
        let sink = Arc::clone(&self.sink);
        // Inside a runtime the sink runs as a task; otherwise it is driven inline.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = sink.log(entry).await {
                        eprintln!("LoggerSink error: {err}");
                    }
                });
            }
            Err(_) => {
                if let Err(err) = futures::executor::block_on(sink.log(entry)) {
                    eprintln!("LoggerSink error: {err}");
                }
            }
        }
    }
}

impl<S> Layer<S> for LoggerSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = log_level(metadata.level());
        if level < self.sink.min_level() {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), message);
        for (name, value) in fields.values {
            let value = if self.redact {
                redact_if_sensitive(name, &value).into_owned()
            } else {
                value
            };
            entry = entry.with_field(name, value);
        }
        if let Some(span) = ctx.event_span(event) {
            entry = entry.with_span(span.name());
        }

        self.deliver(entry);
    }
}

/// Collects an event's fields as strings.
#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: Vec<(&'static str, String)>,
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => self.values.push((name, value)),
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{value:?}"));
    }
}

fn log_level(level: &tracing::Level) -> LogLevel {
    match *level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

// ============================================================================
// Redaction
// ============================================================================

/// Masks `value` when `field_name` marks it as sensitive.
///
/// Credentials become `[REDACTED]`; track locations are reduced to their file
/// name. Matching is case-insensitive on a substring of the field name.
pub fn redact_if_sensitive<'a>(field_name: &str, value: &'a str) -> Cow<'a, str> {
    let name = field_name.to_ascii_lowercase();
    if SECRET_FIELDS.iter().any(|secret| name.contains(secret)) {
        Cow::Borrowed("[REDACTED]")
    } else if PATH_FIELDS.iter().any(|path| name.contains(path)) {
        Cow::Borrowed(strip_path(value))
    } else {
        Cow::Borrowed(value)
    }
}

/// Last component of a Unix or Windows path; the input itself when it has
/// no separator (for example a `spotify:track:` URI).
pub fn strip_path(path: &str) -> &str {
    path.rsplit(&['/', '\\'][..]).next().unwrap_or(path)
}
