//! Structured JSONL logging for the CLI.
//!
//! Logs never go to stdout: `--json` output is parsed by scripts, so log
//! events land in a daily-rolled file or, failing that, on stderr.
//!
//! Each event is one JSON object. The lifecycle subject of the event (the
//! library, set, acting user and so on) is lifted out of the span stack into
//! top-level keys, so `jq 'select(.set_id == "...")'` finds every line about a
//! set no matter which layer logged it:
//!
//! ```json
//! {"timestamp":"2026-01-05T09:14:02.117Z","level":"info","service":"shelf",
//!  "target":"shelf_core::lifecycle::release","command":"release",
//!  "span":"create_version","message":"library released",
//!  "id":"5f0c…","set_id":"a81e…","user":"alice","kind":"major",
//!  "version":"1.0.000"}
//! ```
//!
//! Everything else the event or its spans carry goes under `fields`.

use std::fs::OpenOptions;
use std::io::Write;

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context as LayerContext, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "SHELF_LOG_PATH";
const ENV_LOG_DIR: &str = "SHELF_LOG_DIR";

/// Span name prefix of the CLI command spans (`cmd_release`, ...).
const COMMAND_SPAN_PREFIX: &str = "cmd_";

/// Configuration for observability setup.
#[derive(Clone, Debug)]
pub struct ObservabilityConfig {
    /// Service name written into every line and used for the log file name.
    pub service: String,
    /// Directory for JSONL log files from the config file.
    pub log_dir: Option<Utf8PathBuf>,
}

impl ObservabilityConfig {
    /// Config for this binary, with the log directory from the config file.
    pub fn new(log_dir: Option<Utf8PathBuf>) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_string(),
            log_dir,
        }
    }
}

/// Keeps the background log writer alive; drop it last.
pub struct ObservabilityGuard {
    _log_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Install the global subscriber.
///
/// Falls back to stderr when no log file can be opened.
pub fn init_observability(
    cfg: &ObservabilityConfig,
    env_filter: EnvFilter,
) -> Result<ObservabilityGuard> {
    let (writer, log_guard) = match resolve_log_target(&cfg.service, cfg.log_dir.as_deref()) {
        Ok(target) => {
            let appender = tracing_appender::rolling::daily(&target.dir, &target.file_name);
            tracing_appender::non_blocking(appender)
        }
        Err(err) => {
            eprintln!("Warning: {err:#}. Falling back to stderr logging.");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(JsonLogLayer::new(writer, &cfg.service))
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::debug!("observability initialized");
    Ok(ObservabilityGuard {
        _log_guard: log_guard,
    })
}

/// Build an `EnvFilter` from CLI flags and environment.
///
/// Priority: `--quiet` > `--verbose` > `RUST_LOG` > configured level.
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    match (quiet, verbose) {
        (true, _) => EnvFilter::new("error"),
        (false, 0) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
        }
        (false, 1) => EnvFilter::new("debug"),
        (false, _) => EnvFilter::new("trace"),
    }
}

// ============================================================================
// Log lines
// ============================================================================

/// What a log line is about.
///
/// These keys are promoted to the top level of the line; the innermost span
/// or the event itself wins when several set the same key.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
struct Subject {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    set_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    grantee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

impl Subject {
    /// Take `value` if `name` is a subject key; otherwise hand it back.
    fn absorb(&mut self, name: &str, value: Value) -> Option<Value> {
        let slot = match name {
            "id" => &mut self.id,
            "set_id" => &mut self.set_id,
            "user" => &mut self.user,
            "kind" => &mut self.kind,
            "version" => &mut self.version,
            "grantee" => &mut self.grantee,
            "role" => &mut self.role,
            _ => return Some(value),
        };
        *slot = Some(match value {
            Value::String(text) => text,
            other => other.to_string(),
        });
        None
    }
}

#[derive(Debug, Serialize)]
struct LogLine<'a> {
    timestamp: String,
    level: String,
    service: &'a str,
    target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    span: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(flatten)]
    subject: Subject,
    #[serde(skip_serializing_if = "Map::is_empty")]
    fields: Map<String, Value>,
}

impl<'a> LogLine<'a> {
    fn new(service: &'a str, metadata: &'a tracing::Metadata<'a>) -> Self {
        Self {
            timestamp: format_timestamp(),
            level: metadata.level().as_str().to_lowercase(),
            service,
            target: metadata.target(),
            command: None,
            span: None,
            message: None,
            subject: Subject::default(),
            fields: Map::new(),
        }
    }

    /// Merge recorded fields, later calls overriding earlier ones.
    fn merge(&mut self, recorded: &Map<String, Value>) {
        for (name, value) in recorded {
            if let Some(value) = self.subject.absorb(name, value.clone()) {
                self.fields.insert(name.clone(), value);
            }
        }
    }
}

/// Writes one [`LogLine`] per event to `writer`.
struct JsonLogLayer<W> {
    writer: W,
    service: String,
}

impl<W> JsonLogLayer<W> {
    fn new(writer: W, service: &str) -> Self {
        Self {
            writer,
            service: service.to_string(),
        }
    }
}

/// Fields recorded on a span so far.
#[derive(Debug, Default)]
struct SpanFields(Map<String, Value>);

impl<S, W> Layer<S> for JsonLogLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: LayerContext<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        span.extensions_mut().insert(SpanFields(visitor.0));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: LayerContext<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(fields) => fields.0.extend(visitor.0),
            None => extensions.insert(SpanFields(visitor.0)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let mut line = LogLine::new(&self.service, event.metadata());

        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                let name = span.name();
                if let Some(command) = name.strip_prefix(COMMAND_SPAN_PREFIX) {
                    line.command = Some(command);
                }
                line.span = Some(name);
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    line.merge(&fields.0);
                }
            }
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        if let Some(Value::String(message)) = visitor.0.remove("message") {
            line.message = Some(message);
        }
        line.merge(&visitor.0);

        let mut writer = self.writer.make_writer();
        if serde_json::to_writer(&mut writer, &line).is_ok() {
            let _ = writer.write_all(b"\n");
        }
    }
}

#[derive(Default)]
struct FieldVisitor(Map<String, Value>);

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: impl Into<Value>) {
        self.0.insert(field.name().to_string(), value.into());
    }
}

impl Visit for FieldVisitor {
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        // NaN and infinities have no JSON form and become null
        self.insert(field, value);
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, value.to_string());
    }

    // `%field` values arrive here wrapped in a Debug impl that prints Display
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }
}

/// RFC 3339 UTC timestamp with millisecond precision.
fn format_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============================================================================
// Log file location
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
struct LogTarget {
    dir: Utf8PathBuf,
    file_name: String,
}

impl LogTarget {
    fn in_dir(dir: impl Into<Utf8PathBuf>, service: &str) -> Self {
        Self {
            dir: dir.into(),
            file_name: format!("{service}.jsonl"),
        }
    }

    fn from_path(path: &Utf8Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow!("{ENV_LOG_PATH} must include a file name"))?;
        let dir = path
            .parent()
            .filter(|dir| !dir.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        Ok(Self {
            dir: dir.to_path_buf(),
            file_name: file_name.to_string(),
        })
    }

    /// Create the directory and open the file once to prove it is writable.
    fn ensure_writable(self) -> Result<Self> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create log directory {}", self.dir))?;
        let path = self.dir.join(&self.file_name);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open log file {path}"))?;
        Ok(self)
    }
}

/// Where logs go: `SHELF_LOG_PATH`, then `SHELF_LOG_DIR`, then the config's
/// `log_dir`, then the first writable default.
fn resolve_log_target(service: &str, config_dir: Option<&Utf8Path>) -> Result<LogTarget> {
    let env_path = |name: &str| {
        std::env::var_os(name)
            .map(|value| {
                Utf8PathBuf::try_from(std::path::PathBuf::from(value))
                    .map_err(|_| anyhow!("{name} must be valid UTF-8"))
            })
            .transpose()
    };
    let explicit = match (env_path(ENV_LOG_PATH)?, env_path(ENV_LOG_DIR)?) {
        (Some(path), _) => Some(LogTarget::from_path(&path)?),
        (None, Some(dir)) => Some(LogTarget::in_dir(dir, service)),
        (None, None) => config_dir.map(|dir| LogTarget::in_dir(dir, service)),
    };
    if let Some(target) = explicit {
        return target.ensure_writable();
    }

    default_log_dirs()
        .into_iter()
        .find_map(|dir| LogTarget::in_dir(dir, service).ensure_writable().ok())
        .ok_or_else(|| anyhow!("no writable log directory found"))
}

/// `<data dir>/logs`, then the working directory.
fn default_log_dirs() -> Vec<Utf8PathBuf> {
    let cwd = std::env::current_dir()
        .ok()
        .and_then(|dir| Utf8PathBuf::try_from(dir).ok());
    shelf_core::config::user_data_dir()
        .map(|dir| dir.join("logs"))
        .into_iter()
        .chain(cwd)
        .collect()
}
