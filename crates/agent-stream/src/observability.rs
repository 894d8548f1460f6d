use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

pub const ENABLED_ENV: &str = "AGENT_STREAM_OBSERVABILITY_ENABLED";
pub const LOG_LEVEL_ENV: &str = "AGENT_STREAM_LOG_LEVEL";
pub const JSON_LOG_PATH_ENV: &str = "AGENT_STREAM_JSON_LOG_PATH";

/// Stream lifecycle at `info`, everything else (reqwest, hyper) at `warn`.
pub const DEFAULT_FILTER: &str = "warn,agent_stream=info";

const DEFAULT_JSON_LOG_FILE: &str = "agent-stream.jsonl";

/// Where and how much the crate logs.
///
/// Run streams open a `run_stream` span carrying the request path; parser
/// and accumulator events are recorded inside it, so the JSON output groups
/// every line of one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub enabled: bool,
    /// `EnvFilter` directives.
    pub filter: String,
    /// JSONL destination; `None` logs compactly to stderr.
    pub json_log_path: Option<PathBuf>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: DEFAULT_FILTER.to_string(),
            json_log_path: None,
        }
    }
}

impl ObservabilityConfig {
    /// Reads the config from the environment.
    ///
    /// - `AGENT_STREAM_OBSERVABILITY_ENABLED`: enable/disable flag (default enabled).
    /// - `AGENT_STREAM_LOG_LEVEL`: a bare level (`debug`, `trace`) applies to this
    ///   crate only; full directives (`agent_stream=trace,reqwest=debug`) are used as is.
    /// - `RUST_LOG`: fallback directives.
    /// - `AGENT_STREAM_JSON_LOG_PATH`: write JSONL to this file instead of stderr.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let enabled = non_empty(ENABLED_ENV)
            .and_then(|value| parse_bool_env(&value))
            .unwrap_or(true);
        let filter = non_empty(LOG_LEVEL_ENV)
            .map(|value| scoped_filter(&value))
            .or_else(|| non_empty("RUST_LOG"))
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        Self {
            enabled,
            filter,
            json_log_path: non_empty(JSON_LOG_PATH_ENV).map(PathBuf::from),
        }
    }
}

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn scoped_filter(value: &str) -> String {
    let value = value.trim();
    if value.contains('=') || value.contains(',') {
        value.to_string()
    } else {
        format!("warn,agent_stream={value}")
    }
}

/// Installs a global tracing subscriber from [`ObservabilityConfig::from_env`].
///
/// Meant for binaries and demos; libraries embedding this crate install
/// their own subscriber. Only the first call in a process has any effect.
pub fn init_observability() {
    init_observability_with(ObservabilityConfig::from_env());
}

pub fn init_observability_with(config: ObservabilityConfig) {
    INIT.get_or_init(|| {
        if !config.enabled {
            return;
        }

        let env_filter =
            EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        match &config.json_log_path {
            Some(path) => {
                let (dir, file_name) = split_log_path(path);
                let _ = std::fs::create_dir_all(dir);
                let json_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(tracing_appender::rolling::never(dir, file_name));
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(json_layer)
                    .try_init();
            }
            None => {
                // stdout carries streamed run output.
                let console_layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console_layer)
                    .try_init();
            }
        }
    });
}

fn split_log_path(path: &Path) -> (&Path, &str) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_JSON_LOG_FILE);
    (dir, file_name)
}
