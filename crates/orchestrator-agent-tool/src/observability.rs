use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

/// Filter used when neither `AGENT_TOOL_LOG_LEVEL` nor `RUST_LOG` is set:
/// delegation events from this crate, warnings from everything else
/// (reqwest, hyper, ...).
pub const DEFAULT_LOG_FILTER: &str = "warn,orchestrator_agent_tool=info";

const DEFAULT_JSON_LOG_FILE: &str = "agent-tool.logs.jsonl";

/// Logging settings resolved from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSettings {
    pub enabled: bool,
    /// `EnvFilter` directive string.
    pub filter: String,
    /// JSONL output file; compact stderr output when absent.
    pub json_log_path: Option<PathBuf>,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::resolve(|key| std::env::var(key).ok())
    }

    /// Resolves settings through `lookup`, which maps variable names to values.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = ["AGENT_TOOL_OBSERVABILITY_ENABLED", "AGENT_TOOL_OBSERVABILITY"]
            .into_iter()
            .find_map(&lookup)
            .map_or(true, |value| parse_bool_env(&value).unwrap_or(true));
        let filter = ["AGENT_TOOL_LOG_LEVEL", "RUST_LOG"]
            .into_iter()
            .filter_map(&lookup)
            .find(|directive| EnvFilter::try_new(directive).is_ok())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let json_log_path = lookup("AGENT_TOOL_JSON_LOG_PATH")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        Self {
            enabled,
            filter,
            json_log_path,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    }
}

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Splits a log path into the directory and file name the appender wants.
fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_JSON_LOG_FILE)
        .to_string();
    (dir, file_name)
}

/// Installs the tracing subscriber once per process.
///
/// Environment variables:
/// - `AGENT_TOOL_OBSERVABILITY_ENABLED` / `AGENT_TOOL_OBSERVABILITY`: enable flag (default on).
/// - `AGENT_TOOL_LOG_LEVEL`: filter override (`debug`, `orchestrator_agent_tool=debug`, ...).
/// - `RUST_LOG`: fallback filter. Without either, `DEFAULT_LOG_FILTER` applies.
/// - `AGENT_TOOL_JSON_LOG_PATH`: write JSONL to this file instead of compact stderr output.
pub fn init_observability() {
    INIT.get_or_init(|| install(&LogSettings::from_env()));
}

fn install(settings: &LogSettings) {
    if !settings.enabled {
        return;
    }

    let env_filter = settings.env_filter();
    match &settings.json_log_path {
        Some(path) => {
            let (dir, file_name) = split_log_path(path);
            if let Err(err) = std::fs::create_dir_all(&dir) {
                eprintln!("agent tool logging: cannot create {}: {err}", dir.display());
            }
            let writer = tracing_appender::rolling::never(dir, file_name);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init();
        }
        None => {
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
}
