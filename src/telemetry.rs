//! Tracing setup for the authoring service.
//!
//! LOG_LEVEL is an `EnvFilter` directive string; LOG_FORMAT picks "pretty"
//! (the default) or "json". Targets emitted by the engine:
//! - `lesson_author`: sessions, submissions, collaborator calls
//! - `editor`: rejected block edits
//! - `upload`: task lifecycle (start, supersede, commit, stale results)
//! - `wizard`: step navigation

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,upload=debug,wizard=info,editor=info,lesson_author=debug,tower_http=info,axum=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Unknown values fall back to pretty output.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("json") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Install the global subscriber from LOG_LEVEL / LOG_FORMAT.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let format = LogFormat::parse(std::env::var("LOG_FORMAT").ok().as_deref());
    if try_init(filter, format).is_err() {
        tracing::debug!(target: "lesson_author", "Tracing subscriber already installed");
    }
}

/// Like [`init_tracing`] but with explicit settings; fails if a global
/// subscriber is already set.
pub fn try_init(filter: EnvFilter, format: LogFormat) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);
    match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    }
}
