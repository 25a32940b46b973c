//! Tracing subscriber bootstrap.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Logging settings read from the environment.
///
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
///   RUST_LOG    - standard env filter (default: "dejavu=info,dejavu_media=info,dejavu_db=info")
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub format: String,
    pub file: Option<String>,
    pub ansi: Option<bool>,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self {
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
            file: std::env::var("LOG_FILE").ok(),
            ansi: std::env::var("LOG_ANSI")
                .ok()
                .map(|v| v == "true" || v == "1"),
        }
    }

    fn is_json(&self) -> bool {
        self.format == "json"
    }
}

/// Install the global subscriber. Keep the returned guard alive until exit so
/// buffered file output is flushed.
pub fn init(settings: &LogSettings) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "dejavu=info,dejavu_media=info,dejavu_db=info,dejavu_search=info".into()
    });
    let registry = tracing_subscriber::registry().with(env_filter);

    let Some(path) = settings.file.as_deref() else {
        if settings.is_json() {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = settings.ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        return None;
    };

    let path = Path::new(path);
    let dir = path.parent().unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("dejavu.log");
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(
        dir, file_name,
    ));

    if settings.is_json() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init();
    } else {
        // No ANSI in files unless asked for
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(settings.ansi.unwrap_or(false));
        registry.with(layer).init();
    }
    Some(guard)
}
