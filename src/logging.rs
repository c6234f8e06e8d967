//! Tracing subscriber setup

use crate::config::LogFormat;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Bare levels get quieter defaults for the HTTP stack.
        let directives = if level.contains(',') || level.contains('=') {
            level.to_string()
        } else {
            format!("{},hyper=info,reqwest=info,sqlx=warn", level)
        };
        EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
    });

    let result = match format {
        LogFormat::Json => fmt().json().with_env_filter(filter).try_init(),
        LogFormat::Compact => fmt().compact().with_env_filter(filter).try_init(),
        LogFormat::Pretty => fmt().with_env_filter(filter).try_init(),
    };

    if result.is_ok() {
        tracing::info!(level = %level, format = ?format, "Logging initialized");
    }
}
