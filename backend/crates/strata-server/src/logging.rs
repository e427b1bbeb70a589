// Logging module: tracing-subscriber with a `log` bridge
//
// Library crates log through the `log` facade. `tracing_log::LogTracer`
// forwards those records into the subscriber installed here.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::path::Path;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use strata_commons::config::LoggingSettings;

/// Log format type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact text format: timestamp LEVEL target - message
    Compact,
    /// JSON Lines format for structured logging
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" | "jsonl" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Filter directives: base level, noisy-crate overrides, then per-target
/// overrides from config (last one wins).
fn filter_directives(level: &str, target_levels: Option<&HashMap<String, String>>) -> String {
    let mut directives = vec![level.to_string()];

    let noisy: &[(&str, &str)] = &[
        ("h2", "warn"),
        ("tower", "warn"),
        ("hyper", "warn"),
        ("tonic", "warn"),
        ("openraft", "error"),
        ("openraft::replication", "off"),
        ("tracing", "warn"),
    ];
    for (target, lvl) in noisy {
        directives.push(format!("{}={}", target, lvl));
    }

    if let Some(map) = target_levels {
        let mut targets: Vec<_> = map.iter().collect();
        targets.sort();
        for (target, lvl) in targets {
            directives.push(format!("{}={}", target, lvl));
        }
    }

    directives.join(",")
}

fn build_env_filter(
    level: &str,
    target_levels: Option<&HashMap<String, String>>,
) -> anyhow::Result<EnvFilter> {
    let filter_str = filter_directives(level, target_levels);
    EnvFilter::try_new(&filter_str)
        .map_err(|e| anyhow::anyhow!("Invalid tracing filter '{}': {}", filter_str, e))
}

/// Initialize logging from the `[logging]` section.
///
/// Installs `tracing-subscriber` with:
///  - a colored console layer (when `log_to_console` is true)
///  - a file layer at `<logs_path>/server.log` (compact text or JSON lines)
///  - the `tracing_log::LogTracer` bridge for `log::*` records
pub fn init_logging(settings: &LoggingSettings) -> anyhow::Result<()> {
    let level = settings.level.as_str();
    let targets = Some(&settings.targets);
    let file_path = Path::new(&settings.logs_path).join("server.log");

    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let log_file = OpenOptions::new().create(true).append(true).open(&file_path)?;

    // ok() in case a bridge is already installed
    tracing_log::LogTracer::init().ok();

    let console_layer = if settings.log_to_console {
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_target(true)
                .with_thread_names(true)
                .with_filter(build_env_filter(level, targets)?),
        )
    } else {
        None
    };

    let file_layer = match LogFormat::parse(&settings.format) {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(log_file)
            .with_target(true)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_span_list(true)
            .with_filter(build_env_filter(level, targets)?)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(log_file)
            .with_target(true)
            .with_thread_names(true)
            .with_filter(build_env_filter(level, targets)?)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install subscriber: {}", e))?;

    tracing::trace!(
        "Logging initialized: level={}, console={}, file={}",
        level,
        settings.log_to_console,
        file_path.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("jsonl"), LogFormat::Json);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("anything"), LogFormat::Compact);
    }

    #[test]
    fn test_target_overrides_come_last() {
        let mut targets = HashMap::new();
        targets.insert("openraft".to_string(), "info".to_string());
        targets.insert("strata_raft".to_string(), "debug".to_string());

        let directives = filter_directives("warn", Some(&targets));
        assert!(directives.starts_with("warn,"));
        assert!(directives.ends_with("openraft=info,strata_raft=debug"));
        assert!(build_env_filter("warn", Some(&targets)).is_ok());
    }

    #[test]
    fn test_invalid_level_rejected() {
        assert!(build_env_filter("warn,strata_raft=loud", None).is_err());
    }
}
