//! 结构化日志初始化
//!
//! The terminal stays quiet (warnings only) unless `--debug` is given or
//! `RUST_LOG` is set. When `logging.file` is configured, the configured
//! level is written there as well.

use std::path::{Path, PathBuf};

use anyhow::Context;
use recall_config::{LogLevel, LoggingConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the file writer alive; drop it last.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// 初始化日志系统
pub fn init(config: &LoggingConfig, debug: bool) -> anyhow::Result<LogGuard> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console_filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives)
            .context("invalid RUST_LOG directives")?,
        _ if debug => build_filter(LogLevel::Debug)?,
        _ => build_filter(LogLevel::Warn)?,
    };
    layers.push(console_layer(config.json).with_filter(console_filter).boxed());

    let mut file_guard = None;
    if let Some(file) = config.file.as_deref() {
        let path = recall_config::expand_tilde(file).unwrap_or_else(|| PathBuf::from(file));
        let (writer, guard) = file_writer(&path)?;
        let layer = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(build_filter(config.level)?)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(build_filter(config.level)?)
                .boxed()
        };
        layers.push(layer);
        file_guard = Some(guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context("logging already initialized")?;

    tracing::debug!(level = %config.level, file = ?config.file, "Logging initialized");
    Ok(LogGuard { _file: file_guard })
}

/// Our crates at `level`, everything else at warn.
fn build_filter(level: LogLevel) -> anyhow::Result<EnvFilter> {
    let mut filter = EnvFilter::try_new("warn")?;
    for module in [
        "recall",
        "recall_chat",
        "recall_session",
        "recall_llm",
        "recall_config",
    ] {
        filter = filter.add_directive(
            format!("{}={}", module, level)
                .parse()
                .with_context(|| format!("invalid directive for {}", module))?,
        );
    }
    Ok(filter)
}

fn console_layer(json: bool) -> BoxedLayer {
    if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    }
}

fn file_writer(
    path: &Path,
) -> anyhow::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .with_context(|| format!("log file path has no file name: {:?}", path))?;
    std::fs::create_dir_all(dir).with_context(|| format!("cannot create {:?}", dir))?;

    let appender = tracing_appender::rolling::never(dir, name);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_all_levels() {
        for level in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ] {
            let filter = build_filter(level).unwrap();
            assert!(filter.to_string().contains(&format!("recall_chat={}", level)));
        }
    }

    #[test]
    fn test_file_writer_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("recall.log");
        let (_writer, _guard) = file_writer(&path).unwrap();
        assert!(dir.path().join("logs").is_dir());
    }
}
