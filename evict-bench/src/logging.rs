//! Structured logging.
//!
//! Output goes to stderr so stdout stays clean for `--print-config`. The
//! RUST_LOG environment variable takes precedence over the configured level.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::fmt::format::{DefaultFields, Format, Full};
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Install the global subscriber.
pub fn init(config: &LoggingConfig) {
    tracing_subscriber::registry()
        .with(layer(config, std::io::stderr))
        .with(filter(config))
        .init();
}

fn filter(config: &LoggingConfig) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(config.level.as_str())
    }
}

/// Formatting layer for `config`, writing through `writer`.
fn layer<W>(config: &LoggingConfig, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_target(config.target)
        .with_thread_names(config.thread_names);

    // the timer is part of the layer's type, so pick it before the format
    if config.timestamps {
        formatted(base, config.format)
    } else {
        formatted(base.without_time(), config.format)
    }
}

fn formatted<W, T>(
    layer: fmt::Layer<Registry, DefaultFields, Format<Full, T>, W>,
    format: LogFormat,
) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    T: FormatTime + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => layer.with_ansi(true).boxed(),
        LogFormat::Compact => layer.compact().with_ansi(true).boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture(format: LogFormat, timestamps: bool) -> String {
        let config = LoggingConfig {
            format,
            timestamps,
            ..LoggingConfig::default()
        };
        let out = Capture::default();
        let subscriber = tracing_subscriber::registry().with(layer(&config, out.clone()));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(keys = 7, "progress");
        });
        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_json_lines() {
        let line = capture(LogFormat::Json, false);
        assert!(line.starts_with('{'), "{line}");
        assert!(line.contains("\"keys\":7"), "{line}");
        assert!(!line.contains("\"timestamp\""), "{line}");

        let line = capture(LogFormat::Json, true);
        assert!(line.contains("\"timestamp\""), "{line}");
    }

    #[test]
    fn test_text_formats() {
        for format in [LogFormat::Pretty, LogFormat::Compact] {
            let line = capture(format, false);
            assert!(line.contains("progress"), "{line}");
            assert!(line.contains("keys"), "{line}");
        }
    }
}
