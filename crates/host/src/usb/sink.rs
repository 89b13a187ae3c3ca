//! Descriptor sinks
//!
//! A sink receives the configuration descriptor of every newly enumerated
//! device. It decides what, if anything, to do with the interfaces and
//! endpoints it finds.

use descriptor::{Configuration, ConfigurationSummary, RawConfiguration, dump_configuration};
use serde::Serialize;
use std::io::{self, Write};
use tracing::{info, warn};

/// Consumer of enumerated configuration descriptors
pub trait DescriptorSink {
    /// Called exactly once per enumerated device. The buffer is only
    /// borrowed for the duration of the call.
    fn on_configuration(&mut self, config: &RawConfiguration<'_>);
}

impl<F> DescriptorSink for F
where
    F: FnMut(&RawConfiguration<'_>),
{
    fn on_configuration(&mut self, config: &RawConfiguration<'_>) {
        self(config)
    }
}

/// Logs a field-by-field dump of every record at `info`
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSink;

impl DescriptorSink for LoggingSink {
    fn on_configuration(&mut self, config: &RawConfiguration<'_>) {
        match dump_configuration(config) {
            Ok(text) => info!("Configuration descriptor:\n{}", text.trim_end()),
            Err(e) => warn!("Failed to walk configuration descriptor: {}", e),
        }

        match config.parse() {
            Ok(parsed) => {
                let summary = parsed.summary();
                info!(
                    "Configuration {}: {} interfaces, {} endpoints, {} HID, {} associations",
                    parsed.descriptor.configuration_value,
                    summary.interfaces,
                    summary.endpoints,
                    summary.hid,
                    summary.associations
                );
            }
            Err(e) => warn!("Configuration is not well formed: {}", e),
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    configuration: &'a Configuration,
    summary: ConfigurationSummary,
}

/// Writes each grouped configuration as one line of JSON
pub struct JsonSink<W: Write = io::Stdout> {
    writer: W,
}

impl JsonSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_report(&mut self, configuration: &Configuration) -> io::Result<()> {
        let report = Report {
            configuration,
            summary: configuration.summary(),
        };
        serde_json::to_writer(&mut self.writer, &report)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl<W: Write> DescriptorSink for JsonSink<W> {
    fn on_configuration(&mut self, config: &RawConfiguration<'_>) {
        let configuration = match config.parse() {
            Ok(configuration) => configuration,
            Err(e) => {
                warn!("Configuration is not well formed: {}", e);
                return;
            }
        };

        if let Err(e) = self.write_report(&configuration) {
            warn!("Failed to write JSON report: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{create_mock_config_descriptor, create_mock_keyboard_config};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_closure_sink() {
        let bytes = create_mock_config_descriptor();
        let raw = RawConfiguration::new(&bytes).unwrap();

        let mut lengths = Vec::new();
        let mut sink = |config: &RawConfiguration<'_>| lengths.push(config.as_bytes().len());
        sink.on_configuration(&raw);
        sink.on_configuration(&raw);

        assert_eq!(lengths, vec![25, 25]);
    }

    #[test]
    fn test_json_sink_writes_one_line() {
        let bytes = create_mock_keyboard_config();
        let raw = RawConfiguration::new(&bytes).unwrap();

        let mut sink = JsonSink::new(Vec::new());
        sink.on_configuration(&raw);
        let output = String::from_utf8(sink.into_inner()).unwrap();

        assert_eq!(output.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(value["summary"]["interfaces"], 1);
        assert_eq!(value["summary"]["hid"], 1);
        assert_eq!(
            value["configuration"]["interfaces"][0]["endpoints"][0]["address"],
            0x81
        );
    }

    #[test]
    fn test_json_sink_skips_malformed() {
        let mut bytes = create_mock_keyboard_config();
        bytes[13] = 2; // bNumEndpoints
        let raw = RawConfiguration::new(&bytes).unwrap();

        let mut sink = JsonSink::new(Vec::new());
        sink.on_configuration(&raw);
        assert!(sink.into_inner().is_empty());
    }

    /// Log lines written while a test subscriber is installed
    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture_log(f: impl FnOnce()) -> String {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        tracing::subscriber::with_default(subscriber, f);

        let bytes = log.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_logging_sink_reports_summary() {
        let bytes = create_mock_keyboard_config();
        let raw = RawConfiguration::new(&bytes).unwrap();

        let output = capture_log(|| LoggingSink.on_configuration(&raw));

        assert!(output.contains("Configuration descriptor:"));
        assert!(output.contains("bInterfaceNumber: 0"));
        assert!(
            output.contains("Configuration 1: 1 interfaces, 1 endpoints, 1 HID, 0 associations")
        );
        assert!(!output.contains("WARN"));
    }

    #[test]
    fn test_logging_sink_accepts_malformed() {
        let mut bytes = create_mock_keyboard_config();
        bytes[13] = 2; // bNumEndpoints
        let raw = RawConfiguration::new(&bytes).unwrap();

        let output = capture_log(|| LoggingSink.on_configuration(&raw));

        // The walk itself succeeds, only grouping rejects the interface
        assert!(output.contains("Configuration descriptor:"));
        assert!(output.contains("WARN"));
        assert!(output.contains("Configuration is not well formed"));
        assert!(output.contains("Interface 0 declares 2 endpoints, found 1"));
        assert!(!output.contains("associations"));
    }
}
