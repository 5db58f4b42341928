//! Text and JSON rendering for command results

use serde::Serialize;

pub use crate::storage::OutputFormat;

/// Where command results and `--verbose` traces go
pub struct Output {
    format: OutputFormat,
    verbose: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Confirms a change to a node. JSON mode prints `data` instead of the message.
    pub fn changed<T: Serialize>(&self, message: &str, data: &T) {
        match self.format {
            OutputFormat::Text => println!("{}", message),
            OutputFormat::Json => self.data(data),
        }
    }

    /// Prints a status line, wrapped as `{"success": true, ...}` for JSON
    pub fn success(&self, message: &str) {
        self.changed(
            message,
            &serde_json::json!({
                "success": true,
                "message": message,
            }),
        );
    }

    /// Prints one compact JSON document
    pub fn data<T: Serialize>(&self, data: &T) {
        match serde_json::to_string(data) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!(error = %e, "failed to render JSON output"),
        }
    }

    /// Prints a debug trace to stderr (only with --verbose)
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            eprintln!("[verbose] {}", message);
        }
    }

    /// Same as [`Output::verbose`], tagged with the command name
    pub fn verbose_ctx(&self, command: &str, message: &str) {
        if self.verbose {
            eprintln!("[verbose:{}] {}", command, message);
        }
    }
}
