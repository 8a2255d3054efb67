//! Result reporters.
//!
//! Every format implements [`Reporter`]: the run calls `put` once per
//! document and `flush` exactly once at the end. The format is chosen once,
//! by [`reporter_for`].

use serde::Serialize;
use std::io::Write;

use crate::cli::OutputFormat;
use crate::error::{Result, ValidationError};
use crate::resource::{ResultStatus, ValidationResult};

pub trait Reporter {
    fn put(&mut self, result: &ValidationResult) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// Reporter for `format` writing to `writer`
pub fn reporter_for<'w>(
    format: OutputFormat,
    writer: Box<dyn Write + Send + 'w>,
    color: bool,
) -> Box<dyn Reporter + Send + 'w> {
    match format {
        OutputFormat::Stdout => Box::new(StdoutReporter::new(writer, color)),
        OutputFormat::Json => Box::new(JsonReporter::new(writer)),
        OutputFormat::Tap => Box::new(TapReporter::new(writer)),
    }
}

/// Whether stdout output should carry ANSI colours
pub fn use_color(force_color: bool) -> bool {
    force_color || atty::is(atty::Stream::Stdout)
}

fn write_failed(e: std::io::Error) -> ValidationError {
    ValidationError::Output(format!("Failed to write report: {}", e))
}

/// One human-readable line per document, written as results arrive
pub struct StdoutReporter<W: Write> {
    writer: W,
    show_colors: bool,
}

impl<W: Write> StdoutReporter<W> {
    pub fn new(writer: W, show_colors: bool) -> Self {
        Self {
            writer,
            show_colors,
        }
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn pass(&mut self, message: &str) -> Result<()> {
        let label = self.colorize("PASS", "32");
        writeln!(self.writer, "{} - {}", label, message).map_err(write_failed)
    }

    fn warn(&mut self, message: &str) -> Result<()> {
        let label = self.colorize("WARN", "33");
        writeln!(self.writer, "{} - {}", label, message).map_err(write_failed)
    }
}

impl<W: Write> Reporter for StdoutReporter<W> {
    fn put(&mut self, result: &ValidationResult) -> Result<()> {
        if !result.errors.is_empty() {
            for violation in &result.errors {
                self.warn(&format!(
                    "{} contains an invalid {} ({}) - {}",
                    result.file_name,
                    result.kind,
                    result.qualified_name(),
                    violation
                ))?;
            }
            Ok(())
        } else if result.kind.is_empty() {
            self.pass(&format!("{} contains an empty YAML document", result.file_name))
        } else if !result.validated_against_schema {
            self.warn(&format!(
                "{} containing a {} ({}) was not validated against a schema",
                result.file_name,
                result.kind,
                result.qualified_name()
            ))
        } else {
            self.pass(&format!(
                "{} contains a valid {} ({})",
                result.file_name,
                result.kind,
                result.qualified_name()
            ))
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(write_failed)
    }
}

/// Serialized form shared by the buffered formats
#[derive(Debug, Clone, Serialize)]
struct ReportEntry {
    filename: String,
    kind: String,
    status: ResultStatus,
    errors: Vec<String>,
}

impl From<&ValidationResult> for ReportEntry {
    fn from(result: &ValidationResult) -> Self {
        Self {
            filename: result.file_name.clone(),
            kind: result.kind.clone(),
            status: result.status(),
            errors: result.errors.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Tab-indented JSON array printed on flush
pub struct JsonReporter<W: Write> {
    writer: W,
    entries: Vec<ReportEntry>,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            entries: Vec::new(),
        }
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn put(&mut self, result: &ValidationResult) -> Result<()> {
        self.entries.push(ReportEntry::from(result));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut self.writer, formatter);
        self.entries
            .serialize(&mut serializer)
            .map_err(|e| ValidationError::Output(format!("Failed to encode report: {}", e)))?;
        writeln!(self.writer).map_err(write_failed)?;
        self.writer.flush().map_err(write_failed)
    }
}

/// Test Anything Protocol stream printed on flush
pub struct TapReporter<W: Write> {
    writer: W,
    entries: Vec<ReportEntry>,
}

impl<W: Write> TapReporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            entries: Vec::new(),
        }
    }
}

impl<W: Write> Reporter for TapReporter<W> {
    fn put(&mut self, result: &ValidationResult) -> Result<()> {
        self.entries.push(ReportEntry::from(result));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.entries.is_empty() {
            // One test point per violation, one per clean or skipped document
            let total: usize = self.entries.iter().map(|e| e.errors.len().max(1)).sum();
            writeln!(self.writer, "1..{}", total).map_err(write_failed)?;

            let mut count = 0;
            for entry in &self.entries {
                let kind_marker = if entry.kind.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", entry.kind)
                };

                let written = match entry.status {
                    ResultStatus::Valid => {
                        count += 1;
                        writeln!(self.writer, "ok {} - {}{}", count, entry.filename, kind_marker)
                    }
                    ResultStatus::Skipped => {
                        count += 1;
                        writeln!(
                            self.writer,
                            "ok {} - {}{} # SKIP",
                            count, entry.filename, kind_marker
                        )
                    }
                    ResultStatus::Invalid => entry.errors.iter().try_for_each(|error| {
                        count += 1;
                        writeln!(
                            self.writer,
                            "not ok {} - {}{} - {}",
                            count, entry.filename, kind_marker, error
                        )
                    }),
                };
                written.map_err(write_failed)?;
            }
        }
        self.writer.flush().map_err(write_failed)
    }
}
