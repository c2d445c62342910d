//! Cumulative conversion log returned by every translation call.

use std::fmt;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

/// Single log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub severity: Severity,
    pub message: String,
}

/// Ordered record of what a translation did and what it skipped.
///
/// Entries are mirrored to `tracing` as they are recorded. Info entries go
/// out at `info` level when the log is verbose and at `debug` otherwise.
#[derive(Debug, Clone, Default)]
pub struct ConversionLog {
    entries: Vec<LogEntry>,
    verbose: bool,
}

impl ConversionLog {
    pub fn new(verbose: bool) -> Self {
        Self { entries: Vec::new(), verbose }
    }

    /// Record a progress message.
    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.verbose {
            tracing::info!("{}", message);
        } else {
            tracing::debug!("{}", message);
        }
        self.entries.push(LogEntry { severity: Severity::Info, message });
    }

    /// Record a skipped property, unresolved reference or unmatched assignment.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.entries.push(LogEntry { severity: Severity::Warning, message });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| e.severity == Severity::Warning)
            .map(|e| e.message.as_str())
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render all entries as newline-separated text.
    pub fn text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ConversionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            match entry.severity {
                Severity::Info => write!(f, "{}", entry.message)?,
                Severity::Warning => write!(f, "Warning: {}", entry.message)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_text() {
        let mut log = ConversionLog::new(false);
        assert!(log.is_empty());
        log.info("Convert material: red");
        log.warn("Texture index 4 not found");

        assert_eq!(log.entries().len(), 2);
        assert!(log.has_warnings());
        assert_eq!(log.warnings().collect::<Vec<_>>(), vec!["Texture index 4 not found"]);
        assert_eq!(log.text(), "Convert material: red\nWarning: Texture index 4 not found");
    }
}
