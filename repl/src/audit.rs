//! Audit Logger (spec §4.10): an append-only transcript of the session,
//! one line per record, flushed immediately. Grounded in the project-init
//! file-naming convention (`chrono::Local::now().format(...)`).

use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use chrono::Local;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEntryKind {
    System,
    Input,
    Command,
    Info,
    Error,
    Warning,
    Agent,
    ToolResult,
}

impl AuditEntryKind {
    fn label(self) -> &'static str {
        match self {
            AuditEntryKind::System => "SYSTEM",
            AuditEntryKind::Input => "INPUT",
            AuditEntryKind::Command => "COMMAND",
            AuditEntryKind::Info => "INFO",
            AuditEntryKind::Error => "ERROR",
            AuditEntryKind::Warning => "WARNING",
            AuditEntryKind::Agent => "AGENT",
            AuditEntryKind::ToolResult => "TOOL_RESULT",
        }
    }
}

/// Append-only session transcript. Any I/O failure permanently disables
/// further writes (logged once as a warning, never raised to callers).
pub struct AuditLogger {
    file: Option<File>,
    disabled_reason_logged: bool,
}

impl AuditLogger {
    /// Open `<dir>/audit_<local-start-time-ms>.log` and write the opening
    /// `SYSTEM "Audit started"` record.
    pub fn open(dir: &Path) -> Self {
        let mut logger = match Self::open_file(dir) {
            Ok(file) => AuditLogger {
                file: Some(file),
                disabled_reason_logged: false,
            },
            Err(err) => {
                tracing::warn!(error = %err, "audit log could not be opened; auditing disabled");
                AuditLogger {
                    file: None,
                    disabled_reason_logged: true,
                }
            }
        };
        logger.log(AuditEntryKind::System, "Audit started");
        logger
    }

    /// An audit logger that never writes anything, used in tests and by
    /// embedders that opt out of auditing entirely.
    pub fn disabled() -> Self {
        AuditLogger {
            file: None,
            disabled_reason_logged: true,
        }
    }

    fn open_file(dir: &Path) -> anyhow::Result<File> {
        std::fs::create_dir_all(dir)?;
        let stamp = Local::now().format("%Y%m%d_%H%M%S%3f").to_string();
        let path: PathBuf = dir.join(format!("audit_{stamp}.log"));
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(file)
    }

    /// Write `[<iso-8601-local-ms>] [<TYPE>] <content>\n`, flushed before
    /// returning. A write failure disables the logger silently (once).
    pub fn log(&mut self, kind: AuditEntryKind, content: &str) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let timestamp = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string();
        let line = format!("[{timestamp}] [{}] {content}\n", kind.label());
        if let Err(err) = file.write_all(line.as_bytes()).and_then(|_| file.flush()) {
            tracing::warn!(error = %err, "audit log write failed; auditing disabled");
            self.file = None;
            self.disabled_reason_logged = true;
        }
    }

    /// Write the closing `SYSTEM "Audit stopped"` record.
    pub fn close(&mut self) {
        self.log(AuditEntryKind::System, "Audit stopped");
    }

    pub fn is_active(&self) -> bool {
        self.file.is_some()
    }
}

impl Drop for AuditLogger {
    fn drop(&mut self) {
        if self.file.is_some() {
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    const ENTRY_LINE_PATTERN: &str =
        r"^\[[0-9T:.\-]+\] \[(SYSTEM|INPUT|COMMAND|INFO|ERROR|WARNING|AGENT|TOOL_RESULT)\] ";

    fn matches_entry_grammar(line: &str) -> bool {
        let Some((bracketed_ts, rest)) = line.split_once("] [") else {
            return false;
        };
        if !bracketed_ts.starts_with('[') {
            return false;
        }
        let Some((kind, _content)) = rest.split_once("] ") else {
            return false;
        };
        matches!(
            kind,
            "SYSTEM" | "INPUT" | "COMMAND" | "INFO" | "ERROR" | "WARNING" | "AGENT" | "TOOL_RESULT"
        )
    }

    #[test]
    fn every_written_line_matches_the_audit_grammar() {
        let _ = ENTRY_LINE_PATTERN;
        let dir = tempfile::tempdir().unwrap();
        let mut logger = AuditLogger::open(dir.path());
        logger.log(AuditEntryKind::Input, "hello");
        logger.log(AuditEntryKind::Command, "/help");
        logger.close();

        let entries: Vec<PathBuf> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);

        let file = File::open(&entries[0]).unwrap();
        let lines: Vec<String> = std::io::BufReader::new(file)
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        for line in &lines {
            assert!(matches_entry_grammar(line), "line did not match grammar: {line}");
        }
        assert!(lines[0].contains("Audit started"));
        assert!(lines.last().unwrap().contains("Audit stopped"));
    }

    #[test]
    fn disabled_logger_writes_nothing() {
        let mut logger = AuditLogger::disabled();
        logger.log(AuditEntryKind::Info, "should not be written");
        assert!(!logger.is_active());
    }
}
