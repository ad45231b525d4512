//! Prints a run's events to stdout as they arrive, mirroring the teacher's
//! `codex-exec` event processor: a timestamped line per event, styled with
//! `owo-colors` when ANSI is enabled and left plain otherwise so
//! `--color=never` output stays diffable.

use chrono::Utc;
use owo_colors::OwoColorize;
use owo_colors::Style;
use spacehost_protocol::Event;
use spacehost_protocol::EventKind;

pub(crate) struct EventProcessor {
    bold: Style,
    dimmed: Style,
    green: Style,
    red: Style,
    yellow: Style,
}

macro_rules! ts_println {
    ($($arg:tt)*) => {{
        let formatted = Utc::now().format("%Y-%m-%dT%H:%M:%S");
        print!("[{formatted}] ");
        println!($($arg)*);
    }};
}

impl EventProcessor {
    pub(crate) fn create_with_ansi(with_ansi: bool) -> Self {
        if with_ansi {
            Self {
                bold: Style::new().bold(),
                dimmed: Style::new().dimmed(),
                green: Style::new().green(),
                red: Style::new().red(),
                yellow: Style::new().yellow(),
            }
        } else {
            Self {
                bold: Style::new(),
                dimmed: Style::new(),
                green: Style::new(),
                red: Style::new(),
                yellow: Style::new(),
            }
        }
    }

    pub(crate) fn process_event(&self, event: &Event) {
        match &event.kind {
            EventKind::Message { success } => {
                ts_println!("{} success={success}", "message".style(self.bold));
            }
            EventKind::CreateFile {
                path,
                success,
                bytes_written,
                error,
            } => self.print_file_event("createFile", path, *success, bytes_written.map(|n| format!("{n} bytes")), error),
            EventKind::ReadFile {
                path,
                success,
                size,
                error,
                ..
            } => self.print_file_event("readFile", path, *success, size.map(|n| format!("{n} bytes")), error),
            EventKind::EditFile {
                path,
                success,
                edits_applied,
                error,
            } => self.print_file_event(
                "editFile",
                path,
                *success,
                edits_applied.map(|n| format!("{n} edit(s)")),
                error,
            ),
            EventKind::DeleteFile { path, success, error } => {
                self.print_file_event("deleteFile", path, *success, None, error)
            }
            EventKind::Shell {
                command,
                success,
                exit_code,
                stdout,
                stderr,
                duration_ms,
                timed_out,
                error,
            } => {
                let status = self.status_style(*success);
                let code = exit_code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string());
                let duration = duration_ms.map(|d| format!("{d}ms")).unwrap_or_else(|| "-".to_string());
                ts_println!(
                    "{} {}: `{command}` exit={code} duration={duration} timed_out={timed_out}",
                    "shell".style(self.bold),
                    status
                );
                if let Some(stdout) = stdout.as_ref().filter(|s| !s.is_empty()) {
                    println!("{}", stdout.style(self.dimmed));
                }
                if let Some(stderr) = stderr.as_ref().filter(|s| !s.is_empty()) {
                    println!("{}", stderr.style(self.red));
                }
                if let Some(error) = error {
                    println!("  error: {}", error.style(self.red));
                }
            }
            EventKind::ApprovalRequired {
                operation_type,
                reason,
                details,
                ..
            } => {
                ts_println!(
                    "{} {operation_type}: {reason}",
                    "approval required".style(self.yellow)
                );
                if let Some(command) = &details.command {
                    println!("  command: {command}");
                }
                if let Some(path) = &details.path {
                    println!("  path: {path}");
                }
            }
            EventKind::PolicyDenied {
                operation_type,
                reason,
                suggestion,
            } => {
                ts_println!("{} {operation_type}: {reason}", "denied".style(self.red));
                if let Some(suggestion) = suggestion {
                    println!("  suggestion: {suggestion}");
                }
            }
            EventKind::Error { category, message, .. } => {
                ts_println!("{} ({category:?}): {message}", "error".style(self.red));
            }
        }
    }

    fn status_style(&self, success: bool) -> String {
        if success {
            "ok".style(self.green).to_string()
        } else {
            "failed".style(self.red).to_string()
        }
    }

    fn print_file_event(
        &self,
        op: &str,
        path: &str,
        success: bool,
        extra: Option<String>,
        error: &Option<String>,
    ) {
        let status = self.status_style(success);
        let extra = extra.map(|e| format!(" ({e})")).unwrap_or_default();
        ts_println!("{} {status}: {path}{extra}", op.style(self.bold));
        if let Some(error) = error {
            println!("  error: {}", error.style(self.red));
        }
    }
}
