use std::io::{self, Write};

use client_logging::client_trace;
use kb_core::NoticeKind;
use kb_engine::{ClientEvent, CommandKind, LogoutReason, TranscriptUpdate};

/// Turns client events into terminal output.
///
/// Answer text is written inline as it streams; everything else gets its own
/// prefixed line.
pub struct Renderer<W: Write> {
    out: W,
    inline_open: bool,
    show_file_updates: bool,
    files: Vec<String>,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, show_file_updates: bool) -> Self {
        Self {
            out,
            inline_open: false,
            show_file_updates,
            files: Vec::new(),
        }
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn render(&mut self, event: &ClientEvent) -> io::Result<()> {
        match event {
            ClientEvent::Transcript(TranscriptUpdate::Appended(text)) => {
                write!(self.out, "{text}")?;
                self.inline_open = true;
                self.out.flush()?;
            }
            ClientEvent::Transcript(TranscriptUpdate::Cleared) => {}
            ClientEvent::Status(status) => self.line("status", status)?,
            ClientEvent::Progress(label) if !label.is_empty() => self.line("...", label)?,
            ClientEvent::Progress(_) => {}
            ClientEvent::Notice(notice) => {
                let tag = match notice.kind {
                    NoticeKind::Success => "ok",
                    NoticeKind::Info => "info",
                    NoticeKind::Error => "error",
                };
                self.line(tag, &notice.message)?;
            }
            ClientEvent::FilesRefreshed(files) => {
                self.files = files.clone();
                if self.show_file_updates {
                    self.print_files()?;
                }
            }
            ClientEvent::LoggedIn { role } => self.line("auth", &format!("logged in as {role}"))?,
            ClientEvent::LoggedOut {
                reason: LogoutReason::Expired,
            } => self.line("auth", "session expired, log in again")?,
            ClientEvent::LoggedOut { .. } => {}
            ClientEvent::CommandFinished(CommandKind::Chat) => self.close_inline()?,
            ClientEvent::UploadProgress(_)
            | ClientEvent::Diagnostic(_)
            | ClientEvent::CommandFinished(_) => {
                client_trace!("Not rendered: {:?}", event);
            }
        }
        Ok(())
    }

    pub fn print_files(&mut self) -> io::Result<()> {
        self.close_inline()?;
        if self.files.is_empty() {
            writeln!(self.out, "(no files in the knowledge base)")?;
        }
        for name in &self.files {
            writeln!(self.out, "  {name}")?;
        }
        Ok(())
    }

    fn line(&mut self, tag: &str, text: &str) -> io::Result<()> {
        self.close_inline()?;
        writeln!(self.out, "[{tag}] {text}")
    }

    fn close_inline(&mut self) -> io::Result<()> {
        if self.inline_open {
            writeln!(self.out)?;
            self.inline_open = false;
        }
        Ok(())
    }
}
