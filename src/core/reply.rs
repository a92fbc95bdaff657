//! Where dispatch results go.
//!
//! Delivery to a chat platform is an adapter concern; the dispatcher only needs to
//! post a result and, for long-running commands, edit it later.

use crate::core::envelope::PipeEnvelope;
use async_trait::async_trait;
use colored::Colorize;
use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a posted reply so it can be edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplyHandle(pub u64);

#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn reply(&self, envelope: &PipeEnvelope) -> anyhow::Result<ReplyHandle>;
    async fn edit(&self, handle: ReplyHandle, envelope: &PipeEnvelope) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleFormat {
    #[default]
    Text,
    Json,
}

/// Writes results to stdout; errors are highlighted.
#[derive(Debug, Default)]
pub struct ConsoleReply {
    format: ConsoleFormat,
    next: AtomicU64,
}

impl ConsoleReply {
    pub fn new(format: ConsoleFormat) -> Self {
        Self {
            format,
            next: AtomicU64::new(0),
        }
    }

    fn render(&self, envelope: &PipeEnvelope) -> anyhow::Result<Option<String>> {
        match self.format {
            ConsoleFormat::Json => Ok(Some(serde_json::to_string_pretty(envelope)?)),
            ConsoleFormat::Text => Ok(envelope.display_text().map(|text| {
                if envelope.error {
                    format!("{} {}", "error:".bright_red().bold(), text)
                } else {
                    text
                }
            })),
        }
    }

    fn write(&self, rendered: &str) -> anyhow::Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{rendered}")?;
        Ok(())
    }
}

#[async_trait]
impl ReplySink for ConsoleReply {
    async fn reply(&self, envelope: &PipeEnvelope) -> anyhow::Result<ReplyHandle> {
        if let Some(rendered) = self.render(envelope)? {
            self.write(&rendered)?;
        }
        Ok(ReplyHandle(self.next.fetch_add(1, Ordering::Relaxed)))
    }

    async fn edit(&self, _handle: ReplyHandle, envelope: &PipeEnvelope) -> anyhow::Result<()> {
        // A terminal cannot rewrite earlier output, so an edit is a new line.
        if let Some(rendered) = self.render(envelope)? {
            self.write(&rendered)?;
        }
        Ok(())
    }
}

/// Keeps every reply in memory. Edits replace the recorded reply in place.
#[derive(Debug, Default)]
pub struct RecordingReply {
    replies: Mutex<Vec<PipeEnvelope>>,
    edits: AtomicU64,
}

impl RecordingReply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replies(&self) -> Vec<PipeEnvelope> {
        self.replies.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<PipeEnvelope> {
        self.replies.lock().ok().and_then(|r| r.last().cloned())
    }

    pub fn edit_count(&self) -> u64 {
        self.edits.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ReplySink for RecordingReply {
    async fn reply(&self, envelope: &PipeEnvelope) -> anyhow::Result<ReplyHandle> {
        let mut replies = self
            .replies
            .lock()
            .map_err(|_| anyhow::anyhow!("reply log poisoned"))?;
        replies.push(envelope.clone());
        Ok(ReplyHandle(replies.len() as u64 - 1))
    }

    async fn edit(&self, handle: ReplyHandle, envelope: &PipeEnvelope) -> anyhow::Result<()> {
        let mut replies = self
            .replies
            .lock()
            .map_err(|_| anyhow::anyhow!("reply log poisoned"))?;
        let slot = replies
            .get_mut(handle.0 as usize)
            .ok_or_else(|| anyhow::anyhow!("no reply with handle {}", handle.0))?;
        *slot = envelope.clone();
        self.edits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_reply_edits_in_place() {
        let sink = RecordingReply::new();
        let h = sink.reply(&PipeEnvelope::ok("working")).await.unwrap();
        sink.reply(&PipeEnvelope::ok("other")).await.unwrap();
        sink.edit(h, &PipeEnvelope::ok("done")).await.unwrap();

        let replies = sink.replies();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].message.as_deref(), Some("done"));
        assert_eq!(sink.edit_count(), 1);
        assert!(sink.edit(ReplyHandle(9), &PipeEnvelope::silent()).await.is_err());
    }

    #[test]
    fn console_json_renders_envelope() {
        let sink = ConsoleReply::new(ConsoleFormat::Json);
        let rendered = sink.render(&PipeEnvelope::fail("nope")).unwrap().unwrap();
        let v: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(v["error"], true);
        assert_eq!(v["message"], "nope");
    }

    #[test]
    fn console_text_skips_silent() {
        let sink = ConsoleReply::new(ConsoleFormat::Text);
        assert!(sink.render(&PipeEnvelope::silent()).unwrap().is_none());
    }
}
