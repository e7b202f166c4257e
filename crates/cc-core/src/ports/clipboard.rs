use anyhow::Result;

/// Publisher side: where the shared value comes from.
///
/// Polled once per publish tick. Failures (empty clipboard, non-text
/// content, platform errors) are non-fatal and count as "no change".
pub trait ClipboardReaderPort: Send + Sync {
    fn read_current_value(&self) -> Result<String>;
}

/// Subscriber side: where an accepted update is applied.
pub trait ClipboardWriterPort: Send + Sync {
    fn write_text(&self, text: &str) -> Result<()>;
}
