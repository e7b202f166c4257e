//! System clipboard access through `clipboard-rs`.
//!
//! Only plain text takes part in the protocol; other formats on the
//! clipboard read as "nothing to publish".

use anyhow::{anyhow, bail, Result};
use cc_core::ports::{ClipboardReaderPort, ClipboardWriterPort};
use clipboard_rs::{Clipboard, ClipboardContext, ContentFormat};
use std::sync::Mutex;

fn map_clipboard_err<T>(
    result: std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>,
) -> Result<T> {
    result.map_err(|e| anyhow!(e))
}

pub struct SystemClipboard {
    inner: Mutex<ClipboardContext>,
}

impl SystemClipboard {
    pub fn new() -> Result<Self> {
        let context = map_clipboard_err(ClipboardContext::new())
            .map_err(|e| e.context("failed to open the system clipboard"))?;
        Ok(Self {
            inner: Mutex::new(context),
        })
    }

    fn with_context<T>(&self, f: impl FnOnce(&mut ClipboardContext) -> Result<T>) -> Result<T> {
        let mut ctx = self
            .inner
            .lock()
            .map_err(|_| anyhow!("clipboard context lock poisoned"))?;
        f(&mut ctx)
    }
}

impl ClipboardReaderPort for SystemClipboard {
    fn read_current_value(&self) -> Result<String> {
        self.with_context(|ctx| {
            if !ctx.has(ContentFormat::Text) {
                bail!("clipboard holds no text");
            }
            map_clipboard_err(ctx.get_text())
        })
    }
}

impl ClipboardWriterPort for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        self.with_context(|ctx| map_clipboard_err(ctx.set_text(text.to_string())))
    }
}
