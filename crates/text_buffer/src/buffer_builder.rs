use std::io::Read;

use rope::Rope;
use tracing::debug;

use crate::{buffer::TextBuffer, config::BufferConfig, error::Result};

const READ_CHUNK: usize = 64 * 1024;

/// Assembles a buffer from sequential chunks of bytes.
#[derive(Debug, Default)]
pub struct TextBufferBuilder {
    rope: Rope,
    config: BufferConfig,
    chunks: usize,
}

impl TextBufferBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BufferConfig) -> Self {
        TextBufferBuilder {
            rope: Rope::with_config(config.rope_config()),
            config,
            chunks: 0,
        }
    }

    /// Append a chunk (may span or cut lines).
    pub fn accept_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.rope.insert(self.rope.len(), chunk)?;
        self.chunks += 1;
        Ok(())
    }

    /// Finish building and return a `TextBuffer`.
    pub fn finish(mut self) -> Result<TextBuffer> {
        // small chunks leave fragmented leaves behind
        if self.chunks > 1 {
            self.rope.rebalance()?;
        }
        debug!(
            bytes = self.rope.len(),
            chunks = self.chunks,
            leaves = self.rope.leaf_count(),
            "finished text buffer"
        );
        Ok(TextBuffer::from_rope(self.rope, self.config))
    }

    /// Feed everything `reader` yields, cutting chunks only between whole
    /// UTF-8 sequences where the input allows it.
    pub fn read_from<R: Read>(&mut self, mut reader: R) -> Result<()> {
        let mut buf = vec![0u8; READ_CHUNK];
        let mut carry: Vec<u8> = Vec::new();

        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            carry.extend_from_slice(&buf[..n]);

            // hold back a codepoint cut off by the read boundary
            let keep = match std::str::from_utf8(&carry) {
                Err(e) if e.error_len().is_none() => e.valid_up_to(),
                _ => carry.len(),
            };
            self.accept_chunk(&carry[..keep])?;
            carry.drain(..keep);
        }

        // whatever is left is a truncated sequence at end of input
        self.accept_chunk(&carry)
    }
}
