use std::{fmt, str::FromStr};

use rope::{Match, Rope};
use tracing::{debug, trace};
use unicode_segmentation::UnicodeSegmentation;

use crate::{
    config::BufferConfig,
    error::{BufferError, Result},
};

/// Where a search hit starts: 0-based line and column in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// The single erase-then-insert that turns one snapshot into the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Edit {
    pub offset: usize,
    pub deleted: usize,
    pub inserted: usize,
}

impl Edit {
    pub fn is_noop(&self) -> bool {
        self.deleted == 0 && self.inserted == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub bytes: usize,
    pub chars: usize,
    pub words: usize,
    pub lines: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TextBuffer {
    rope: Rope,
    config: BufferConfig,
    edits_since_rebalance: usize,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BufferConfig) -> Self {
        TextBuffer {
            rope: Rope::with_config(config.rope_config()),
            config,
            edits_since_rebalance: 0,
        }
    }

    pub fn from_text(text: &[u8], config: BufferConfig) -> Result<Self> {
        let rope = Rope::from_text_with_config(text, config.rope_config())?;
        Ok(Self::from_rope(rope, config))
    }

    pub fn from_rope(rope: Rope, config: BufferConfig) -> Self {
        TextBuffer {
            rope,
            config,
            edits_since_rebalance: 0,
        }
    }

    pub fn rope(&self) -> &Rope {
        &self.rope
    }

    pub fn config(&self) -> BufferConfig {
        self.config
    }

    /// Insert `value` at byte `offset` in the document.
    pub fn insert(&mut self, offset: usize, value: &[u8]) -> Result<()> {
        if value.is_empty() {
            return Ok(());
        }
        self.rope.insert(offset, value)?;
        self.count_edit()
    }

    /// Delete `len` bytes starting at byte `offset`.
    pub fn delete(&mut self, offset: usize, len: usize) -> Result<()> {
        if len == 0 || offset >= self.rope.len() {
            return Ok(());
        }
        self.rope.erase(offset, len)?;
        self.count_edit()
    }

    /// Bring the buffer in line with a full snapshot of the document, as an
    /// editor widget reports it after every change.
    ///
    /// Only the span between the common prefix and the common suffix is
    /// touched, so a keystroke costs one small erase and/or insert.
    pub fn sync_to(&mut self, new_text: &[u8]) -> Result<Edit> {
        let old_text = self.rope.to_bytes();
        let prefix = old_text
            .iter()
            .zip(new_text)
            .take_while(|(a, b)| a == b)
            .count();
        // the suffix may not reach back into the prefix of either text
        let suffix = old_text[prefix..]
            .iter()
            .rev()
            .zip(new_text[prefix..].iter().rev())
            .take_while(|(a, b)| a == b)
            .count();

        let edit = Edit {
            offset: prefix,
            deleted: old_text.len() - prefix - suffix,
            inserted: new_text.len() - prefix - suffix,
        };
        if edit.is_noop() {
            return Ok(edit);
        }
        trace!(?edit, "syncing snapshot");
        self.delete(edit.offset, edit.deleted)?;
        self.insert(edit.offset, &new_text[prefix..prefix + edit.inserted])?;
        Ok(edit)
    }

    pub fn rebalance(&mut self) -> Result<()> {
        self.edits_since_rebalance = 0;
        self.rope.rebalance()?;
        Ok(())
    }

    fn count_edit(&mut self) -> Result<()> {
        self.edits_since_rebalance += 1;
        let interval = self.config.rebalance_interval;
        if interval > 0 && self.edits_since_rebalance >= interval {
            debug!(edits = self.edits_since_rebalance, "periodic rebalance");
            self.rebalance()?;
        }
        Ok(())
    }

    /// Edits applied since the last rebalance.
    pub fn pending_edits(&self) -> usize {
        self.edits_since_rebalance
    }

    /// Complete text content, invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.rope.to_bytes()
    }

    /// Content of a 0-based line without its newline.
    pub fn line(&self, line: usize) -> Result<String> {
        let bytes = self.rope.line(line)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Number of lines; an empty document has none.
    pub fn line_count(&self) -> usize {
        self.rope.line_count()
    }

    /// Document length in bytes.
    pub fn len(&self) -> usize {
        self.rope.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rope.is_empty()
    }

    pub fn offset_for_line(&self, line: usize) -> Result<usize> {
        Ok(self.rope.offset_for_line(line)?)
    }

    pub fn text_range(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        Ok(self.rope.text_range(offset, len)?)
    }

    pub fn find(&self, pattern: &[u8]) -> Option<usize> {
        self.rope.find(pattern)
    }

    pub fn find_line(&self, pattern: &[u8]) -> Option<usize> {
        self.rope.find_line(pattern)
    }

    pub fn find_from(&self, pattern: &[u8], from: usize) -> Option<Match> {
        self.rope.find_from(pattern, from)
    }

    /// Line and character column of the first occurrence of `pattern`.
    pub fn find_position(&self, pattern: &[u8]) -> Result<Option<Position>> {
        let Some(found) = self.rope.find_from(pattern, 0) else {
            return Ok(None);
        };
        let line_start = self.rope.offset_for_line(found.line)?;
        let before = self.rope.text_range(line_start, found.offset - line_start)?;
        Ok(Some(Position {
            line: found.line,
            column: bytecount::num_chars(&before),
        }))
    }

    /// Counts for a status line. Words follow Unicode word boundaries.
    pub fn stats(&self) -> Stats {
        let chars = self
            .rope
            .leaves()
            .map(|leaf| bytecount::num_chars(leaf.as_bytes()))
            .sum();
        let text = self.rope.to_bytes();
        Stats {
            bytes: self.rope.len(),
            chars,
            words: String::from_utf8_lossy(&text).unicode_words().count(),
            lines: self.rope.line_count(),
        }
    }
}

impl fmt::Display for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.rope, f)
    }
}

impl FromStr for TextBuffer {
    type Err = BufferError;

    /// Build from a single string with the default config.
    fn from_str(s: &str) -> Result<Self> {
        Self::from_text(s.as_bytes(), BufferConfig::default())
    }
}
