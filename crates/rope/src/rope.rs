//! Binary rope text buffer.
//!
//! Text lives in owned leaf byte chunks under internal nodes that cache the
//! byte length and newline count of their subtree, so edits, line lookups and
//! range reads only walk one root-to-leaf path. [`codec`] persists the tree
//! shape to a flat file addressed by byte offsets.

pub mod codec;
mod error;
mod node;
mod search;
mod split;

pub use codec::{decode, encode, load, load_with_config, read_from, save, write_to};
pub use error::{Result, RopeError, TreeFileError};
pub use node::{Internal, Leaf, Leaves, MAX_LEAF_SIZE, Node};
pub use search::Match;

use node::Slot;
use search::Kmp;
use std::{fmt, str::FromStr};
use tracing::{debug, trace};

const MIN_LEAF_SIZE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RopeConfig {
    max_leaf_size: usize,
}

impl RopeConfig {
    /// Leaves never grow past `max_leaf_size` bytes; values below 2 are raised
    /// to 2 so an oversized span can always be cut in two.
    pub fn new(max_leaf_size: usize) -> Self {
        RopeConfig {
            max_leaf_size: max_leaf_size.max(MIN_LEAF_SIZE),
        }
    }

    pub fn max_leaf_size(&self) -> usize {
        self.max_leaf_size
    }
}

impl Default for RopeConfig {
    fn default() -> Self {
        Self::new(MAX_LEAF_SIZE)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Rope {
    root: Slot,
    config: RopeConfig,
}

impl Rope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RopeConfig) -> Self {
        Rope { root: None, config }
    }

    pub fn from_text(text: &[u8]) -> Result<Self> {
        Self::from_text_with_config(text, RopeConfig::default())
    }

    pub fn from_text_with_config(text: &[u8], config: RopeConfig) -> Result<Self> {
        let mut rope = Self::with_config(config);
        rope.set_text(text)?;
        Ok(rope)
    }

    pub(crate) fn from_root(root: Slot, config: RopeConfig) -> Self {
        Rope { root, config }
    }

    pub fn config(&self) -> RopeConfig {
        self.config
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.as_deref()
    }

    /// Total length in bytes.
    pub fn len(&self) -> usize {
        self.root.as_deref().map_or(0, Node::len)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// `1 + count('\n')` for a non-empty rope, 0 for an empty one.
    pub fn line_count(&self) -> usize {
        self.root.as_deref().map_or(0, Node::line_count)
    }

    pub fn height(&self) -> usize {
        self.root.as_deref().map_or(0, Node::height)
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves().count()
    }

    pub fn leaves(&self) -> Leaves<'_> {
        Leaves::new(self.root.as_deref())
    }

    pub fn clear(&mut self) {
        self.root = None;
    }

    /// Replace the whole content, splitting it into leaves near line breaks.
    pub fn set_text(&mut self, text: &[u8]) -> Result<()> {
        self.clear();
        if text.is_empty() {
            return Ok(());
        }
        self.root = Some(Node::build(text, self.config.max_leaf_size)?);
        debug!(
            bytes = text.len(),
            max_leaf_size = self.config.max_leaf_size,
            "built rope from text"
        );
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.len());
        for leaf in self.leaves() {
            buf.extend_from_slice(leaf.as_bytes());
        }
        buf
    }

    /// Copy of `len` bytes from `offset`, clamped to the end of the text.
    pub fn text_range(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let total = self.len();
        if offset > total {
            return Err(RopeError::OffsetOutOfRange { offset, len: total });
        }
        let len = len.min(total - offset);
        let mut out = Vec::new();
        out.try_reserve_exact(len)?;
        let Some(root) = self.root.as_deref() else {
            return Ok(out);
        };
        if len == 0 {
            return Ok(out);
        }

        let (leaves, mut skip) = Leaves::seek(root, offset);
        for leaf in leaves {
            let bytes = &leaf.as_bytes()[skip.min(leaf.len())..];
            skip = 0;
            let take = bytes.len().min(len - out.len());
            out.extend_from_slice(&bytes[..take]);
            if out.len() == len {
                break;
            }
        }
        Ok(out)
    }

    /// Insert `data` at byte `pos`, clamped to the end of the text.
    pub fn insert(&mut self, pos: usize, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let pos = pos.min(self.len());
        trace!(pos, len = data.len(), "insert");
        node::insert(&mut self.root, pos, data, self.config.max_leaf_size)?;
        Ok(())
    }

    /// Remove up to `len` bytes from `pos`. A `pos` at or past the end is a
    /// no-op.
    pub fn erase(&mut self, pos: usize, len: usize) -> Result<()> {
        let total = self.len();
        if len == 0 || pos >= total {
            return Ok(());
        }
        let len = len.min(total - pos);
        trace!(pos, len, "erase");
        node::erase(&mut self.root, pos, len)?;
        Ok(())
    }

    /// Byte offset where 0-based line `line` starts.
    pub fn offset_for_line(&self, line: usize) -> Result<usize> {
        let line_count = self.line_count();
        match self.root.as_deref() {
            Some(root) if line < line_count => Ok(root.line_start(line)),
            _ => Err(RopeError::LineOutOfRange { line, line_count }),
        }
    }

    /// Bytes of line `line` without its terminating newline.
    pub fn line(&self, line: usize) -> Result<Vec<u8>> {
        let start = self.offset_for_line(line)?;
        let end = if line + 1 < self.line_count() {
            self.offset_for_line(line + 1)? - 1
        } else {
            self.len()
        };
        self.text_range(start, end - start)
    }

    /// Leaf holding byte `offset` and the offset inside it. The end of the
    /// text resolves to the end of the last leaf.
    pub fn leaf_at(&self, offset: usize) -> Result<(&Leaf, usize)> {
        let len = self.len();
        match self.root.as_deref() {
            Some(root) if offset <= len => Ok(root.leaf_at(offset)),
            _ => Err(RopeError::OffsetOutOfRange { offset, len }),
        }
    }

    /// Line holding byte `offset`; the end of the text belongs to the last line.
    pub fn line_of_offset(&self, offset: usize) -> Result<usize> {
        let len = self.len();
        match self.root.as_deref() {
            Some(root) if offset <= len => Ok(root.newlines_before(offset)),
            _ => Err(RopeError::OffsetOutOfRange { offset, len }),
        }
    }

    /// Byte offset of the first occurrence of `pattern`.
    pub fn find(&self, pattern: &[u8]) -> Option<usize> {
        self.find_from(pattern, 0).map(|found| found.offset)
    }

    /// Line index of the first occurrence of `pattern`.
    pub fn find_line(&self, pattern: &[u8]) -> Option<usize> {
        self.find_from(pattern, 0).map(|found| found.line)
    }

    /// First occurrence of `pattern` starting at or after byte `from`.
    pub fn find_from(&self, pattern: &[u8], from: usize) -> Option<Match> {
        let root = self.root.as_deref()?;
        if pattern.is_empty() || from > root.len() {
            return None;
        }
        let (leaves, skip) = Leaves::seek(root, from);
        let leaf_start = from - skip;
        Kmp::new(pattern).find_in(leaves, skip, leaf_start, root.newlines_before(leaf_start))
    }

    /// Fold sibling leaves that fit in one leaf, bottom-up. Height balance is
    /// kept by every edit already; this only reclaims fragmented leaves.
    pub fn rebalance(&mut self) -> Result<()> {
        if self.root.is_none() {
            return Ok(());
        }
        let leaves = self.leaf_count();
        // rotations can pair leaves that fit together, so run to a fixpoint
        let mut remaining = leaves;
        loop {
            node::merge_leaves(&mut self.root, self.config.max_leaf_size)?;
            let after = self.leaf_count();
            if after == remaining {
                break;
            }
            remaining = after;
        }
        debug!(
            leaves_before = leaves,
            leaves_after = self.leaf_count(),
            height = self.height(),
            "rebalanced rope"
        );
        Ok(())
    }

    /// Verify cached aggregates and structural rules over the whole tree.
    pub fn check_invariants(&self) -> Result<(), String> {
        match self.root.as_deref() {
            Some(root) => root.validate(self.config.max_leaf_size),
            None => Ok(()),
        }
    }
}

impl FromStr for Rope {
    type Err = RopeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_text(s.as_bytes())
    }
}

impl fmt::Display for Rope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(text: &str) -> Rope {
        Rope::from_text_with_config(text.as_bytes(), RopeConfig::new(8)).unwrap()
    }

    #[test]
    fn hello_world() {
        let hello_rope: Rope = "Hello world!".parse().unwrap();
        assert_eq!(hello_rope.to_string(), "Hello world!");
    }

    #[test]
    fn hello_not_the_same() {
        let hello_rope: Rope = "Hello rope!".parse().unwrap();
        assert_ne!(hello_rope.to_string(), "Hello word!");
    }

    #[test]
    fn empty_rope() {
        let rope = Rope::new();
        assert!(rope.is_empty());
        assert_eq!(rope.len(), 0);
        assert_eq!(rope.line_count(), 0);
        assert!(rope.to_bytes().is_empty());
        assert!(matches!(
            rope.offset_for_line(0),
            Err(RopeError::LineOutOfRange { line: 0, line_count: 0 })
        ));
        assert!(rope.line(0).is_err());
        assert_eq!(rope.text_range(0, 10).unwrap(), b"");
        assert_eq!(rope.find(b"x"), None);
    }

    #[test]
    fn lines_of_text_with_trailing_newline() {
        let rope: Rope = "one\ntwo\nthree\n".parse().unwrap();
        assert_eq!(rope.line_count(), 4);
        assert_eq!(rope.line(0).unwrap(), b"one");
        assert_eq!(rope.line(1).unwrap(), b"two");
        assert_eq!(rope.line(2).unwrap(), b"three");
        assert_eq!(rope.line(3).unwrap(), b"");
        assert!(rope.line(4).is_err());
        assert_eq!(rope.offset_for_line(3).unwrap(), 14);
    }

    #[test]
    fn lines_spanning_small_leaves() {
        let rope = small("first line\nsecond line\nthird");
        assert!(rope.leaf_count() > 2);
        assert_eq!(rope.line(0).unwrap(), b"first line");
        assert_eq!(rope.line(1).unwrap(), b"second line");
        assert_eq!(rope.line(2).unwrap(), b"third");
        assert_eq!(rope.offset_for_line(1).unwrap(), 11);
        assert_eq!(rope.offset_for_line(2).unwrap(), 23);
    }

    #[test]
    fn insert_at_beginning_and_middle() {
        let mut rope: Rope = "abc".parse().unwrap();
        rope.insert(0, b"X").unwrap();
        assert_eq!(rope.to_string(), "Xabc");
        rope.insert(2, b"Y").unwrap();
        assert_eq!(rope.to_string(), "XaYbc");
        rope.insert(rope.len(), b"Z").unwrap();
        assert_eq!(rope.to_string(), "XaYbcZ");
    }

    #[test]
    fn insert_clamps_position() {
        let mut rope: Rope = "Hello".parse().unwrap();
        rope.insert(100, b" world!").unwrap();
        assert_eq!(rope.to_string(), "Hello world!");
    }

    #[test]
    fn insert_into_empty_rope() {
        let mut rope = Rope::new();
        rope.insert(3, b"abc").unwrap();
        assert_eq!(rope.to_string(), "abc");
        rope.insert(0, b"").unwrap();
        assert_eq!(rope.to_string(), "abc");
    }

    #[test]
    fn erase_begin_middle_end() {
        let mut rope: Rope = "0123456789".parse().unwrap();
        rope.erase(0, 1).unwrap();
        assert_eq!(rope.to_string(), "123456789");
        rope.erase(3, 2).unwrap();
        assert_eq!(rope.to_string(), "1236789");
        rope.erase(rope.len() - 1, 1).unwrap();
        assert_eq!(rope.to_string(), "123678");
    }

    #[test]
    fn erase_out_of_range_is_noop_or_clamped() {
        let mut rope: Rope = "Hello".parse().unwrap();
        rope.erase(5, 3).unwrap();
        assert_eq!(rope.to_string(), "Hello");
        rope.erase(3, 100).unwrap();
        assert_eq!(rope.to_string(), "Hel");
        rope.erase(0, 3).unwrap();
        assert!(rope.is_empty());
        assert_eq!(rope.line_count(), 0);
    }

    #[test]
    fn erase_across_small_leaves_collapses() {
        let mut rope = small("aaaaaaa\nbbbbbbb\nccccccc\n");
        rope.erase(4, 16).unwrap();
        assert_eq!(rope.to_string(), "aaaaccc\n");
        rope.check_invariants().unwrap();
    }

    #[test]
    fn delete_then_insert() {
        let mut rope: Rope = "Hello beautiful world!".parse().unwrap();
        rope.erase(6, 15).unwrap();
        rope.insert(6, b"world").unwrap();
        assert_eq!(rope.to_string(), "Hello world!");
    }

    #[test]
    fn text_range_clamps_length() {
        let rope = small("Hello, World!");
        assert_eq!(rope.text_range(0, 5).unwrap(), b"Hello");
        assert_eq!(rope.text_range(7, 100).unwrap(), b"World!");
        assert_eq!(rope.text_range(13, 4).unwrap(), b"");
        assert_eq!(rope.text_range(5, 0).unwrap(), b"");
        assert!(matches!(
            rope.text_range(14, 1),
            Err(RopeError::OffsetOutOfRange { offset: 14, len: 13 })
        ));
    }

    #[test]
    fn leaf_at_resolves_local_offsets() {
        let rope = small("aaaaaaa\nbbbbbbb\n");
        let (leaf, local) = rope.leaf_at(9).unwrap();
        assert_eq!(leaf.as_bytes(), b"bbbbbbb\n");
        assert_eq!(local, 1);
        let (leaf, local) = rope.leaf_at(rope.len()).unwrap();
        assert_eq!(local, leaf.len());
        assert!(rope.leaf_at(17).is_err());
        assert!(Rope::new().leaf_at(0).is_err());
    }

    #[test]
    fn line_of_offset_matches_lines() {
        let rope = small("ab\ncd\n\nef");
        assert_eq!(rope.line_of_offset(0).unwrap(), 0);
        assert_eq!(rope.line_of_offset(2).unwrap(), 0);
        assert_eq!(rope.line_of_offset(3).unwrap(), 1);
        assert_eq!(rope.line_of_offset(6).unwrap(), 2);
        assert_eq!(rope.line_of_offset(9).unwrap(), 3);
        assert!(rope.line_of_offset(10).is_err());
    }

    #[test]
    fn find_and_find_line() {
        let rope = small("alpha\nbeta\ngamma\nbeta");
        assert_eq!(rope.find(b"beta"), Some(6));
        assert_eq!(rope.find_line(b"gamma"), Some(2));
        assert_eq!(rope.find(b"delta"), None);
        assert_eq!(rope.find_line(b""), None);

        let next = rope.find_from(b"beta", 7).unwrap();
        assert_eq!(next, Match { offset: 17, line: 3 });
        assert_eq!(rope.find_from(b"beta", 18), None);
    }

    #[test]
    fn oversized_insert_is_split() {
        let mut rope = Rope::with_config(RopeConfig::new(16));
        rope.insert(0, b"A").unwrap();
        let big = vec![b'B'; 100];
        rope.insert(1, &big).unwrap();
        assert_eq!(rope.len(), 101);
        assert!(rope.leaf_count() >= 7);
        rope.check_invariants().unwrap();
    }

    #[test]
    fn rebalance_merges_fragments() {
        let mut rope = Rope::with_config(RopeConfig::new(64));
        let mut expected = String::new();
        for i in 0..200 {
            let piece = format!("p{i};");
            rope.insert(rope.len(), piece.as_bytes()).unwrap();
            expected.push_str(&piece);
        }
        let before = rope.leaf_count();
        rope.rebalance().unwrap();
        assert_eq!(rope.to_string(), expected);
        assert!(rope.leaf_count() <= before);
        rope.check_invariants().unwrap();
    }

    #[test]
    fn appending_never_builds_a_spine() {
        let mut rope = Rope::with_config(RopeConfig::new(4));
        for _ in 0..4096 {
            rope.insert(rope.len(), b"abc").unwrap();
        }
        assert_eq!(rope.leaf_count(), 4096);
        // height-balanced: 4096 leaves fit in 17 levels
        assert!(rope.height() <= 17, "height {}", rope.height());
        rope.check_invariants().unwrap();

        rope.rebalance().unwrap();
        assert_eq!(rope.to_string(), "abc".repeat(4096));
        rope.check_invariants().unwrap();
    }

    #[test]
    fn erasing_keeps_height_balanced() {
        let mut rope = small(&"0123456789\n".repeat(400));
        for _ in 0..300 {
            rope.erase(rope.len() / 3, 7).unwrap();
            rope.check_invariants().unwrap();
        }
        assert_eq!(rope.len(), 4400 - 2100);
    }

    #[test]
    fn rebalance_empty_is_noop() {
        let mut rope = Rope::new();
        rope.rebalance().unwrap();
        assert!(rope.is_empty());
    }

    #[test]
    fn set_text_replaces_content() {
        let mut rope: Rope = "old".parse().unwrap();
        rope.set_text(b"new\ntext").unwrap();
        assert_eq!(rope.to_string(), "new\ntext");
        rope.set_text(b"").unwrap();
        assert!(rope.is_empty());
    }

    #[test]
    fn config_floor() {
        assert_eq!(RopeConfig::new(0).max_leaf_size(), 2);
        assert_eq!(RopeConfig::default().max_leaf_size(), MAX_LEAF_SIZE);
    }
}
