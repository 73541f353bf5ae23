use std::{collections::TryReserveError, ops::Range};

use crate::split;

pub const MAX_LEAF_SIZE: usize = 4096;

/// Owned child slot of an internal node, or the root slot of a rope.
pub type Slot = Option<Box<Node>>;

#[derive(Debug, Clone)]
pub enum Node {
    Internal(Internal),
    Leaf(Leaf),
}

impl Node {
    /// Build a subtree holding a copy of `text`, splitting until every leaf
    /// fits in `max_leaf` bytes. `text` must not be empty.
    pub fn build(text: &[u8], max_leaf: usize) -> Result<Box<Node>, TryReserveError> {
        if text.len() <= max_leaf {
            return Ok(Box::new(Node::Leaf(Leaf::try_from_slice(text)?)));
        }
        let (before, after) = text.split_at(split::split_index(text));
        // a failed right half drops the finished left half on the way out
        let left = Node::build(before, max_leaf)?;
        let right = Node::build(after, max_leaf)?;
        Ok(join(left, right))
    }

    pub fn is_leaf(&self) -> bool {
        match self {
            Self::Internal(_) => false,
            Self::Leaf(_) => true,
        }
    }

    pub fn as_internal(&self) -> Option<&Internal> {
        match self {
            Self::Internal(inner) => Some(inner),
            Self::Leaf(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Internal(inner) => inner.len,
            Self::Leaf(leaf) => leaf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn newlines(&self) -> usize {
        match self {
            Self::Internal(inner) => inner.newlines,
            Self::Leaf(leaf) => leaf.newlines,
        }
    }

    /// Line segments in this subtree: one more than its newline count.
    pub fn line_count(&self) -> usize {
        self.newlines() + 1
    }

    /// Levels from this node down to its deepest leaf; a leaf has height 1.
    pub fn height(&self) -> usize {
        match self {
            Self::Internal(inner) => inner.height,
            Self::Leaf(_) => 1,
        }
    }

    pub fn leaf_count(&self) -> usize {
        Leaves::new(Some(self)).count()
    }

    /// Byte offset where line `line` of this subtree starts.
    ///
    /// `line` must be at most `self.newlines()`. Descends by the cached newline
    /// totals and scans a single leaf at the bottom.
    pub fn line_start(&self, line: usize) -> usize {
        let mut node = self;
        let mut line = line;
        let mut base = 0;
        loop {
            let inner = match node {
                Self::Leaf(leaf) => return base + leaf.line_start(line),
                Self::Internal(inner) => inner,
            };
            match inner.left.as_deref() {
                Some(left) if line <= left.newlines() => node = left,
                _ => {
                    line -= inner.left_newlines();
                    base += inner.left_len();
                    match inner.right.as_deref() {
                        Some(right) => node = right,
                        None => return base,
                    }
                }
            }
        }
    }

    /// Number of newlines in the first `offset` bytes of this subtree.
    pub fn newlines_before(&self, offset: usize) -> usize {
        let mut node = self;
        let mut offset = offset;
        let mut count = 0;
        loop {
            let inner = match node {
                Self::Leaf(leaf) => {
                    let end = offset.min(leaf.len());
                    return count + bytecount::count(&leaf.bytes[..end], b'\n');
                }
                Self::Internal(inner) => inner,
            };
            let left_len = inner.left_len();
            match (inner.left.as_deref(), inner.right.as_deref()) {
                (Some(left), _) if offset < left_len => node = left,
                (_, Some(right)) => {
                    count += inner.left_newlines();
                    offset -= left_len;
                    node = right;
                }
                _ => return count + inner.left_newlines(),
            }
        }
    }

    /// The leaf holding byte `offset` and the offset local to it. The end of
    /// the subtree resolves to the last leaf.
    pub fn leaf_at(&self, offset: usize) -> (&Leaf, usize) {
        let (mut leaves, local) = Leaves::seek(self, offset);
        match leaves.next() {
            Some(leaf) => (leaf, local.min(leaf.len())),
            None => (Leaf::empty(), 0),
        }
    }

    // Check cached aggregates and structural rules for the whole subtree.
    pub(crate) fn validate(&self, max_leaf: usize) -> Result<(), String> {
        match self {
            Self::Leaf(leaf) => {
                if leaf.is_empty() {
                    return Err("empty leaf reachable from root".to_owned());
                }
                if leaf.len() > max_leaf {
                    return Err(format!("leaf of {} bytes exceeds {max_leaf}", leaf.len()));
                }
                let actual = bytecount::count(&leaf.bytes, b'\n');
                if actual != leaf.newlines {
                    return Err(format!("leaf caches {} newlines, holds {actual}", leaf.newlines));
                }
                Ok(())
            }
            Self::Internal(inner) => {
                let (Some(left), Some(right)) = (inner.left.as_deref(), inner.right.as_deref())
                else {
                    return Err("internal node with a missing child".to_owned());
                };
                left.validate(max_leaf)?;
                right.validate(max_leaf)?;
                if inner.len != left.len() + right.len() {
                    return Err(format!("internal length cache {} is stale", inner.len));
                }
                if inner.newlines != left.newlines() + right.newlines() {
                    return Err(format!("internal newline cache {} is stale", inner.newlines));
                }
                if inner.height != 1 + left.height().max(right.height()) {
                    return Err(format!("internal height cache {} is stale", inner.height));
                }
                if left.height().abs_diff(right.height()) > 1 {
                    return Err(format!(
                        "children of heights {} and {} are out of balance",
                        left.height(),
                        right.height()
                    ));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Internal {
    left: Slot,
    right: Slot,
    len: usize,
    newlines: usize,
    height: usize,
}

impl Internal {
    pub fn new(left: Slot, right: Slot) -> Self {
        let mut inner = Self {
            left,
            right,
            len: 0,
            newlines: 0,
            height: 1,
        };
        inner.recalc();
        inner
    }

    pub fn left(&self) -> Option<&Node> {
        self.left.as_deref()
    }

    pub fn right(&self) -> Option<&Node> {
        self.right.as_deref()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn newlines(&self) -> usize {
        self.newlines
    }

    fn left_len(&self) -> usize {
        self.left.as_deref().map_or(0, Node::len)
    }

    fn left_newlines(&self) -> usize {
        self.left.as_deref().map_or(0, Node::newlines)
    }

    // refresh caches from the children
    fn recalc(&mut self) {
        let children = [self.left.as_deref(), self.right.as_deref()];
        self.len = children.iter().flatten().map(|child| child.len()).sum();
        self.newlines = children.iter().flatten().map(|child| child.newlines()).sum();
        self.height = 1 + children.iter().flatten().map(|child| child.height()).max().unwrap_or(0);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Leaf {
    bytes: Vec<u8>,
    newlines: usize,
}

impl Leaf {
    pub fn new(bytes: Vec<u8>) -> Self {
        let newlines = bytecount::count(&bytes, b'\n');
        Leaf { bytes, newlines }
    }

    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, TryReserveError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(bytes.len())?;
        buf.extend_from_slice(bytes);
        Ok(Self::new(buf))
    }

    fn empty() -> &'static Leaf {
        static EMPTY: Leaf = Leaf {
            bytes: Vec::new(),
            newlines: 0,
        };
        &EMPTY
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn newlines(&self) -> usize {
        self.newlines
    }

    pub fn line_count(&self) -> usize {
        self.newlines + 1
    }

    /// Local byte offset where local line `line` starts; the leaf length when
    /// the line begins right after a trailing newline.
    pub fn line_start(&self, line: usize) -> usize {
        if line == 0 {
            return 0;
        }
        memchr::memchr_iter(b'\n', &self.bytes)
            .nth(line - 1)
            .map_or(self.bytes.len(), |at| at + 1)
    }

    // prefix ++ data ++ suffix, pos already clamped to the leaf
    fn spliced(&self, pos: usize, data: &[u8]) -> Result<Vec<u8>, TryReserveError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(self.bytes.len() + data.len())?;
        buf.extend_from_slice(&self.bytes[..pos]);
        buf.extend_from_slice(data);
        buf.extend_from_slice(&self.bytes[pos..]);
        Ok(buf)
    }

    fn without(&self, range: Range<usize>) -> Result<Vec<u8>, TryReserveError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(self.bytes.len() - range.len())?;
        buf.extend_from_slice(&self.bytes[..range.start]);
        buf.extend_from_slice(&self.bytes[range.end..]);
        Ok(buf)
    }

    fn concat(&self, other: &Leaf) -> Result<Leaf, TryReserveError> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(self.len() + other.len())?;
        bytes.extend_from_slice(&self.bytes);
        bytes.extend_from_slice(&other.bytes);
        Ok(Leaf {
            bytes,
            newlines: self.newlines + other.newlines,
        })
    }
}

/// In-order leaf iterator driven by an explicit stack.
pub struct Leaves<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Leaves<'a> {
    pub fn new(root: Option<&'a Node>) -> Self {
        Leaves {
            stack: root.into_iter().collect(),
        }
    }

    /// Iterator starting at the leaf holding `offset`, plus the offset local
    /// to that first leaf. Only right siblings of the descent path are kept.
    pub fn seek(root: &'a Node, offset: usize) -> (Self, usize) {
        let mut stack = Vec::new();
        let mut node = root;
        let mut offset = offset;
        loop {
            let inner = match node {
                Node::Leaf(_) => {
                    stack.push(node);
                    return (Leaves { stack }, offset);
                }
                Node::Internal(inner) => inner,
            };
            let left_len = inner.left_len();
            match (inner.left.as_deref(), inner.right.as_deref()) {
                (Some(left), right) if offset < left_len => {
                    stack.extend(right);
                    node = left;
                }
                (_, Some(right)) => {
                    offset -= left_len;
                    node = right;
                }
                (Some(left), None) => node = left,
                (None, None) => return (Leaves { stack }, 0),
            }
        }
    }
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a Leaf;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match node {
                Node::Leaf(leaf) => return Some(leaf),
                Node::Internal(inner) => {
                    self.stack.extend(inner.right.as_deref());
                    self.stack.extend(inner.left.as_deref());
                }
            }
        }
        None
    }
}

// Rewrites the root-to-leaf path covering `pos`. A failed allocation leaves
// the subtree untouched.
pub(crate) fn insert(
    slot: &mut Slot,
    pos: usize,
    data: &[u8],
    max_leaf: usize,
) -> Result<(), TryReserveError> {
    let Some(node) = slot else {
        *slot = Some(Node::build(data, max_leaf)?);
        return Ok(());
    };
    match node.as_mut() {
        Node::Leaf(leaf) => {
            let pos = pos.min(leaf.len());
            let joined = leaf.spliced(pos, data)?;
            if joined.len() <= max_leaf {
                *leaf = Leaf::new(joined);
            } else {
                *node = Node::build(&joined, max_leaf)?;
            }
        }
        Node::Internal(inner) => {
            let left_len = inner.left_len();
            if pos <= left_len {
                insert(&mut inner.left, pos, data, max_leaf)?;
            } else {
                insert(&mut inner.right, pos - left_len, data, max_leaf)?;
            }
            collapse(slot);
        }
    }
    Ok(())
}

// Removes `[pos, pos + len)` from the subtree, collapsing emptied nodes on
// the way back up. Caches stay consistent even when an allocation fails
// between the two halves of a straddling erase.
pub(crate) fn erase(slot: &mut Slot, pos: usize, len: usize) -> Result<(), TryReserveError> {
    let Some(node) = slot else {
        return Ok(());
    };
    if len == 0 {
        return Ok(());
    }
    match node.as_mut() {
        Node::Leaf(leaf) => {
            if pos >= leaf.len() {
                return Ok(());
            }
            let end = pos.saturating_add(len).min(leaf.len());
            if pos == 0 && end == leaf.len() {
                *slot = None;
            } else {
                let kept = leaf.without(pos..end)?;
                *leaf = Leaf::new(kept);
            }
            Ok(())
        }
        Node::Internal(inner) => {
            let left_len = inner.left_len();
            let outcome = if pos.saturating_add(len) <= left_len {
                erase(&mut inner.left, pos, len)
            } else if pos >= left_len {
                erase(&mut inner.right, pos - left_len, len)
            } else {
                let left_del = left_len - pos;
                erase(&mut inner.left, pos, left_del)
                    .and_then(|()| erase(&mut inner.right, 0, len - left_del))
            };
            collapse(slot);
            outcome
        }
    }
}

/// Replace an internal node that lost a child with its survivor and drop it
/// when both are gone. Children that drifted more than one level apart are
/// re-joined; otherwise only the caches are refreshed.
pub(crate) fn collapse(slot: &mut Slot) {
    let Some(node) = slot else {
        return;
    };
    let Node::Internal(inner) = node.as_mut() else {
        return;
    };
    if let (Some(left), Some(right)) = (inner.left.as_deref(), inner.right.as_deref()) {
        if left.height().abs_diff(right.height()) <= 1 {
            inner.recalc();
            return;
        }
    }
    let (left, right) = (inner.left.take(), inner.right.take());
    *slot = join_slots(left, right);
}

// Bottom-up pass folding sibling leaf pairs that fit in one leaf.
pub(crate) fn merge_leaves(slot: &mut Slot, max_leaf: usize) -> Result<(), TryReserveError> {
    let Some(node) = slot else {
        return Ok(());
    };
    let Node::Internal(inner) = node.as_mut() else {
        return Ok(());
    };
    let children = merge_leaves(&mut inner.left, max_leaf)
        .and_then(|()| merge_leaves(&mut inner.right, max_leaf));

    let merged = match (inner.left.as_deref(), inner.right.as_deref()) {
        (Some(Node::Leaf(left)), Some(Node::Leaf(right)))
            if children.is_ok() && left.len() + right.len() <= max_leaf =>
        {
            Some(left.concat(right))
        }
        _ => None,
    };
    match merged {
        Some(Ok(leaf)) => {
            **node = Node::Leaf(leaf);
            Ok(())
        }
        Some(Err(err)) => {
            collapse(slot);
            Err(err)
        }
        None => {
            collapse(slot);
            children
        }
    }
}

pub(crate) fn join_slots(left: Slot, right: Slot) -> Slot {
    match (left, right) {
        (Some(left), Some(right)) => Some(join(left, right)),
        (left, None) => left,
        (None, right) => right,
    }
}

/// Concatenate two height-balanced subtrees. The shorter one is hung off the
/// facing spine of the taller at a matching height and the spine is
/// rebalanced on the way back up, so the cost is the height difference.
pub(crate) fn join(left: Box<Node>, right: Box<Node>) -> Box<Node> {
    let (left_height, right_height) = (left.height(), right.height());
    if left_height > right_height + 1 {
        match into_children(left) {
            Ok((outer, inner)) => balance(outer, join(inner, right)),
            Err(left) => pair(left, right),
        }
    } else if right_height > left_height + 1 {
        match into_children(right) {
            Ok((inner, outer)) => balance(join(left, inner), outer),
            Err(right) => pair(left, right),
        }
    } else {
        pair(left, right)
    }
}

// Siblings at most two levels apart: one single or double rotation.
fn balance(left: Box<Node>, right: Box<Node>) -> Box<Node> {
    if left.height() > right.height() + 1 {
        let (outer, inner) = match into_children(left) {
            Ok(children) => children,
            Err(left) => return pair(left, right),
        };
        if outer.height() >= inner.height() {
            return pair(outer, pair(inner, right));
        }
        match into_children(inner) {
            Ok((inner_left, inner_right)) => pair(pair(outer, inner_left), pair(inner_right, right)),
            Err(inner) => pair(outer, pair(inner, right)),
        }
    } else if right.height() > left.height() + 1 {
        let (inner, outer) = match into_children(right) {
            Ok(children) => children,
            Err(right) => return pair(left, right),
        };
        if outer.height() >= inner.height() {
            return pair(pair(left, inner), outer);
        }
        match into_children(inner) {
            Ok((inner_left, inner_right)) => pair(pair(left, inner_left), pair(inner_right, outer)),
            Err(inner) => pair(pair(left, inner), outer),
        }
    } else {
        pair(left, right)
    }
}

fn pair(left: Box<Node>, right: Box<Node>) -> Box<Node> {
    Box::new(Node::Internal(Internal::new(Some(left), Some(right))))
}

// Both children of a full internal node, or the node back unchanged.
fn into_children(node: Box<Node>) -> Result<(Box<Node>, Box<Node>), Box<Node>> {
    match *node {
        Node::Internal(Internal {
            left: Some(left),
            right: Some(right),
            ..
        }) => Ok((left, right)),
        other => Err(Box::new(other)),
    }
}
