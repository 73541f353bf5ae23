//! Tree file format.
//!
//! ```text
//! header   (16 bytes): magic "TREE" | version: u32 | root offset: i64 (-1 = empty)
//! leaf     record:     tag 1: u8 | length: i32 | line count: i32 | <length> bytes
//! internal record:     tag 0: u8 | left offset: i64 | right offset: i64 (-1 = none)
//! ```
//!
//! All integers are little-endian. Records are written children first, so a
//! parent stores the file offsets of records that already exist and the root
//! offset is patched into the header last. Internal records carry no cached
//! aggregates; the reader recomputes them from the children.

use std::{
    collections::HashSet,
    fs::File,
    io::{self, BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write},
    path::Path,
};

use tracing::debug;

use crate::{
    Rope, RopeConfig,
    error::TreeFileError,
    node::{self, Leaf, Node, Slot},
};

pub const MAGIC: [u8; 4] = *b"TREE";
pub const VERSION: u32 = 1;
pub const HEADER_LEN: u64 = 16;

const OFFSET_NONE: i64 = -1;
const ROOT_OFFSET_POS: u64 = 8;
const TAG_INTERNAL: u8 = 0;
const TAG_LEAF: u8 = 1;
const LEAF_HEADER_LEN: u64 = 9;
const INTERNAL_RECORD_LEN: u64 = 17;

type Result<T> = std::result::Result<T, TreeFileError>;

/// Write `rope` to a new file at `path`, replacing any existing file.
pub fn save(rope: &Rope, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_to(rope, &mut writer)?;
    writer.flush()?;
    debug!(path = %path.display(), bytes = rope.len(), "saved tree file");
    Ok(())
}

pub fn encode(rope: &Rope) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    write_to(rope, &mut cursor)?;
    Ok(cursor.into_inner())
}

/// Write `rope` from the start of `writer`.
pub fn write_to<W: Write + Seek>(rope: &Rope, writer: W) -> Result<()> {
    let mut out = NodeWriter {
        inner: writer,
        pos: 0,
    };
    out.inner.seek(SeekFrom::Start(0))?;
    out.write_all(&MAGIC)?;
    out.write_all(&VERSION.to_le_bytes())?;
    out.write_all(&OFFSET_NONE.to_le_bytes())?;

    let root_offset = out.write_child(rope.root())?;

    out.inner.seek(SeekFrom::Start(ROOT_OFFSET_POS))?;
    out.inner.write_all(&root_offset.to_le_bytes())?;
    out.inner.seek(SeekFrom::Start(out.pos))?;
    Ok(())
}

pub fn load(path: impl AsRef<Path>) -> Result<Rope> {
    load_with_config(path, RopeConfig::default())
}

pub fn load_with_config(path: impl AsRef<Path>, config: RopeConfig) -> Result<Rope> {
    let path = path.as_ref();
    let rope = read_from(BufReader::new(File::open(path)?), config)?;
    debug!(path = %path.display(), bytes = rope.len(), "loaded tree file");
    Ok(rope)
}

pub fn decode(bytes: &[u8]) -> Result<Rope> {
    read_from(Cursor::new(bytes), RopeConfig::default())
}

/// Read a whole tree file. Any corrupt record fails the load; no partial
/// rope is ever returned.
///
/// Subtrees are re-joined as they are read and leaves larger than
/// `config.max_leaf_size()` are split, so the result keeps the same balance
/// and leaf bounds as a rope built by editing, whatever shape the file has.
pub fn read_from<R: Read + Seek>(reader: R, config: RopeConfig) -> Result<Rope> {
    let mut input = NodeReader::new(reader, config.max_leaf_size())?;
    let root_offset = input.read_header()?;
    let root = input.read_tree(root_offset)?;
    Ok(Rope::from_root(root, config))
}

struct NodeWriter<W> {
    inner: W,
    pos: u64,
}

impl<W: Write> NodeWriter<W> {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }

    fn write_child(&mut self, child: Option<&Node>) -> Result<i64> {
        match child {
            Some(node) => self.write_node(node),
            None => Ok(OFFSET_NONE),
        }
    }

    // post-order: returns the offset of this node's own record
    fn write_node(&mut self, node: &Node) -> Result<i64> {
        match node {
            Node::Leaf(leaf) => {
                let too_large = || TreeFileError::TooLarge(leaf.len());
                let len = i32::try_from(leaf.len()).map_err(|_| too_large())?;
                let lines = i32::try_from(leaf.line_count()).map_err(|_| too_large())?;

                let offset = self.pos;
                self.write_all(&[TAG_LEAF])?;
                self.write_all(&len.to_le_bytes())?;
                self.write_all(&lines.to_le_bytes())?;
                self.write_all(leaf.as_bytes())?;
                Ok(offset as i64)
            }
            Node::Internal(inner) => {
                let left = self.write_child(inner.left())?;
                let right = self.write_child(inner.right())?;

                let offset = self.pos;
                self.write_all(&[TAG_INTERNAL])?;
                self.write_all(&left.to_le_bytes())?;
                self.write_all(&right.to_le_bytes())?;
                Ok(offset as i64)
            }
        }
    }
}

struct NodeReader<R> {
    inner: R,
    file_len: u64,
    max_leaf: usize,
    // every record may be referenced once, which bounds the decoded size
    visited: HashSet<u64>,
}

// Pending work of the post-order walk over records.
enum Step {
    // read the record at `offset`, which must precede `bound`
    Visit { offset: i64, bound: u64 },
    // pop the two finished children and join them
    Link,
}

impl<R: Read + Seek> NodeReader<R> {
    fn new(mut inner: R, max_leaf: usize) -> Result<Self> {
        let file_len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(NodeReader {
            inner,
            file_len,
            max_leaf,
            visited: HashSet::new(),
        })
    }

    fn read_exact(&mut self, buf: &mut [u8], what: &'static str, offset: u64) -> Result<()> {
        self.inner.read_exact(buf).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => TreeFileError::Truncated { what, offset },
            _ => TreeFileError::Io(err),
        })
    }

    fn read_array<const N: usize>(&mut self, what: &'static str, offset: u64) -> Result<[u8; N]> {
        let mut buf = [0; N];
        self.read_exact(&mut buf, what, offset)?;
        Ok(buf)
    }

    // validates magic and version, returns the root offset
    fn read_header(&mut self) -> Result<i64> {
        if self.file_len < HEADER_LEN {
            return Err(TreeFileError::Truncated {
                what: "header",
                offset: 0,
            });
        }
        let magic: [u8; 4] = self.read_array("magic", 0)?;
        if magic != MAGIC {
            return Err(TreeFileError::BadMagic { found: magic });
        }
        let version = u32::from_le_bytes(self.read_array("version", 4)?);
        if version != VERSION {
            return Err(TreeFileError::UnsupportedVersion(version));
        }
        Ok(i64::from_le_bytes(self.read_array("root offset", ROOT_OFFSET_POS)?))
    }

    // Explicit-stack walk: nesting in the file costs heap, never call depth.
    fn read_tree(&mut self, root_offset: i64) -> Result<Slot> {
        let mut steps = vec![Step::Visit {
            offset: root_offset,
            bound: self.file_len,
        }];
        let mut built: Vec<Slot> = Vec::new();

        while let Some(step) = steps.pop() {
            match step {
                Step::Visit { offset, bound } => {
                    let Some(at) = self.locate(offset, bound)? else {
                        built.push(None);
                        continue;
                    };
                    self.inner.seek(SeekFrom::Start(at))?;
                    let [tag] = self.read_array::<1>("node type", at)?;
                    match tag {
                        TAG_LEAF => built.push(self.read_leaf(at)?),
                        TAG_INTERNAL => {
                            let (left, right) = self.read_internal(at)?;
                            steps.push(Step::Link);
                            steps.push(Step::Visit { offset: right, bound: at });
                            steps.push(Step::Visit { offset: left, bound: at });
                        }
                        tag => return Err(TreeFileError::UnknownNodeType { tag, offset: at }),
                    }
                }
                Step::Link => {
                    let right = built.pop().flatten();
                    let left = built.pop().flatten();
                    built.push(node::join_slots(left, right));
                }
            }
        }
        Ok(built.pop().flatten())
    }

    // Checks a child offset against the file and its parent; `None` for a
    // null child.
    fn locate(&mut self, offset: i64, bound: u64) -> Result<Option<u64>> {
        if offset == OFFSET_NONE {
            return Ok(None);
        }
        let file_len = self.file_len;
        let at = match u64::try_from(offset) {
            Ok(at) if (HEADER_LEN..file_len).contains(&at) => at,
            _ => return Err(TreeFileError::OffsetOutOfBounds { offset, file_len }),
        };
        if at >= bound {
            return Err(TreeFileError::ForwardReference {
                offset,
                parent: bound,
            });
        }
        if !self.visited.insert(at) {
            return Err(TreeFileError::SharedRecord { offset: at });
        }
        Ok(Some(at))
    }

    fn read_leaf(&mut self, at: u64) -> Result<Slot> {
        if at + LEAF_HEADER_LEN > self.file_len {
            return Err(TreeFileError::Truncated {
                what: "leaf header",
                offset: at,
            });
        }
        let len = i32::from_le_bytes(self.read_array("leaf length", at)?);
        if len < 0 {
            return Err(TreeFileError::NegativeLength {
                what: "leaf length",
                value: len,
                offset: at,
            });
        }
        let lines = i32::from_le_bytes(self.read_array("leaf line count", at)?);
        if lines < 0 {
            return Err(TreeFileError::NegativeLength {
                what: "leaf line count",
                value: lines,
                offset: at,
            });
        }
        if at + LEAF_HEADER_LEN + len as u64 > self.file_len {
            return Err(TreeFileError::Truncated {
                what: "leaf data",
                offset: at,
            });
        }

        let len = len as usize;
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(len)?;
        bytes.resize(len, 0);
        self.read_exact(&mut bytes, "leaf data", at)?;

        let leaf = Leaf::new(bytes);
        if leaf.line_count() != lines as usize {
            return Err(TreeFileError::LineCountMismatch {
                offset: at,
                stored: lines,
                actual: leaf.line_count(),
            });
        }
        if leaf.is_empty() {
            return Ok(None);
        }
        if leaf.len() > self.max_leaf {
            return Ok(Some(Node::build(leaf.as_bytes(), self.max_leaf)?));
        }
        Ok(Some(Box::new(Node::Leaf(leaf))))
    }

    // child offsets of the internal record at `at`
    fn read_internal(&mut self, at: u64) -> Result<(i64, i64)> {
        if at + INTERNAL_RECORD_LEN > self.file_len {
            return Err(TreeFileError::Truncated {
                what: "internal node",
                offset: at,
            });
        }
        let left = i64::from_le_bytes(self.read_array("left offset", at)?);
        let right = i64::from_le_bytes(self.read_array("right offset", at)?);
        Ok((left, right))
    }
}
