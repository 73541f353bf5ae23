//! Error types for rope queries and tree files.

use std::{collections::TryReserveError, io};
use thiserror::Error;

/// Errors from rope queries and allocations. Mutations clamp their arguments
/// instead of reporting them out of range.
#[derive(Error, Debug)]
pub enum RopeError {
    #[error("line {line} out of range (line count {line_count})")]
    LineOutOfRange { line: usize, line_count: usize },

    #[error("offset {offset} out of range (length {len})")]
    OffsetOutOfRange { offset: usize, len: usize },

    #[error("allocation failed: {0}")]
    Alloc(#[from] TryReserveError),
}

/// Errors from reading or writing a tree file. Every corrupt-file condition is
/// fatal for the load.
#[derive(Error, Debug)]
pub enum TreeFileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("bad magic {found:?}, not a tree file")]
    BadMagic { found: [u8; 4] },

    #[error("unsupported tree file version {0}")]
    UnsupportedVersion(u32),

    #[error("truncated {what} at offset {offset}")]
    Truncated { what: &'static str, offset: u64 },

    #[error("node offset {offset} outside file of {file_len} bytes")]
    OffsetOutOfBounds { offset: i64, file_len: u64 },

    #[error("child offset {offset} does not precede its parent at {parent}")]
    ForwardReference { offset: i64, parent: u64 },

    #[error("negative {what} {value} at offset {offset}")]
    NegativeLength {
        what: &'static str,
        value: i32,
        offset: u64,
    },

    #[error("leaf at offset {offset} stores line count {stored}, its data has {actual}")]
    LineCountMismatch {
        offset: u64,
        stored: i32,
        actual: usize,
    },

    #[error("record at offset {offset} is referenced more than once")]
    SharedRecord { offset: u64 },

    #[error("unknown node type {tag} at offset {offset}")]
    UnknownNodeType { tag: u8, offset: u64 },

    #[error("leaf of {0} bytes does not fit the file format")]
    TooLarge(usize),

    #[error("allocation failed: {0}")]
    Alloc(#[from] TryReserveError),
}

pub type Result<T, E = RopeError> = std::result::Result<T, E>;
