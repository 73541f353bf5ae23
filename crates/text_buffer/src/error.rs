use std::io;

use rope::{RopeError, TreeFileError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BufferError {
    #[error(transparent)]
    Rope(#[from] RopeError),

    #[error("tree file: {0}")]
    TreeFile(#[from] TreeFileError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid buffer config: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, BufferError>;
