//! Editor-facing text buffer backed by a binary rope.

mod buffer;
mod buffer_builder;
mod config;
mod error;
mod io;

pub use crate::buffer::{Edit, Position, Stats, TextBuffer};
pub use crate::buffer_builder::TextBufferBuilder;
pub use crate::config::{BufferConfig, DEFAULT_REBALANCE_INTERVAL};
pub use crate::error::{BufferError, Result};
pub use crate::io::{load_text_file, load_tree_file, save_text_file, save_tree_file};
pub use rope::{Match, Rope, RopeConfig};
