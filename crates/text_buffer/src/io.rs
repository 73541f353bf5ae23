use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use tracing::debug;

use crate::{
    buffer::TextBuffer, buffer_builder::TextBufferBuilder, config::BufferConfig, error::Result,
};

/// Read a plain text file in chunks.
pub fn load_text_file<P: AsRef<Path>>(path: P, config: BufferConfig) -> Result<TextBuffer> {
    let path = path.as_ref();
    let mut builder = TextBufferBuilder::with_config(config);
    builder.read_from(BufReader::new(File::open(path)?))?;
    let buffer = builder.finish()?;
    debug!(path = %path.display(), bytes = buffer.len(), "loaded text file");
    Ok(buffer)
}

/// Write the document as plain text, one leaf-sized range at a time.
pub fn save_text_file<P: AsRef<Path>>(buffer: &TextBuffer, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path)?);
    let step = buffer.rope().config().max_leaf_size();
    let mut offset = 0;
    while offset < buffer.len() {
        let chunk = buffer.text_range(offset, step)?;
        out.write_all(&chunk)?;
        offset += chunk.len();
    }
    out.flush()?;
    debug!(path = %path.display(), bytes = offset, "saved text file");
    Ok(())
}

/// Read a tree file written by [`save_tree_file`].
pub fn load_tree_file<P: AsRef<Path>>(path: P, config: BufferConfig) -> Result<TextBuffer> {
    let rope = rope::load_with_config(path, config.rope_config())?;
    Ok(TextBuffer::from_rope(rope, config))
}

pub fn save_tree_file<P: AsRef<Path>>(buffer: &TextBuffer, path: P) -> Result<()> {
    rope::save(buffer.rope(), path)?;
    Ok(())
}
