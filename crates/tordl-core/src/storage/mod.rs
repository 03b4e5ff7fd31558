//! Destination file I/O.
//!
//! Partial downloads live at their final name: a fresh download creates (and
//! truncates) the file, a resumed one appends to it. The [`StreamWriter`]
//! regroups whatever the transport delivers into fixed-size chunks, writes
//! each chunk in arrival order, and reports progress per chunk.

mod progress;
mod writer;

pub use progress::ProgressReporter;
pub use writer::{StreamWriter, WriteMode};

/// Write an already-split stream to `path` and return the bytes written.
pub fn write_chunks<I, C>(
    chunks: I,
    path: &std::path::Path,
    mode: WriteMode,
    chunk_size: usize,
    progress: ProgressReporter<'_>,
) -> std::io::Result<u64>
where
    I: IntoIterator<Item = C>,
    C: AsRef<[u8]>,
{
    let mut writer = StreamWriter::open(path, mode, chunk_size, progress)?;
    for chunk in chunks {
        writer.push(chunk.as_ref())?;
    }
    writer.finish()
}

/// Size of the file at `path`, or 0 if it does not exist.
pub fn file_len(path: &std::path::Path) -> std::io::Result<u64> {
    match std::fs::metadata(path) {
        Ok(m) => Ok(m.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e),
    }
}

/// Cut the file at `path` down to `len` bytes.
pub fn truncate_to(path: &std::path::Path, len: u64) -> std::io::Result<()> {
    std::fs::OpenOptions::new().write(true).open(path)?.set_len(len)
}
