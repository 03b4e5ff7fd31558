//! Chunked sequential writer for destination files.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::progress::ProgressReporter;

/// How the destination is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Resume: keep existing bytes and write after them.
    Append,
    /// Fresh: create, discarding anything already there.
    Truncate,
}

/// Writes a byte stream to the destination in `chunk_size` units.
///
/// Holds at most one incomplete chunk in memory. The file handle is closed
/// when the writer is dropped, on success and on every error path. Bytes still
/// buffered at drop (less than one chunk) are discarded, so an abandoned
/// transfer leaves the file at a chunk boundary; call [`finish`](Self::finish)
/// to write the tail.
pub struct StreamWriter<'a> {
    file: File,
    path: PathBuf,
    chunk_size: usize,
    pending: Vec<u8>,
    bytes_written: u64,
    chunks_written: u64,
    progress: ProgressReporter<'a>,
}

impl<'a> StreamWriter<'a> {
    pub fn open(
        path: &Path,
        mode: WriteMode,
        chunk_size: usize,
        progress: ProgressReporter<'a>,
    ) -> io::Result<Self> {
        let mut opts = File::options();
        match mode {
            WriteMode::Append => opts.create(true).append(true),
            WriteMode::Truncate => opts.create(true).write(true).truncate(true),
        };
        let file = opts.open(path)?;
        let chunk_size = chunk_size.max(1);
        Ok(Self {
            file,
            path: path.to_path_buf(),
            chunk_size,
            pending: Vec::with_capacity(chunk_size),
            bytes_written: 0,
            chunks_written: 0,
            progress,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written to disk by this writer (excludes buffered bytes).
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn chunks_written(&self) -> u64 {
        self.chunks_written
    }

    /// Accept the next piece of the stream. Whole chunks are written
    /// immediately, in order; a trailing partial chunk is kept for later.
    pub fn push(&mut self, mut data: &[u8]) -> io::Result<()> {
        while !data.is_empty() {
            if self.pending.is_empty() && data.len() >= self.chunk_size {
                let (chunk, rest) = data.split_at(self.chunk_size);
                self.write_chunk(chunk)?;
                data = rest;
                continue;
            }
            let take = (self.chunk_size - self.pending.len()).min(data.len());
            self.pending.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.pending.len() == self.chunk_size {
                let chunk = std::mem::take(&mut self.pending);
                let res = self.write_chunk(&chunk);
                self.pending = chunk;
                self.pending.clear();
                res?;
            }
        }
        Ok(())
    }

    /// Write the buffered tail, flush and sync. Returns the bytes written by this writer.
    pub fn finish(mut self) -> io::Result<u64> {
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            self.write_chunk(&tail)?;
        }
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(self.bytes_written)
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk)?;
        self.bytes_written += chunk.len() as u64;
        self.chunks_written += 1;
        self.progress.chunk_written(self.bytes_written);
        Ok(())
    }
}
