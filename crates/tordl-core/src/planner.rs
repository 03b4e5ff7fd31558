//! Range-resume planning: derive the `Range` request from bytes already on disk.

use std::io;
use std::path::Path;

/// Resume state for one attempt, computed from the destination file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePlan {
    /// Bytes already present; the next request starts at this offset.
    pub offset: u64,
    /// Whole chunks already on disk. Only used for progress totals.
    pub chunks_present: u64,
}

impl ResumePlan {
    pub const FRESH: ResumePlan = ResumePlan {
        offset: 0,
        chunks_present: 0,
    };

    pub fn is_resume(&self) -> bool {
        self.offset > 0
    }

    /// `Range` header value (`bytes=N-`), open-ended. `None` for a fresh download.
    pub fn range_header(&self) -> Option<String> {
        self.is_resume().then(|| format!("bytes={}-", self.offset))
    }

    /// Range in curl's `start-end` form (curl adds the `bytes=` prefix itself).
    pub fn curl_range(&self) -> Option<String> {
        self.is_resume().then(|| format!("{}-", self.offset))
    }
}

/// Inspect `destination` and plan the next request.
///
/// A missing file plans a fresh download. An existing file of `S` bytes plans
/// `bytes=S-` and `S / chunk_size` whole chunks present. Anything at the path
/// other than a regular file is an error.
pub fn plan(destination: &Path, chunk_size: usize) -> io::Result<ResumePlan> {
    let meta = match std::fs::metadata(destination) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ResumePlan::FRESH),
        Err(e) => return Err(e),
    };
    if !meta.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{} exists and is not a regular file", destination.display()),
        ));
    }
    let offset = meta.len();
    Ok(ResumePlan {
        offset,
        chunks_present: offset / chunk_size.max(1) as u64,
    })
}
