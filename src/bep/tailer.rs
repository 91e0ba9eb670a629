//! Incremental byte tailer for the growing event file.
//!
//! Reads bytes appended since the last read, tracking the file offset so the
//! caller observes the stream in write order.

use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Errors that can occur while tailing the event file.
#[derive(thiserror::Error, Debug)]
pub enum TailError {
    /// The event file disappeared while the stream was being read.
    #[error("Build event file deleted: {0}")]
    FileDeleted(PathBuf),

    /// The file shrank below the read offset. The writer is append-only, so
    /// this means the file was replaced or corrupted underneath us.
    #[error("Build event file truncated below offset {offset}")]
    FileTruncated { offset: u64 },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Incremental byte reader that tracks its position in the event file.
#[derive(Debug)]
pub struct ByteTailer {
    path: PathBuf,
    offset: u64,
}

impl ByteTailer {
    /// Create a tailer starting at the beginning of the file.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path, offset: 0 }
    }

    /// Current byte offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Path being tailed.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Read bytes appended since the last call.
    ///
    /// Returns an empty vector when the file has not grown.
    ///
    /// # Errors
    ///
    /// Returns [`TailError::FileDeleted`] if the file no longer exists,
    /// [`TailError::FileTruncated`] if it shrank below the current offset,
    /// or [`TailError::Io`] for other read failures.
    pub async fn read_new_bytes(&mut self) -> Result<Vec<u8>, TailError> {
        let mut file = match File::open(&self.path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TailError::FileDeleted(self.path.clone()));
            }
            Err(e) => return Err(TailError::Io(e)),
        };

        let file_len = file.metadata().await?.len();
        if file_len < self.offset {
            return Err(TailError::FileTruncated {
                offset: self.offset,
            });
        }
        if file_len == self.offset {
            return Ok(Vec::new());
        }

        file.seek(std::io::SeekFrom::Start(self.offset)).await?;
        let mut bytes = Vec::with_capacity(usize::try_from(file_len - self.offset).unwrap_or(0));
        file.read_to_end(&mut bytes).await?;
        self.offset += bytes.len() as u64;
        Ok(bytes)
    }
}
