//! Event-output file allocation.
//!
//! The build tool writes its event stream to a file this crate names; the
//! subprocess creates and appends to it, this side only reads.

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// A uniquely-named event-output file in the system temp directory.
///
/// Creating the sink only reserves the path; the subprocess creates the file
/// on its first write, which may happen an arbitrary time after spawn (or
/// never, if the process dies early).
#[derive(Debug)]
pub struct EventSink {
    path: PathBuf,
}

impl EventSink {
    /// Allocate a fresh event-output path.
    #[must_use]
    pub fn create() -> Self {
        let path = std::env::temp_dir().join(format!("bep-{}.bin", Uuid::new_v4()));
        tracing::debug!(path = %path.display(), "Allocated build event file");
        Self { path }
    }

    /// Path to hand to the subprocess via its event-output flag.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the event file.
    ///
    /// A file the subprocess never created is not an error; that run simply
    /// produced zero events.
    pub async fn delete(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to delete build event file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_unique() {
        let a = EventSink::create();
        let b = EventSink::create();
        assert_ne!(a.path(), b.path());
    }

    #[tokio::test]
    async fn test_delete_missing_file_is_ok() {
        let sink = EventSink::create();
        assert!(!sink.path().exists());
        sink.delete().await;
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let sink = EventSink::create();
        tokio::fs::write(sink.path(), b"events").await.unwrap();
        assert!(sink.path().exists());
        sink.delete().await;
        assert!(!sink.path().exists());
    }
}
