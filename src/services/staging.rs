//! Per-request scratch files.
//!
//! A [`ScratchFile`] owns a local path and removes it when dropped, whatever
//! way the owning scope exits. Declaring guards in acquisition order gives
//! removal in reverse order.

use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::File,
    io::{AsyncSeekExt, AsyncWriteExt},
};
use uuid::Uuid;

#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// A fresh, unique path under `dir`. Nothing is created yet.
    pub fn reserve(dir: &Path, prefix: &str, extension: &str) -> Self {
        Self {
            path: dir.join(format!("{}-{}.{}", prefix, Uuid::new_v4(), extension)),
        }
    }

    /// Take ownership of a path another component writes to, so it is
    /// removed even if that component fails partway through.
    pub fn adopt(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    // Synchronous unlink: Drop cannot await.
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed scratch file"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => tracing::warn!(
                path = %self.path.display(),
                error = %err,
                "failed to remove scratch file"
            ),
        }
    }
}

/// Why staging a payload stopped.
#[derive(Debug)]
pub enum StageError<E> {
    /// The payload source itself failed (client disconnect, bad multipart framing, ...).
    Source(E),
    /// More than `limit` bytes arrived.
    TooLarge { limit: usize },
    Io(io::Error),
}

/// Write `stream` to `file`'s path, never accepting more than `limit`
/// bytes, then flush and rewind the handle for downstream readers.
/// Returns the open handle and the number of bytes written.
pub async fn stage_stream<S, E>(
    file: &ScratchFile,
    stream: S,
    limit: usize,
) -> Result<(File, u64), StageError<E>>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    let mut out = File::create(file.path()).await.map_err(StageError::Io)?;
    let mut written: u64 = 0;

    pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(StageError::Source)?;
        written += chunk.len() as u64;
        if written > limit as u64 {
            return Err(StageError::TooLarge { limit });
        }
        out.write_all(&chunk).await.map_err(StageError::Io)?;
    }

    out.flush().await.map_err(StageError::Io)?;
    out.rewind().await.map_err(StageError::Io)?;
    Ok((out, written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tokio::io::AsyncReadExt;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, io::Error>> {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok::<_, io::Error>(Bytes::from_static(*p)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchFile::reserve(dir.path(), "upload", "mp4");
            std::fs::write(scratch.path(), b"x").unwrap();
            assert!(scratch.path().exists());
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drop_of_never_created_file_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchFile::adopt(dir.path().join("never-written"));
        drop(scratch);
    }

    /// Records, when dropped, which of two watched paths still exist.
    struct Witness {
        first: PathBuf,
        second: PathBuf,
        seen: std::sync::Arc<std::sync::Mutex<Option<(bool, bool)>>>,
    }

    impl Drop for Witness {
        fn drop(&mut self) {
            *self.seen.lock().unwrap() = Some((self.first.exists(), self.second.exists()));
        }
    }

    #[tokio::test]
    async fn guards_release_in_reverse_acquisition_order() {
        let dir = tempfile::tempdir().unwrap();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
        {
            let staged = ScratchFile::reserve(dir.path(), "upload", "mp4");
            std::fs::write(staged.path(), b"raw").unwrap();
            let processed_path = staged.path().with_extension("mp4.processing");

            // declared between the two guards, so it drops between them
            let _witness = Witness {
                first: staged.path().to_path_buf(),
                second: processed_path.clone(),
                seen: seen.clone(),
            };

            let processed = ScratchFile::adopt(processed_path);
            std::fs::write(processed.path(), b"remuxed").unwrap();
        }
        // processed output already removed, staged upload not yet
        assert_eq!(*seen.lock().unwrap(), Some((true, false)));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn reserved_paths_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let a = ScratchFile::reserve(dir.path(), "upload", "mp4");
        let b = ScratchFile::reserve(dir.path(), "upload", "mp4");
        assert_ne!(a.path(), b.path());
        assert!(a.path().to_string_lossy().ends_with(".mp4"));
    }

    #[tokio::test]
    async fn staged_handle_is_rewound() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchFile::reserve(dir.path(), "upload", "mp4");
        let (mut file, written) = stage_stream(&scratch, chunks(&[b"hello ", b"world"]), 1024)
            .await
            .unwrap();
        assert_eq!(written, 11);

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.unwrap();
        assert_eq!(contents, "hello world");
    }

    #[tokio::test]
    async fn stops_reading_past_the_limit() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchFile::reserve(dir.path(), "upload", "mp4");
        let result = stage_stream(&scratch, chunks(&[b"12345", b"67890"]), 8).await;
        assert!(matches!(result, Err(StageError::TooLarge { limit: 8 })));
    }
}
