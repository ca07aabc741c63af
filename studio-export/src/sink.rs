//! Destinations for exported images.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::info;

use crate::error::SinkError;

/// Receives a finished PNG under its download name.
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Store the image and return where it went.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be stored.
    async fn deliver(&self, file_name: &str, png: Vec<u8>) -> Result<String, SinkError>;
}

fn check_file_name(file_name: &str) -> Result<(), SinkError> {
    let path = Path::new(file_name);
    let plain = path.file_name().is_some_and(|name| name == path.as_os_str());
    if file_name.is_empty() || !plain || file_name.starts_with('.') {
        return Err(SinkError::InvalidFileName(file_name.to_string()));
    }
    Ok(())
}

/// Writes images into a directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Sink writing into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DownloadSink for DirectorySink {
    async fn deliver(&self, file_name: &str, png: Vec<u8>) -> Result<String, SinkError> {
        check_file_name(file_name)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, &png).await?;
        info!(path = %path.display(), bytes = png.len(), "Export saved");
        Ok(path.display().to_string())
    }
}

/// Keeps images in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    downloads: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, oldest first.
    #[must_use]
    pub fn downloads(&self) -> Vec<(String, Vec<u8>)> {
        self.downloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DownloadSink for MemorySink {
    async fn deliver(&self, file_name: &str, png: Vec<u8>) -> Result<String, SinkError> {
        check_file_name(file_name)?;
        self.downloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((file_name.to_string(), png));
        Ok(format!("memory://{file_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn directory_sink_writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = DirectorySink::new(dir.path().join("exports"));
        let location = sink
            .deliver("canvas-export-1.png", vec![1, 2, 3])
            .await
            .expect("deliver");
        let written = std::fs::read(dir.path().join("exports/canvas-export-1.png")).expect("read");
        assert_eq!(written, vec![1, 2, 3]);
        assert!(location.ends_with("canvas-export-1.png"));
    }

    #[tokio::test]
    async fn path_components_are_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = DirectorySink::new(dir.path());
        for name in ["../escape.png", "nested/file.png", "", ".hidden.png"] {
            let err = sink.deliver(name, vec![1]).await.expect_err(name);
            assert!(matches!(err, SinkError::InvalidFileName(_)));
        }
    }

    #[tokio::test]
    async fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.deliver("a.png", vec![1]).await.expect("a");
        sink.deliver("b.png", vec![2]).await.expect("b");
        let names: Vec<String> = sink.downloads().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
    }
}
