use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use shared::domain::AttachmentHandle;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

use crate::MediaStore;

/// Keeps attachment images as files in one directory. The handle is the
/// file name.
#[derive(Debug, Clone)]
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, handle: &AttachmentHandle) -> Result<PathBuf> {
        let name = handle.as_str();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            bail!("invalid attachment handle '{name}'");
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn store(&self, bytes: &[u8]) -> Result<AttachmentHandle> {
        fs::create_dir_all(&self.root).await.with_context(|| {
            format!("failed to create media directory '{}'", self.root.display())
        })?;

        let handle = AttachmentHandle(format!("{}.jpg", Uuid::new_v4()));
        let path = self.path_for(&handle)?;
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write attachment '{}'", path.display()))?;
        info!("media: stored attachment handle={handle} bytes={}", bytes.len());
        Ok(handle)
    }

    async fn fetch(&self, handle: &AttachmentHandle) -> Result<Vec<u8>> {
        let path = self.path_for(handle)?;
        fs::read(&path)
            .await
            .with_context(|| format!("failed to read attachment '{}'", path.display()))
    }

    async fn delete(&self, handle: &AttachmentHandle) -> Result<()> {
        let path = self.path_for(handle)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("media: deleted attachment handle={handle}");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to delete attachment '{}'", path.display())),
        }
    }
}

#[cfg(test)]
#[path = "tests/media_tests.rs"]
mod tests;
