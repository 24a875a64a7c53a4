//! Cover blobs kept as files below a root directory.

use super::{candidate_name, CoverStore};
use crate::domain::book::CoverImage;
use anyhow::Context;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub struct DirectoryCoverStore {
    root: PathBuf,
    // serializes name selection with file creation
    write_lock: Mutex<()>,
}

impl DirectoryCoverStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a stored name to a path, refusing anything that could leave the root.
    fn path_for(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
            .then(|| self.root.join(relative))
    }
}

#[async_trait]
impl CoverStore for DirectoryCoverStore {
    async fn save(&self, filename: &str, content: Vec<u8>) -> anyhow::Result<CoverImage> {
        let _guard = self.write_lock.lock().await;
        for attempt in 0.. {
            let name = candidate_name(filename, attempt);
            let path = self
                .path_for(&name)
                .ok_or_else(|| anyhow::anyhow!("invalid cover filename {:?}", filename))?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e).with_context(|| format!("creating {}", path.display())),
            };
            file.write_all(&content).await?;
            file.flush().await?;
            return Ok(CoverImage::new(name));
        }
        Err(anyhow::anyhow!("no free cover name for {}", filename))
    }

    async fn load(&self, image: &CoverImage) -> anyhow::Result<Option<Vec<u8>>> {
        let Some(path) = self.path_for(&image.name) else {
            return Ok(None);
        };
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    async fn delete(&self, image: &CoverImage) -> anyhow::Result<()> {
        let Some(path) = self.path_for(&image.name) else {
            return Ok(());
        };
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }
}
