use super::{candidate_name, CoverStore};
use crate::domain::book::CoverImage;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryCoverStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryCoverStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoverStore for MemoryCoverStore {
    async fn save(&self, filename: &str, content: Vec<u8>) -> anyhow::Result<CoverImage> {
        let mut blobs = self.blobs.write().await;
        let name = (0..)
            .map(|attempt| candidate_name(filename, attempt))
            .find(|name| !blobs.contains_key(name))
            .ok_or_else(|| anyhow::anyhow!("no free cover name for {}", filename))?;
        blobs.insert(name.clone(), content);
        Ok(CoverImage::new(name))
    }

    async fn load(&self, image: &CoverImage) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().await.get(&image.name).cloned())
    }

    async fn delete(&self, image: &CoverImage) -> anyhow::Result<()> {
        self.blobs.write().await.remove(&image.name);
        Ok(())
    }
}
