//! Blob store for cover images, keyed by filename.

use crate::domain::book::{CoverImage, COVERS_PREFIX};
use async_trait::async_trait;

pub mod directory;
pub mod memory;

pub use directory::DirectoryCoverStore;
pub use memory::MemoryCoverStore;

#[async_trait]
pub trait CoverStore: Send + Sync {
    /// Stores `content` under `covers/<filename>`, choosing a free name if
    /// that one is taken, and returns the stored reference.
    async fn save(&self, filename: &str, content: Vec<u8>) -> anyhow::Result<CoverImage>;

    async fn load(&self, image: &CoverImage) -> anyhow::Result<Option<Vec<u8>>>;

    /// Removes the blob; a missing blob is not an error.
    async fn delete(&self, image: &CoverImage) -> anyhow::Result<()>;
}

/// The `attempt`-th candidate name for `filename`: `covers/name.ext`,
/// then `covers/name_1.ext`, `covers/name_2.ext`, ...
pub(crate) fn candidate_name(filename: &str, attempt: usize) -> String {
    if attempt == 0 {
        return format!("{COVERS_PREFIX}{filename}");
    }
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{COVERS_PREFIX}{stem}_{attempt}.{ext}"),
        _ => format!("{COVERS_PREFIX}{filename}_{attempt}"),
    }
}

/// Content type served for a stored cover, from its extension.
pub fn content_type(image: &CoverImage) -> &'static str {
    let ext = image
        .name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
