use std::path::Path;

use bytes::Bytes;
use tracing::{info, instrument, warn};

use super::services::{AssetLinks, AssetStore};
use crate::error::AssetError;
use crate::storage::StorageClient;

fn basename(link: &str) -> &str {
    let path = link.split(['?', '#']).next().unwrap_or(link);
    path.rsplit('/').next().unwrap_or(path)
}

fn content_type_for(link: &str) -> &'static str {
    match Path::new(link)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

pub fn origin_key(folder: &str, resource_id: i64, link: &str) -> String {
    format!("{}/origin/{}/{}", folder, resource_id, basename(link))
}

pub fn thumbnail_key(folder: &str, resource_id: i64, link: &str) -> String {
    format!("{}/thumbnails/{}/{}", folder, resource_id, basename(link))
}

/// Deletes the remote pair previously published for `resource_id`.
/// Nothing happens unless both links are known.
pub async fn remove_remote(
    storage: &dyn StorageClient,
    folder: &str,
    resource_id: i64,
    old: &AssetLinks,
) -> anyhow::Result<()> {
    if old.origin.is_empty() || old.thumb.is_empty() {
        return Ok(());
    }
    let keys = [
        origin_key(folder, resource_id, &old.origin),
        thumbnail_key(folder, resource_id, &old.thumb),
    ];
    storage.delete_objects(&keys).await
}

impl AssetStore {
    /// Uploads a locally derived pair under resource-scoped keys and returns
    /// the public URLs. The old remote pair goes first; the local files are
    /// deleted last and any trouble there fails the whole publish.
    #[instrument(skip(self, storage, old))]
    pub async fn publish(
        &self,
        storage: &dyn StorageClient,
        origin: &str,
        thumb: &str,
        folder: &str,
        resource_id: i64,
        old: Option<&AssetLinks>,
    ) -> Result<AssetLinks, AssetError> {
        if let Some(old) = old {
            if let Err(e) = remove_remote(storage, folder, resource_id, old).await {
                warn!(error = %e, resource_id, "removing previous remote assets failed");
            }
        }

        let origin_url = self
            .upload(storage, origin, &origin_key(folder, resource_id, origin))
            .await?;
        let thumb_url = self
            .upload(storage, thumb, &thumbnail_key(folder, resource_id, thumb))
            .await?;

        if !self.clear_by_url(origin).await? {
            return Err(AssetError::Publish(format!(
                "local source {origin} disappeared before cleanup"
            )));
        }
        if !self.clear_by_url(thumb).await? {
            warn!(resource_id, thumb, "local thumbnail already gone after publish");
        }

        info!(resource_id, %origin_url, %thumb_url, "assets published");
        Ok(AssetLinks {
            origin: origin_url,
            thumb: thumb_url,
        })
    }

    async fn upload(
        &self,
        storage: &dyn StorageClient,
        link: &str,
        key: &str,
    ) -> Result<String, AssetError> {
        let path = self.resolve(link);
        let body = tokio::fs::read(&path)
            .await
            .map_err(|e| AssetError::io(&path, e))?;
        storage
            .put_object(key, Bytes::from(body), content_type_for(link))
            .await
            .map_err(|e| AssetError::Publish(format!("put {key}: {e:#}")))?;
        Ok(storage.object_url(key))
    }
}
