use std::path::{Path, PathBuf};

use bytes::Bytes;
use rand::{distributions::Alphanumeric, Rng};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::thumbnail;
use crate::config::AssetConfig;
use crate::error::AssetError;

pub const MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024;
const ALLOWED_EXTENSIONS: [&str; 2] = ["png", "jpg"];
const RANDOM_NAME_LEN: usize = 20;

/// A file as it arrives from the caller, before anything touches disk.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub body: Bytes,
}

impl Upload {
    pub fn size(&self) -> usize {
        self.body.len()
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }
}

/// Origin + thumbnail links, always stored and removed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetLinks {
    pub origin: String,
    pub thumb: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetSlot {
    Origin,
    Thumb,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    Removed,
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SlotRemoval {
    pub slot: AssetSlot,
    pub direct: RemovalOutcome,
    pub scoped: RemovalOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct RemovalReport {
    pub slots: Vec<SlotRemoval>,
}

impl RemovalReport {
    /// Slots for which at least one layout had the file.
    pub fn removed(&self) -> Vec<AssetSlot> {
        self.slots
            .iter()
            .filter(|s| s.direct == RemovalOutcome::Removed || s.scoped == RemovalOutcome::Removed)
            .map(|s| s.slot)
            .collect()
    }

    pub fn failures(&self) -> Vec<String> {
        self.slots
            .iter()
            .flat_map(|s| [&s.direct, &s.scoped])
            .filter_map(|o| match o {
                RemovalOutcome::Failed(reason) => Some(reason.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Local side of the meal image lifecycle. Links handed out are relative to `root`.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
    origin_folder: String,
    thumbnail_folder: String,
}

impl AssetStore {
    pub fn new(cfg: &AssetConfig) -> Self {
        Self {
            root: cfg.root.clone(),
            origin_folder: cfg.origin_folder.trim_matches('/').to_string(),
            thumbnail_folder: cfg.thumbnail_folder.trim_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, link: &str) -> PathBuf {
        self.root.join(link.trim_start_matches('/'))
    }

    pub fn validate(&self, upload: &Upload) -> Result<String, AssetError> {
        let ext = upload
            .extension()
            .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
            .ok_or_else(|| {
                AssetError::Invalid(format!(
                    "{}: only files with these extensions are allowed: {}",
                    upload.file_name,
                    ALLOWED_EXTENSIONS.join(", ")
                ))
            })?;
        if upload.size() > MAX_UPLOAD_BYTES {
            return Err(AssetError::Invalid(format!(
                "{}: file is {} bytes, limit is {} bytes",
                upload.file_name,
                upload.size(),
                MAX_UPLOAD_BYTES
            )));
        }
        Ok(ext)
    }

    /// `<origin_folder>/<unix seconds><random token>.<ext>`; does not touch disk.
    pub fn derive_storage_name(&self, extension: &str) -> String {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RANDOM_NAME_LEN)
            .map(char::from)
            .collect();
        format!(
            "{}/{}{}.{}",
            self.origin_folder,
            OffsetDateTime::now_utc().unix_timestamp(),
            token,
            extension
        )
    }

    pub async fn store_local(&self, body: &[u8], link: &str) -> Result<(), AssetError> {
        for folder in [&self.origin_folder, &self.thumbnail_folder] {
            let dir = self.root.join(folder);
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| AssetError::io(&dir, e))?;
        }
        let target = self.resolve(link);
        tokio::fs::write(&target, body)
            .await
            .map_err(|e| AssetError::io(&target, e))?;
        debug!(path = %target.display(), bytes = body.len(), "asset stored");
        Ok(())
    }

    /// Link of the thumbnail derived from `origin`. Keeps the origin's file
    /// name, adding `_thumb` to the stem only when both folders coincide.
    pub fn thumbnail_link(&self, origin: &str) -> Result<String, AssetError> {
        let path = Path::new(origin);
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AssetError::Invalid(format!("{origin}: no file name")))?;
        if self.thumbnail_folder != self.origin_folder {
            return Ok(format!("{}/{}", self.thumbnail_folder, file_name));
        }
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(file_name);
        let name = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{stem}_thumb.{ext}"),
            None => format!("{stem}_thumb"),
        };
        Ok(format!("{}/{}", self.thumbnail_folder, name))
    }

    pub async fn generate_thumbnail(&self, origin: &str) -> Result<String, AssetError> {
        let link = self.thumbnail_link(origin)?;
        let src = self.resolve(origin);
        let dst = self.resolve(&link);
        let src_for_err = src.clone();
        tokio::task::spawn_blocking(move || thumbnail::render(&src, &dst))
            .await
            .map_err(|e| AssetError::Thumbnail {
                path: src_for_err,
                reason: e.to_string(),
            })??;
        Ok(link)
    }

    /// Deletes the file behind a previously returned link or URL. Returns
    /// whether a file was actually removed.
    pub async fn clear_by_url(&self, url: &str) -> Result<bool, AssetError> {
        let path = match url::Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => url.to_string(),
        };
        let target = self.resolve(&path);
        if !tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return Ok(false);
        }
        tokio::fs::remove_file(&target)
            .await
            .map_err(|e| AssetError::io(&target, e))?;
        Ok(true)
    }

    /// Best-effort removal of a meal's files in both the flat layout and the
    /// `<origin_folder>/<id>/` layout. Never fails; the report is for logging.
    pub async fn remove_local(&self, resource_id: i64, links: &AssetLinks) -> RemovalReport {
        let mut report = RemovalReport::default();
        for (slot, link) in [(AssetSlot::Origin, &links.origin), (AssetSlot::Thumb, &links.thumb)] {
            let direct = remove_file(&self.resolve(link)).await;
            let scoped = match Path::new(link).file_name() {
                Some(name) => {
                    let path = self
                        .root
                        .join(&self.origin_folder)
                        .join(resource_id.to_string())
                        .join(name);
                    remove_file(&path).await
                }
                None => RemovalOutcome::NotFound,
            };
            report.slots.push(SlotRemoval { slot, direct, scoped });
        }
        for reason in report.failures() {
            warn!(resource_id, %reason, "local asset removal failed");
        }
        report
    }
}

async fn remove_file(path: &Path) -> RemovalOutcome {
    match tokio::fs::remove_file(path).await {
        Ok(()) => RemovalOutcome::Removed,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => RemovalOutcome::NotFound,
        Err(e) => RemovalOutcome::Failed(format!("{}: {e}", path.display())),
    }
}
