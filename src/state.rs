use crate::config::AppConfig;
use crate::db::{PgRepo, Repository};
use crate::images::AssetStore;
use crate::storage::{Storage, StorageClient};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub config: Arc<AppConfig>,
    pub assets: Arc<AssetStore>,
    /// Present only when assets are published to object storage.
    pub storage: Option<Arc<dyn StorageClient>>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let repo = Arc::new(PgRepo::connect(&config.database_url).await?) as Arc<dyn Repository>;

        let storage = match &config.storage {
            Some(cfg) => Some(Arc::new(Storage::new(cfg).await?) as Arc<dyn StorageClient>),
            None => None,
        };
        let state = Self::from_parts(repo, config, storage);
        tracing::info!(
            backend = ?state.config.assets.backend,
            root = %state.assets.root().display(),
            "asset store ready"
        );
        Ok(state)
    }

    pub fn from_parts(
        repo: Arc<dyn Repository>,
        config: Arc<AppConfig>,
        storage: Option<Arc<dyn StorageClient>>,
    ) -> Self {
        let assets = Arc::new(AssetStore::new(&config.assets));
        Self {
            repo,
            config,
            assets,
            storage,
        }
    }
}
