use std::path::PathBuf;

use serde::Deserialize;

use crate::meals::repo_types::MealType;

/// Where meal images end up once they are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetBackend {
    Local,
    S3,
}

impl AssetBackend {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "s3" | "minio" => Ok(Self::S3),
            other => anyhow::bail!("unknown ASSET_BACKEND: {other}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
    pub root: PathBuf,
    pub origin_folder: String,
    pub thumbnail_folder: String,
    pub remote_folder: String,
    pub backend: AssetBackend,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            origin_folder: "meals-images".into(),
            thumbnail_folder: "meals-images".into(),
            remote_folder: "meals-images".into(),
            backend: AssetBackend::Local,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub public_url: String,
}

/// Display flags for a single meal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TypeVisibility {
    pub default_selection: bool,
    pub directions: bool,
    pub description: bool,
}

/// Per-type flags, resolved once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct MealTypeConfig {
    pub daily: TypeVisibility,
    pub restaurant: TypeVisibility,
}

impl Default for MealTypeConfig {
    fn default() -> Self {
        Self {
            daily: TypeVisibility {
                default_selection: true,
                directions: true,
                description: true,
            },
            restaurant: TypeVisibility {
                default_selection: false,
                directions: false,
                description: true,
            },
        }
    }
}

impl MealTypeConfig {
    pub fn for_type(&self, meal_type: MealType) -> &TypeVisibility {
        match meal_type {
            MealType::Daily => &self.daily,
            MealType::Restaurant => &self.restaurant,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub public_host: String,
    pub recipe_prefix: String,
    pub assets: AssetConfig,
    pub storage: Option<StorageConfig>,
    pub meal_types: MealTypeConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let defaults = AssetConfig::default();
        let assets = AssetConfig {
            root: std::env::var("ASSET_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.root),
            origin_folder: std::env::var("ASSET_ORIGIN_FOLDER")
                .unwrap_or(defaults.origin_folder),
            thumbnail_folder: std::env::var("ASSET_THUMBNAIL_FOLDER")
                .unwrap_or(defaults.thumbnail_folder),
            remote_folder: std::env::var("ASSET_REMOTE_FOLDER")
                .unwrap_or(defaults.remote_folder),
            backend: match std::env::var("ASSET_BACKEND") {
                Ok(raw) => AssetBackend::parse(&raw)?,
                Err(_) => defaults.backend,
            },
        };

        let storage = match assets.backend {
            AssetBackend::Local => None,
            AssetBackend::S3 => {
                let endpoint = std::env::var("MINIO_ENDPOINT")?;
                Some(StorageConfig {
                    public_url: std::env::var("MINIO_PUBLIC_URL")
                        .unwrap_or_else(|_| endpoint.clone()),
                    endpoint,
                    bucket: std::env::var("MINIO_BUCKET")?,
                    access_key: std::env::var("MINIO_ACCESS_KEY")?,
                    secret_key: std::env::var("MINIO_SECRET_KEY")?,
                    region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
                })
            }
        };

        Ok(Self {
            database_url,
            public_host: std::env::var("PUBLIC_HOST")
                .unwrap_or_else(|_| "http://localhost:8080".into()),
            recipe_prefix: std::env::var("RECIPE_URL_PREFIX").unwrap_or_else(|_| "api/meal/".into()),
            assets,
            storage,
            meal_types: MealTypeConfig::default(),
        })
    }

    /// Absolute link to the public recipe page of a persisted meal.
    pub fn recipe_url(&self, meal_id: i64) -> String {
        format!(
            "{}/{}show-recipe?meal_id={}",
            self.public_host.trim_end_matches('/'),
            self.recipe_prefix.trim_start_matches('/'),
            meal_id
        )
    }
}
