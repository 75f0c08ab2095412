//! In-memory stand-ins for Postgres and object storage, shared by unit tests.

use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use image::{ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;

use crate::config::{AppConfig, AssetBackend, AssetConfig, MealTypeConfig, StorageConfig};
use crate::db::{RepoError, RepoResult, Repository};
use crate::images::{AssetStore, Upload};
use crate::ingredients::repo::IngredientRepo;
use crate::ingredients::repo_types::{
    AlternativeLine, AlternativeMealIngredient, IngredientLine, MealIngredient,
};
use crate::meals::repo::MealRepo;
use crate::meals::repo_types::{Meal, MealFields};
use crate::menu::repo::MenuRepo;
use crate::menu::{MenuSlot, PhaseMenu};
use crate::state::AppState;
use crate::storage::StorageClient;

struct Ingredient {
    ingredient_id: i64,
    title: String,
}

#[derive(Default)]
struct Tables {
    meals: Vec<Meal>,
    next_meal_id: i64,
    ingredients: Vec<Ingredient>,
    meal_ingredients: Vec<MealIngredient>,
    alternatives: Vec<AlternativeMealIngredient>,
    placements: Vec<PhaseMenu>,
    selections: Vec<(i64, MenuSlot, i64)>,
    fail_ingredient_batches: bool,
    fail_mark_default: HashSet<i64>,
    fail_selection_deletes: bool,
}

#[derive(Default)]
pub struct MemoryRepo {
    tables: Mutex<Tables>,
}

impl MemoryRepo {
    fn with<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut tables = self.tables.lock().unwrap();
        f(&mut tables)
    }

    pub fn seed_ingredient(&self, title: &str) -> i64 {
        self.with(|t| insert_ingredient(t, title))
    }

    pub fn ingredient_count(&self) -> usize {
        self.with(|t| t.ingredients.len())
    }

    pub fn fail_ingredient_batches(&self, fail: bool) {
        self.with(|t| t.fail_ingredient_batches = fail);
    }

    pub fn meal(&self, meal_id: i64) -> Option<Meal> {
        self.with(|t| t.meals.iter().find(|m| m.meal_id == meal_id).cloned())
    }

    pub fn meal_ingredients(&self, meal_id: i64) -> Vec<MealIngredient> {
        self.with(|t| {
            t.meal_ingredients
                .iter()
                .filter(|r| r.meal_id == meal_id)
                .cloned()
                .collect()
        })
    }

    pub fn alternatives(&self, meal_id: i64) -> Vec<AlternativeMealIngredient> {
        self.with(|t| {
            t.alternatives
                .iter()
                .filter(|a| a.meal_id == meal_id)
                .cloned()
                .collect()
        })
    }

    pub fn meal_count(&self) -> usize {
        self.with(|t| t.meals.len())
    }

    pub fn place(&self, slot: MenuSlot, meal_id: i64, is_default: bool) {
        self.with(|t| {
            t.placements.push(PhaseMenu {
                phase_id: slot.phase_id,
                day_of_phase: slot.day_of_phase,
                category_id: slot.category_id,
                meal_id,
                group: 1,
                is_default,
            })
        });
    }

    pub fn pin(&self, user_id: i64, slot: MenuSlot, meal_id: i64) {
        self.with(|t| t.selections.push((user_id, slot, meal_id)));
    }

    pub fn placement(&self, slot: MenuSlot, meal_id: i64) -> Option<PhaseMenu> {
        self.with(|t| {
            t.placements
                .iter()
                .find(|p| p.slot() == slot && p.meal_id == meal_id)
                .cloned()
        })
    }

    pub fn pinned_meals(&self, slot: MenuSlot) -> Vec<i64> {
        self.with(|t| {
            t.selections
                .iter()
                .filter(|(_, s, _)| *s == slot)
                .map(|(_, _, meal_id)| *meal_id)
                .collect()
        })
    }

    pub fn defaults_in(&self, slot: MenuSlot) -> Vec<i64> {
        self.with(|t| {
            t.placements
                .iter()
                .filter(|p| p.slot() == slot && p.is_default)
                .map(|p| p.meal_id)
                .collect()
        })
    }

    pub fn fail_mark_default_for(&self, meal_id: i64) {
        self.with(|t| t.fail_mark_default.insert(meal_id));
    }

    pub fn fail_selection_deletes(&self, fail: bool) {
        self.with(|t| t.fail_selection_deletes = fail);
    }
}

fn insert_ingredient(t: &mut Tables, title: &str) -> i64 {
    let ingredient_id = t.ingredients.len() as i64 + 1;
    t.ingredients.push(Ingredient {
        ingredient_id,
        title: title.to_string(),
    });
    ingredient_id
}

fn ingredient_title(t: &Tables, ingredient_id: i64) -> String {
    t.ingredients
        .iter()
        .find(|i| i.ingredient_id == ingredient_id)
        .map(|i| i.title.clone())
        .unwrap_or_default()
}

#[async_trait]
impl MealRepo for MemoryRepo {
    async fn find_meal(&self, meal_id: i64) -> RepoResult<Option<Meal>> {
        Ok(self.meal(meal_id))
    }

    async fn title_taken(&self, title: &str, except: Option<i64>) -> RepoResult<bool> {
        Ok(self.with(|t| {
            t.meals
                .iter()
                .any(|m| m.title == title && Some(m.meal_id) != except)
        }))
    }

    async fn insert_meal(&self, fields: &MealFields) -> RepoResult<Meal> {
        self.with(|t| {
            if t.meals.iter().any(|m| m.title == fields.title) {
                return Err(RepoError::Conflict("title".into()));
            }
            t.next_meal_id += 1;
            let meal = Meal {
                meal_id: t.next_meal_id,
                title: fields.title.clone(),
                recipe_caption: fields.recipe_caption.clone(),
                description: fields.description.clone(),
                recipe: fields.recipe.clone(),
                recipe_url: None,
                meal_type: fields.meal_type,
                image: None,
                thumbnail: None,
            };
            t.meals.push(meal.clone());
            Ok(meal)
        })
    }

    async fn update_meal(&self, meal: &Meal) -> RepoResult<()> {
        self.with(|t| {
            if let Some(row) = t.meals.iter_mut().find(|m| m.meal_id == meal.meal_id) {
                *row = meal.clone();
            }
        });
        Ok(())
    }

    async fn delete_meal(&self, meal_id: i64) -> RepoResult<u64> {
        Ok(self.with(|t| {
            let before = t.meals.len();
            t.meals.retain(|m| m.meal_id != meal_id);
            (before - t.meals.len()) as u64
        }))
    }
}

#[async_trait]
impl IngredientRepo for MemoryRepo {
    async fn existing_titles(&self, titles: &[String]) -> RepoResult<Vec<String>> {
        Ok(self.with(|t| {
            let mut found: Vec<String> = t
                .ingredients
                .iter()
                .filter(|i| titles.contains(&i.title))
                .map(|i| i.title.clone())
                .collect();
            found.sort();
            found
        }))
    }

    async fn find_or_create_ingredient(&self, title: &str) -> RepoResult<i64> {
        Ok(self.with(|t| {
            let found = t
                .ingredients
                .iter()
                .find(|i| i.title == title)
                .map(|i| i.ingredient_id);
            found.unwrap_or_else(|| insert_ingredient(t, title))
        }))
    }

    async fn replace_meal_ingredients(&self, meal_id: i64, rows: &[MealIngredient]) -> RepoResult<()> {
        self.with(|t| {
            if t.fail_ingredient_batches {
                return Err(RepoError::Other(anyhow!("ingredient batch rejected")));
            }
            t.meal_ingredients.retain(|r| r.meal_id != meal_id);
            t.meal_ingredients.extend_from_slice(rows);
            Ok(())
        })
    }

    async fn delete_meal_ingredients(&self, meal_id: i64) -> RepoResult<u64> {
        Ok(self.with(|t| {
            let before = t.meal_ingredients.len();
            t.meal_ingredients.retain(|r| r.meal_id != meal_id);
            (before - t.meal_ingredients.len()) as u64
        }))
    }

    async fn delete_meal_ingredient(&self, meal_id: i64, ingredient_id: i64) -> RepoResult<u64> {
        Ok(self.with(|t| {
            let before = t.meal_ingredients.len();
            t.meal_ingredients
                .retain(|r| !(r.meal_id == meal_id && r.ingredient_id == ingredient_id));
            (before - t.meal_ingredients.len()) as u64
        }))
    }

    async fn insert_alternatives(&self, rows: &[AlternativeMealIngredient]) -> RepoResult<()> {
        self.with(|t| t.alternatives.extend_from_slice(rows));
        Ok(())
    }

    async fn delete_alternatives(&self, meal_id: i64) -> RepoResult<u64> {
        Ok(self.with(|t| {
            let before = t.alternatives.len();
            t.alternatives.retain(|a| a.meal_id != meal_id);
            (before - t.alternatives.len()) as u64
        }))
    }

    async fn delete_alternatives_for_default(&self, meal_id: i64, ingredient_id: i64) -> RepoResult<u64> {
        Ok(self.with(|t| {
            let before = t.alternatives.len();
            t.alternatives
                .retain(|a| !(a.meal_id == meal_id && a.default_ing_id == ingredient_id));
            (before - t.alternatives.len()) as u64
        }))
    }

    async fn ingredient_lines(&self, meal_id: i64) -> RepoResult<Vec<IngredientLine>> {
        Ok(self.with(|t| {
            let t: &Tables = t;
            t.meal_ingredients
                .iter()
                .filter(|r| r.meal_id == meal_id)
                .map(|r| IngredientLine {
                    ingredient_id: r.ingredient_id,
                    title: ingredient_title(t, r.ingredient_id),
                    portion: r.portion.clone(),
                })
                .collect()
        }))
    }

    async fn alternative_lines(&self, meal_id: i64) -> RepoResult<Vec<AlternativeLine>> {
        Ok(self.with(|t| {
            let t: &Tables = t;
            t.alternatives
                .iter()
                .filter(|a| a.meal_id == meal_id)
                .map(|a| AlternativeLine {
                    default_ing_id: a.default_ing_id,
                    default_title: ingredient_title(t, a.default_ing_id),
                    alternative_ingredients: a.alternative_ingredients.clone(),
                })
                .collect()
        }))
    }
}

#[async_trait]
impl MenuRepo for MemoryRepo {
    async fn slots_for_meal(&self, meal_id: i64) -> RepoResult<Vec<MenuSlot>> {
        Ok(self.with(|t| {
            let mut slots: Vec<MenuSlot> = t
                .placements
                .iter()
                .filter(|p| p.meal_id == meal_id)
                .map(PhaseMenu::slot)
                .collect();
            slots.sort();
            slots.dedup();
            slots
        }))
    }

    async fn replacement_in_slot(&self, slot: MenuSlot, excluding_meal: i64) -> RepoResult<Option<PhaseMenu>> {
        Ok(self.with(|t| {
            t.placements
                .iter()
                .filter(|p| p.slot() == slot && p.meal_id != excluding_meal)
                .min_by_key(|p| (!p.is_default, p.meal_id))
                .cloned()
        }))
    }

    async fn mark_default(&self, slot: MenuSlot, meal_id: i64) -> RepoResult<u64> {
        self.with(|t| {
            if t.fail_mark_default.contains(&meal_id) {
                return Err(RepoError::Other(anyhow!("phase_menu row for meal {meal_id} is locked")));
            }
            let mut n = 0;
            for p in t.placements.iter_mut() {
                if p.slot() == slot && p.meal_id == meal_id {
                    p.is_default = true;
                    n += 1;
                }
            }
            Ok(n)
        })
    }

    async fn delete_user_selections(&self, slot: MenuSlot, meal_id: i64) -> RepoResult<u64> {
        self.with(|t| {
            if t.fail_selection_deletes {
                return Err(RepoError::Other(anyhow!("user_menu is read-only")));
            }
            let before = t.selections.len();
            t.selections
                .retain(|(_, s, m)| !(*s == slot && *m == meal_id));
            Ok((before - t.selections.len()) as u64)
        })
    }

    async fn delete_placements(&self, meal_id: i64) -> RepoResult<u64> {
        Ok(self.with(|t| {
            let before = t.placements.len();
            t.placements.retain(|p| p.meal_id != meal_id);
            (before - t.placements.len()) as u64
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Put(String),
    Delete(Vec<String>),
}

/// Records calls instead of talking to S3; URLs live under `https://fake.local/`.
#[derive(Default)]
pub struct FakeStorage {
    ops: Mutex<Vec<StorageOp>>,
    fail_deletes: bool,
    fail_puts: AtomicBool,
}

impl FakeStorage {
    pub fn failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Default::default()
        }
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn ops(&self) -> Vec<StorageOp> {
        self.ops.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn put_object(&self, key: &str, _body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            anyhow::bail!("bucket unavailable");
        }
        self.ops.lock().unwrap().push(StorageOp::Put(key.to_string()));
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> anyhow::Result<()> {
        if self.fail_deletes {
            anyhow::bail!("delete refused");
        }
        self.ops.lock().unwrap().push(StorageOp::Delete(keys.to_vec()));
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!("https://fake.local/{key}")
    }
}

pub fn asset_store() -> (TempDir, AssetStore) {
    let dir = tempfile::tempdir().unwrap();
    let cfg = AssetConfig {
        root: dir.path().to_path_buf(),
        ..AssetConfig::default()
    };
    (dir, AssetStore::new(&cfg))
}

/// A gradient image encoded in `format`.
pub fn sample_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn jpg_upload(name: &str) -> Upload {
    Upload {
        file_name: name.to_string(),
        body: Bytes::from(sample_image(640, 480, ImageFormat::Jpeg)),
    }
}

pub struct Harness {
    pub state: AppState,
    pub repo: Arc<MemoryRepo>,
    storage: Option<Arc<FakeStorage>>,
    dir: TempDir,
}

impl Harness {
    pub fn storage(&self) -> &FakeStorage {
        self.storage.as_deref().expect("remote harness")
    }

    /// Paths of every file under the asset root, relative to it.
    pub fn local_files(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_files(self.dir.path(), self.dir.path(), &mut out);
        out.sort();
        out
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out);
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_string_lossy().into_owned());
        }
    }
}

fn build_harness(remote: bool) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let assets = AssetConfig {
        root: dir.path().to_path_buf(),
        backend: if remote { AssetBackend::S3 } else { AssetBackend::Local },
        ..AssetConfig::default()
    };
    let storage_cfg = remote.then(|| StorageConfig {
        endpoint: "http://fake.local".into(),
        bucket: "meals".into(),
        access_key: "test".into(),
        secret_key: "test".into(),
        region: "us-east-1".into(),
        public_url: "https://fake.local".into(),
    });
    let config = Arc::new(AppConfig {
        database_url: "postgres://unused/test".into(),
        public_host: "http://test.local".into(),
        recipe_prefix: "api/meal/".into(),
        assets,
        storage: storage_cfg,
        meal_types: MealTypeConfig::default(),
    });

    let repo = Arc::new(MemoryRepo::default());
    let storage = remote.then(|| Arc::new(FakeStorage::default()));
    let state = AppState::from_parts(
        repo.clone() as Arc<dyn Repository>,
        config,
        storage.clone().map(|s| s as Arc<dyn StorageClient>),
    );
    Harness {
        state,
        repo,
        storage,
        dir,
    }
}

pub fn harness() -> Harness {
    build_harness(false)
}

pub fn remote_harness() -> Harness {
    build_harness(true)
}
