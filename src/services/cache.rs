//! Dataset cache for pipeline results.
//!
//! The four tables of an import are stored under fixed names so a restart (or
//! another page of the dashboard) does not re-run the pipeline:
//!
//! | Name | Table |
//! |------|-------|
//! | `badDf` | bad-rows report |
//! | `mainDf` | cleaned observations |
//! | `proxDf` | proximity edges |
//! | `tagsDf` | tag metadata with row counts |
//!
//! Two backends implement [`DatasetCache`]: an in-process `moka` cache and a
//! directory of JSON files. Neither expires entries; staleness is decided by
//! calling [`DatasetStore::clear`].
//!
//! [`DatasetStore`] owns the process-wide copy of the tables. The first
//! caller of [`DatasetStore::load`] computes (or reads from the cache); the
//! others wait for it and reuse the result.

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::wildfi::importer;
use crate::wildfi::{BadRow, Datasets, Observation, ProximityEdge, TagMetadata};

/// Names under which the pipeline tables are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetName {
    BadRows,
    Main,
    Proximity,
    Tags,
}

impl DatasetName {
    pub const ALL: [Self; 4] = [Self::BadRows, Self::Main, Self::Proximity, Self::Tags];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadRows => "badDf",
            Self::Main => "mainDf",
            Self::Proximity => "proxDf",
            Self::Tags => "tagsDf",
        }
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cached table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "dataset", content = "rows")]
pub enum Dataset {
    #[serde(rename = "badDf")]
    BadRows(Arc<Vec<BadRow>>),
    #[serde(rename = "mainDf")]
    Main(Arc<Vec<Observation>>),
    #[serde(rename = "proxDf")]
    Proximity(Arc<Vec<ProximityEdge>>),
    #[serde(rename = "tagsDf")]
    Tags(Arc<Vec<TagMetadata>>),
}

impl Dataset {
    #[must_use]
    pub fn name(&self) -> DatasetName {
        match self {
            Self::BadRows(_) => DatasetName::BadRows,
            Self::Main(_) => DatasetName::Main,
            Self::Proximity(_) => DatasetName::Proximity,
            Self::Tags(_) => DatasetName::Tags,
        }
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        match self {
            Self::BadRows(r) => r.len(),
            Self::Main(r) => r.len(),
            Self::Proximity(r) => r.len(),
            Self::Tags(r) => r.len(),
        }
    }

    /// Split a full result into its four tables.
    #[must_use]
    pub fn split(datasets: &Datasets) -> [Self; 4] {
        [
            Self::BadRows(datasets.bad_rows.clone()),
            Self::Main(datasets.main.clone()),
            Self::Proximity(datasets.edges.clone()),
            Self::Tags(datasets.tags.clone()),
        ]
    }

    /// Reassemble the four tables. Fails if one is missing.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Cache` when a table is missing.
    pub fn assemble(tables: impl IntoIterator<Item = Self>) -> AppResult<Datasets> {
        let (mut bad_rows, mut main, mut edges, mut tags) = (None, None, None, None);
        for table in tables {
            match table {
                Self::BadRows(r) => bad_rows = Some(r),
                Self::Main(r) => main = Some(r),
                Self::Proximity(r) => edges = Some(r),
                Self::Tags(r) => tags = Some(r),
            }
        }

        let missing = |name: DatasetName| AppError::Cache(format!("{name} missing from cache"));
        Ok(Datasets {
            bad_rows: bad_rows.ok_or_else(|| missing(DatasetName::BadRows))?,
            main: main.ok_or_else(|| missing(DatasetName::Main))?,
            edges: edges.ok_or_else(|| missing(DatasetName::Proximity))?,
            tags: tags.ok_or_else(|| missing(DatasetName::Tags))?,
        })
    }
}

/// Named table storage used by [`DatasetStore`].
pub trait DatasetCache: Send + Sync {
    fn is_cached(&self, name: DatasetName) -> impl Future<Output = bool> + Send;

    /// Read the table stored under `name`.
    fn read(&self, name: DatasetName) -> impl Future<Output = AppResult<Dataset>> + Send;

    /// Store a table under its own name, replacing any previous copy.
    fn write(&self, dataset: Dataset) -> impl Future<Output = AppResult<()>> + Send;

    /// Drop every cached table.
    fn clear(&self) -> impl Future<Output = AppResult<()>> + Send;
}

/// In-process cache, weighted by row count.
#[derive(Clone)]
pub struct MemoryDatasetCache {
    cache: Cache<DatasetName, Dataset>,
}

impl MemoryDatasetCache {
    #[must_use]
    pub fn new(max_rows: u64) -> Self {
        // Weighted by rows, not entry count
        let cache = Cache::builder()
            .weigher(|_name: &DatasetName, value: &Dataset| -> u32 {
                value.rows().try_into().unwrap_or(u32::MAX)
            })
            .max_capacity(max_rows)
            .build();
        Self { cache }
    }
}

impl DatasetCache for MemoryDatasetCache {
    async fn is_cached(&self, name: DatasetName) -> bool {
        self.cache.contains_key(&name)
    }

    async fn read(&self, name: DatasetName) -> AppResult<Dataset> {
        self.cache
            .get(&name)
            .await
            .ok_or_else(|| AppError::Cache(format!("{name} is not cached")))
    }

    async fn write(&self, dataset: Dataset) -> AppResult<()> {
        let name = dataset.name();
        let rows = dataset.rows();
        self.cache.insert(name, dataset).await;
        tracing::debug!(dataset = %name, rows, "cache_stored");
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        tracing::debug!("cache_cleared");
        Ok(())
    }
}

/// One JSON file per table in a cache directory.
#[derive(Debug, Clone)]
pub struct DiskDatasetCache {
    dir: PathBuf,
}

impl DiskDatasetCache {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: DatasetName) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl DatasetCache for DiskDatasetCache {
    async fn is_cached(&self, name: DatasetName) -> bool {
        tokio::fs::try_exists(self.path(name)).await.unwrap_or(false)
    }

    async fn read(&self, name: DatasetName) -> AppResult<Dataset> {
        let path = self.path(name);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| AppError::io(&path, e))?;
        let dataset: Dataset = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Cache(format!("{}: {e}", path.display())))?;

        if dataset.name() != name {
            return Err(AppError::Cache(format!(
                "{} holds {} instead of {name}",
                path.display(),
                dataset.name()
            )));
        }
        Ok(dataset)
    }

    async fn write(&self, dataset: Dataset) -> AppResult<()> {
        let name = dataset.name();
        let path = self.path(name);
        let tmp = self.dir.join(format!("{name}.json.tmp"));

        let json = serde_json::to_vec(&dataset).map_err(|e| AppError::Cache(e.to_string()))?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::io(&self.dir, e))?;
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| AppError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| AppError::io(&path, e))?;

        tracing::debug!(
            dataset = %name,
            path = %path.display(),
            size_bytes = json.len(),
            "cache_stored"
        );
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        for name in DatasetName::ALL {
            let path = self.path(name);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(AppError::io(&path, e)),
            }
        }
        tracing::debug!(dir = %self.dir.display(), "cache_cleared");
        Ok(())
    }
}

/// Cache backend selected from configuration.
#[derive(Clone)]
pub enum CacheBackend {
    Memory(MemoryDatasetCache),
    Disk(DiskDatasetCache),
}

impl CacheBackend {
    /// Disk cache when `cache_dir` is set, memory cache otherwise.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        match &config.cache_dir {
            Some(dir) => Self::Disk(DiskDatasetCache::new(dir)),
            None => Self::Memory(MemoryDatasetCache::new(config.cache_max_rows)),
        }
    }
}

impl DatasetCache for CacheBackend {
    async fn is_cached(&self, name: DatasetName) -> bool {
        match self {
            Self::Memory(c) => c.is_cached(name).await,
            Self::Disk(c) => c.is_cached(name).await,
        }
    }

    async fn read(&self, name: DatasetName) -> AppResult<Dataset> {
        match self {
            Self::Memory(c) => c.read(name).await,
            Self::Disk(c) => c.read(name).await,
        }
    }

    async fn write(&self, dataset: Dataset) -> AppResult<()> {
        match self {
            Self::Memory(c) => c.write(dataset).await,
            Self::Disk(c) => c.write(dataset).await,
        }
    }

    async fn clear(&self) -> AppResult<()> {
        match self {
            Self::Memory(c) => c.clear().await,
            Self::Disk(c) => c.clear().await,
        }
    }
}

/// Holds the pipeline result for the lifetime of the process.
pub struct DatasetStore<C = CacheBackend> {
    config: Arc<Config>,
    cache: C,
    loaded: RwLock<Option<Datasets>>,
    load_lock: Mutex<()>,
}

impl<C: DatasetCache> DatasetStore<C> {
    pub fn new(config: Arc<Config>, cache: C) -> Self {
        Self {
            config,
            cache,
            loaded: RwLock::new(None),
            load_lock: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Whether the tables are loaded in this process.
    pub async fn is_ready(&self) -> bool {
        self.loaded.read().await.is_some()
    }

    /// The loaded tables, if any.
    pub async fn current(&self) -> Option<Datasets> {
        self.loaded.read().await.clone()
    }

    /// Load the tables, running the import from the configured inputs on a miss.
    ///
    /// # Errors
    ///
    /// Propagates import failures (unreadable inputs, missing columns).
    pub async fn load(&self) -> AppResult<Datasets> {
        let config = self.config.clone();
        self.load_with(move || importer::run_import(&config)).await
    }

    /// Load the tables, computing them with `compute` on a miss.
    ///
    /// Order of lookup: process memory, then the dataset cache (only if all
    /// four tables are present), then `compute`. Concurrent callers wait for
    /// the first one. An unreadable cache falls back to `compute`; a failed
    /// cache write is logged and the cache cleared so the next process
    /// recomputes.
    ///
    /// # Errors
    ///
    /// Propagates the error of `compute`.
    pub async fn load_with<F>(&self, compute: F) -> AppResult<Datasets>
    where
        F: FnOnce() -> AppResult<Datasets> + Send + 'static,
    {
        if let Some(datasets) = self.current().await {
            return Ok(datasets);
        }

        let _guard = self.load_lock.lock().await;
        if let Some(datasets) = self.current().await {
            return Ok(datasets);
        }

        let datasets = match self.read_cached().await {
            Ok(Some(datasets)) => datasets,
            Ok(None) => self.compute_and_store(compute).await?,
            Err(e) => {
                tracing::warn!(error = %e, "Dataset cache unreadable, recomputing");
                self.compute_and_store(compute).await?
            }
        };

        *self.loaded.write().await = Some(datasets.clone());
        Ok(datasets)
    }

    /// Drop the in-process tables and every cached table.
    ///
    /// # Errors
    ///
    /// Propagates cache backend failures.
    pub async fn clear(&self) -> AppResult<()> {
        let _guard = self.load_lock.lock().await;
        *self.loaded.write().await = None;
        self.cache.clear().await?;
        tracing::info!("Dataset cache cleared");
        Ok(())
    }

    async fn is_complete(&self) -> bool {
        for name in DatasetName::ALL {
            if !self.cache.is_cached(name).await {
                return false;
            }
        }
        true
    }

    async fn read_cached(&self) -> AppResult<Option<Datasets>> {
        if !self.is_complete().await {
            tracing::debug!("Dataset cache incomplete");
            return Ok(None);
        }

        let started = std::time::Instant::now();
        let mut tables = Vec::with_capacity(DatasetName::ALL.len());
        for name in DatasetName::ALL {
            tables.push(self.cache.read(name).await?);
        }
        let datasets = Dataset::assemble(tables)?;

        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Loaded datasets from cache"
        );
        Ok(Some(datasets))
    }

    async fn compute_and_store<F>(&self, compute: F) -> AppResult<Datasets>
    where
        F: FnOnce() -> AppResult<Datasets> + Send + 'static,
    {
        let datasets = tokio::task::spawn_blocking(compute)
            .await
            .map_err(|e| AppError::Internal(format!("import task failed: {e}")))??;

        for table in Dataset::split(&datasets) {
            let name = table.name();
            if let Err(e) = self.cache.write(table).await {
                tracing::error!(dataset = %name, error = %e, "Failed to cache dataset");
                if let Err(e) = self.cache.clear().await {
                    tracing::error!(error = %e, "Failed to clear dataset cache");
                }
                break;
            }
        }

        Ok(datasets)
    }
}
