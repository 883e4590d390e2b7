use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::arena::Arena;
use crate::config::HistogramConfig;
use crate::dispatch::EquiHeightHistogram;
use crate::histogram::ColumnIdentity;
use crate::HistogramError;

const CATALOG_LOG_TARGET: &str = "stats::catalog";

#[derive(Debug, Error)]
pub enum StatisticsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("histogram error: {0}")]
    Histogram(#[from] HistogramError),
}

/// A histogram in its persisted JSON form, keyed by the column it describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredHistogram {
    pub identity: ColumnIdentity,
    pub document: Value,
}

impl StoredHistogram {
    pub fn from_histogram(histogram: &EquiHeightHistogram<'_>) -> Result<Self, StatisticsError> {
        Ok(Self {
            identity: histogram.identity().clone(),
            document: histogram.to_json()?,
        })
    }

    /// Rebuilds the histogram inside `arena`.
    pub fn load<'a>(
        &self,
        arena: &'a Arena,
        config: &HistogramConfig,
    ) -> Result<EquiHeightHistogram<'a>, StatisticsError> {
        Ok(EquiHeightHistogram::from_json_with_config(
            arena,
            self.identity.clone(),
            &self.document,
            config,
        )?)
    }
}

#[async_trait]
pub trait HistogramCatalog: Send + Sync {
    async fn get_histogram(
        &self,
        identity: &ColumnIdentity,
    ) -> Result<Option<StoredHistogram>, StatisticsError>;

    async fn upsert_histogram(&self, histogram: StoredHistogram) -> Result<(), StatisticsError>;

    /// Returns whether a histogram was stored for the column.
    async fn remove_histogram(&self, identity: &ColumnIdentity) -> Result<bool, StatisticsError>;

    /// Drops every histogram of `database.table`, returning how many went away.
    async fn remove_stats_for_table(
        &self,
        database: &str,
        table: &str,
    ) -> Result<usize, StatisticsError>;

    async fn list_histograms(&self) -> Result<Vec<ColumnIdentity>, StatisticsError>;
}

/// Stored histograms sorted by column identity, at most one per column.
#[derive(Debug, Default, Serialize, Deserialize, Clone)]
struct CatalogState {
    histograms: Vec<StoredHistogram>,
}

impl CatalogState {
    fn position(&self, identity: &ColumnIdentity) -> Result<usize, usize> {
        self.histograms
            .binary_search_by(|stored| stored.identity.cmp(identity))
    }

    fn get(&self, identity: &ColumnIdentity) -> Option<StoredHistogram> {
        self.position(identity)
            .ok()
            .map(|idx| self.histograms[idx].clone())
    }

    fn upsert(&mut self, histogram: StoredHistogram) {
        log::debug!(
            target: CATALOG_LOG_TARGET,
            "histogram_upserted column={}",
            histogram.identity
        );
        match self.position(&histogram.identity) {
            Ok(idx) => self.histograms[idx] = histogram,
            Err(idx) => self.histograms.insert(idx, histogram),
        }
    }

    fn remove(&mut self, identity: &ColumnIdentity) -> bool {
        match self.position(identity) {
            Ok(idx) => {
                self.histograms.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    fn remove_table(&mut self, database: &str, table: &str) -> usize {
        let before = self.histograms.len();
        self.histograms.retain(|stored| {
            stored.identity.database != database || stored.identity.table != table
        });
        let removed = before - self.histograms.len();
        log::debug!(
            target: CATALOG_LOG_TARGET,
            "table_histograms_removed database={} table={} removed={}",
            database,
            table,
            removed
        );
        removed
    }

    fn identities(&self) -> Vec<ColumnIdentity> {
        self.histograms
            .iter()
            .map(|stored| stored.identity.clone())
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryHistogramCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryHistogramCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistogramCatalog for InMemoryHistogramCatalog {
    async fn get_histogram(
        &self,
        identity: &ColumnIdentity,
    ) -> Result<Option<StoredHistogram>, StatisticsError> {
        Ok(self.state.read().get(identity))
    }

    async fn upsert_histogram(&self, histogram: StoredHistogram) -> Result<(), StatisticsError> {
        self.state.write().upsert(histogram);
        Ok(())
    }

    async fn remove_histogram(&self, identity: &ColumnIdentity) -> Result<bool, StatisticsError> {
        Ok(self.state.write().remove(identity))
    }

    async fn remove_stats_for_table(
        &self,
        database: &str,
        table: &str,
    ) -> Result<usize, StatisticsError> {
        Ok(self.state.write().remove_table(database, table))
    }

    async fn list_histograms(&self) -> Result<Vec<ColumnIdentity>, StatisticsError> {
        Ok(self.state.read().identities())
    }
}

/// Catalog persisted as one pretty-printed JSON file, rewritten on every change.
pub struct FileHistogramCatalog {
    path: PathBuf,
    state: RwLock<CatalogState>,
}

impl FileHistogramCatalog {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StatisticsError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut state = if path.exists() {
            let data = fs::read(&path)?;
            if data.is_empty() {
                CatalogState::default()
            } else {
                serde_json::from_slice::<CatalogState>(&data)?
            }
        } else {
            CatalogState::default()
        };
        state
            .histograms
            .sort_by(|a, b| a.identity.cmp(&b.identity));
        state
            .histograms
            .dedup_by(|later, earlier| later.identity == earlier.identity);
        log::debug!(
            target: CATALOG_LOG_TARGET,
            "catalog_opened path={:?} histograms={}",
            path,
            state.histograms.len()
        );
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `change` to a copy of the state and keeps it only once the copy
    /// is on disk.
    fn update<R>(
        &self,
        change: impl FnOnce(&mut CatalogState) -> R,
    ) -> Result<R, StatisticsError> {
        let mut guard = self.state.write();
        let mut next = guard.clone();
        let outcome = change(&mut next);
        self.persist(&next)?;
        *guard = next;
        Ok(outcome)
    }

    fn persist(&self, state: &CatalogState) -> Result<(), StatisticsError> {
        let json = serde_json::to_vec_pretty(state)?;
        fs::write(&self.path, &json)?;
        log::debug!(
            target: CATALOG_LOG_TARGET,
            "catalog_persisted path={:?} histograms={} size_bytes={}",
            self.path,
            state.histograms.len(),
            json.len()
        );
        Ok(())
    }
}

#[async_trait]
impl HistogramCatalog for FileHistogramCatalog {
    async fn get_histogram(
        &self,
        identity: &ColumnIdentity,
    ) -> Result<Option<StoredHistogram>, StatisticsError> {
        Ok(self.state.read().get(identity))
    }

    async fn upsert_histogram(&self, histogram: StoredHistogram) -> Result<(), StatisticsError> {
        self.update(|state| state.upsert(histogram))
    }

    async fn remove_histogram(&self, identity: &ColumnIdentity) -> Result<bool, StatisticsError> {
        self.update(|state| state.remove(identity))
    }

    async fn remove_stats_for_table(
        &self,
        database: &str,
        table: &str,
    ) -> Result<usize, StatisticsError> {
        self.update(|state| state.remove_table(database, table))
    }

    async fn list_histograms(&self) -> Result<Vec<ColumnIdentity>, StatisticsError> {
        Ok(self.state.read().identities())
    }
}
