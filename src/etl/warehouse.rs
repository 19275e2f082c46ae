use crate::error::{EtlError, Result};
use crate::models::TrackerEntry;
use crate::store::OfferStore;
use async_trait::async_trait;
use chrono::NaiveDate;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// Bulk-load target holding staging tables, warehouse tables and the
/// tracker log.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Open an exclusive transaction on `table`. Fails with
    /// [`EtlError::TrackerConflict`] when one is already open.
    async fn begin(&self, table: &str) -> Result<Box<dyn WarehouseTx>>;
}

/// Effects are only visible after [`WarehouseTx::commit`]; dropping the
/// transaction discards them.
#[async_trait]
pub trait WarehouseTx: Send {
    /// Tracker rows of the table, oldest first
    fn entries(&self) -> &[TrackerEntry];

    fn append_entry(&mut self, entry: TrackerEntry);

    /// Copy a snapshot file into the staging table
    async fn load_staging(&mut self, snapshot: &Path) -> Result<usize>;

    /// Move one day of staged rows into the warehouse table
    async fn merge_to_warehouse(&mut self, ds: NaiveDate) -> Result<usize>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TableState {
    entries: Vec<TrackerEntry>,
    staging: Vec<Vec<String>>,
    warehouse: Vec<Vec<String>>,
}

/// Warehouse kept in memory and, when given a directory, persisted there as
/// one JSON document per table.
pub struct LocalWarehouse {
    dir: Option<PathBuf>,
    tables: Mutex<HashMap<String, Arc<Mutex<Option<TableState>>>>>,
}

impl LocalWarehouse {
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            tables: Mutex::new(HashMap::new()),
        }
    }

    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir: Some(dir),
            tables: Mutex::new(HashMap::new()),
        })
    }

    async fn slot(&self, table: &str) -> Arc<Mutex<Option<TableState>>> {
        let mut tables = self.tables.lock().await;
        tables
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    async fn read<T>(&self, table: &str, f: impl FnOnce(&TableState) -> T) -> Result<T> {
        let tx = self.begin_local(table).await?;
        Ok(f(&tx.pending))
    }

    /// Committed tracker rows of a table
    pub async fn entries(&self, table: &str) -> Result<Vec<TrackerEntry>> {
        self.read(table, |state| state.entries.clone()).await
    }

    pub async fn staging_rows(&self, table: &str) -> Result<Vec<Vec<String>>> {
        self.read(table, |state| state.staging.clone()).await
    }

    pub async fn warehouse_rows(&self, table: &str) -> Result<Vec<Vec<String>>> {
        self.read(table, |state| state.warehouse.clone()).await
    }

    async fn begin_local(&self, table: &str) -> Result<LocalTx> {
        let slot = self.slot(table).await;
        let mut guard = slot.try_lock_owned().map_err(|_| EtlError::TrackerConflict {
            table: table.to_string(),
        })?;

        // The directory may be shared with other processes: lock, then re-read
        let lock = match &self.dir {
            Some(dir) => {
                let lock = lock_table(dir, table)?;
                *guard = Some(load_table(&table_path(dir, table))?);
                Some(lock)
            }
            None => None,
        };
        let pending = (*guard).clone().unwrap_or_default();

        Ok(LocalTx {
            table: table.to_string(),
            dir: self.dir.clone(),
            guard,
            _lock: lock,
            pending,
        })
    }
}

/// Exclusive OS lock on `<table>.lock`, held until the returned file drops
fn lock_table(dir: &Path, table: &str) -> Result<File> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(dir.join(format!("{table}.lock")))?;
    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => Ok(file),
        Err(err) if err.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
            debug!("{} is locked by another process", table);
            Err(EtlError::TrackerConflict {
                table: table.to_string(),
            })
        }
        Err(err) => Err(err.into()),
    }
}

fn table_path(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{table}.json"))
}

fn load_table(path: &Path) -> Result<TableState> {
    if !path.exists() {
        return Ok(TableState::default());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn save_table(dir: &Path, table: &str, state: &TableState) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer(tmp.as_file_mut(), state)?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(table_path(dir, table)).map_err(|err| err.error)?;
    Ok(())
}

#[async_trait]
impl Warehouse for LocalWarehouse {
    async fn begin(&self, table: &str) -> Result<Box<dyn WarehouseTx>> {
        Ok(Box::new(self.begin_local(table).await?))
    }
}

struct LocalTx {
    table: String,
    dir: Option<PathBuf>,
    guard: OwnedMutexGuard<Option<TableState>>,
    _lock: Option<File>,
    pending: TableState,
}

#[async_trait]
impl WarehouseTx for LocalTx {
    fn entries(&self) -> &[TrackerEntry] {
        &self.pending.entries
    }

    fn append_entry(&mut self, entry: TrackerEntry) {
        self.pending.entries.push(entry);
    }

    async fn load_staging(&mut self, snapshot: &Path) -> Result<usize> {
        let rows = OfferStore::read_snapshot(snapshot)?;
        let count = rows.len();
        self.pending.staging.extend(rows);
        debug!("Loaded {} rows into {}", count, self.table);
        Ok(count)
    }

    async fn merge_to_warehouse(&mut self, ds: NaiveDate) -> Result<usize> {
        let ds = ds.format("%Y-%m-%d").to_string();
        let day: Vec<Vec<String>> = self
            .pending
            .staging
            .iter()
            .filter(|row| row.first() == Some(&ds))
            .cloned()
            .collect();
        let count = day.len();

        self.pending
            .warehouse
            .retain(|row| row.first() != Some(&ds));
        self.pending.warehouse.extend(day);
        debug!("Merged {} rows of {} from {}", count, ds, self.table);
        Ok(count)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let LocalTx {
            table,
            dir,
            mut guard,
            _lock,
            pending,
        } = *self;

        if let Some(dir) = &dir {
            save_table(dir, &table, &pending)?;
        }
        *guard = Some(pending);
        info!("Committed transaction on {}", table);
        Ok(())
    }
}
