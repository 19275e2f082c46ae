use crate::error::Result;
use crate::etl::warehouse::Warehouse;
use crate::models::TrackerEntry;
use chrono::{NaiveDate, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Assumed last warehoused day of a table that was never loaded
pub fn sentinel_ds() -> NaiveDate {
    NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or(NaiveDate::MIN)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Staged { rows: usize },
    AlreadyStaged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarehouseOutcome {
    Loaded { rows: usize },
    /// `requested` is not newer than the last warehoused day
    BackwardLoadRejected {
        requested: NaiveDate,
        max_loaded: NaiveDate,
    },
    /// The day was never staged, so there is nothing to merge
    NotStaged,
}

/// Latest tracker row of `ds` that marks it staged
pub fn staged_entry(entries: &[TrackerEntry], ds: NaiveDate) -> Option<&TrackerEntry> {
    entries.iter().rev().find(|entry| entry.ds == ds && entry.staged)
}

/// Newest day already merged into the warehouse
pub fn max_warehoused(entries: &[TrackerEntry]) -> NaiveDate {
    entries
        .iter()
        .filter(|entry| entry.warehoused)
        .map(|entry| entry.ds)
        .max()
        .unwrap_or_else(sentinel_ds)
}

/// Forward-only state machine UNSTAGED -> STAGED -> WAREHOUSED per
/// (table, ds). Every transition runs inside one warehouse transaction
/// together with the tracker row that records it.
#[derive(Clone)]
pub struct Tracker {
    warehouse: Arc<dyn Warehouse>,
}

impl Tracker {
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self { warehouse }
    }

    pub async fn stage(&self, table: &str, ds: NaiveDate, snapshot: &Path) -> Result<StageOutcome> {
        let mut tx = self.warehouse.begin(table).await?;

        if staged_entry(tx.entries(), ds).is_some() {
            info!("{} already staged for {}, skipping load", table, ds);
            return Ok(StageOutcome::AlreadyStaged);
        }

        let rows = tx.load_staging(snapshot).await?;
        tx.append_entry(TrackerEntry {
            table_name: table.to_string(),
            ds,
            staged: true,
            staged_at: Some(Utc::now()),
            warehoused: false,
            warehoused_at: None,
        });
        tx.commit().await?;

        info!("Loaded {} ({} rows) into {}", snapshot.display(), rows, table);
        Ok(StageOutcome::Staged { rows })
    }

    pub async fn warehouse_load(&self, table: &str, ds: NaiveDate) -> Result<WarehouseOutcome> {
        let mut tx = self.warehouse.begin(table).await?;

        let max_loaded = max_warehoused(tx.entries());
        if ds <= max_loaded {
            info!(
                "Not loading {} for {}: last warehoused day is {}",
                table, ds, max_loaded
            );
            return Ok(WarehouseOutcome::BackwardLoadRejected {
                requested: ds,
                max_loaded,
            });
        }

        let Some(staged_at) = staged_entry(tx.entries(), ds).map(|entry| entry.staged_at) else {
            info!("{} has nothing staged for {}, not loading", table, ds);
            return Ok(WarehouseOutcome::NotStaged);
        };

        let rows = tx.merge_to_warehouse(ds).await?;
        tx.append_entry(TrackerEntry {
            table_name: table.to_string(),
            ds,
            staged: true,
            staged_at,
            warehoused: true,
            warehoused_at: Some(Utc::now()),
        });
        tx.commit().await?;

        info!("Merged {} rows of {} from {} into the warehouse", rows, ds, table);
        Ok(WarehouseOutcome::Loaded { rows })
    }
}
