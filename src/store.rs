use crate::error::StoreError;
use crate::models::Offer;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Column type of a snapshot field in the staging table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Varchar,
    Integer,
    Decimal,
}

/// Offer columns in staging-table order. Every snapshot row starts with
/// `ds` and `source_id`, followed by these fields.
pub const OFFER_SCHEMA: &[(&str, FieldType)] = &[
    ("source_offer_id", FieldType::Varchar),
    ("offer_type", FieldType::Varchar),
    ("title", FieldType::Varchar),
    ("url", FieldType::Varchar),
    ("location_raw", FieldType::Varchar),
    ("province", FieldType::Varchar),
    ("county", FieldType::Varchar),
    ("city", FieldType::Varchar),
    ("district", FieldType::Varchar),
    ("neighbourhood", FieldType::Varchar),
    ("room_count", FieldType::Integer),
    ("price", FieldType::Decimal),
    ("area", FieldType::Decimal),
    ("offer_source", FieldType::Varchar),
];

pub type Record = Map<String, Value>;

/// Key/value form of an offer as it is validated and written
pub fn to_record(offer: &Offer) -> Result<Record, StoreError> {
    match serde_json::to_value(offer)? {
        Value::Object(map) => Ok(map),
        other => unreachable!("offer serialized to {other}"),
    }
}

/// All records must use schema fields only, and all must use the same ones.
pub fn validate_schema(records: &[Record]) -> Result<(), StoreError> {
    let schemas: BTreeSet<Vec<&str>> = records
        .iter()
        .map(|record| record.keys().map(String::as_str).collect())
        .collect();

    if schemas.len() > 1 {
        return Err(StoreError::MultipleSchemas {
            count: schemas.len(),
        });
    }

    for keys in &schemas {
        if let Some(field) = keys
            .iter()
            .find(|key| !OFFER_SCHEMA.iter().any(|(name, _)| name == *key))
        {
            return Err(StoreError::SchemaMismatch {
                field: field.to_string(),
            });
        }
    }

    Ok(())
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Daily CSV snapshots of extracted offers, one file per (source, ds)
#[derive(Debug, Clone)]
pub struct OfferStore {
    dir: PathBuf,
}

impl OfferStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn snapshot_path(&self, source_id: &str, ds: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}_{}.csv", source_id, ds.format("%Y_%m_%d")))
    }

    /// Whether a snapshot was already published. Its content is not checked.
    pub fn snapshot_exists(&self, source_id: &str, ds: NaiveDate) -> bool {
        self.snapshot_path(source_id, ds).exists()
    }

    /// Validate and publish the snapshot. The file appears under its final
    /// name only once it is completely written.
    pub fn write_snapshot(
        &self,
        source_id: &str,
        ds: NaiveDate,
        offers: &[Offer],
    ) -> Result<PathBuf, StoreError> {
        let records = offers
            .iter()
            .map(to_record)
            .collect::<Result<Vec<_>, _>>()?;
        validate_schema(&records)?;

        let path = self.snapshot_path(source_id, ds);
        if path.exists() {
            return Err(StoreError::SnapshotExists {
                source_id: source_id.to_string(),
                ds,
            });
        }

        std::fs::create_dir_all(&self.dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(tmp.as_file_mut());
            let ds = ds.format("%Y-%m-%d").to_string();
            for record in &records {
                let mut row = vec![ds.clone(), source_id.to_string()];
                row.extend(OFFER_SCHEMA.iter().map(|(name, _)| cell(record.get(*name))));
                writer.write_record(&row)?;
            }
            writer.flush()?;
        }
        tmp.as_file_mut().flush()?;
        tmp.as_file().sync_all()?;
        debug!("Wrote {} rows to {}", records.len(), tmp.path().display());

        tmp.persist_noclobber(&path).map_err(|err| err.error)?;
        info!("Stored {} offers in {}", records.len(), path.display());
        Ok(path)
    }

    /// Raw rows of a published snapshot
    pub fn read_snapshot(path: &Path) -> Result<Vec<Vec<String>>, StoreError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)?;
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(String::from).collect());
        }
        Ok(rows)
    }
}
