pub mod pipeline;
pub mod tracker;
pub mod warehouse;

pub use pipeline::{Pipeline, RunReport, ScrapeOutcome, SourceReport};
pub use tracker::{StageOutcome, Tracker, WarehouseOutcome};
pub use warehouse::{LocalWarehouse, Warehouse, WarehouseTx};
