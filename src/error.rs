use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("required column `{0}` is missing")]
    MissingColumn(&'static str),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("date range start {start} is after end {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("collection name must not be empty")]
    EmptyCollection,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("failed to store upload: {0}")]
    Store(#[from] StoreError),
}
