pub mod aggregate;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod report;
pub mod store;
