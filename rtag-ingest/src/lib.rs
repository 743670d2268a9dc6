//! # rtag-ingest
//!
//! Replay archiving, processing, and querying:
//! - Content-addressed replay archive
//! - SQLite record store
//! - Telemetry model and parser sources
//! - Preprocessing and tag generation stages
//! - Tag/time-range query engine
//! - Replay manager facade for front ends

pub mod archive;
pub mod db;
pub mod generators;
pub mod preprocess;
pub mod processor;
pub mod query;
pub mod services;
pub mod telemetry;

pub use archive::ReplayArchive;
pub use db::{ReplayStore, UpdateScope};
pub use processor::ReplayProcessor;
pub use query::{tag_frequency_table, MatchMode, ReplayQuery};
pub use services::{ReplayLocator, ReplayManager, ReplaySources};
