//! Record store for rtag-ingest
//!
//! Shares the SQLite schema created by `rtag_common::db::init_database`.

pub mod replays;

pub use replays::{ReplayStore, UpdateScope};
