//! # rtag Common Library
//!
//! Shared code for the rtag replay tagger including:
//! - Replay and team data model
//! - Ordered tag sets and tag namespaces
//! - Database initialization
//! - Configuration loading and root folder resolution
//! - Timestamp utilities

pub mod config;
pub mod db;
pub mod error;
pub mod replay;
pub mod tags;
pub mod time;

pub use error::{Error, Result};
pub use replay::{Replay, Role, Team};
pub use tags::{Namespace, TagSet};
