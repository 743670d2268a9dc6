//! Front-end facing services

pub mod replay_locator;
pub mod replay_manager;

pub use replay_locator::ReplayLocator;
pub use replay_manager::{ReplayManager, ReplaySources, ReprocessSummary};
