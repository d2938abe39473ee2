//! # sapling-memory
//!
//! Persistent storage for Sapling (SQLite-backed) plus the in-memory
//! recent-message index.

pub mod recent;
pub mod store;
pub mod tracking;

pub use recent::{RecentMessage, RecentMessageIndex};
pub use store::{NewReminder, Store};
pub use tracking::{TrackingEntry, TrackingLog};
