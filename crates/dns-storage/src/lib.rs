//! Durable storage for validated zone files
//!
//! This crate provides the terminal stage of the pipeline: committing a
//! validated zone to the nameserver's zone directory or removing it.

pub mod zone;

pub use zone::{ZoneStore, ZoneStoreStatistics};
