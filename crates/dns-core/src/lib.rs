//! Core types, error handling and hashing for the zone sync bridge
//!
//! This crate provides the foundational types and error handling patterns used
//! by every stage of the fetch-and-validate pipeline.

pub mod error;
pub mod types;
pub mod hash;

pub use error::{DnsError, DnsResult};
pub use types::*;
pub use hash::*;
