//! Zone sync bridge
//!
//! This crate ties the chain, protocol and storage crates together: it turns
//! incoming zone hash change logs into zone file writes and deletions.

pub mod config;
pub mod dispatcher;
pub mod logging;
pub mod pipeline;
pub mod server;

pub use config::*;
pub use dispatcher::*;
pub use logging::init_logging;
pub use pipeline::*;
pub use server::*;
