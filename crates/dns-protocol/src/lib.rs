//! Zone file parsing and authority validation
//!
//! This crate turns fetched zone file text into resource records and decides
//! whether the zone may be committed for a given domain identity hash.

pub mod parser;
pub mod records;
pub mod validation;


pub use parser::{parse_ttl, ZoneFileParser};
pub use records::{RecordData, ResourceRecord};
pub use validation::{ZoneFile, ZoneFileValidator};
