//! Resource record structures for parsed zone files
//!
//! Records are kept in presentation form: owner and target names are absolute
//! (trailing dot) and numeric fields are decoded.

use dns_core::{DnsClass, RecordType};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Parsed zone file resource record
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    /// Absolute owner name, including the trailing root dot
    pub name: String,
    pub ttl: u32,
    pub class: DnsClass,
    /// Numeric type code, also set for `TYPEnnn` records
    pub type_code: u16,
    pub data: RecordData,
    /// Line on which the record starts
    pub line: usize,
}

impl ResourceRecord {
    /// Known record type, if the type code has a mnemonic
    pub fn record_type(&self) -> Option<RecordType> {
        RecordType::from_u16(self.type_code)
    }

    /// Check if this is a start-of-authority record
    pub fn is_soa(&self) -> bool {
        self.type_code == RecordType::SOA.to_u16()
    }

    /// Owner name without the trailing root dot
    pub fn owner(&self) -> &str {
        self.name.strip_suffix('.').unwrap_or(&self.name)
    }
}

/// Parsed record data for the record types with typed presentation formats
#[derive(Debug, Clone, PartialEq)]
pub enum RecordData {
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    CNAME(String),
    MX { priority: u16, exchange: String },
    NS(String),
    PTR(String),
    TXT(Vec<String>),
    SRV { priority: u16, weight: u16, port: u16, target: String },
    SOA {
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    CAA { flags: u8, tag: String, value: String },
    /// Any other type: the RDATA tokens as written
    Generic(Vec<String>),
}
