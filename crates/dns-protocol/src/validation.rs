//! Zone file authority validation
//!
//! A fetched zone file is only accepted when it contains exactly one SOA
//! record and that record's owner hashes to the node named by the event.

use crate::parser::ZoneFileParser;
use dns_core::{namehash, DnsError, DnsResult, NodeHash};

/// A zone file that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneFile {
    /// Raw text as fetched
    pub text: String,
    /// Owner of the SOA record without the trailing root dot
    pub domain_name: String,
    /// Always 1 for a validated zone
    pub authority_record_count: usize,
    /// Total number of parsed resource records
    pub record_count: usize,
}

/// Validates zone files against a domain identity hash
#[derive(Debug, Clone, Default)]
pub struct ZoneFileValidator {
    parser: ZoneFileParser,
}

impl ZoneFileValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `text` and check its authority record against `node`
    ///
    /// Parse failures are reported before any SOA inspection. With several SOA
    /// records the last one decides the match, but the result is
    /// [`DnsError::MultipleAuthorityRecords`] regardless.
    pub fn validate(&self, text: &str, node: &NodeHash) -> DnsResult<ZoneFile> {
        let records = self.parser.parse(text)?;

        let mut soas = 0;
        let mut zone = String::new();
        let mut soa_match = false;
        for record in records.iter().filter(|r| r.is_soa()) {
            soas += 1;
            zone = record.owner().to_string();
            soa_match = namehash(&zone)? == *node;
            tracing::debug!(zone = %zone, line = record.line, matched = soa_match, "Found SOA record");
        }

        match soas {
            0 => Err(DnsError::NoAuthorityRecord),
            1 if soa_match => Ok(ZoneFile {
                text: text.to_owned(),
                domain_name: zone,
                authority_record_count: 1,
                record_count: records.len(),
            }),
            1 => Err(DnsError::OriginMismatch { zone }),
            count => Err(DnsError::MultipleAuthorityRecords { count }),
        }
    }
}
