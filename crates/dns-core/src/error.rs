//! Error handling for the zone sync bridge
//!
//! Every stage of the pipeline reports failures through [`DnsError`]. A failure
//! is local to the event being processed: it is logged with its stage and the
//! event is dropped.

use thiserror::Error;

/// Main result type used throughout the bridge
pub type DnsResult<T> = Result<T, DnsError>;

/// Error taxonomy for event decoding, content resolution, validation and storage
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    // Event decoding
    #[error("Malformed event payload: {message}")]
    Decode { message: String },

    // Content resolution
    #[error("Failed to decode content address: {message}")]
    AddressDecode { message: String },

    #[error("Unsupported content address protocol: {protocol}")]
    UnsupportedProtocol { protocol: String },

    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    // Zone file validation
    #[error("Zone file parse error at line {line}: {message}")]
    ZoneParse { line: usize, message: String },

    #[error("no SOA")]
    NoAuthorityRecord,

    #[error("multiple SOAs ({count})")]
    MultipleAuthorityRecords { count: usize },

    #[error("mismatched SOAs: zone {zone} does not hash to the event node")]
    OriginMismatch { zone: String },

    #[error("Invalid DNS name: {name}")]
    InvalidDnsName { name: String },

    // Origin attestation
    #[error("Failed to obtain resolver for {name}: {message}")]
    ResolverLookup { name: String, message: String },

    #[error("Event for {name} was not emitted by its registered resolver {resolver}")]
    OriginRejected { name: String, resolver: String },

    // Storage
    #[error("Disk I/O error: {message}")]
    DiskIoError { message: String },

    // Configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Configuration file not found: {path}")]
    ConfigurationNotFound { path: String },

    #[error("Configuration parse error: {message}")]
    ConfigurationParseError { message: String },
}

impl DnsError {
    /// Create a new payload decoding error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode { message: message.into() }
    }

    /// Create a new content address decoding error
    pub fn address_decode(message: impl Into<String>) -> Self {
        Self::AddressDecode { message: message.into() }
    }

    /// Create a new fetch error for the given URL
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a new zone file parse error
    pub fn zone_parse(line: usize, message: impl Into<String>) -> Self {
        Self::ZoneParse {
            line,
            message: message.into(),
        }
    }

    /// Create a new invalid name error
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidDnsName { name: name.into() }
    }

    /// Create a new resolver lookup error
    pub fn resolver_lookup(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResolverLookup {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration { message: message.into() }
    }

    /// Pipeline stage that produced this error, used as a log field
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "decode",

            Self::AddressDecode { .. } |
            Self::UnsupportedProtocol { .. } => "resolve",

            Self::Fetch { .. } => "fetch",

            Self::ZoneParse { .. } |
            Self::NoAuthorityRecord |
            Self::MultipleAuthorityRecords { .. } |
            Self::OriginMismatch { .. } |
            Self::InvalidDnsName { .. } => "validate",

            Self::ResolverLookup { .. } |
            Self::OriginRejected { .. } => "attest",

            Self::DiskIoError { .. } => "store",

            Self::InvalidConfiguration { .. } |
            Self::ConfigurationNotFound { .. } |
            Self::ConfigurationParseError { .. } => "config",
        }
    }

    /// Get the error category for logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::Decode { .. } |
            Self::AddressDecode { .. } |
            Self::ZoneParse { .. } |
            Self::InvalidDnsName { .. } => "input",

            Self::UnsupportedProtocol { .. } => "unsupported",

            Self::Fetch { .. } |
            Self::ResolverLookup { .. } => "network",

            Self::NoAuthorityRecord |
            Self::MultipleAuthorityRecords { .. } |
            Self::OriginMismatch { .. } |
            Self::OriginRejected { .. } => "security",

            Self::DiskIoError { .. } => "storage",

            Self::InvalidConfiguration { .. } |
            Self::ConfigurationNotFound { .. } |
            Self::ConfigurationParseError { .. } => "configuration",
        }
    }

    /// Whether a later event for the same domain could succeed where this one failed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::ResolverLookup { .. } | Self::DiskIoError { .. }
        )
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for DnsError {
    fn from(err: std::io::Error) -> Self {
        Self::DiskIoError { message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_are_stable() {
        assert_eq!(DnsError::NoAuthorityRecord.to_string(), "no SOA");
        assert_eq!(
            DnsError::MultipleAuthorityRecords { count: 2 }.to_string(),
            "multiple SOAs (2)"
        );
    }

    #[test]
    fn test_error_stages() {
        assert_eq!(DnsError::decode("short").stage(), "decode");
        assert_eq!(DnsError::address_decode("bad").stage(), "resolve");
        assert_eq!(
            DnsError::UnsupportedProtocol { protocol: "tcp".into() }.stage(),
            "resolve"
        );
        assert_eq!(DnsError::fetch("http://x", "refused").stage(), "fetch");
        assert_eq!(DnsError::NoAuthorityRecord.stage(), "validate");
        assert_eq!(DnsError::resolver_lookup("a.eth", "unset").stage(), "attest");
        assert_eq!(DnsError::DiskIoError { message: "x".into() }.stage(), "store");
    }

    #[test]
    fn test_io_error_conversion() {
        let err: DnsError = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, DnsError::DiskIoError { .. }));
        assert!(err.is_transient());
        assert!(!DnsError::NoAuthorityRecord.is_transient());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(DnsError::decode("short").category(), "input");
        assert_eq!(DnsError::fetch("http://x", "refused").category(), "network");
        assert_eq!(
            DnsError::OriginRejected { name: "a.eth".into(), resolver: "0x00".into() }.category(),
            "security"
        );
        assert_eq!(DnsError::DiskIoError { message: "x".into() }.category(), "storage");
    }
}
