//! Core DNS and on-chain types and constants

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! record_types {
    ($($variant:ident = $code:literal => $mnemonic:literal,)+) => {
        /// DNS record types as registered with IANA
        ///
        /// Types without a dedicated RDATA parser are kept as raw fields.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum RecordType {
            $($variant = $code,)+
        }

        impl RecordType {
            const ALL: &'static [RecordType] = &[$(Self::$variant,)+];

            /// Presentation-format mnemonic
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Self::$variant => $mnemonic,)+
                }
            }
        }
    };
}

record_types! {
    A = 1 => "A",
    NS = 2 => "NS",
    MD = 3 => "MD",
    MF = 4 => "MF",
    CNAME = 5 => "CNAME",
    SOA = 6 => "SOA",
    MB = 7 => "MB",
    MG = 8 => "MG",
    MR = 9 => "MR",
    NULL = 10 => "NULL",
    WKS = 11 => "WKS",
    PTR = 12 => "PTR",
    HINFO = 13 => "HINFO",
    MINFO = 14 => "MINFO",
    MX = 15 => "MX",
    TXT = 16 => "TXT",
    RP = 17 => "RP",
    AFSDB = 18 => "AFSDB",
    X25 = 19 => "X25",
    ISDN = 20 => "ISDN",
    RT = 21 => "RT",
    NSAP = 22 => "NSAP",
    NSAPPTR = 23 => "NSAP-PTR",
    SIG = 24 => "SIG",
    KEY = 25 => "KEY",
    PX = 26 => "PX",
    GPOS = 27 => "GPOS",
    AAAA = 28 => "AAAA",
    LOC = 29 => "LOC",
    NXT = 30 => "NXT",
    EID = 31 => "EID",
    NIMLOC = 32 => "NIMLOC",
    SRV = 33 => "SRV",
    ATMA = 34 => "ATMA",
    NAPTR = 35 => "NAPTR",
    KX = 36 => "KX",
    CERT = 37 => "CERT",
    A6 = 38 => "A6",
    DNAME = 39 => "DNAME",
    SINK = 40 => "SINK",
    APL = 42 => "APL",
    DS = 43 => "DS",
    SSHFP = 44 => "SSHFP",
    IPSECKEY = 45 => "IPSECKEY",
    RRSIG = 46 => "RRSIG",
    NSEC = 47 => "NSEC",
    DNSKEY = 48 => "DNSKEY",
    DHCID = 49 => "DHCID",
    NSEC3 = 50 => "NSEC3",
    NSEC3PARAM = 51 => "NSEC3PARAM",
    TLSA = 52 => "TLSA",
    SMIMEA = 53 => "SMIMEA",
    HIP = 55 => "HIP",
    NINFO = 56 => "NINFO",
    RKEY = 57 => "RKEY",
    TALINK = 58 => "TALINK",
    CDS = 59 => "CDS",
    CDNSKEY = 60 => "CDNSKEY",
    OPENPGPKEY = 61 => "OPENPGPKEY",
    CSYNC = 62 => "CSYNC",
    ZONEMD = 63 => "ZONEMD",
    SVCB = 64 => "SVCB",
    HTTPS = 65 => "HTTPS",
    SPF = 99 => "SPF",
    UINFO = 100 => "UINFO",
    UID = 101 => "UID",
    GID = 102 => "GID",
    UNSPEC = 103 => "UNSPEC",
    NID = 104 => "NID",
    L32 = 105 => "L32",
    L64 = 106 => "L64",
    LP = 107 => "LP",
    EUI48 = 108 => "EUI48",
    EUI64 = 109 => "EUI64",
    TKEY = 249 => "TKEY",
    TSIG = 250 => "TSIG",
    URI = 256 => "URI",
    CAA = 257 => "CAA",
    AVC = 258 => "AVC",
    DOA = 259 => "DOA",
    AMTRELAY = 260 => "AMTRELAY",
    TA = 32768 => "TA",
    DLV = 32769 => "DLV",
}

impl RecordType {
    /// Convert from u16
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.to_u16() == value)
    }

    /// Convert to u16
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Parse a presentation-format mnemonic (case-insensitive)
    pub fn from_mnemonic(token: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.mnemonic().eq_ignore_ascii_case(token))
    }
}

/// DNS class (usually IN for Internet)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum DnsClass {
    IN = 1,    // Internet
    CS = 2,    // CSNET (obsolete)
    CH = 3,    // Chaos
    HS = 4,    // Hesiod
}

impl DnsClass {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::IN),
            2 => Some(Self::CS),
            3 => Some(Self::CH),
            4 => Some(Self::HS),
            _ => None,
        }
    }

    pub fn to_u16(self) -> u16 {
        self as u16
    }

    pub fn from_mnemonic(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "IN" => Some(Self::IN),
            "CS" => Some(Self::CS),
            "CH" => Some(Self::CH),
            "HS" => Some(Self::HS),
            _ => None,
        }
    }
}

/// Parse a fixed-width `0x`-prefixed (or bare) hex string
fn parse_fixed_hex<const N: usize>(s: &str) -> Result<[u8; N], String> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let bytes = hex::decode(digits).map_err(|e| format!("invalid hex {:?}: {}", s, e))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("expected {} bytes, got {}", N, b.len()))
}

/// 32-byte digest: an event topic or a domain identity hash (ENS node)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeHash(pub [u8; 32]);

impl NodeHash {
    pub const ZERO: NodeHash = NodeHash([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for NodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for NodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHash({})", self)
    }
}

impl FromStr for NodeHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed_hex::<32>(s).map(NodeHash)
    }
}

/// 20-byte contract or account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The unset sentinel returned by the registry for unknown names
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed_hex::<20>(s).map(Address)
    }
}

macro_rules! hex_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_serde!(NodeHash);
hex_serde!(Address);

/// Constants
pub const MAX_DOMAIN_NAME_LENGTH: usize = 253;
pub const MAX_LABEL_LENGTH: usize = 63;
