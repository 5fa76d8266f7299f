//! Textual multiaddr parsing
//!
//! Only the textual form is handled: `/proto/value/proto/value...`. Each
//! segment is checked against a fixed protocol table and values are validated
//! for the protocols that carry them.

use dns_core::{DnsError, DnsResult};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Protocol code for peer identifiers (`/p2p/`, historically `/ipfs/`)
pub const P_P2P: u32 = 421;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    None,
    Ip4,
    Ip6,
    Port,
    Text,
    /// Consumes the remainder of the address
    Path,
    PeerId,
    Onion,
    Onion3,
}

/// A multiaddr protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Protocol {
    pub name: &'static str,
    pub code: u32,
    kind: ValueKind,
}

const fn protocol(name: &'static str, code: u32, kind: ValueKind) -> Protocol {
    Protocol { name, code, kind }
}

static PROTOCOLS: &[Protocol] = &[
    protocol("ip4", 4, ValueKind::Ip4),
    protocol("tcp", 6, ValueKind::Port),
    protocol("dccp", 33, ValueKind::Port),
    protocol("ip6", 41, ValueKind::Ip6),
    protocol("dns", 53, ValueKind::Text),
    protocol("dns4", 54, ValueKind::Text),
    protocol("dns6", 55, ValueKind::Text),
    protocol("dnsaddr", 56, ValueKind::Text),
    protocol("sctp", 132, ValueKind::Port),
    protocol("udp", 273, ValueKind::Port),
    protocol("p2p-circuit", 290, ValueKind::None),
    protocol("unix", 400, ValueKind::Path),
    protocol("p2p", P_P2P, ValueKind::PeerId),
    protocol("https", 443, ValueKind::None),
    protocol("onion", 444, ValueKind::Onion),
    protocol("onion3", 445, ValueKind::Onion3),
    protocol("tls", 448, ValueKind::None),
    protocol("quic", 460, ValueKind::None),
    protocol("quic-v1", 461, ValueKind::None),
    protocol("ws", 477, ValueKind::None),
    protocol("wss", 478, ValueKind::None),
    protocol("http", 480, ValueKind::None),
];

impl Protocol {
    /// Look up a protocol by its textual name
    pub fn by_name(name: &str) -> Option<&'static Protocol> {
        let name = if name == "ipfs" { "p2p" } else { name };
        PROTOCOLS.iter().find(|p| p.name == name)
    }

    fn validate(&self, value: &str) -> DnsResult<()> {
        let valid = match self.kind {
            ValueKind::None => true,
            ValueKind::Ip4 => value.parse::<Ipv4Addr>().is_ok(),
            ValueKind::Ip6 => value.parse::<Ipv6Addr>().is_ok(),
            ValueKind::Port => value.parse::<u16>().is_ok(),
            ValueKind::Text | ValueKind::Path => !value.is_empty(),
            ValueKind::PeerId => is_peer_id(value),
            ValueKind::Onion => is_onion(value, 16),
            ValueKind::Onion3 => is_onion(value, 56),
        };

        if valid {
            Ok(())
        } else {
            Err(DnsError::address_decode(format!("invalid {} value {:?}", self.name, value)))
        }
    }
}

/// Peer ids are a base58btc multihash or a base58btc multibase CID
fn is_peer_id(value: &str) -> bool {
    let digits = value.strip_prefix('z').unwrap_or(value);
    !digits.is_empty() && bs58::decode(digits).into_vec().is_ok()
}

/// `<base32 id>:<port>`
fn is_onion(value: &str, id_length: usize) -> bool {
    match value.split_once(':') {
        Some((id, port)) => {
            id.len() == id_length
                && id.bytes().all(|b| b.is_ascii_lowercase() || (b'2'..=b'7').contains(&b))
                && port.parse::<u16>().map(|p| p > 0).unwrap_or(false)
        }
        None => false,
    }
}

/// One `/proto/value` segment of an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub protocol: &'static Protocol,
    pub value: Option<String>,
}

/// A parsed multiaddr
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentAddress {
    segments: Vec<Segment>,
}

impl ContentAddress {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Final protocol of the address, which decides how it is fetched
    pub fn last_protocol(&self) -> &'static Protocol {
        // Parsing guarantees at least one segment
        self.segments[self.segments.len() - 1].protocol
    }
}

impl FromStr for ContentAddress {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_end_matches('/');
        let rest = trimmed
            .strip_prefix('/')
            .ok_or_else(|| DnsError::address_decode(format!("{:?} must begin with /", s)))?;

        let mut segments = Vec::new();
        let mut parts = rest.split('/');
        while let Some(name) = parts.next() {
            let protocol = Protocol::by_name(name)
                .ok_or_else(|| DnsError::address_decode(format!("unknown protocol {:?}", name)))?;

            let value = match protocol.kind {
                ValueKind::None => None,
                ValueKind::Path => {
                    let path = parts.by_ref().collect::<Vec<_>>().join("/");
                    Some(format!("/{}", path))
                }
                _ => Some(
                    parts
                        .next()
                        .ok_or_else(|| {
                            DnsError::address_decode(format!("missing value for {}", protocol.name))
                        })?
                        .to_string(),
                ),
            };

            if let Some(value) = &value {
                let raw = if protocol.kind == ValueKind::Path { &value[1..] } else { value.as_str() };
                protocol.validate(raw)?;
            }
            segments.push(Segment { protocol, value });
        }

        if segments.is_empty() {
            return Err(DnsError::address_decode("address has no protocol segments"));
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment.protocol.name)?;
            if let Some(value) = &segment.value {
                if segment.protocol.kind == ValueKind::Path {
                    write!(f, "{}", value)?;
                } else {
                    write!(f, "/{}", value)?;
                }
            }
        }
        Ok(())
    }
}
