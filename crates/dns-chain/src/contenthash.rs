//! Content hash decoding
//!
//! A content hash is a self-describing locator: an unsigned varint codec
//! followed by codec-specific bytes. IPFS and IPNS carry a CID, swarm carries
//! a CID whose multihash digest is the manifest hash, onion services carry
//! their service id as text.

use dns_core::{DnsError, DnsResult};

const CODEC_IPFS: u64 = 0xe3;
const CODEC_SWARM: u64 = 0xe4;
const CODEC_IPNS: u64 = 0xe5;
const CODEC_ONION: u64 = 0x01bc;
const CODEC_ONION3: u64 = 0x01bd;

/// sha2-256 multihash prefix that marks a version 0 CID
const CIDV0_PREFIX: [u8; 2] = [0x12, 0x20];
const CIDV0_LENGTH: usize = 34;

const MAX_VARINT_BYTES: usize = 9;

/// Render a content hash as its textual address
///
/// ```text
/// e3 01 <cid>      -> /ipfs/<cid>
/// e5 01 <cid>      -> /ipns/<cid>
/// e4 01 <cid>      -> bzz://<hex digest>
/// bc 03 <id>       -> onion://<id>
/// bd 03 <id>       -> onion3://<id>
/// ```
pub fn contenthash_to_string(contenthash: &[u8]) -> DnsResult<String> {
    if contenthash.is_empty() {
        return Err(DnsError::address_decode("empty content hash"));
    }

    let (codec, read) = read_varint(contenthash)?;
    let body = &contenthash[read..];

    match codec {
        CODEC_IPFS => Ok(format!("/ipfs/{}", Cid::parse(body)?)),
        CODEC_IPNS => Ok(format!("/ipns/{}", Cid::parse(body)?)),
        CODEC_SWARM => {
            let cid = Cid::parse(body)?;
            Ok(format!("bzz://{}", hex::encode(cid.digest())))
        }
        CODEC_ONION => Ok(format!("onion://{}", service_id(body)?)),
        CODEC_ONION3 => Ok(format!("onion3://{}", service_id(body)?)),
        other => Err(DnsError::address_decode(format!(
            "unknown content hash codec 0x{:x}",
            other
        ))),
    }
}

/// Read an unsigned LEB128 varint, returning the value and bytes consumed
pub(crate) fn read_varint(data: &[u8]) -> DnsResult<(u64, usize)> {
    let mut value = 0u64;
    for (i, byte) in data.iter().take(MAX_VARINT_BYTES).enumerate() {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(DnsError::address_decode("truncated or oversized varint"))
}

fn service_id(body: &[u8]) -> DnsResult<&str> {
    if body.is_empty() {
        return Err(DnsError::address_decode("empty onion service id"));
    }
    std::str::from_utf8(body).map_err(|_| DnsError::address_decode("onion service id is not text"))
}

/// A borrowed content identifier
#[derive(Debug)]
struct Cid<'a> {
    /// Full binary CID
    bytes: &'a [u8],
    /// Offset of the multihash digest within `bytes`
    digest_offset: usize,
    v0: bool,
}

impl<'a> Cid<'a> {
    fn parse(bytes: &'a [u8]) -> DnsResult<Self> {
        if bytes.len() == CIDV0_LENGTH && bytes.starts_with(&CIDV0_PREFIX) {
            return Ok(Self {
                bytes,
                digest_offset: CIDV0_PREFIX.len(),
                v0: true,
            });
        }

        let (version, mut offset) = read_varint(bytes)?;
        if version != 1 {
            return Err(DnsError::address_decode(format!("unsupported CID version {}", version)));
        }

        // Content codec, then the multihash function code and digest length
        for _ in 0..2 {
            let (_, read) = read_varint(&bytes[offset..])?;
            offset += read;
        }
        let (length, read) = read_varint(&bytes[offset..])?;
        offset += read;

        if bytes.len() - offset != length as usize || length == 0 {
            return Err(DnsError::address_decode(format!(
                "multihash digest length {} does not match {} remaining bytes",
                length,
                bytes.len() - offset
            )));
        }

        Ok(Self {
            bytes,
            digest_offset: offset,
            v0: false,
        })
    }

    fn digest(&self) -> &[u8] {
        &self.bytes[self.digest_offset..]
    }
}

impl std::fmt::Display for Cid<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let encoded = bs58::encode(self.bytes).into_string();
        if self.v0 {
            write!(f, "{}", encoded)
        } else {
            // base58btc multibase prefix
            write!(f, "z{}", encoded)
        }
    }
}
