//! Zone hash change event decoding
//!
//! The resolver emits `DNSZonehashChanged(bytes32 indexed node, bytes
//! lastzonehash, bytes zonehash)`. The node is the second topic; the data
//! payload holds the two ABI-encoded byte arrays back to back.

use bytes::Bytes;
use dns_core::{Address, DnsError, DnsResult, NodeHash};
use serde::{Deserialize, Serialize};

/// topic[0] of `DNSZonehashChanged(bytes32,bytes,bytes)`
pub const ZONEHASH_CHANGED_TOPIC: NodeHash = NodeHash([
    0x8f, 0x15, 0xed, 0x4b, 0x72, 0x3e, 0xf4, 0x28, 0xf2, 0x50, 0x96, 0x1d, 0xa8, 0x31, 0x56, 0x75,
    0xb5, 0x07, 0x04, 0x67, 0x37, 0xe1, 0x93, 0x19, 0xfc, 0x1a, 0x4d, 0x81, 0xbf, 0xe8, 0x7f, 0x85,
]);

const WORD: usize = 32;

/// Offset of the previous zone hash length word in the payload
const PREVIOUS_LENGTH_OFFSET: usize = 2 * WORD;

/// A raw log record as delivered by the event listener
///
/// Deserializes from the JSON-RPC log object; unrelated fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Contract that emitted the log
    pub address: Address,
    pub topics: Vec<NodeHash>,
    #[serde(with = "hex_bytes")]
    pub data: Bytes,
}

/// What a change event asks the pipeline to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneAction {
    /// New content was published: fetch and write it
    Update,
    /// Content was cleared: validate the previous content and delete
    Removal,
}

impl ZoneAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Removal => "removal",
        }
    }
}

/// A decoded zone hash change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Domain identity hash, taken verbatim from topic[1]
    pub node: NodeHash,
    pub previous_content: Bytes,
    pub new_content: Bytes,
    /// Contract that emitted the event
    pub emitter: Address,
}

impl ChangeEvent {
    pub fn action(&self) -> ZoneAction {
        if self.new_content.is_empty() {
            ZoneAction::Removal
        } else {
            ZoneAction::Update
        }
    }

    /// The content hash the pipeline resolves for this event
    pub fn content_reference(&self) -> &Bytes {
        match self.action() {
            ZoneAction::Update => &self.new_content,
            ZoneAction::Removal => &self.previous_content,
        }
    }
}

/// Decoder for zone hash change logs
#[derive(Debug, Clone)]
pub struct EventDecoder {
    topic: NodeHash,
}

impl Default for EventDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::with_topic(ZONEHASH_CHANGED_TOPIC)
    }

    pub fn with_topic(topic: NodeHash) -> Self {
        Self { topic }
    }

    /// Check whether the log is a zone hash change
    pub fn matches(&self, log: &LogRecord) -> bool {
        log.topics.len() == 2 && log.topics[0] == self.topic
    }

    /// Decode a log record
    ///
    /// Returns `Ok(None)` for logs that are not zone hash changes. A payload
    /// whose length fields point past its end, or an event with neither a
    /// previous nor a new content hash, is a [`DnsError::Decode`] error.
    pub fn decode(&self, log: &LogRecord) -> DnsResult<Option<ChangeEvent>> {
        if !self.matches(log) {
            return Ok(None);
        }

        let (previous_content, next) = read_bytes(&log.data, PREVIOUS_LENGTH_OFFSET)?;
        let (new_content, _) = read_bytes(&log.data, next)?;

        if previous_content.is_empty() && new_content.is_empty() {
            return Err(DnsError::decode("both previous and new zone hashes are empty"));
        }

        Ok(Some(ChangeEvent {
            node: log.topics[1],
            previous_content,
            new_content,
            emitter: log.address,
        }))
    }
}

/// Read a length-prefixed byte array at `offset`
///
/// Returns the content and the offset just past its 32-byte padding.
fn read_bytes(data: &Bytes, offset: usize) -> DnsResult<(Bytes, usize)> {
    let length = read_length(data, offset)?;
    let start = offset + WORD;
    let end = start
        .checked_add(length)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| {
            DnsError::decode(format!(
                "{} bytes at offset {} run past payload end {}",
                length,
                start,
                data.len()
            ))
        })?;

    let next = start + length.div_ceil(WORD) * WORD;
    Ok((data.slice(start..end), next))
}

fn read_length(data: &[u8], offset: usize) -> DnsResult<usize> {
    let word = offset
        .checked_add(WORD)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| {
            DnsError::decode(format!(
                "length word at offset {} runs past payload end {}",
                offset,
                data.len()
            ))
        })?;

    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(DnsError::decode(format!("length word at offset {} is too large", offset)));
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(low))
        .map_err(|_| DnsError::decode(format!("length word at offset {} is too large", offset)))
}

mod hex_bytes {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(data)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(digits)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ABI-encode `(bytes previous, bytes new)` the way the resolver emits them
    fn encode_payload(previous: &[u8], new: &[u8]) -> Bytes {
        fn word(value: usize) -> [u8; 32] {
            let mut word = [0u8; 32];
            word[24..].copy_from_slice(&(value as u64).to_be_bytes());
            word
        }
        fn padded(data: &[u8]) -> Vec<u8> {
            let mut out = data.to_vec();
            out.resize(data.len().div_ceil(32) * 32, 0);
            out
        }

        let second_offset = 64 + 32 + padded(previous).len();
        let mut payload = Vec::new();
        payload.extend_from_slice(&word(64));
        payload.extend_from_slice(&word(second_offset));
        payload.extend_from_slice(&word(previous.len()));
        payload.extend_from_slice(&padded(previous));
        payload.extend_from_slice(&word(new.len()));
        payload.extend_from_slice(&padded(new));
        Bytes::from(payload)
    }

    fn zonehash_log(node: NodeHash, previous: &[u8], new: &[u8]) -> LogRecord {
        LogRecord {
            address: Address([0x42; 20]),
            topics: vec![ZONEHASH_CHANGED_TOPIC, node],
            data: encode_payload(previous, new),
        }
    }

    #[test]
    fn test_decode_update() {
        let node = NodeHash([7u8; 32]);
        let new = vec![0xe3, 0x01, 0x01, 0x70, 0x12, 0x20];
        let log = zonehash_log(node, b"", &new);

        let event = EventDecoder::new().decode(&log).unwrap().unwrap();
        assert_eq!(event.node, node);
        assert_eq!(event.emitter, Address([0x42; 20]));
        assert!(event.previous_content.is_empty());
        assert_eq!(event.new_content.as_ref(), new.as_slice());
        assert_eq!(event.action(), ZoneAction::Update);
        assert_eq!(event.content_reference().as_ref(), new.as_slice());
    }

    #[test]
    fn test_decode_update_with_previous_value() {
        let previous = vec![0xaa; 40];
        let new = vec![0xbb; 33];
        let log = zonehash_log(NodeHash([1u8; 32]), &previous, &new);

        let event = EventDecoder::new().decode(&log).unwrap().unwrap();
        assert_eq!(event.previous_content.as_ref(), previous.as_slice());
        assert_eq!(event.new_content.as_ref(), new.as_slice());
        assert_eq!(event.action(), ZoneAction::Update);
    }

    #[test]
    fn test_decode_removal() {
        let previous = vec![0xe3, 0x01, 0x01, 0x70];
        let log = zonehash_log(NodeHash([2u8; 32]), &previous, b"");

        let event = EventDecoder::new().decode(&log).unwrap().unwrap();
        assert_eq!(event.action(), ZoneAction::Removal);
        assert_eq!(event.content_reference().as_ref(), previous.as_slice());
    }

    #[test]
    fn test_both_empty_is_invalid() {
        let log = zonehash_log(NodeHash([3u8; 32]), b"", b"");
        assert!(matches!(EventDecoder::new().decode(&log), Err(DnsError::Decode { .. })));
    }

    #[test]
    fn test_other_events_ignored() {
        let decoder = EventDecoder::new();

        let mut log = zonehash_log(NodeHash([4u8; 32]), b"", b"\x01");
        log.topics[0] = NodeHash([0u8; 32]);
        assert_eq!(decoder.decode(&log).unwrap(), None);

        let mut log = zonehash_log(NodeHash([4u8; 32]), b"", b"\x01");
        log.topics.push(NodeHash([5u8; 32]));
        assert_eq!(decoder.decode(&log).unwrap(), None);

        let log = LogRecord {
            address: Address::ZERO,
            topics: vec![ZONEHASH_CHANGED_TOPIC],
            data: Bytes::new(),
        };
        assert_eq!(decoder.decode(&log).unwrap(), None);
    }

    #[test]
    fn test_truncated_payloads_rejected() {
        let decoder = EventDecoder::new();
        let full = zonehash_log(NodeHash([6u8; 32]), b"", &[0x11; 40]);

        // Cut inside the new content, inside its length word, and before the first length word
        for cut in [full.data.len() - 30, 64 + 32 + 10, 50] {
            let mut log = full.clone();
            log.data = full.data.slice(..cut);
            assert!(
                matches!(decoder.decode(&log), Err(DnsError::Decode { .. })),
                "cut at {} should fail",
                cut
            );
        }
    }

    #[test]
    fn test_oversized_length_rejected() {
        let mut payload = encode_payload(b"\x01", b"\x02").to_vec();
        payload[64] = 0xff;
        let log = LogRecord {
            address: Address::ZERO,
            topics: vec![ZONEHASH_CHANGED_TOPIC, NodeHash::ZERO],
            data: Bytes::from(payload),
        };
        assert!(matches!(EventDecoder::new().decode(&log), Err(DnsError::Decode { .. })));
    }

    #[test]
    fn test_log_record_from_json() {
        let json = r#"{
            "address": "0x4976fb03c32e5b8cfe2b6ccb31c09ba78ebaba41",
            "topics": [
                "0x8f15ed4b723ef428f250961da8315675b507046737e19319fc1a4d81bfe87f85",
                "0x93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae"
            ],
            "data": "0x00ff",
            "blockNumber": "0x10",
            "removed": false
        }"#;
        let log: LogRecord = serde_json::from_str(json).unwrap();
        assert_eq!(log.topics[0], ZONEHASH_CHANGED_TOPIC);
        assert_eq!(log.data.as_ref(), &[0x00, 0xff]);
        assert!(EventDecoder::new().matches(&log));
    }
}
