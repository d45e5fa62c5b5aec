use serde::{Deserialize, Serialize};

use crate::checksum;

/// Every payload in the lab is exactly this long; application messages are
/// padded or truncated to fit.
pub const PAYLOAD_LEN: usize = 20;

/// Sentinel for header fields that are not being used (e.g. `acknum` in a
/// data packet).
pub const NOT_IN_USE: i32 = -1;

/// The unit handed to the channel. Immutable once constructed and
/// checksummed; always moved by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub seqnum: i32,
    pub acknum: i32,
    pub checksum: i32,
    pub payload: [u8; PAYLOAD_LEN],
}

impl Packet {
    /// Build a data packet carrying `payload` with `acknum` unused.
    pub fn data(seqnum: i32, payload: [u8; PAYLOAD_LEN]) -> Self {
        let acknum = NOT_IN_USE;
        Self {
            seqnum,
            acknum,
            checksum: checksum::compute(seqnum, acknum, &payload),
            payload,
        }
    }

    /// Build an acknowledgment for `acknum`. The receiver stamps its own
    /// sequence counter into `seqnum`; the payload is filler.
    pub fn ack(seqnum: i32, acknum: i32) -> Self {
        let payload = [b'0'; PAYLOAD_LEN];
        Self {
            seqnum,
            acknum,
            checksum: checksum::compute(seqnum, acknum, &payload),
            payload,
        }
    }

    /// True iff the stored checksum no longer matches the packet's fields.
    pub fn is_corrupted(&self) -> bool {
        self.checksum != checksum::compute(self.seqnum, self.acknum, &self.payload)
    }
}

/// An application-level message: a fixed-length chunk with no identity
/// beyond FIFO arrival order at the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub data: [u8; PAYLOAD_LEN],
}

impl Message {
    /// Pad (with zero bytes) or truncate arbitrary bytes into a message.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut data = [0u8; PAYLOAD_LEN];
        let n = bytes.len().min(PAYLOAD_LEN);
        data[..n].copy_from_slice(&bytes[..n]);
        Self { data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_packet_checksum_is_valid() {
        let packet = Packet::data(3, *b"abcdefghijklmnopqrst");
        assert_eq!(packet.acknum, NOT_IN_USE);
        assert!(!packet.is_corrupted());
    }

    #[test]
    fn tampered_payload_is_detected() {
        let mut packet = Packet::data(0, [b'a'; PAYLOAD_LEN]);
        packet.payload[0] = b'Z';
        assert!(packet.is_corrupted());
    }

    #[test]
    fn tampered_header_is_detected() {
        let mut ack = Packet::ack(1, 4);
        ack.acknum = 5;
        assert!(ack.is_corrupted());
    }

    #[test]
    fn message_pads_and_truncates() {
        let short = Message::from_bytes(b"A");
        assert_eq!(short.data[0], b'A');
        assert!(short.data[1..].iter().all(|&b| b == 0));

        let long = Message::from_bytes(&[b'x'; 40]);
        assert_eq!(long.data, [b'x'; PAYLOAD_LEN]);
    }
}
