//! Sliding-window containers shared by both protocol variants.

use std::collections::VecDeque;

use arq_lab_abstract::Packet;

/// One outstanding packet in the send window. The `acked` flag and retry
/// counter are only meaningful for Selective Repeat; Go-Back-N retires
/// slots wholesale on a cumulative ACK.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SendSlot {
    pub packet: Packet,
    pub acked: bool,
    pub retries: u32,
}

/// Result of applying a per-packet (Selective Repeat) ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SelectiveAck {
    /// Newly acknowledged; `retired` slots slid out of the window front.
    New { retired: usize },
    /// The slot was already acknowledged.
    Duplicate,
    /// The ACK does not identify any outstanding packet.
    OutOfWindow,
}

/// Bounded circular buffer of outstanding packets forming a contiguous
/// modular range `[base, base + count)`. Slots are kept in insertion
/// order; `base` only advances over a contiguous acknowledged prefix.
#[derive(Debug)]
pub(crate) struct SendWindow {
    slots: VecDeque<SendSlot>,
    base: i32,
    next_seq: i32,
    capacity: usize,
    seq_space: i32,
}

impl SendWindow {
    pub fn new(capacity: usize, seq_space: i32) -> Self {
        Self {
            slots: VecDeque::with_capacity(capacity),
            base: 0,
            next_seq: 0,
            capacity,
            seq_space,
        }
    }

    pub fn reset(&mut self) {
        self.slots.clear();
        self.base = 0;
        self.next_seq = 0;
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn outstanding(&self) -> usize {
        self.slots.len()
    }

    pub fn base(&self) -> i32 {
        self.base
    }

    pub fn next_seq(&self) -> i32 {
        self.next_seq
    }

    /// Store a freshly built packet. The caller must have stamped it with
    /// `next_seq` and checked `is_full` first.
    pub fn push(&mut self, packet: Packet) {
        debug_assert!(!self.is_full());
        debug_assert_eq!(packet.seqnum, self.next_seq);
        self.slots.push_back(SendSlot {
            packet,
            acked: false,
            retries: 0,
        });
        self.next_seq = (self.next_seq + 1) % self.seq_space;
    }

    /// Modular distance of `seq` ahead of `base`.
    fn offset(&self, seq: i32) -> i32 {
        (seq - self.base).rem_euclid(self.seq_space)
    }

    /// Cumulative (Go-Back-N) ACK: if `acknum` identifies an outstanding
    /// packet, retire it and everything before it. Returns the number of
    /// slots retired, 0 for an old or duplicate ACK.
    pub fn ack_cumulative(&mut self, acknum: i32) -> usize {
        let diff = self.offset(acknum) as usize;
        if diff >= self.slots.len() {
            return 0;
        }
        for _ in 0..=diff {
            self.slots.pop_front();
            self.base = (self.base + 1) % self.seq_space;
        }
        diff + 1
    }

    /// Per-packet (Selective Repeat) ACK: mark the slot acknowledged and
    /// slide `base` over the contiguous acknowledged prefix.
    pub fn ack_selective(&mut self, acknum: i32) -> SelectiveAck {
        let diff = self.offset(acknum) as usize;
        let Some(slot) = self.slots.get_mut(diff) else {
            return SelectiveAck::OutOfWindow;
        };
        if slot.acked {
            return SelectiveAck::Duplicate;
        }
        slot.acked = true;
        slot.retries = 0;

        let mut retired = 0;
        while self.slots.front().is_some_and(|s| s.acked) {
            self.slots.pop_front();
            self.base = (self.base + 1) % self.seq_space;
            retired += 1;
        }
        SelectiveAck::New { retired }
    }

    /// All outstanding packets in window order (Go-Back-N retransmission).
    pub fn packets(&self) -> impl Iterator<Item = &Packet> {
        self.slots.iter().map(|s| &s.packet)
    }

    /// The slot at `base`, which is by construction the oldest
    /// unacknowledged packet.
    pub fn front_mut(&mut self) -> Option<&mut SendSlot> {
        self.slots.front_mut()
    }
}

/// Receiver-side window: which sequence numbers in
/// `[expected, expected + capacity)` have been received, each slot holding
/// at most one buffered packet awaiting in-order delivery.
///
/// Slots are indexed `seqnum % capacity`, the reference formula; under the
/// default constants (`seq_space` < 2 x window) this shares the reference's
/// latent wraparound aliasing.
#[derive(Debug)]
pub(crate) struct RecvWindow {
    slots: Vec<Option<Packet>>,
    expected: i32,
    seq_space: i32,
}

impl RecvWindow {
    pub fn new(capacity: usize, seq_space: i32) -> Self {
        Self {
            slots: vec![None; capacity],
            expected: 0,
            seq_space,
        }
    }

    pub fn reset(&mut self) {
        self.slots.fill(None);
        self.expected = 0;
    }

    pub fn expected(&self) -> i32 {
        self.expected
    }

    /// Modular distance of `seq` ahead of `expected`.
    pub fn offset(&self, seq: i32) -> i32 {
        (seq - self.expected).rem_euclid(self.seq_space)
    }

    pub fn in_window(&self, seq: i32) -> bool {
        (self.offset(seq) as usize) < self.slots.len()
    }

    fn slot_index(&self, seq: i32) -> usize {
        seq.rem_euclid(self.slots.len() as i32) as usize
    }

    /// Buffer an in-window packet. Returns false if its slot was already
    /// occupied (duplicate within the window).
    pub fn insert(&mut self, packet: Packet) -> bool {
        let idx = self.slot_index(packet.seqnum);
        if self.slots[idx].is_some() {
            return false;
        }
        self.slots[idx] = Some(packet);
        true
    }

    /// Drain the contiguous run of buffered packets starting at
    /// `expected`, advancing it past each one.
    pub fn take_ready(&mut self) -> Vec<Packet> {
        let mut ready = Vec::new();
        loop {
            let idx = self.slot_index(self.expected);
            match self.slots[idx].take() {
                Some(packet) => {
                    ready.push(packet);
                    self.expected = (self.expected + 1) % self.seq_space;
                }
                None => break,
            }
        }
        ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arq_lab_abstract::PAYLOAD_LEN;

    fn pkt(seq: i32) -> Packet {
        Packet::data(seq, [b'a' + seq as u8; PAYLOAD_LEN])
    }

    fn filled(count: i32) -> SendWindow {
        let mut w = SendWindow::new(6, 7);
        for seq in 0..count {
            w.push(pkt(seq));
        }
        w
    }

    #[test]
    fn window_never_exceeds_capacity() {
        let w = filled(6);
        assert!(w.is_full());
        assert_eq!(w.outstanding(), 6);
        assert_eq!(w.next_seq(), 6);
    }

    #[test]
    fn cumulative_ack_retires_prefix() {
        let mut w = filled(4);
        assert_eq!(w.ack_cumulative(2), 3);
        assert_eq!(w.base(), 3);
        assert_eq!(w.outstanding(), 1);
        // Old ACK is a no-op.
        assert_eq!(w.ack_cumulative(1), 0);
        assert_eq!(w.base(), 3);
    }

    #[test]
    fn cumulative_ack_across_wraparound() {
        let mut w = filled(6);
        assert_eq!(w.ack_cumulative(5), 6);
        assert_eq!(w.base(), 6);
        w.push(pkt(6));
        w.push(pkt(0));
        assert_eq!(w.ack_cumulative(0), 2);
        assert_eq!(w.base(), 1);
    }

    #[test]
    fn selective_ack_slides_only_contiguous_prefix() {
        let mut w = filled(3);
        assert_eq!(w.ack_selective(1), SelectiveAck::New { retired: 0 });
        assert_eq!(w.base(), 0);
        assert_eq!(w.ack_selective(1), SelectiveAck::Duplicate);
        assert_eq!(w.ack_selective(0), SelectiveAck::New { retired: 2 });
        assert_eq!(w.base(), 2);
        assert_eq!(w.ack_selective(5), SelectiveAck::OutOfWindow);
    }

    #[test]
    fn recv_window_buffers_and_drains_in_order() {
        let mut w = RecvWindow::new(6, 7);
        assert!(w.in_window(0));
        assert!(w.in_window(5));
        assert!(!w.in_window(6));

        assert!(w.insert(pkt(1)));
        assert!(w.take_ready().is_empty());
        assert!(!w.insert(pkt(1)));

        assert!(w.insert(pkt(0)));
        let ready = w.take_ready();
        assert_eq!(ready.iter().map(|p| p.seqnum).collect::<Vec<_>>(), [0, 1]);
        assert_eq!(w.expected(), 2);
    }
}
