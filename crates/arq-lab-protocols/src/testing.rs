//! Recording `ChannelPort` used by the protocol unit tests.

use arq_lab_abstract::{ChannelPort, Message, Packet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOp {
    Start(u64),
    Stop,
}

#[derive(Default)]
pub struct MockPort {
    pub transmitted: Vec<Packet>,
    pub delivered: Vec<Vec<u8>>,
    pub timer_ops: Vec<TimerOp>,
    pub logs: Vec<String>,
    pub now: u64,
}

impl ChannelPort for MockPort {
    fn transmit(&mut self, packet: Packet) {
        self.transmitted.push(packet);
    }

    fn deliver_data(&mut self, payload: &[u8]) {
        self.delivered.push(payload.to_vec());
    }

    fn start_timer(&mut self, duration: u64) {
        self.timer_ops.push(TimerOp::Start(duration));
    }

    fn stop_timer(&mut self) {
        self.timer_ops.push(TimerOp::Stop);
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }
}

/// Shorthand for a padded application message.
pub fn msg(text: &str) -> Message {
    Message::from_bytes(text.as_bytes())
}

/// Tamper with a packet after construction so its checksum is stale.
pub fn corrupted(mut packet: Packet) -> Packet {
    packet.payload[0] ^= 0xff;
    packet
}
