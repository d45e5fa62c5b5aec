//! Go-Back-N: cumulative ACKs, bulk retransmission of every outstanding
//! packet on timeout, and a receiver that only accepts the next in-order
//! sequence number.

use arq_lab_abstract::{
    ArqReceiver, ArqSender, ChannelPort, Message, Packet, ProtocolConfig, ProtocolError,
    ReceiverStats, SendOutcome, SenderStats,
};

use crate::window::SendWindow;

pub struct GbnSender {
    window: SendWindow,
    config: ProtocolConfig,
    stats: SenderStats,
}

impl GbnSender {
    pub fn new(config: ProtocolConfig) -> Self {
        Self {
            window: SendWindow::new(config.window_size, config.seq_space),
            config,
            stats: SenderStats::default(),
        }
    }
}

impl ArqSender for GbnSender {
    fn init(&mut self, _ctx: &mut dyn ChannelPort) {
        self.window.reset();
        self.stats = SenderStats::default();
    }

    fn on_app_message(&mut self, ctx: &mut dyn ChannelPort, message: Message) -> SendOutcome {
        if self.window.is_full() {
            ctx.log("send window is full, refusing message");
            self.stats.window_full += 1;
            return SendOutcome::WindowFull;
        }

        let packet = Packet::data(self.window.next_seq(), message.data);
        ctx.log(&format!("sending packet {}", packet.seqnum));
        let was_empty = self.window.is_empty();
        self.window.push(packet);
        ctx.transmit(packet);
        if was_empty {
            ctx.start_timer(self.config.rtt);
        }
        self.stats.messages_accepted += 1;
        self.stats.packets_sent += 1;
        SendOutcome::Accepted
    }

    fn on_ack(&mut self, ctx: &mut dyn ChannelPort, packet: Packet) {
        if packet.is_corrupted() {
            ctx.log("corrupted ACK, ignoring");
            self.stats.corrupted_acks += 1;
            return;
        }
        self.stats.acks_received += 1;

        let retired = self.window.ack_cumulative(packet.acknum);
        if retired == 0 {
            ctx.log(&format!("duplicate ACK {}, ignoring", packet.acknum));
            self.stats.duplicate_acks += 1;
            return;
        }

        ctx.log(&format!(
            "ACK {} retires {} packet(s), base is now {}",
            packet.acknum,
            retired,
            self.window.base()
        ));
        self.stats.new_acks += 1;
        ctx.stop_timer();
        if !self.window.is_empty() {
            ctx.start_timer(self.config.rtt);
        }
    }

    fn on_timer(&mut self, ctx: &mut dyn ChannelPort) -> Result<(), ProtocolError> {
        ctx.log("timeout, resending every outstanding packet");
        let mut resent = 0;
        for packet in self.window.packets() {
            ctx.transmit(*packet);
            resent += 1;
        }
        self.stats.packets_resent += resent;
        // Go-Back-N has no retry ceiling; the timer is rearmed
        // unconditionally.
        ctx.start_timer(self.config.rtt);
        Ok(())
    }

    fn stats(&self) -> SenderStats {
        self.stats
    }
}

pub struct GbnReceiver {
    expected: i32,
    /// Sequence counter stamped into outgoing ACK packets.
    ack_seq: i32,
    config: ProtocolConfig,
    stats: ReceiverStats,
}

impl GbnReceiver {
    pub fn new(config: ProtocolConfig) -> Self {
        Self {
            expected: 0,
            ack_seq: 1,
            config,
            stats: ReceiverStats::default(),
        }
    }

    /// The last correctly received in-order sequence number.
    fn last_in_order(&self) -> i32 {
        (self.expected - 1).rem_euclid(self.config.seq_space)
    }

    fn send_ack(&mut self, ctx: &mut dyn ChannelPort, acknum: i32) {
        let ack = Packet::ack(self.ack_seq, acknum);
        self.ack_seq = (self.ack_seq + 1) % self.config.seq_space;
        ctx.transmit(ack);
        self.stats.acks_sent += 1;
    }
}

impl ArqReceiver for GbnReceiver {
    fn init(&mut self, _ctx: &mut dyn ChannelPort) {
        self.expected = 0;
        self.ack_seq = 1;
        self.stats = ReceiverStats::default();
    }

    fn on_packet(&mut self, ctx: &mut dyn ChannelPort, packet: Packet) {
        if packet.is_corrupted() {
            ctx.log("corrupted packet, re-ACKing last in-order seqnum");
            self.stats.corrupted += 1;
            let last = self.last_in_order();
            self.send_ack(ctx, last);
            return;
        }

        if packet.seqnum != self.expected {
            ctx.log(&format!(
                "packet {} is not the expected {}, re-ACKing {}",
                packet.seqnum,
                self.expected,
                self.last_in_order()
            ));
            self.stats.duplicates += 1;
            let last = self.last_in_order();
            self.send_ack(ctx, last);
            return;
        }

        ctx.log(&format!("packet {} received in order, delivering", packet.seqnum));
        self.stats.packets_received += 1;
        ctx.deliver_data(&packet.payload);
        self.stats.delivered += 1;
        self.expected = (self.expected + 1) % self.config.seq_space;
        self.send_ack(ctx, packet.seqnum);
    }

    fn stats(&self) -> ReceiverStats {
        self.stats
    }
}
