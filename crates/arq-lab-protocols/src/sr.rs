//! Selective Repeat: per-packet ACKs, retransmission of only the window
//! front on timeout (with a fatal retry ceiling), and a receiver that
//! buffers out-of-order arrivals for in-order delivery.

use arq_lab_abstract::{
    ArqReceiver, ArqSender, ChannelPort, Message, Packet, ProtocolConfig, ProtocolError,
    ReceiverStats, SendOutcome, SenderStats,
};

use crate::window::{RecvWindow, SelectiveAck, SendWindow};

pub struct SrSender {
    window: SendWindow,
    config: ProtocolConfig,
    stats: SenderStats,
}

impl SrSender {
    pub fn new(config: ProtocolConfig) -> Self {
        Self {
            window: SendWindow::new(config.window_size, config.seq_space),
            config,
            stats: SenderStats::default(),
        }
    }
}

impl ArqSender for SrSender {
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
        // base == next_seq exactly when nothing is outstanding.
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

        match self.window.ack_selective(packet.acknum) {
            SelectiveAck::OutOfWindow => {
                ctx.log(&format!("ACK {} is outside the window, ignoring", packet.acknum));
            }
            SelectiveAck::Duplicate => {
                ctx.log(&format!("duplicate ACK {}, ignoring", packet.acknum));
                self.stats.duplicate_acks += 1;
            }
            SelectiveAck::New { retired } => {
                ctx.log(&format!(
                    "ACK {} marked, {} slot(s) retired, base is now {}",
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
        }
    }

    fn on_timer(&mut self, ctx: &mut dyn ChannelPort) -> Result<(), ProtocolError> {
        let max_retries = self.config.max_retries;
        let rtt = self.config.rtt;
        let Some(slot) = self.window.front_mut() else {
            return Ok(());
        };
        if slot.retries >= max_retries {
            return Err(ProtocolError::RetryExhausted {
                seqnum: slot.packet.seqnum,
                retries: slot.retries,
            });
        }
        slot.retries += 1;
        let packet = slot.packet;
        ctx.log(&format!(
            "timeout, resending packet {} (attempt {})",
            packet.seqnum, slot.retries
        ));
        ctx.transmit(packet);
        self.stats.packets_resent += 1;
        ctx.start_timer(rtt);
        Ok(())
    }

    fn stats(&self) -> SenderStats {
        self.stats
    }
}

pub struct SrReceiver {
    window: RecvWindow,
    /// Sequence counter stamped into outgoing ACK packets.
    ack_seq: i32,
    config: ProtocolConfig,
    stats: ReceiverStats,
}

impl SrReceiver {
    pub fn new(config: ProtocolConfig) -> Self {
        Self {
            window: RecvWindow::new(config.window_size, config.seq_space),
            ack_seq: 1,
            config,
            stats: ReceiverStats::default(),
        }
    }

    fn send_ack(&mut self, ctx: &mut dyn ChannelPort, acknum: i32) {
        let ack = Packet::ack(self.ack_seq, acknum);
        self.ack_seq = (self.ack_seq + 1) % self.config.seq_space;
        ctx.transmit(ack);
        self.stats.acks_sent += 1;
    }
}

impl ArqReceiver for SrReceiver {
    fn init(&mut self, _ctx: &mut dyn ChannelPort) {
        self.window.reset();
        self.ack_seq = 1;
        self.stats = ReceiverStats::default();
    }

    fn on_packet(&mut self, ctx: &mut dyn ChannelPort, packet: Packet) {
        // Unlike Go-Back-N, a corrupted packet earns no ACK at all.
        if packet.is_corrupted() {
            ctx.log("corrupted packet, discarding");
            self.stats.corrupted += 1;
            return;
        }

        if !self.window.in_window(packet.seqnum) {
            ctx.log(&format!(
                "packet {} is outside [{}, {}+{}), ignoring",
                packet.seqnum,
                self.window.expected(),
                self.window.expected(),
                self.config.window_size
            ));
            self.stats.out_of_window += 1;
            return;
        }

        let is_new = self.window.insert(packet);
        if is_new {
            if packet.seqnum == self.window.expected() {
                ctx.log(&format!("packet {} received in order", packet.seqnum));
            } else {
                ctx.log(&format!("packet {} received out of order, buffered", packet.seqnum));
            }
            self.stats.packets_received += 1;
        } else {
            ctx.log(&format!("duplicate packet {}, re-ACKing", packet.seqnum));
            self.stats.duplicates += 1;
        }

        // ACK the exact seqnum we got, new or duplicate.
        self.send_ack(ctx, packet.seqnum);

        if is_new {
            for ready in self.window.take_ready() {
                ctx.deliver_data(&ready.payload);
                self.stats.delivered += 1;
            }
        }
    }

    fn stats(&self) -> ReceiverStats {
        self.stats
    }
}
