use thiserror::Error;

use crate::packet::{Message, Packet};
use crate::stats::{ReceiverStats, SenderStats};

/// The capability the channel emulator provides to a protocol state
/// machine. Handlers call these to interact with the network, the single
/// per-side retransmission timer, and the application layer above.
pub trait ChannelPort {
    /// Hand a packet to the unreliable channel. Fire-and-forget.
    fn transmit(&mut self, packet: Packet);

    /// Pass a completed, in-order payload up to the application layer.
    fn deliver_data(&mut self, payload: &[u8]);

    /// Arm this side's retransmission timer. At most one timer may be
    /// outstanding; callers must `stop_timer` before re-arming.
    fn start_timer(&mut self, duration: u64);

    /// Disarm this side's retransmission timer.
    fn stop_timer(&mut self);

    /// Log a message into the emulator's trace output.
    fn log(&mut self, message: &str);

    /// Current simulation time in ms.
    fn now(&self) -> u64;
}

/// Outcome of handing a message to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The message entered the send window and a packet was transmitted.
    Accepted,
    /// The window already held `window_size` outstanding packets; the
    /// message was refused and dropped (there is no send-side queue).
    WindowFull,
}

/// Fatal protocol failures surfaced to the harness instead of aborting
/// the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("packet {seqnum} could not be delivered after {retries} retransmissions")]
    RetryExhausted { seqnum: i32, retries: u32 },
}

/// Sender half of an ARQ variant.
pub trait ArqSender {
    /// Reset all window state to the initial sequence-number-zero
    /// configuration. Called exactly once before any other call.
    fn init(&mut self, ctx: &mut dyn ChannelPort);

    /// The application wants to send one message reliably.
    fn on_app_message(&mut self, ctx: &mut dyn ChannelPort, message: Message) -> SendOutcome;

    /// An acknowledgment (possibly corrupted or duplicated) arrived.
    fn on_ack(&mut self, ctx: &mut dyn ChannelPort, packet: Packet);

    /// The retransmission timer expired.
    fn on_timer(&mut self, ctx: &mut dyn ChannelPort) -> Result<(), ProtocolError>;

    fn stats(&self) -> SenderStats;
}

/// Receiver half of an ARQ variant. It never originates data, only
/// acknowledgments.
pub trait ArqReceiver {
    /// Reset all window state. Called exactly once before any other call.
    fn init(&mut self, ctx: &mut dyn ChannelPort);

    /// A packet (possibly corrupted, duplicated or out of order) arrived.
    fn on_packet(&mut self, ctx: &mut dyn ChannelPort, packet: Packet);

    fn stats(&self) -> ReceiverStats;
}
