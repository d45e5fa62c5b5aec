use serde::Serialize;

/// Observability counters kept by every sender variant.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct SenderStats {
    pub messages_accepted: u64,
    /// Application sends refused because the window was full.
    pub window_full: u64,
    /// Uncorrupted ACKs seen, new or duplicate.
    pub acks_received: u64,
    pub new_acks: u64,
    pub duplicate_acks: u64,
    pub corrupted_acks: u64,
    pub packets_sent: u64,
    pub packets_resent: u64,
}

/// Observability counters kept by every receiver variant.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct ReceiverStats {
    /// New, uncorrupted in-window packets accepted.
    pub packets_received: u64,
    pub duplicates: u64,
    pub corrupted: u64,
    pub out_of_window: u64,
    pub acks_sent: u64,
    /// Payloads handed up to the application, each exactly once.
    pub delivered: u64,
}
