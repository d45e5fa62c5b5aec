use serde::{Deserialize, Serialize};

/// Protocol constants shared by a sender/receiver pair.
///
/// The defaults reproduce the reference assignment constants. Note that
/// `seq_space = 7` with `window_size = 6` satisfies the Go-Back-N
/// requirement (window + 1) but not the Selective Repeat requirement
/// (2 x window): a retransmitted old packet can alias a new sequence
/// number after wraparound. This is a known latent defect of the
/// reference constants, kept rather than silently widened; pass a larger
/// `seq_space` to avoid it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Maximum number of outstanding (sender) or buffered (receiver) packets.
    pub window_size: usize,
    /// Size of the modular sequence-number space.
    pub seq_space: i32,
    /// Fixed retransmission timeout, in simulated milliseconds.
    pub rtt: u64,
    /// Selective Repeat only: retransmissions of a single packet beyond
    /// this ceiling are a fatal protocol failure.
    pub max_retries: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            window_size: 6,
            seq_space: 7,
            rtt: 16,
            max_retries: 10,
        }
    }
}

/// Channel emulation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub loss_rate: f64,
    pub corrupt_rate: f64,
    pub min_latency: u64,
    pub max_latency: u64,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        // One-way delay well under ProtocolConfig::default().rtt, matching
        // the reference emulator's "average five time units".
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            min_latency: 1,
            max_latency: 7,
            seed: 0,
        }
    }
}
