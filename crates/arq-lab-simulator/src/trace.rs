use serde::Serialize;
use arq_lab_abstract::{ReceiverStats, SenderStats, SimConfig};

use crate::engine::LinkEventSummary;

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub duration_ms: u64,
    pub delivered_data: Vec<Vec<u8>>,
    pub sender_packet_count: u32,
    pub sender_stats: SenderStats,
    pub receiver_stats: ReceiverStats,
    pub link_events: Vec<LinkEventSummary>,
}
