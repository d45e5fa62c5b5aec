pub mod checksum;
pub mod config;
pub mod interface;
pub mod packet;
pub mod scenario;
pub mod stats;

pub use interface::{ArqReceiver, ArqSender, ChannelPort, ProtocolError, SendOutcome};
pub use packet::{Message, Packet, NOT_IN_USE, PAYLOAD_LEN};

pub use config::{ProtocolConfig, SimConfig};
pub use scenario::{SimConfigOverride, TestAction, TestAssertion, TestScenario};
pub use stats::{ReceiverStats, SenderStats};
