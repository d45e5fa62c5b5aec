//! The two ARQ sender/receiver pairs: Go-Back-N and Selective Repeat.
//!
//! Both share the packet/checksum data model and the sliding-window
//! containers in [`window`]; they differ only in ACK semantics (cumulative
//! vs per-packet), retransmission scope (all outstanding vs the window
//! front) and the receiver's treatment of corrupted or unexpected
//! packets.

pub mod gbn;
pub mod sr;
mod window;

#[cfg(test)]
pub(crate) mod testing;

use anyhow::Result;
use arq_lab_abstract::{ArqReceiver, ArqSender, ProtocolConfig};

pub use gbn::{GbnReceiver, GbnSender};
pub use sr::{SrReceiver, SrSender};

/// Which protocol pair to run. Either variant can be swapped in without
/// touching the channel emulator or the event dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    GoBackN,
    SelectiveRepeat,
}

/// Map a user-visible variant name to the enum used by the harness.
pub fn variant_by_name(name: &str) -> Result<Variant> {
    match name {
        "gbn" | "go-back-n" => Ok(Variant::GoBackN),
        "sr" | "selective-repeat" => Ok(Variant::SelectiveRepeat),
        other => anyhow::bail!("Unknown variant '{other}'. Try 'gbn' or 'sr'."),
    }
}

/// Build a matching sender/receiver pair for `variant`.
pub fn build_pair(
    variant: Variant,
    config: ProtocolConfig,
) -> (Box<dyn ArqSender>, Box<dyn ArqReceiver>) {
    match variant {
        Variant::GoBackN => (
            Box::new(GbnSender::new(config)),
            Box::new(GbnReceiver::new(config)),
        ),
        Variant::SelectiveRepeat => (
            Box::new(SrSender::new(config)),
            Box::new(SrReceiver::new(config)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_names_resolve() {
        assert_eq!(variant_by_name("gbn").unwrap(), Variant::GoBackN);
        assert_eq!(variant_by_name("sr").unwrap(), Variant::SelectiveRepeat);
        assert!(variant_by_name("tcp").is_err());
    }
}
