//! Executes a TOML test scenario against a sender/receiver pair and
//! checks its assertions.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

use arq_lab_abstract::{
    ArqReceiver, ArqSender, Message, SimConfig, TestAction, TestAssertion, TestScenario,
};

use crate::engine::Simulator;
use crate::trace::SimulationReport;

pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    let scenario: TestScenario =
        toml::from_str(&content).context("Failed to parse scenario file")?;
    Ok(scenario)
}

pub fn run_scenario(
    path: &Path,
    sender: Box<dyn ArqSender>,
    receiver: Box<dyn ArqReceiver>,
) -> Result<SimulationReport> {
    let scenario = load_scenario(path)?;
    run_parsed_scenario(&scenario, sender, receiver)
}

pub fn run_parsed_scenario(
    scenario: &TestScenario,
    sender: Box<dyn ArqSender>,
    receiver: Box<dyn ArqReceiver>,
) -> Result<SimulationReport> {
    info!("Running scenario '{}': {}", scenario.name, scenario.description);

    let mut config = SimConfig::default();
    scenario.config.apply_to(&mut config);
    anyhow::ensure!(
        config.min_latency <= config.max_latency,
        "min_latency ({}) must not exceed max_latency ({})",
        config.min_latency,
        config.max_latency
    );
    let mut sim = Simulator::new(config, sender, receiver);
    configure_actions(&mut sim, &scenario.actions);

    sim.run_until_complete()
        .with_context(|| format!("Scenario '{}' hit a fatal protocol failure", scenario.name))?;

    let report = sim.export_report();
    check_assertions(scenario, &report)?;
    info!("Scenario '{}' passed", scenario.name);
    Ok(report)
}

pub fn configure_actions(sim: &mut Simulator, actions: &[TestAction]) {
    for action in actions {
        match action {
            TestAction::AppSend { time, data } => {
                sim.schedule_app_send(*time, data.as_bytes().to_vec());
            }
            TestAction::DropNextFromSenderSeq { seq } => {
                sim.add_drop_sender_seq_once(*seq);
            }
            TestAction::DropNextFromReceiverAck { ack } => {
                sim.add_drop_receiver_ack_once(*ack);
            }
        }
    }
}

fn check_assertions(scenario: &TestScenario, report: &SimulationReport) -> Result<()> {
    for assertion in &scenario.assertions {
        match assertion {
            TestAssertion::DataDelivered { data } => {
                // Delivered payloads are padded to the fixed length.
                let expected = Message::from_bytes(data.as_bytes()).data.to_vec();
                anyhow::ensure!(
                    report.delivered_data.contains(&expected),
                    "'{data}' was never delivered to the application"
                );
            }
            TestAssertion::DeliveredCount { expected } => {
                anyhow::ensure!(
                    report.delivered_data.len() == *expected,
                    "expected {expected} deliveries, saw {}",
                    report.delivered_data.len()
                );
            }
            TestAssertion::SenderPacketCount { min, max } => {
                anyhow::ensure!(
                    report.sender_packet_count >= *min,
                    "sender sent {} packets, expected at least {min}",
                    report.sender_packet_count
                );
                if let Some(max) = max {
                    anyhow::ensure!(
                        report.sender_packet_count <= *max,
                        "sender sent {} packets, expected at most {max}",
                        report.sender_packet_count
                    );
                }
            }
            TestAssertion::MaxDuration { ms } => {
                anyhow::ensure!(
                    report.duration_ms <= *ms,
                    "simulation took {}ms, expected at most {ms}ms",
                    report.duration_ms
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arq_lab_abstract::ProtocolConfig;
    use arq_lab_protocols::{build_pair, Variant};
    use std::path::PathBuf;

    /// The scenario files shipped at the workspace root, so the tests
    /// exercise exactly what `--scenario` users run.
    fn scenario_path(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../scenarios")
            .join(name)
    }

    #[test]
    fn shipped_sr_scenario_passes() {
        let (sender, receiver) = build_pair(Variant::SelectiveRepeat, ProtocolConfig::default());
        let report =
            run_scenario(&scenario_path("sr_drop_data.toml"), sender, receiver).unwrap();
        assert_eq!(report.delivered_data.len(), 3);
    }

    #[test]
    fn shipped_gbn_scenario_passes() {
        let (sender, receiver) = build_pair(Variant::GoBackN, ProtocolConfig::default());
        let report =
            run_scenario(&scenario_path("gbn_drop_ack.toml"), sender, receiver).unwrap();
        assert_eq!(report.delivered_data.len(), 2);
    }

    #[test]
    fn failed_assertion_is_an_error() {
        let mut scenario = load_scenario(&scenario_path("sr_drop_data.toml")).unwrap();
        scenario
            .assertions
            .push(TestAssertion::DeliveredCount { expected: 99 });
        let (sender, receiver) = build_pair(Variant::SelectiveRepeat, ProtocolConfig::default());
        assert!(run_parsed_scenario(&scenario, sender, receiver).is_err());
    }

    #[test]
    fn inverted_latency_bounds_are_rejected() {
        let mut scenario = load_scenario(&scenario_path("sr_drop_data.toml")).unwrap();
        scenario.config.min_latency = Some(50);
        scenario.config.max_latency = Some(10);
        let (sender, receiver) = build_pair(Variant::SelectiveRepeat, ProtocolConfig::default());
        let err = run_parsed_scenario(&scenario, sender, receiver).unwrap_err();
        assert!(err.to_string().contains("max_latency"));
    }
}
