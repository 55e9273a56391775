use upgrade_core::test_harness::{run_simulator, Scenario, SimulatorConfig};
use upgrade_core::workflow::WorkflowPhase;

fn config(seed: u64, runs: u64) -> SimulatorConfig {
    SimulatorConfig {
        seed,
        runs,
        ..SimulatorConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_simulator_passes() {
    let report = run_simulator(config(42, 40)).await;

    println!("{}", report.generate_text());
    assert!(report.passed(), "violations: {:?}", report.violations);
    assert_eq!(report.stats.runs, 40);
    assert_eq!(
        report.stats.completed + report.stats.errored + report.stats.canceled,
        40
    );
}

#[tokio::test(start_paused = true)]
async fn test_simulator_other_seeds() {
    for seed in [1, 7, 1234] {
        let report = run_simulator(config(seed, 20)).await;
        assert!(report.passed(), "seed {seed}: {:?}", report.violations);
    }
}

#[tokio::test(start_paused = true)]
async fn test_simulator_is_reproducible() {
    let first = run_simulator(config(99, 15)).await;
    let second = run_simulator(config(99, 15)).await;

    assert_eq!(first.stats.completed, second.stats.completed);
    assert_eq!(first.stats.errored, second.stats.errored);
    assert_eq!(first.stats.canceled, second.stats.canceled);
    assert_eq!(first.stats.free_tier_requests, second.stats.free_tier_requests);
}

#[tokio::test(start_paused = true)]
async fn test_report_serializes() {
    let report = run_simulator(config(5, 3)).await;
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["config"]["seed"], 5);
    assert_eq!(json["stats"]["runs"], 3);
    assert!(json["violations"].as_array().unwrap().is_empty());
}

#[test]
fn test_scenario_outcomes() {
    let complete = Scenario::ALL
        .into_iter()
        .filter(|s| s.expected_phase() == WorkflowPhase::Complete)
        .count();
    assert_eq!(complete, 3);
    assert!(Scenario::ALL
        .into_iter()
        .all(|s| s.expected_phase().is_terminal()));
}
