//! Upgrade Workflow Simulator
//!
//! Runs seeded, randomized workflows against [`SimulatedBackground`] and
//! checks the controller's invariants after each run:
//! - the run ends in the phase its scenario implies
//! - every refresh timer start is matched by exactly one stop
//! - a cancel signal is sent exactly once unless the upgrade completed
//! - the free tier is only requested for small orgs without SSO
//! - a stale session response never replaces the current selection's archive

use super::{importable_session, known_account, RemoteScript, SimulatedBackground};
use crate::background::ErrorPayload;
use crate::config::WorkflowConfig;
use crate::error::WorkflowError;
use crate::plan::PlanChoice;
use crate::timer::TimerStats;
use crate::workflow::{JournalKind, UpgradeController, UserAction, WorkflowPhase};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use upgrade_model::{AccountId, LegacyUpgrade};

/// Simulator configuration
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Workflows to run
    pub runs: u64,
    pub stop_on_first_violation: bool,
    /// Refresh timer period used by simulated controllers
    pub refresh_interval_ms: u64,
    /// Upper bound for the remote side's per-stage delay
    pub max_step_delay_ms: u64,
    /// A run still live after this long is a violation
    pub run_deadline_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            runs: 100,
            stop_on_first_violation: false,
            refresh_interval_ms: 5,
            max_step_delay_ms: 10,
            run_deadline_ms: 5_000,
        }
    }
}

/// Workflow shapes the simulator draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    NewAccount,
    ExistingAccount,
    StaleSelection,
    CatalogFailure,
    DecryptFailure,
    RemoteFailure,
    CancelWhilePreparing,
    CancelWhileImporting,
}

impl Scenario {
    pub const ALL: [Scenario; 8] = [
        Scenario::NewAccount,
        Scenario::ExistingAccount,
        Scenario::StaleSelection,
        Scenario::CatalogFailure,
        Scenario::DecryptFailure,
        Scenario::RemoteFailure,
        Scenario::CancelWhilePreparing,
        Scenario::CancelWhileImporting,
    ];

    /// Phase the run must end in
    #[must_use]
    pub fn expected_phase(self) -> WorkflowPhase {
        match self {
            Scenario::NewAccount | Scenario::ExistingAccount | Scenario::StaleSelection => {
                WorkflowPhase::Complete
            }
            Scenario::CatalogFailure | Scenario::DecryptFailure | Scenario::RemoteFailure => {
                WorkflowPhase::Errored
            }
            Scenario::CancelWhilePreparing | Scenario::CancelWhileImporting => {
                WorkflowPhase::Canceled
            }
        }
    }
}

/// A violation detected during simulation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Violation {
    UnexpectedPhase {
        run: u64,
        scenario: Scenario,
        expected: WorkflowPhase,
        actual: WorkflowPhase,
    },
    /// Timer starts and stops do not match, or it outlived the workflow
    TimerLeak {
        run: u64,
        scenario: Scenario,
        starts: u64,
        stops: u64,
    },
    /// Timer started although no import was ever reported
    TimerStartedWithoutImport { run: u64, scenario: Scenario },
    CancelCount {
        run: u64,
        scenario: Scenario,
        expected: usize,
        actual: usize,
    },
    FreeTierMisoffered {
        run: u64,
        num_users: u32,
        sso: bool,
    },
    StaleArchiveApplied { run: u64 },
    Timeout { run: u64, scenario: Scenario },
    Workflow {
        run: u64,
        scenario: Scenario,
        error: String,
    },
}

/// Statistics for simulation
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulatorStats {
    pub runs: u64,
    pub completed: u64,
    pub errored: u64,
    pub canceled: u64,
    pub free_tier_requests: u64,
    pub stale_responses_discarded: u64,
    pub timer_starts: u64,
}

/// Final report from simulator
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorReport {
    pub config: SimulatorConfig,
    pub stats: SimulatorStats,
    pub violations: Vec<Violation>,
}

impl SimulatorReport {
    /// Check if simulation passed all criteria
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Upgrade Workflow Simulator Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.config.seed));
        report.push_str(&format!("Runs: {}\n", self.stats.runs));
        report.push_str(&format!("Completed: {}\n", self.stats.completed));
        report.push_str(&format!("Errored: {}\n", self.stats.errored));
        report.push_str(&format!("Canceled: {}\n", self.stats.canceled));
        report.push_str(&format!("Free Tier Requests: {}\n", self.stats.free_tier_requests));
        report.push_str(&format!(
            "Stale Responses Discarded: {}\n",
            self.stats.stale_responses_discarded
        ));
        report.push_str(&format!("Timer Starts: {}\n", self.stats.timer_starts));
        report.push_str(&format!("Violations: {}\n", self.violations.len()));

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {:?}\n", i + 1, v));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));

        report
    }
}

/// Parameters drawn for one run
#[derive(Debug, Clone, Copy)]
struct RunPlan {
    scenario: Scenario,
    num_users: u32,
    sso: bool,
    prefer_free_tier: bool,
    step_delay: Duration,
}

const DESTINATION: &str = "dest";
const SLOW_DESTINATION: &str = "slow";

/// Run the simulator
pub async fn run_simulator(config: SimulatorConfig) -> SimulatorReport {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut stats = SimulatorStats::default();
    let mut violations = Vec::new();

    for run in 0..config.runs {
        let plan = RunPlan {
            scenario: Scenario::ALL[rng.gen_range(0..Scenario::ALL.len())],
            num_users: rng.gen_range(1..=12),
            sso: rng.gen_bool(0.3),
            prefer_free_tier: rng.gen_bool(0.5),
            step_delay: Duration::from_millis(rng.gen_range(1..=config.max_step_delay_ms.max(1))),
        };
        debug!(run, ?plan, "Simulating workflow");

        let found = simulate_run(&config, run, plan, &mut stats).await;
        stats.runs += 1;

        let stop = config.stop_on_first_violation && !found.is_empty();
        violations.extend(found);
        if stop {
            break;
        }
    }

    SimulatorReport {
        config,
        stats,
        violations,
    }
}

async fn simulate_run(
    config: &SimulatorConfig,
    run: u64,
    plan: RunPlan,
    stats: &mut SimulatorStats,
) -> Vec<Violation> {
    let scenario = plan.scenario;
    let background = build_background(plan);
    let legacy = LegacyUpgrade::new(plan.num_users, "encrypted", "key");
    let accounts = vec![
        known_account(DESTINATION, 5),
        known_account(SLOW_DESTINATION, 30),
    ];
    let workflow_config =
        WorkflowConfig::new().with_refresh_interval(Duration::from_millis(config.refresh_interval_ms));

    let mut controller =
        match UpgradeController::new(background.clone(), workflow_config, Some(legacy), accounts) {
            Ok(controller) => controller,
            Err(e) => return vec![workflow_violation(run, scenario, &e)],
        };

    let deadline = Duration::from_millis(config.run_deadline_ms);
    let mut violations = Vec::new();

    match tokio::time::timeout(deadline, drive(&mut controller, plan)).await {
        Err(_) => violations.push(Violation::Timeout { run, scenario }),
        Ok(Err(e)) => violations.push(workflow_violation(run, scenario, &e)),
        Ok(Ok(())) => {}
    }

    let phase = controller.phase();
    if scenario == Scenario::StaleSelection && phase == WorkflowPhase::Complete {
        let upgraded_into = controller.request().and_then(|r| r.account_id().cloned());
        if upgraded_into != Some(AccountId::new(DESTINATION)) {
            violations.push(Violation::StaleArchiveApplied { run });
        }
    }
    if let Some(request) = controller.request() {
        if request.free_tier() {
            stats.free_tier_requests += 1;
            let users = controller.projected_users();
            if users > 3 || request.sso_enabled() {
                violations.push(Violation::FreeTierMisoffered {
                    run,
                    num_users: users,
                    sso: request.sso_enabled(),
                });
            }
        }
    }
    stats.stale_responses_discarded += controller
        .journal()
        .count(|k| matches!(k, JournalKind::StaleResponse { .. })) as u64;

    let timer = controller.timer_stats();
    stats.timer_starts += timer.starts;
    if phase.is_terminal() {
        violations.extend(check_timer(run, scenario, timer, controller.timer_active()));
    }
    if scenario == Scenario::CatalogFailure && timer.starts > 0 {
        violations.push(Violation::TimerStartedWithoutImport { run, scenario });
    }

    controller.shutdown().await;
    violations.extend(check_outcome(run, scenario, phase, &background));
    match phase {
        WorkflowPhase::Complete => stats.completed += 1,
        WorkflowPhase::Errored => stats.errored += 1,
        WorkflowPhase::Canceled => stats.canceled += 1,
        _ => {}
    }
    violations
}

fn check_outcome(
    run: u64,
    scenario: Scenario,
    phase: WorkflowPhase,
    background: &SimulatedBackground,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    let expected = scenario.expected_phase();
    if phase != expected {
        violations.push(Violation::UnexpectedPhase {
            run,
            scenario,
            expected,
            actual: phase,
        });
    }

    let expected_cancels = usize::from(phase != WorkflowPhase::Complete);
    let actual = background.cancel_count();
    if actual != expected_cancels {
        violations.push(Violation::CancelCount {
            run,
            scenario,
            expected: expected_cancels,
            actual,
        });
    }
    violations
}

fn check_timer(run: u64, scenario: Scenario, stats: TimerStats, active: bool) -> Option<Violation> {
    (active || !stats.balanced()).then_some(Violation::TimerLeak {
        run,
        scenario,
        starts: stats.starts,
        stops: stats.stops,
    })
}

fn workflow_violation(run: u64, scenario: Scenario, error: &WorkflowError) -> Violation {
    Violation::Workflow {
        run,
        scenario,
        error: error.to_string(),
    }
}

fn build_background(plan: RunPlan) -> Arc<SimulatedBackground> {
    let mut builder = SimulatedBackground::builder()
        .session(importable_session(DESTINATION, 0))
        .cached_session(importable_session(SLOW_DESTINATION, 0))
        .session_delay(SLOW_DESTINATION, plan.step_delay * 20)
        .script(RemoteScript::happy_path(plan.step_delay));

    builder = match plan.scenario {
        Scenario::CatalogFailure => builder.catalog_failure("v1 upgrade - billing unavailable"),
        Scenario::DecryptFailure => builder.decrypt_failure("v1 upgrade - wrong encryption key"),
        Scenario::RemoteFailure => builder.script(RemoteScript::failing(
            plan.step_delay,
            ErrorPayload::message("v1 upgrade - org registration failed"),
        )),
        Scenario::CancelWhileImporting => builder.script(RemoteScript::stalled(plan.step_delay)),
        _ => builder,
    };
    builder.build()
}

/// Drive one workflow to its terminal phase
async fn drive(controller: &mut UpgradeController, plan: RunPlan) -> Result<(), WorkflowError> {
    controller.begin()?;

    if plan.scenario == Scenario::CancelWhilePreparing {
        return controller.act(UserAction::Cancel).await;
    }

    controller
        .run_until(|c| c.phase() != WorkflowPhase::Preparing)
        .await?;
    if controller.phase().is_terminal() {
        return Ok(());
    }

    controller.act(UserAction::SetSso(plan.sso)).await?;

    match plan.scenario {
        Scenario::NewAccount | Scenario::RemoteFailure | Scenario::CancelWhileImporting => {
            controller
                .act(UserAction::SetDeviceName("sim-device".into()))
                .await?;
            let free_offered = controller.plan_options().is_some_and(|o| o.free_tier);
            if plan.prefer_free_tier && free_offered {
                controller
                    .act(UserAction::ChoosePlan(PlanChoice::FreeTier))
                    .await?;
            }
        }
        Scenario::StaleSelection => {
            controller
                .act(UserAction::SelectAccount(Some(AccountId::new(SLOW_DESTINATION))))
                .await?;
            select_destination(controller).await?;
        }
        Scenario::ExistingAccount | Scenario::DecryptFailure => {
            select_destination(controller).await?;
            if controller.phase().is_terminal() {
                return Ok(());
            }
        }
        Scenario::CatalogFailure | Scenario::CancelWhilePreparing => {}
    }

    controller.act(UserAction::Submit).await?;

    if plan.scenario == Scenario::CancelWhileImporting {
        controller
            .run_until(|c| c.phase() != WorkflowPhase::Upgrading)
            .await?;
        if controller.phase() == WorkflowPhase::Importing {
            controller.act(UserAction::Cancel).await?;
        }
        return Ok(());
    }

    controller.run_until(|c| c.phase().is_terminal()).await
}

async fn select_destination(controller: &mut UpgradeController) -> Result<(), WorkflowError> {
    controller
        .act(UserAction::SelectAccount(Some(AccountId::new(DESTINATION))))
        .await?;
    controller
        .run_until(|c| c.archive().is_some() || c.phase().is_terminal())
        .await
}
