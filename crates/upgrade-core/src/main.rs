use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use upgrade_core::plan::{PlanOptions, PlanSelector};
use upgrade_core::test_harness::{run_simulator, sample_catalog, SimulatorConfig};
use upgrade_core::WorkflowConfig;
use upgrade_model::{BillingCatalog, BillingInterval};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Command::new("upgrade-sim")
        .version(upgrade_core::VERSION)
        .about("Legacy upgrade workflow simulator and plan calculator")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Workflow configuration (TOML)"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run randomized workflows and check controller invariants")
                .arg(
                    Arg::new("runs")
                        .long("runs")
                        .default_value("100")
                        .value_parser(value_parser!(u64))
                        .help("Number of workflows to simulate"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("stop-on-violation")
                        .long("stop-on-violation")
                        .action(ArgAction::SetTrue)
                        .help("Stop simulation on first violation"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("plans")
                .about("Show the plans and price offered for an org")
                .arg(
                    Arg::new("users")
                        .long("users")
                        .required(true)
                        .value_parser(value_parser!(u32))
                        .help("Number of users in the upgraded org"),
                )
                .arg(
                    Arg::new("sso")
                        .long("sso")
                        .action(ArgAction::SetTrue)
                        .help("Require SSO"),
                )
                .arg(
                    Arg::new("interval")
                        .long("interval")
                        .default_value("month")
                        .value_parser(value_parser!(BillingInterval))
                        .help("Billing interval: month or year"),
                )
                .arg(
                    Arg::new("catalog")
                        .long("catalog")
                        .value_parser(value_parser!(PathBuf))
                        .help("Billing catalog (JSON); defaults to the sample catalog"),
                ),
        );

    let matches = cli.get_matches();
    let config = load_config(matches.get_one::<PathBuf>("config")).await?;

    match matches.subcommand() {
        Some(("simulate", args)) => simulate(args, &config).await,
        Some(("plans", args)) => plans(args, &config).await,
        _ => {
            println!("No command given. Use --help for usage.");
            Ok(())
        }
    }
}

async fn load_config(path: Option<&PathBuf>) -> anyhow::Result<WorkflowConfig> {
    match path {
        Some(path) => WorkflowConfig::load(path)
            .await
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(WorkflowConfig::default()),
    }
}

async fn simulate(args: &ArgMatches, config: &WorkflowConfig) -> anyhow::Result<()> {
    let runs = args.get_one::<u64>("runs").copied().unwrap_or(100);
    let seed = args.get_one::<u64>("seed").copied().unwrap_or(42);
    let json = args.get_flag("json");

    let sim_config = SimulatorConfig {
        seed,
        runs,
        stop_on_first_violation: args.get_flag("stop-on-violation"),
        refresh_interval_ms: config.refresh_interval_ms.min(50),
        ..SimulatorConfig::default()
    };

    if !json {
        println!("Running upgrade workflow simulator...");
        println!("Runs: {runs}");
        println!("Seed: {seed}");
        println!();
    }

    let report = run_simulator(sim_config).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.generate_text());
    }

    std::process::exit(if report.passed() { 0 } else { 1 });
}

async fn plans(args: &ArgMatches, config: &WorkflowConfig) -> anyhow::Result<()> {
    let users = args
        .get_one::<u32>("users")
        .copied()
        .context("--users is required")?;
    let sso = args.get_flag("sso");
    let interval = args
        .get_one::<BillingInterval>("interval")
        .copied()
        .unwrap_or_default();

    let catalog = match args.get_one::<PathBuf>("catalog") {
        Some(path) => load_catalog(path).await?,
        None => sample_catalog(),
    };
    let pricing = config.pricing()?;
    let options = PlanOptions::compute(&catalog, &pricing, users, sso, interval);

    println!("Users: {users}");
    println!("SSO: {}", if sso { "required" } else { "not required" });
    println!("Discount: pay {}% of list price", options.discount.percent());
    println!();

    match &options.default {
        Some(plan) => println!(
            "Default: {} ({} {}, list {})",
            plan.product.display_name(),
            plan.price.amount.discounted(options.discount),
            interval.per_label(),
            plan.price.amount
        ),
        None => println!("Default: no product accommodates this org"),
    }
    if let Some(plan) = &options.alternative {
        println!(
            "Alternative: {} ({} {}, list {})",
            plan.product.display_name(),
            plan.price.amount.discounted(options.discount),
            interval.per_label(),
            plan.price.amount
        );
    }
    println!(
        "Free tier: {}",
        if options.free_tier { "offered" } else { "not offered" }
    );

    if let Some(quote) = PlanSelector::new().quote(&options) {
        println!();
        println!("Selected: {quote}");
    }
    Ok(())
}

async fn load_catalog(path: &Path) -> anyhow::Result<BillingCatalog> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    BillingCatalog::from_json(&content).with_context(|| format!("parsing {}", path.display()))
}
