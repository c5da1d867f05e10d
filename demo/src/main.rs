//! Route policy engine demo CLI.
//!
//! Runs the Junos reference scenarios, or compiles and evaluates a
//! configuration file given on the command line.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- peer-import
//!   cargo run -p demo -- compile router.toml --simplify
//!   cargo run -p demo -- eval router.toml --policy '~PEER_IMPORT:192.0.2.1~' \
//!       --prefix 203.0.113.0/24 --protocol bgp --as-path 64500,64501

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rpl_audit::{fingerprint, InMemoryDiagnostics};
use rpl_contracts::{
    decision::{Action, Direction},
    error::{RplError, RplResult},
    route::{Community, Prefix, Protocol, Route},
};
use rpl_core::{EvalOptions, Evaluator, PolicyTable};
use rpl_policy::{convert, ConfigurationInput};
use rpl_ref_junos::scenarios::{aggregate, peer_import, vrf_leak};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Route policy engine demo.
///
/// Runs the reference scenarios, or compiles a TOML configuration and
/// evaluates a single route against one of its policies.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "Route policy engine reference demo",
    long_about = "Compiles vendor policy statements into the policy IR and evaluates routes\n\
                  against them, reporting decisions, attribute writes and diagnostics."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all three reference scenarios in sequence.
    RunAll,
    /// Scenario 1: Transit peer import and export chains.
    PeerImport,
    /// Scenario 2: Aggregate contributor selection.
    Aggregate,
    /// Scenario 3: RIB group and instance-import leaking.
    VrfLeak,
    /// Compile a configuration and list its policies and diagnostics.
    Compile {
        /// TOML configuration file.
        file: PathBuf,
        /// Simplify every policy before freezing.
        #[arg(long)]
        simplify: bool,
        /// Dump the compiled policies and the diagnostic report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Evaluate one route against one policy of a configuration.
    Eval {
        /// TOML configuration file.
        file: PathBuf,
        /// Policy to evaluate, user-written or derived.
        #[arg(long)]
        policy: String,
        #[arg(long)]
        prefix: Prefix,
        #[arg(long, default_value = "bgp")]
        protocol: Protocol,
        #[arg(long, value_enum, default_value_t = DirectionArg::Import)]
        direction: DirectionArg,
        /// Comma-separated AS path, neighbor first.
        #[arg(long, value_delimiter = ',')]
        as_path: Vec<u32>,
        #[arg(long, value_delimiter = ',')]
        community: Vec<Community>,
        #[arg(long, default_value_t = 0)]
        tag: u32,
        /// Source routing instance.
        #[arg(long)]
        vrf: Option<String>,
        /// Initial default action. Defaults to the direction's convention.
        #[arg(long, value_enum)]
        default_action: Option<ActionArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Import,
    Export,
    Generation,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Import => Direction::Import,
            DirectionArg::Export => Direction::Export,
            DirectionArg::Generation => Direction::Generation,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ActionArg {
    Accept,
    Reject,
}

impl From<ActionArg> for Action {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Accept => Action::Accept,
            ActionArg::Reject => Action::Reject,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for engine tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::RunAll => {
            print_banner();
            run_all()
        }
        Command::PeerImport => {
            print_banner();
            peer_import::run_scenario()
        }
        Command::Aggregate => {
            print_banner();
            aggregate::run_scenario()
        }
        Command::VrfLeak => {
            print_banner();
            vrf_leak::run_scenario()
        }
        Command::Compile { file, simplify, json } => run_compile(&file, simplify, json),
        Command::Eval {
            file,
            policy,
            prefix,
            protocol,
            direction,
            as_path,
            community,
            tag,
            vrf,
            default_action,
        } => {
            let mut route = Route::new(prefix, protocol)
                .with_as_path(as_path)
                .with_communities(community)
                .with_tag(tag);
            route.source_vrf = vrf;
            let options = EvalOptions {
                default_action: default_action.map(Action::from),
                ..EvalOptions::default()
            };
            run_eval(&file, &policy, &route, direction.into(), options)
        }
    };

    if let Err(e) = result {
        eprintln!("Demo error: {}", e);
        std::process::exit(1);
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

fn run_all() -> RplResult<()> {
    peer_import::run_scenario()?;
    aggregate::run_scenario()?;
    vrf_leak::run_scenario()?;
    println!("All scenarios completed successfully.");
    Ok(())
}

// ── Ad-hoc configurations ─────────────────────────────────────────────────────

fn load(file: &Path, simplify: bool, diagnostics: &InMemoryDiagnostics) -> RplResult<PolicyTable> {
    let mut input = ConfigurationInput::from_file(file)?;
    input.simplify |= simplify;
    let table = convert(&input, diagnostics)?;
    info!(file = %file.display(), policies = table.len(), "configuration loaded");
    Ok(table)
}

fn run_compile(file: &Path, simplify: bool, json: bool) -> RplResult<()> {
    let diagnostics = InMemoryDiagnostics::new();
    let table = load(file, simplify, &diagnostics)?;
    let report = diagnostics.export_report(Some(fingerprint(&table)));

    if json {
        let policies: Vec<_> = table.iter().collect();
        let dump = serde_json::json!({ "policies": policies, "report": report });
        let rendered = serde_json::to_string_pretty(&dump).map_err(|e| RplError::ConfigError {
            reason: format!("failed to serialize compiled policies: {}", e),
        })?;
        println!("{}", rendered);
        return Ok(());
    }

    for policy in table.iter() {
        let sources: Vec<&str> = policy.sources.iter().map(String::as_str).collect();
        println!(
            "{:<40} {:>3} statement(s)  sources: {}",
            policy.name,
            policy.statements.len(),
            if sources.is_empty() { "-".to_string() } else { sources.join(", ") }
        );
    }
    println!();
    for diagnostic in &report.diagnostics {
        println!("warning: {}", diagnostic);
    }
    println!("fingerprint: {}", report.table_fingerprint.as_deref().unwrap_or("-"));
    Ok(())
}

fn run_eval(file: &Path, policy: &str, route: &Route, direction: Direction, options: EvalOptions) -> RplResult<()> {
    let diagnostics = InMemoryDiagnostics::new();
    let table = load(file, false, &diagnostics)?;
    if table.id_of(policy).is_none() {
        return Err(RplError::UnknownPolicy { name: policy.to_string() });
    }

    let evaluator = Evaluator::new(&table, &diagnostics).with_options(options);
    let decision = evaluator.evaluate_policy(policy, route, direction)?;
    let rendered = serde_json::to_string_pretty(&decision).map_err(|e| RplError::ConfigError {
        reason: format!("failed to serialize decision: {}", e),
    })?;
    println!("{}", rendered);

    for diagnostic in diagnostics.snapshot() {
        eprintln!("warning: {}", diagnostic);
    }
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("Route Policy Engine");
    println!("Junos Reference Demo");
    println!("====================");
    println!();
    println!("Per configuration:");
    println!("  [1] Policy statements compile term by term into the policy IR");
    println!("  [2] Derived policies wire peers, aggregates and instances to user policies");
    println!("  [3] The registry freezes, linking references and reporting dangling ones");
    println!("  [4] Routes evaluate to accept/reject plus attribute writes");
    println!("  [5] The table fingerprint seals the diagnostic report");
    println!();
}
