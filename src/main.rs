use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nested_subsets::{
    audit_subset, list_runs, open_ledger, run_build, verify_nested, InclusionPolicy, OrderStrategy,
    SubsetConfig, SubsetError, VerifyOptions,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nested-subsets", version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build one subset directory per configured fraction
    Build(BuildArgs),
    /// Check that SMALL is nested in BIG
    Verify(VerifyArgs),
    /// Reload a subset directory and report provenance and closure
    Audit(AuditArgs),
    /// List builds recorded in a ledger
    History(HistoryArgs),
}

#[derive(Parser, Debug)]
struct BuildArgs {
    /// JSON config file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the full dataset
    #[arg(long)]
    input: Option<PathBuf>,

    /// Root directory for subset_<pct>/ outputs
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, value_delimiter = ',')]
    fractions: Option<Vec<f64>>,

    /// any | both | src | dest
    #[arg(long)]
    policy: Option<InclusionPolicy>,

    /// Use seeded ordering instead of file order
    #[arg(long)]
    seed: Option<u64>,

    /// SQLite ledger to record the build in
    #[arg(long)]
    ledger: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct VerifyArgs {
    small: PathBuf,
    big: PathBuf,

    #[arg(long)]
    skip_keys: bool,

    #[arg(long)]
    skip_rows: bool,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct AuditArgs {
    dir: PathBuf,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct HistoryArgs {
    #[arg(long)]
    ledger: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nested_subsets=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Build(args) => run_build_command(args),
        Command::Verify(args) => run_verify_command(args),
        Command::Audit(args) => run_audit_command(args),
        Command::History(args) => run_history_command(args),
    }
}

fn load_config(path: Option<&Path>) -> Result<SubsetConfig> {
    match path {
        Some(path) => SubsetConfig::from_file(path),
        None => Ok(SubsetConfig::default()),
    }
}

fn run_build_command(args: BuildArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(input) = args.input {
        config.input_dir = input;
    }
    if let Some(output) = args.output {
        config.output_root = output;
    }
    if let Some(fractions) = args.fractions {
        config.fractions = fractions;
    }
    if let Some(policy) = args.policy {
        config.policy = policy;
    }
    if let Some(seed) = args.seed {
        config.order = OrderStrategy::Seeded { seed };
    }
    if args.ledger.is_some() {
        config.ledger_path = args.ledger;
    }

    println!("📂 Building nested subsets from {}", config.input_dir.display());
    println!("   policy: {}  order: {}", config.policy, config.order);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let outcomes = run_build(&config)?;

    for outcome in &outcomes {
        println!("\n✓ {}", outcome.summary());
        match outcome.recorded {
            Some(true) => println!("  🗄️  recorded in ledger"),
            Some(false) => println!("  🗄️  identical build already in ledger"),
            None => {}
        }
        if outcome.dangling_references > 0 {
            println!("  ⚠️  {} dangling references", outcome.dangling_references);
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ {} subsets written to {}", outcomes.len(), config.output_root.display());
    Ok(())
}

fn run_verify_command(args: VerifyArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let options = VerifyOptions {
        skip_keys: args.skip_keys,
        skip_rows: args.skip_rows,
    };

    match verify_nested(&args.small, &args.big, options, &config.schema) {
        Ok(report) => {
            print!("{}", report.render());
            println!("✅ Nesting verified: {} ⊂ {}", args.small.display(), args.big.display());
            Ok(())
        }
        Err(err) => {
            report_verify_failure(&err);
            std::process::exit(err.exit_code());
        }
    }
}

fn report_verify_failure(err: &SubsetError) {
    if err.is_violation() {
        eprintln!("❌ Verification failed: {}", err);
    } else if err.is_missing_input() {
        eprintln!("❌ Cannot run verification: {}", err);
    } else {
        eprintln!("❌ Error: {}", err);
    }
}

fn run_audit_command(args: AuditArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let report = audit_subset(&args.dir, &config.schema)
        .with_context(|| format!("Failed to audit {}", args.dir.display()))?;

    print!("{}", report.render());
    let modified = report.modified_files();
    if !modified.is_empty() {
        println!("⚠️  modified since build: {}", modified.join(", "));
    }
    Ok(())
}

fn run_history_command(args: HistoryArgs) -> Result<()> {
    let conn = open_ledger(&args.ledger)?;
    let runs = list_runs(&conn)?;

    println!("🗄️  {} recorded builds in {}", runs.len(), args.ledger.display());
    for run in &runs {
        println!(
            "  {}  {:<24} fraction {:<6} policy {:<5} order {:<12} {}",
            run.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            run.output_dir,
            run.fraction,
            run.policy,
            run.order_strategy,
            &run.content_hash[..run.content_hash.len().min(12)],
        );
    }
    Ok(())
}
