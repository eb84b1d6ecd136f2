//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use keypearls_artifacts::StageSummary;
use keypearls_core::{
    ProgressReporter, Stage, StageContext, StageReport, pipeline_stats, run_range, run_stage,
};
use keypearls_shared::{AppConfig, config_file_path, init_config, load_config, load_config_from};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// keypearls — distill key-programming notes into graded, attributed pearls.
#[derive(Parser)]
#[command(
    name = "keypearls",
    version,
    about = "Distill automotive key-programming notes into graded, vehicle-attributed pearls and procedure packages.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.keypearls/keypearls.toml).
    #[arg(long, env = "KEYPEARLS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Input directory of source documents.
    #[arg(long, global = true)]
    pub input: Option<String>,

    /// Artifact directory.
    #[arg(long, global = true)]
    pub out: Option<String>,

    /// Pipeline revision used in artifact file names.
    #[arg(long, global = true)]
    pub revision: Option<String>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run a contiguous range of stages (all of them by default).
    Run {
        /// First stage to run.
        #[arg(long, default_value = "load")]
        from: Stage,

        /// Last stage to run.
        #[arg(long, default_value = "package")]
        to: Stage,
    },

    /// Run a single stage against the existing artifacts.
    Stage {
        /// Stage name (load, extract, score, classify, dedup, attribute,
        /// repair, package) or its artifact name.
        name: Stage,
    },

    /// Print the summary of every stage artifact present.
    Stats {
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "keypearls=info",
        1 => "keypearls=debug",
        _ => "keypearls=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Run { from, to } => cmd_run(&cli, *from, *to),
        Command::Stage { name } => cmd_stage(&cli, *name),
        Command::Stats { json } => cmd_stats(&cli, *json),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&cli),
        },
    }
}

/// Config file (explicit or default), then CLI overrides.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)
            .wrap_err_with(|| format!("loading config from {}", path.display()))?,
        None => load_config()?,
    };

    if let Some(input) = &cli.input {
        config.paths.input_dir = input.clone();
    }
    if let Some(out) = &cli.out {
        config.paths.artifact_dir = out.clone();
    }
    if let Some(revision) = &cli.revision {
        config.paths.revision = revision.clone();
    }
    Ok(config)
}

fn context(cli: &Cli) -> Result<StageContext> {
    let config = resolve_config(cli)?;
    Ok(StageContext::new(&config)?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_run(cli: &Cli, from: Stage, to: Stage) -> Result<()> {
    let ctx = context(cli)?;
    info!(%from, %to, input = %ctx.input_dir.display(), revision = %ctx.revision, "running pipeline");

    let reporter = CliProgress::new();
    let reports = run_range(from, to, &ctx, &reporter)?;

    println!();
    for report in &reports {
        print_report(report);
    }
    let total: f64 = reports.iter().map(|r| r.elapsed.as_secs_f64()).sum();
    println!("  {} stage(s) in {total:.2}s", reports.len());
    println!();
    Ok(())
}

fn cmd_stage(cli: &Cli, stage: Stage) -> Result<()> {
    let ctx = context(cli)?;
    info!(%stage, revision = %ctx.revision, "running single stage");

    let report = run_stage(stage, &ctx)?;
    println!();
    print_report(&report);
    println!();
    Ok(())
}

fn cmd_stats(cli: &Cli, json: bool) -> Result<()> {
    let ctx = context(cli)?;
    let statuses = pipeline_stats(&ctx)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    println!();
    println!("  Revision:  {}", ctx.revision);
    println!("  Artifacts: {}", ctx.artifact_dir.display());
    println!();
    for status in &statuses {
        match &status.header {
            Some(header) => {
                println!(
                    "  {:<10} {:<11} written {}",
                    status.stage.name(),
                    header.stage,
                    header.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
                print_summary(&header.summary);
            }
            None => println!("  {:<10} (no artifact)", status.stage.name()),
        }
    }
    println!();
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = config_file_path()?;
    if path.exists() {
        return Err(eyre!("config already exists at {}", path.display()));
    }
    let path = init_config()?;
    println!("Config written to {}", path.display());
    Ok(())
}

fn cmd_config_show(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    let rendered = toml::to_string_pretty(&config).wrap_err("rendering config")?;
    println!("{rendered}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_report(report: &StageReport) {
    println!(
        "  {:<10} {:>5} → {:<5} {:>6.2}s  {}",
        report.stage.name(),
        report.summary.input,
        report.summary.output,
        report.elapsed.as_secs_f64(),
        report.path.display()
    );
    if report.skipped > 0 {
        println!("             skipped {} malformed record(s)", report.skipped);
    }
    print_summary(&report.summary);
}

fn print_summary(summary: &StageSummary) {
    if summary.discarded > 0 {
        println!("             discarded: {}", summary.discarded);
    }
    if summary.unresolved > 0 {
        println!("             unresolved: {}", summary.unresolved);
    }
    for (label, counts) in [
        ("category", &summary.by_category),
        ("tier", &summary.by_tier),
        ("type", &summary.by_semantic_type),
        ("scenario", &summary.by_scenario),
    ] {
        if counts.is_empty() {
            continue;
        }
        let parts: Vec<String> = counts.iter().map(|(k, n)| format!("{k}={n}")).collect();
        println!("             {label}: {}", parts.join(" "));
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, stage: Stage) {
        self.spinner.set_message(format!("Running {stage}"));
    }

    fn stage_done(&self, report: &StageReport) {
        self.spinner.println(format!(
            "  ✓ {} ({} → {})",
            report.stage, report.summary.input, report.summary.output
        ));
    }

    fn done(&self, _reports: &[StageReport]) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
