//! StrengthLab CLI — build the per-instrument indicator panel and industry tables.
//!
//! Commands:
//! - `build` — run the full build from a TOML config, a local data directory, or synthetic data
//! - `init-config` — write the default build configuration as TOML

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use strengthlab_core::data::{ColumnStandardizer, InstrumentFeed};
use strengthlab_core::industry::IndustryBenchmarkPolicy;
use strengthlab_runner::{
    run_build, BuildConfig, BuildOutcome, LocalFileFeed, ParquetArtifactSink, SyntheticFeed,
    TracingProgress,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "strengthlab",
    about = "StrengthLab CLI — relative-strength feature panels for equity universes"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the indicator panel and industry tables.
    Build {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Start date (YYYY-MM-DD). Overrides the config.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Overrides the config.
        #[arg(long)]
        end: Option<String>,

        /// Local feed directory holding the master file and `series/<code>.csv`.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Use a seeded synthetic feed with this many instruments.
        #[arg(long)]
        synthetic: Option<usize>,

        /// Worker pool size.
        #[arg(long)]
        max_workers: Option<usize>,

        /// Only process the first N instruments (0 = all).
        #[arg(long)]
        test_limit: Option<usize>,

        /// Output directory for Parquet tables and metadata.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Restrict the universe to one market (e.g. KOSPI).
        #[arg(long)]
        market: Option<String>,

        /// Benchmark used for industry Mansfield RS.
        #[arg(long, value_enum)]
        industry_benchmark: Option<BenchmarkArg>,

        /// Skip industry aggregation.
        #[arg(long, default_value_t = false)]
        no_industry: bool,

        /// Build without an external benchmark (Mansfield columns stay null).
        #[arg(long, default_value_t = false)]
        no_benchmark: bool,
    },
    /// Write the default build configuration as TOML.
    InitConfig {
        /// Destination file. Prints to stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BenchmarkArg {
    Universe,
    External,
}

impl From<BenchmarkArg> for IndustryBenchmarkPolicy {
    fn from(arg: BenchmarkArg) -> Self {
        match arg {
            BenchmarkArg::Universe => IndustryBenchmarkPolicy::Universe,
            BenchmarkArg::External => IndustryBenchmarkPolicy::External,
        }
    }
}

/// Command-line overrides applied on top of the loaded config.
struct BuildArgs {
    config: Option<PathBuf>,
    start: Option<String>,
    end: Option<String>,
    data_dir: Option<PathBuf>,
    synthetic: Option<usize>,
    max_workers: Option<usize>,
    test_limit: Option<usize>,
    output_dir: Option<PathBuf>,
    market: Option<String>,
    industry_benchmark: Option<BenchmarkArg>,
    no_industry: bool,
    no_benchmark: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Build {
            config,
            start,
            end,
            data_dir,
            synthetic,
            max_workers,
            test_limit,
            output_dir,
            market,
            industry_benchmark,
            no_industry,
            no_benchmark,
        } => run_build_cmd(BuildArgs {
            config,
            start,
            end,
            data_dir,
            synthetic,
            max_workers,
            test_limit,
            output_dir,
            market,
            industry_benchmark,
            no_industry,
            no_benchmark,
        }),
        Commands::InitConfig { output } => run_init_config(output),
    };

    if let Err(err) = result {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn parse_date(flag: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid {flag} date '{value}' (expected YYYY-MM-DD)"))
}

fn load_config(args: &BuildArgs) -> Result<BuildConfig> {
    let mut cfg = match &args.config {
        Some(path) => BuildConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => BuildConfig::default(),
    };

    if let Some(start) = &args.start {
        cfg.start_date = parse_date("--start", start)?;
    }
    if let Some(end) = &args.end {
        cfg.end_date = parse_date("--end", end)?;
    }
    if let Some(workers) = args.max_workers {
        cfg.max_workers = workers;
    }
    if let Some(limit) = args.test_limit {
        cfg.test_limit = limit;
    }
    if let Some(dir) = &args.output_dir {
        cfg.output.dir = dir.clone();
    }
    if let Some(market) = &args.market {
        cfg.market = Some(market.clone());
    }
    if let Some(policy) = args.industry_benchmark {
        cfg.industry.benchmark = policy.into();
    }
    if args.no_industry {
        cfg.industry.enabled = false;
    }
    if args.no_benchmark {
        cfg.benchmark = None;
    }
    Ok(cfg)
}

fn run_build_cmd(args: BuildArgs) -> Result<()> {
    let cfg = load_config(&args)?;

    let feed: Box<dyn InstrumentFeed> = match (&args.data_dir, args.synthetic) {
        (Some(_), Some(_)) => bail!("--data-dir and --synthetic are mutually exclusive"),
        (None, None) => bail!("one of --data-dir or --synthetic is required"),
        (Some(dir), None) => Box::new(LocalFileFeed::new(dir).with_code_width(cfg.code_width)),
        (None, Some(count)) => Box::new(SyntheticFeed::new(count)),
    };

    tracing::info!(
        feed = feed.name(),
        start = %cfg.start_date,
        end = %cfg.end_date,
        workers = cfg.max_workers,
        "starting build"
    );
    let sink = ParquetArtifactSink::new(cfg.output.clone());
    let outcome = run_build(
        &cfg,
        feed.as_ref(),
        &ColumnStandardizer::default(),
        &sink,
        &TracingProgress,
    )?;

    print_summary(&cfg, &outcome);
    Ok(())
}

fn print_summary(cfg: &BuildConfig, outcome: &BuildOutcome) {
    let meta = &outcome.metadata;
    println!();
    println!("=== Build {} ===", meta.run_id);
    println!("Provider:     {}", meta.provider.name);
    println!("Range:        {} to {}", meta.start_date, meta.end_date);
    println!("Instruments:  {}", meta.instrument_count);
    println!("Panel rows:   {}", meta.rows);
    println!("Features:     {}", meta.features.join(", "));
    if cfg.industry.enabled {
        println!("Industry rows: {}", outcome.industry.len());
    }
    println!();
    for (stage, seconds) in &meta.timing_seconds {
        println!("  {stage:<26} {seconds:>9.3}s");
    }
    println!();
    println!("Panel:    {}", cfg.output.panel_path().display());
    println!("Metadata: {}", cfg.output.panel_metadata_path().display());
    if outcome.industry_metadata.is_some() {
        println!("Industry: {}", cfg.output.industry_path().display());
    }
}

fn run_init_config(output: Option<PathBuf>) -> Result<()> {
    let text = BuildConfig::default().to_toml()?;
    match output {
        Some(path) => {
            if path.exists() {
                bail!("{} already exists", path.display());
            }
            std::fs::write(&path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote default config to {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
