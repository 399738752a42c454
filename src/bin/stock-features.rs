//! stock-features CLI - build and check per-stock feature tables
//!
//! ## Example Usage
//!
//! ```bash
//! # Build features from a raw daily price export
//! stock-features build prices.csv --output features.csv
//!
//! # Same, as JSON, with a custom pipeline configuration
//! stock-features --config pipeline.toml build prices.csv -o features.json
//!
//! # Validate a feature table before clustering
//! stock-features check features.csv
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;
use stock_features::prelude::*;

/// stock-features: risk/return feature extraction for daily equity prices
#[derive(Parser)]
#[command(name = "stock-features")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Robert Fall")]
#[command(about = "Per-stock risk/return feature extraction", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Pipeline configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the feature table from a raw daily CSV
    Build {
        /// Raw daily prices (stock code, date, price, volume, sector, name)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file (defaults to features.csv)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format; inferred from the output extension when omitted
        #[arg(short = 'f', long, value_enum)]
        format: Option<Format>,

        /// Primary date format of the input
        #[arg(long, default_value = "%Y-%m-%d")]
        date_format: String,

        /// Price column name
        #[arg(long, default_value = "Day Price")]
        price_column: String,
    },

    /// Validate a feature CSV against the clustering schema
    Check {
        /// Feature table written by `build`
        #[arg(value_name = "FEATURES")]
        features: PathBuf,

        /// Sharpe clamp bound to verify (defaults to the configured bound)
        #[arg(long)]
        sharpe_bound: Option<f64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => OutputFormat::Csv,
            Format::Json => OutputFormat::Json,
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".stock-features").join("config.toml"))
}

/// Explicit `--config` must load; the home-directory file is used only if present
fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    if let Some(config_path) = path {
        return PipelineConfig::from_toml_file(config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()));
    }

    if let Some(default_config) = default_config_path() {
        if default_config.exists() {
            match PipelineConfig::from_toml_file(&default_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    eprintln!(
                        "{} Ignoring {}: {}",
                        "Warning:".yellow(),
                        default_config.display(),
                        e
                    );
                }
            }
        }
    }

    Ok(PipelineConfig::default())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    if cli.verbose {
        println!(
            "{} v{}",
            "stock-features".cyan().bold(),
            env!("CARGO_PKG_VERSION")
        );
    }

    match cli.command {
        Commands::Build {
            input,
            output,
            format,
            date_format,
            price_column,
        } => build_features(BuildConfig {
            input,
            output: output.unwrap_or_else(|| PathBuf::from("features.csv")),
            format,
            date_format,
            price_column,
            verbose: cli.verbose,
            config,
        }),
        Commands::Check {
            features,
            sharpe_bound,
        } => check_features(&features, sharpe_bound.unwrap_or(config.sharpe_bound)),
    }
}

struct BuildConfig {
    input: PathBuf,
    output: PathBuf,
    format: Option<Format>,
    date_format: String,
    price_column: String,
    verbose: bool,
    config: PipelineConfig,
}

fn build_features(cfg: BuildConfig) -> anyhow::Result<()> {
    println!("{}", "Building feature table...".cyan().bold());
    let start = Instant::now();

    if cfg.verbose {
        println!("  {} {}", "Input:".bold(), cfg.input.display());
        println!("  {} {}", "Output:".bold(), cfg.output.display());
        println!("  {} {}", "Min active days:".bold(), cfg.config.min_active_days);
    }

    let pb = ProgressBar::new(3);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    pb.set_message("Reading prices...");
    let format = CsvFormat {
        date_format: cfg.date_format,
        price_column: cfg.price_column,
        ..CsvFormat::default()
    };
    let universe = DailyCsvReader::with_format(format)
        .load_universe(&cfg.input)
        .with_context(|| format!("Failed to read {}", cfg.input.display()))?;
    pb.inc(1);

    pb.set_message("Computing features...");
    let pipeline = Pipeline::with_default_stages(cfg.config)?;
    let output = pipeline.run_universe(universe)?;
    pb.inc(1);

    pb.set_message("Writing table...");
    let output_format = cfg
        .format
        .map(OutputFormat::from)
        .unwrap_or_else(|| OutputFormat::from_path(&cfg.output));
    FeatureTableWriter::new(output_format)
        .write_path(&cfg.output, &output.features)
        .with_context(|| format!("Failed to write {}", cfg.output.display()))?;
    pb.inc(1);
    pb.finish_with_message("Done");

    println!();
    println!("{}", "Feature Summary".green().bold());
    println!("{}", "===============".green());
    println!("  {} {}", "Stocks read:".bold(), output.summary.stocks_in);
    println!("  {} {}", "Stocks with features:".bold(), output.len());
    println!(
        "  {} {}",
        "Excluded (insufficient activity):".bold(),
        output.summary.excluded.len()
    );
    if cfg.verbose && !output.summary.excluded.is_empty() {
        println!("    {}", output.summary.excluded.join(", ").dimmed());
    }
    println!("  {} {:.2?}", "Elapsed:".bold(), start.elapsed());
    println!(
        "{} Wrote {}",
        "✓".green().bold(),
        cfg.output.display()
    );

    Ok(())
}

fn check_features(path: &Path, sharpe_bound: f64) -> anyhow::Result<()> {
    println!("{}", format!("Checking {}", path.display()).cyan().bold());

    let file = std::fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let table = FeatureTable::from_csv_reader(file)?;
    println!("  {} {}", "Rows:".bold(), table.len());

    let missing = table.missing_columns(&REQUIRED_FEATURE_COLUMNS);
    if missing.is_empty() {
        println!(
            "  {} all {} required columns present",
            "✓".green().bold(),
            REQUIRED_FEATURE_COLUMNS.len()
        );
    } else {
        println!(
            "  {} missing columns: {}",
            "✗".red().bold(),
            missing.join(", ")
        );
    }

    if let Some((lo, hi)) = table.sharpe_range() {
        println!("  {} [{:.3}, {:.3}]", "Sharpe range:".bold(), lo, hi);
    }
    let out_of_bounds = table.sharpe_out_of_bounds(sharpe_bound);
    for (code, value) in &out_of_bounds {
        println!(
            "  {} {} sharpe_ratio {} outside ±{}",
            "✗".red().bold(),
            code,
            value,
            sharpe_bound
        );
    }

    if !missing.is_empty() || !out_of_bounds.is_empty() {
        bail!(
            "{} missing columns, {} Sharpe values out of bounds",
            missing.len(),
            out_of_bounds.len()
        );
    }

    println!("{}", "Feature table OK".green().bold());
    Ok(())
}
