//! pkcap CLI - Variance Reduction Capacity Model
//!
//! Command-line interface for building the P-K capacity workbook and reports.
//!
//! Running `pkcap` with no subcommand writes the default workbook to
//! `variance_reduction_analysis.xlsx` in the current directory.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pkcap_core::{CapacityAnalysis, CapacityModel, ModelConfig, Renderer, StabilityPolicy};
use pkcap_render::{ExcelRenderer, JsonRenderer, TextRenderer};

const DEFAULT_WORKBOOK: &str = "variance_reduction_analysis.xlsx";
const CONFIG_ENV: &str = "PKCAP_CONFIG";

#[derive(Parser)]
#[command(name = "pkcap")]
#[command(author, version, about = "P-K variance reduction capacity model", long_about = None)]
struct Cli {
    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the capacity model workbook (XLSX)
    Workbook {
        #[command(flatten)]
        model: ModelArgs,

        /// Output file path
        #[arg(short, long, default_value = DEFAULT_WORKBOOK)]
        output: PathBuf,

        /// Write computed values instead of live formulas
        #[arg(long)]
        static_values: bool,
    },

    /// Print the scenario table and summary
    Report {
        #[command(flatten)]
        model: ModelArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create a model configuration file with default values
    Init {
        /// Configuration name (writes NAME.toml)
        #[arg(default_value = "pkcap")]
        name: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

/// Model inputs shared by `workbook` and `report`
#[derive(Args, Debug, Default)]
struct ModelArgs {
    /// Model configuration file (TOML)
    #[arg(short, long, value_name = "FILE", env = "PKCAP_CONFIG")]
    config: Option<PathBuf>,

    /// Initial serviceable clients
    #[arg(long)]
    clients: Option<f64>,

    /// Initial standard deviation of service time
    #[arg(long)]
    sigma: Option<f64>,

    /// Average time per task
    #[arg(long)]
    tpt: Option<f64>,

    /// Variance reduction percentages, comma separated
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    scenarios: Option<Vec<f64>>,

    /// Percentage used for the before/after summary
    #[arg(long)]
    reference: Option<f64>,

    /// Fail instead of warning when the queue is unstable (ρ >= 1)
    #[arg(long)]
    strict: bool,
}

impl ModelArgs {
    /// Inputs for a run without a subcommand: defaults plus `PKCAP_CONFIG`
    fn from_env() -> Self {
        Self {
            config: std::env::var_os(CONFIG_ENV).map(PathBuf::from),
            ..Self::default()
        }
    }

    /// Config file (or defaults) with command-line overrides applied
    fn resolve(&self) -> Result<ModelConfig> {
        let mut config = match &self.config {
            Some(path) => ModelConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ModelConfig::default(),
        };

        if let Some(clients) = self.clients {
            config.baseline.clients = clients;
        }
        if let Some(sigma) = self.sigma {
            config.baseline.sigma = sigma;
        }
        if let Some(tpt) = self.tpt {
            config.baseline.tpt = tpt;
        }
        if let Some(scenarios) = &self.scenarios {
            config.scenarios.variance_reductions = scenarios.clone();
        }
        if let Some(reference) = self.reference {
            config.scenarios.reference = reference;
        }
        if self.strict {
            config.policy.stability = StabilityPolicy::Strict;
        }

        debug!(?config, "resolved model configuration");
        Ok(config)
    }

    fn analyze(&self) -> Result<CapacityAnalysis> {
        let config = self.resolve()?;
        CapacityModel::new(config)
            .analyze()
            .context("Capacity model evaluation failed")
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing (RUST_LOG overrides -v)
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match cli.command {
        Some(Commands::Workbook {
            model,
            output,
            static_values,
        }) => cmd_workbook(&model, &output, static_values),
        Some(Commands::Report {
            model,
            format,
            output,
        }) => cmd_report(&model, format, output.as_deref()),
        Some(Commands::Init {
            name,
            output,
            force,
        }) => cmd_init(&name, &output, force),
        None => cmd_workbook(&ModelArgs::from_env(), Path::new(DEFAULT_WORKBOOK), false),
    }
}

fn cmd_workbook(model: &ModelArgs, output: &Path, static_values: bool) -> Result<()> {
    let analysis = model.analyze()?;

    let mut renderer = ExcelRenderer::new();
    if static_values {
        renderer = renderer.static_values();
    }
    renderer
        .save(&analysis, output)
        .with_context(|| format!("Failed to write workbook {}", output.display()))?;

    info!(path = %output.display(), scenarios = analysis.scenarios.len(), "workbook written");
    println!("Excel file created successfully: {}", output.display());
    Ok(())
}

fn cmd_report(model: &ModelArgs, format: ReportFormat, output: Option<&Path>) -> Result<()> {
    let analysis = model.analyze()?;

    let report = match format {
        ReportFormat::Text => TextRenderer::new().render(&analysis)?,
        ReportFormat::Json => JsonRenderer::new().render(&analysis)?,
    };

    match output {
        Some(path) => {
            std::fs::write(path, &report)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            println!("Report written: {}", path.display());
        }
        None => print!("{report}"),
    }
    Ok(())
}

fn cmd_init(name: &str, dir: &Path, force: bool) -> Result<()> {
    let path = dir.join(format!("{name}.toml"));
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let body = ModelConfig::default().to_toml_string()?;
    let content = format!(
        "# pkcap model configuration\n\
         # stability = \"warn\" reports ρ >= 1 as a warning; \"strict\" fails.\n\n{body}"
    );
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Created: {}", path.display());
    Ok(())
}
