//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand};

/// fixflow - move relational data between a live database and versioned
/// CSV datasets
#[derive(Parser, Debug)]
#[command(name = "fx")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the project config file
    #[arg(short = 'c', long, global = true, default_value = "fixflow.yml")]
    pub config: String,

    /// Override the fixture directory
    #[arg(short = 'd', long, global = true)]
    pub directory: Option<String>,

    /// Override the database path
    #[arg(long, global = true)]
    pub database: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download table rows into a dataset
    Extract(ExtractArgs),

    /// Load datasets into the target database
    Load(LoadArgs),

    /// List datasets and their files
    Ls(LsArgs),

    /// Cross-check dataset tables against the live catalog
    Validate(ValidateArgs),
}

/// Arguments for the extract command
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Tables to download (catalog.schema.table, schema.table, or bare)
    #[arg(short, long = "table", required = true)]
    pub tables: Vec<String>,

    /// Target dataset name
    #[arg(long, default_value = "base")]
    pub dataset: String,

    /// Follow foreign keys outward from a single root table
    #[arg(long)]
    pub structured: bool,

    /// Literal column=value filters on the root table (structured only)
    #[arg(short = 'f', long = "filter")]
    pub filters: Vec<String>,

    /// Dry run: report row counts without writing files
    #[arg(long)]
    pub count: bool,

    /// Override the global row budget
    #[arg(long)]
    pub max_rows: Option<usize>,
}

/// Arguments for the load command
#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Dataset names to load, in request order
    #[arg(required = true)]
    pub datasets: Vec<String>,
}

/// Arguments for the ls command
#[derive(Args, Debug)]
pub struct LsArgs {}

/// Arguments for the validate command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Dataset names to validate (default: all)
    pub datasets: Vec<String>,
}
