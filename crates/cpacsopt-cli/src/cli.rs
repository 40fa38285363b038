use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "CEASIOMpy contributors",
    version,
    about = "cpacsopt - Optimisation and design-of-experiments driver for CPACS-based aircraft analysis module chains.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an optimisation or design-of-experiments routine over a module chain.
    Run(RunArgs),
    /// List the built-in module specs, or show the variables of one module.
    Specs(SpecsArgs),
    /// Show the design and result variables declared in a CPACS file.
    Variables(VariablesArgs),
    /// Declare the variables of a module spec in a CPACS file.
    Declare(DeclareArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    // --- Core Arguments ---
    /// Path to the routine configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Override the directory holding one sub-directory per module.
    #[arg(short, long, value_name = "PATH")]
    pub root: Option<PathBuf>,

    // --- Routine Overrides ---
    /// Override the routine type ('optim' or 'doe').
    #[arg(short = 't', long, value_name = "TYPE")]
    pub routine_type: Option<String>,

    /// Override the module chain. Repeat in execution order.
    #[arg(short, long = "module", value_name = "NAME")]
    pub modules: Vec<String>,

    /// Override the objective formula (e.g., 'cl/cd').
    #[arg(long, value_name = "EXPR")]
    pub objective: Option<String>,

    // --- Driver Overrides ---
    /// Override the optimiser (currently only 'nelder-mead').
    #[arg(long, value_name = "NAME")]
    pub algorithm: Option<String>,

    /// Override the optimiser iteration cap.
    #[arg(long, value_name = "INT")]
    pub max_iterations: Option<usize>,

    /// Override the optimiser convergence tolerance.
    #[arg(long, value_name = "FLOAT")]
    pub tolerance: Option<f64>,

    /// Override the number of uniform design-of-experiments samples.
    #[arg(long, value_name = "INT")]
    pub samples: Option<usize>,

    /// Seed the design-of-experiments sampler for reproducible runs.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    // --- Workflow Overrides ---
    /// Kill a module that runs longer than this many seconds.
    #[arg(long, value_name = "SECS")]
    pub module_timeout: Option<u64>,

    /// Do not archive the updated CPACS file of each iteration.
    #[arg(long)]
    pub no_snapshots: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S optimiser.max-iterations=20
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `specs` subcommand.
#[derive(Args, Debug)]
pub struct SpecsArgs {
    /// Module to describe. Lists every built-in module when omitted.
    #[arg(value_name = "MODULE")]
    pub module: Option<String>,
}

/// Arguments for the `variables` subcommand.
#[derive(Args, Debug)]
pub struct VariablesArgs {
    /// Path to the CPACS file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,
}

/// Arguments for the `declare` subcommand.
#[derive(Args, Debug)]
pub struct DeclareArgs {
    /// Path to the CPACS file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Module whose spec provides the variables.
    #[arg(short, long, required = true, value_name = "NAME")]
    pub module: String,

    /// Where to write the updated file. Defaults to rewriting the input.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Bound design variables to `default -/+ spread * |default|`.
    #[arg(long, value_name = "FRACTION")]
    pub spread: Option<f64>,
}
