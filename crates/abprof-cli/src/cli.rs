use clap::Parser;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "abprof - Parallel developability profiling for antibody structures: \
             hydrophobic/charged surface-patch areas and Fv charge asymmetry over \
             repeated stochastic pipeline runs.",
    help_template = HELP_TEMPLATE,
)]
pub struct Cli {
    /// Path to a PDB file or a directory containing PDB files.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Number of independent stochastic repeats per structure.
    #[arg(short, long, default_value_t = 1, value_name = "INT")]
    pub repeats: u32,

    /// Surface each completed result as soon as it resolves instead of
    /// waiting for the whole batch.
    #[arg(short, long)]
    pub wait: bool,

    /// Destination path for the JSON report.
    #[arg(short, long, default_value = "molecular_features.json", value_name = "PATH")]
    pub output: PathBuf,

    /// pH used for protonation in every repeat.
    #[arg(long = "pH", value_name = "FLOAT")]
    pub ph: Option<f64>,

    /// Base random seed; repeat i runs with seed BASE+i.
    /// Omit for fresh entropy on every repeat.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Maximum number of concurrently running pipeline invocations.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, value_name = "NUM")]
    pub jobs: Option<usize>,

    /// Per-task timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to the tool configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}
