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
    author = "Chempot Developers",
    version,
    about = "chempot - Chemical potential limits of a compound from the energies of its competing phases, for defect formation energy calculations.",
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

    /// Set the number of threads used to parse calculations.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute the chemical potential limits of a target compound.
    Limits(LimitsArgs),
    /// Parse a directory of VASP calculations into a phase table.
    Ingest(IngestArgs),
    /// Write the CPLAP input file for a target compound.
    Cplap(CplapArgs),
    /// Sample chemical potentials inside the stability region of a target compound.
    Grid(GridArgs),
}

/// Options shared by every command that works on a target compound.
#[derive(Args, Debug, Clone, Default)]
pub struct SolveArgs {
    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Target compound whose stability region is computed (e.g., LaMnO3).
    #[arg(short, long, value_name = "FORMULA")]
    pub target: Option<String>,

    /// Elements spanning the chemical potential space, comma-separated.
    /// Defaults to the elements of the target.
    #[arg(short, long, value_delimiter = ',', value_name = "EL,...")]
    pub elements: Option<Vec<String>>,

    /// Element eliminated through the target equality.
    #[arg(short, long = "dependent", value_name = "ELEMENT")]
    pub dependent_element: Option<String>,

    /// Extrinsic species (dopants), comma-separated.
    #[arg(short = 'x', long, value_delimiter = ',', value_name = "EL,...")]
    pub extrinsic: Option<Vec<String>>,

    /// Numerical tolerance in eV for constraint checks and vertex merging.
    #[arg(long, value_name = "FLOAT")]
    pub tolerance: Option<f64>,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S cache.policy=rebuild
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Where the phase energies come from.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Phase table with the columns formula, energy_per_fu, energy, formation_energy.
    #[arg(long, value_name = "PATH", conflicts_with = "calculations")]
    pub table: Option<PathBuf>,

    /// Directory of finished calculations, one sub-directory per phase.
    #[arg(long, value_name = "DIR")]
    pub calculations: Option<PathBuf>,

    /// Abort when a calculation's structure disagrees with its directory name.
    #[arg(long)]
    pub strict: bool,

    /// Cache the parsed phase table at this path.
    #[arg(long, value_name = "PATH")]
    pub cache: Option<PathBuf>,

    /// Ignore any existing cache and rebuild it.
    #[arg(long, requires = "cache")]
    pub rebuild_cache: bool,
}

/// Arguments for the `limits` subcommand.
#[derive(Args, Debug)]
pub struct LimitsArgs {
    #[command(flatten)]
    pub solve: SolveArgs,

    /// Write the limits (relative to the elemental references) to a CSV file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Write absolute chemical potentials instead of values relative to the
    /// elemental references.
    #[arg(long)]
    pub absolute: bool,

    /// Also write the CPLAP input file.
    #[arg(long, value_name = "PATH")]
    pub cplap: Option<PathBuf>,
}

/// Arguments for the `ingest` subcommand.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Directory of finished calculations, one sub-directory per phase.
    #[arg(required = true, value_name = "DIR")]
    pub calculations: PathBuf,

    /// Path of the phase table to write. An up-to-date table is reused.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Abort when a calculation's structure disagrees with its directory name.
    #[arg(long)]
    pub strict: bool,

    /// Re-parse every calculation even if the table is up to date.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `cplap` subcommand.
#[derive(Args, Debug)]
pub struct CplapArgs {
    #[command(flatten)]
    pub solve: SolveArgs,

    /// Path of the CPLAP input file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Arguments for the `grid` subcommand.
#[derive(Args, Debug)]
pub struct GridArgs {
    #[command(flatten)]
    pub solve: SolveArgs,

    /// Number of samples along each independent chemical potential.
    #[arg(short = 'n', long, value_name = "INT")]
    pub points: Option<usize>,

    /// Interpolate along a line between two limits instead of sampling the
    /// region. Limits are named by label or as `<El>-rich` / `<El>-poor`.
    #[arg(long, num_args = 2, value_names = ["FROM", "TO"])]
    pub between: Option<Vec<String>>,

    /// Path of the grid CSV file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_command_parses_lists_and_source() {
        let cli = Cli::parse_from([
            "chempot", "limits", "-t", "LaMnO3", "-x", "Sr,Ca", "--table", "phases.csv", "-vv",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.threads, None);
        let Commands::Limits(args) = cli.command else {
            panic!("expected limits");
        };
        assert_eq!(args.solve.target.as_deref(), Some("LaMnO3"));
        assert_eq!(
            args.solve.extrinsic,
            Some(vec!["Sr".to_string(), "Ca".to_string()])
        );
        assert_eq!(args.solve.source.table, Some(PathBuf::from("phases.csv")));
    }

    #[test]
    fn table_and_calculations_are_exclusive() {
        let result = Cli::try_parse_from([
            "chempot",
            "limits",
            "--table",
            "phases.csv",
            "--calculations",
            "runs",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn grid_between_takes_two_limits() {
        let cli = Cli::parse_from([
            "chempot", "grid", "-t", "CdTe", "--between", "Cd-rich", "Te-rich", "-o", "line.csv",
        ]);
        let Commands::Grid(args) = cli.command else {
            panic!("expected grid");
        };
        assert_eq!(
            args.between,
            Some(vec!["Cd-rich".to_string(), "Te-rich".to_string()])
        );
        assert!(
            Cli::try_parse_from(["chempot", "grid", "--between", "Cd-rich", "-o", "line.csv"])
                .is_err()
        );
    }

    #[test]
    fn ingest_requires_output() {
        assert!(Cli::try_parse_from(["chempot", "ingest", "runs"]).is_err());
        let cli = Cli::parse_from(["chempot", "ingest", "runs", "-o", "phases.csv", "--strict"]);
        let Commands::Ingest(args) = cli.command else {
            panic!("expected ingest");
        };
        assert!(args.strict);
        assert!(!args.force);
    }
}
