use std::path::PathBuf;
use std::process;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use threadbench::config::{self, FileConfig, ParserSection};
use threadbench::filter::FilterPolicy;
use threadbench::launch::CommandLauncher;
use threadbench::parse::{MatchScope, TimeUnit};
use threadbench::report;
use threadbench::runner::BenchmarkRunner;
use threadbench::types::{ModeSpec, OutputFormat};

/// Exit status when the run finished but some cells have no value.
const EXIT_PARTIAL: i32 = 2;

#[derive(Parser)]
#[command(
    name = "threadbench",
    version,
    about = "Benchmark a program across thread counts and scheduling modes"
)]
struct Cli {
    /// Program to benchmark (overrides `program` in the config file)
    program: Option<PathBuf>,

    /// Config file (default: ./threadbench.toml, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Thread counts to test, comma separated
    #[arg(short, long, value_delimiter = ',')]
    threads: Option<Vec<u32>>,

    /// Repetitions per configuration cell
    #[arg(short, long)]
    runs: Option<usize>,

    /// Scheduling mode as ID=NAME; repeat for several modes
    #[arg(short, long = "mode", value_name = "ID=NAME")]
    modes: Vec<ModeSpec>,

    /// Result key when the program has a single mode
    #[arg(long)]
    name: Option<String>,

    /// Argument placed before the mode id; repeatable
    #[arg(long = "pre-arg", value_name = "ARG", allow_hyphen_values = true)]
    pre_args: Vec<String>,

    /// Extra argument passed after the thread count; repeatable
    #[arg(long = "arg", value_name = "ARG", allow_hyphen_values = true)]
    args: Vec<String>,

    /// Regex with one capture group around the time value
    #[arg(long)]
    pattern: Option<String>,

    #[arg(long, value_enum)]
    unit: Option<TimeUnit>,

    #[arg(long, value_enum)]
    scope: Option<MatchScope>,

    /// Outlier filter applied against each cell's raw mean
    #[arg(long, value_enum)]
    filter: Option<FilterPolicy>,

    /// Result file, overwritten on every run
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, default_value = "json")]
    format: OutputFormat,

    /// Show throughput (1000 / ms) in table and markdown output
    #[arg(long)]
    perf: bool,

    /// Exit 0 even when some cells produced no value
    #[arg(long)]
    allow_partial: bool,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> FileConfig {
        FileConfig {
            program: self.program.clone(),
            pre_args: (!self.pre_args.is_empty()).then(|| self.pre_args.clone()),
            args: (!self.args.is_empty()).then(|| self.args.clone()),
            name: self.name.clone(),
            threads: self.threads.clone(),
            runs: self.runs,
            filter: self.filter,
            output: self.output.clone(),
            parser: ParserSection {
                pattern: self.pattern.clone(),
                unit: self.unit,
                scope: self.scope,
            },
            modes: (!self.modes.is_empty()).then(|| self.modes.clone()),
        }
    }
}

/// Logs go to stderr so stdout only carries the report.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "threadbench=debug"
    } else {
        "threadbench=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let file_config = match config::discover(cli.config.as_deref())? {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            FileConfig::load(&path)?
        }
        None => FileConfig::default(),
    };
    let config = file_config.merge(cli.overrides()).into_config()?;
    let parser = config.parser()?;
    let output_path = config.output.clone();

    info!(
        program = %config.program.display(),
        cells = config.cell_count(),
        runs = config.runs,
        filter = ?config.filter,
        "starting benchmark"
    );

    let runner = BenchmarkRunner::new(config, CommandLauncher, parser);
    let outcome = runner.run();

    let json = report::to_json(&outcome.matrix);
    if let Err(err) = &json {
        error!("{}", err);
    }

    let rendered = match cli.format {
        OutputFormat::Json => match &json {
            Ok(text) => format!("{}\n", text),
            Err(_) => report::format_plain(&outcome.matrix),
        },
        OutputFormat::Table => report::format_table(&outcome.matrix, cli.perf, Utc::now()),
        OutputFormat::Markdown => report::format_markdown(&outcome.matrix, cli.perf),
    };
    print!("{}", rendered);

    let saved = match &json {
        Ok(text) => match report::write_results(&output_path, text) {
            Ok(()) => {
                info!(path = %output_path.display(), "results saved");
                true
            }
            Err(err) => {
                error!("{}", err);
                false
            }
        },
        Err(_) => false,
    };

    if !saved {
        return Ok(1);
    }

    if !outcome.is_complete() {
        warn!(
            missing = outcome.missing.len(),
            failed_runs = outcome.failed_runs,
            "some cells produced no result"
        );
        if !cli.allow_partial {
            return Ok(EXIT_PARTIAL);
        }
    }

    Ok(0)
}

fn main() {
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    }
}
