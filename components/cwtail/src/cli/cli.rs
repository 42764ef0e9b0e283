//! `cwtail` command line.

use crate::helpers::load_config::Config;
use crate::instrumentation::tracing::{init_panic_handler, init_tracing};
use crate::metrics::metrics;
use crate::runtime::{self, output::RecordFormat};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "cwtail",
    about = "Tail CloudWatch Logs groups across all of their streams",
    version,
    term_width = 100,
    after_help = "\
    EXAMPLES:
        cwtail list
        cwtail tail -f -n 50 /aws/lambda/my-function
        cwtail --profile staging tail -st my-service"
)]
struct Cli {
    /// Configuration file (defaults to ./cwtail.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Select AWS profile
    #[arg(short, long, global = true, env = "AWS_PROFILE")]
    profile: Option<String>,

    /// Select AWS region
    #[arg(short, long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    /// Print retrieval metrics to stderr on exit
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the latest records of a log group, optionally following it
    Tail {
        /// Log group to read
        log_group: String,

        /// Follow the log (default is to exit)
        #[arg(short, long)]
        follow: bool,

        /// Number of log records to show per poll
        #[arg(short = 'n', long = "num")]
        num: Option<usize>,

        /// Polling interval in milliseconds
        #[arg(long)]
        interval: Option<u64>,

        /// Show log stream names
        #[arg(short = 's', long)]
        streams: bool,

        /// Show timestamps in log records
        #[arg(short = 't', long)]
        time: bool,

        /// Append a newline to every log record
        #[arg(short = 'e', long)]
        eol: bool,
    },

    /// List available log groups
    List {
        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<usize>,

        /// Print every group as a JSON object
        #[arg(short, long)]
        long: bool,
    },

    /// Validate and print the effective configuration
    Validate,

    /// Display version information
    Version,
}

/// Entry function for CLI
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = Config::load(cli.config.as_deref())?;
    if cli.profile.is_some() {
        cfg.aws.profile = cli.profile.clone();
    }
    if cli.region.is_some() {
        cfg.aws.region = cli.region.clone();
    }

    let _guard = init_tracing(&cfg.logging)?;
    init_panic_handler();

    let result = dispatch(cli.command, cfg).await;

    if cli.metrics {
        eprintln!("{}", metrics::render()?);
    }

    result
}

async fn dispatch(command: Commands, mut cfg: Config) -> Result<()> {
    match command {
        Commands::Tail {
            log_group,
            follow,
            num,
            interval,
            streams,
            time,
            eol,
        } => {
            if let Some(num) = num {
                cfg.retrieval.num_records = num;
            }
            if let Some(interval) = interval {
                cfg.retrieval.poll_interval_ms = interval;
            }
            let format = RecordFormat {
                show_streams: streams,
                show_time: time,
                append_eol: eol,
            };
            let options = cfg.retrieval.retrieval_options(follow);
            runtime::runtime::run_tail(&cfg, &log_group, options, format).await
        }
        Commands::List { max_pages, long } => {
            if max_pages.is_some() {
                cfg.retrieval.max_group_pages = max_pages;
            }
            let options = cfg.retrieval.group_listing_options();
            runtime::runtime::run_list(&cfg, options, long).await
        }
        Commands::Validate => validate_config(&cfg),
        Commands::Version => {
            show_version();
            Ok(())
        }
    }
}

//
// ------------------------ Command Implementations ------------------------------
//

/// Validate configuration and print it as TOML
fn validate_config(cfg: &Config) -> Result<()> {
    cfg.retrieval.retrieval_options(true).validate_settings()?;
    cfg.retrieval.group_listing_options().validate()?;

    println!("Configuration valid:\n{}", cfg.to_toml()?);
    Ok(())
}

/// Show version information
fn show_version() {
    println!("cwtail {}", env!("CARGO_PKG_VERSION"));
}
