// src/bin/lines.rs

//! `dirq-lines`: run a command once per stdin line, print an exit-status
//! histogram.
//!
//! Each input line is shell-split and appended to the command prefix given
//! on the command line. When stdin is exhausted and every child has exited,
//! a JSON object mapping each observed exit status to its occurrence count
//! is printed, keys in numeric order.

use std::sync::Arc;

use clap::Parser;

use dirq::cli::LogLevel;
use dirq::exec::CommandTemplate;
use dirq::{logging, tally};

/// Command-line arguments for `dirq-lines`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dirq-lines",
    version,
    about = "Run a command once per stdin line; print a JSON histogram of exit statuses."
)]
struct LinesArgs {
    /// Number of commands allowed to run at the same time.
    ///
    /// Defaults to the platform core count.
    #[arg(long, value_name = "N")]
    num_processes: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    #[arg(long, value_enum, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// The command prefix; each stdin line is shell-split and appended to it.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("dirq-lines error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = LinesArgs::parse();
    logging::init_logging(args.log_level)?;

    let num_processes = args
        .num_processes
        .unwrap_or_else(tally::default_num_processes);
    if num_processes < 1 {
        anyhow::bail!("for --num-processes, the value must be at least 1");
    }

    let template = Arc::new(CommandTemplate::from_parts(&args.command)?);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let counts = tally::run_lines(stdin, template, num_processes).await?;

    println!("{}", tally::render_histogram(&counts)?);
    Ok(())
}
