#![deny(unsafe_code)]

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use clap::builder::styling::{AnsiColor, Effects, Styles};
use env_logger::Env;
use log::{debug, info};
use pidecimals::{
    Algorithm, Communicator, DigitsRequest, Error, PI_REFERENCE, ProcessComm, RunConfig,
    WorkRates, compute, env, matching_decimals, read_reference,
};

/// Custom styles for CLI help output
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Compute decimals of pi with the BBP, Bellard or Chudnovsky series.
#[derive(Parser, Debug)]
#[command(version, styles = STYLES)]
struct Args {
    /// Series to run: bbp (0), bellard (1) or chudnovsky (2)
    algorithm: Algorithm,

    /// Number of decimals to compute
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    digits: u64,

    /// Threads per process [default: $PIDECIMALS_THREADS, $OMP_NUM_THREADS or 1]
    #[arg(short, long)]
    threads: Option<usize>,

    /// Number of processes
    #[arg(short, long, default_value_t = 1)]
    processes: usize,

    /// Reference expansion of pi to count correct decimals against
    #[arg(long, value_name = "FILE")]
    reference: Option<PathBuf>,

    /// Work-rate table for the weighted distribution (TOML)
    #[arg(long, value_name = "FILE")]
    work_rates: Option<PathBuf>,

    /// Print the computed decimals
    #[arg(long)]
    print: bool,
}

/// Exit status for a run rejected before any worker started, matching clap's
/// usage errors.
const CONFIGURATION_EXIT: i32 = 2;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("Error: {e:#}");
        let configuration = e
            .chain()
            .any(|cause| cause.downcast_ref::<Error>().is_some_and(Error::is_configuration));
        process::exit(if configuration { CONFIGURATION_EXIT } else { 1 });
    }
}

fn run(args: &Args) -> Result<()> {
    let threads = args.threads.unwrap_or_else(env::default_threads);
    let request = DigitsRequest::new(args.algorithm, args.digits);
    let mut config = RunConfig::from_digits(request, threads)?;
    if let Some(path) = &args.work_rates {
        let rates = WorkRates::load(path)
            .with_context(|| format!("Failed to load work rates from {}", path.display()))?;
        config = config.with_work_rates(rates);
    }
    config.check_workers(args.processes)?;

    let comm = ProcessComm::init(args.processes).context("Failed to start the process world")?;
    if !comm.is_root() {
        debug!("rank {} of {} starting", comm.rank(), comm.size());
    }

    let start = Instant::now();
    let Some(pi) = compute(&comm, &config)? else {
        // Spawned ranks have handed their share to the root
        return Ok(());
    };
    let elapsed = start.elapsed();
    comm.finish()?;

    let reference = match &args.reference {
        Some(path) => read_reference(path)
            .with_context(|| format!("Failed to read reference from {}", path.display()))?,
        None => PI_REFERENCE.to_string(),
    };
    let matched = matching_decimals(&pi, &reference);
    info!("{} finished in {:.3?}", config.algorithm, elapsed);

    println!("Algorithm:          {}", config.algorithm);
    println!(
        "Precision:          {} (~{} decimals)",
        config.precision,
        config.precision.decimal_digits()
    );
    println!("Iterations:         {}", config.iterations);
    println!("Processes:          {}", comm.size());
    println!("Threads/process:    {}", config.threads);
    println!("Correct decimals:   {matched}");
    println!("Elapsed:            {:.6} s", elapsed.as_secs_f64());
    if args.print {
        // "3." plus the requested decimals
        println!("{}", pi.to_decimal_string(args.digits as usize + 1));
    }
    Ok(())
}
