use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use memtrace::config::DEFAULT_CLOCK_HZ;
use memtrace::dump::write_op;
use memtrace::{Config, MemOp, Session};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

/// Decodes a raw RAM bus trace into read and write bursts.
///
/// Bursts are printed to stdout unless a memory image is requested, in which case the final
/// contents of shadow memory are written to that file instead.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Raw trace log saved by the logger.
    input: PathBuf,

    /// Write the final shadow memory image to this file. Implies --quiet.
    image: Option<PathBuf>,

    /// Stop once the trace timestamp passes this many seconds.
    limit: Option<f64>,

    /// Frequency of the bus clock in Hz.
    #[arg(long, default_value_t = DEFAULT_CLOCK_HZ)]
    clock_hz: u64,

    /// Don't print bursts.
    #[arg(short, long)]
    quiet: bool,

    /// Print bursts as JSON lines instead of a hex dump.
    #[arg(long)]
    json: bool,

    /// Give up after this many decode errors in a row.
    #[arg(long)]
    max_errors: Option<u64>,

    /// Verbosity level for stderr logging. MEMTRACE_LOG takes precedence.
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Serialize)]
struct JsonOp<'a> {
    seconds: f64,
    clocks: u64,
    #[serde(flatten)]
    op: &'a MemOp,
    data: &'a [u8],
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .with_env_var("MEMTRACE_LOG")
                .from_env_lossy(),
        )
        .with_writer(io::stderr)
        .init();

    let config = Config::new().with_clock_hz(args.clock_hz);
    let mut session = Session::open_with(&args.input, &config)
        .with_context(|| format!("failed to open {}", args.input.display()))?;

    let quiet = args.quiet || args.image.is_some();
    let mut stdout = BufWriter::new(io::stdout().lock());

    let mut ops = 0u64;
    let mut errors = 0u64;
    let mut consecutive = 0u64;

    while let Some(result) = session.next() {
        let op = match result {
            Ok(op) => op,
            Err(e) => {
                tracing::warn!("*** Error at offset {:x}: {e}", session.offset());
                errors += 1;
                consecutive += 1;
                if args.max_errors.is_some_and(|max| consecutive >= max) {
                    bail!("giving up after {consecutive} consecutive decode errors");
                }
                continue;
            }
        };
        consecutive = 0;

        let timestamp = session.timestamp();
        if args.limit.is_some_and(|limit| timestamp.seconds() > limit) {
            tracing::warn!(
                "Exiting per user request before entry @ {:11.6}",
                timestamp.seconds()
            );
            break;
        }
        ops += 1;

        if quiet {
            continue;
        }
        let data = session.data(&op);
        if args.json {
            let record = JsonOp {
                seconds: timestamp.seconds(),
                clocks: timestamp.clocks(),
                op: &op,
                data: &data,
            };
            serde_json::to_writer(&mut stdout, &record)?;
            writeln!(stdout)?;
        } else {
            write_op(&mut stdout, timestamp, &op, &data)?;
        }
    }
    stdout.flush()?;

    tracing::info!(
        ops,
        errors,
        seconds = session.timestamp().seconds(),
        "finished decoding"
    );

    if let Some(path) = &args.image {
        let file = fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        session
            .memory()
            .write_image(BufWriter::new(file))
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(())
}
