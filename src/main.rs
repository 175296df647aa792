use breakwatch::{codec, Breakpoint, ComparisonParser, Debugger, Inline, NullHost, Session, Watchpoint};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(name = "breakwatch", version)]
/// Inspect and rewrite saved breakpoint and watchpoint sessions.
struct Opt {
    /// Session file with [BreakPoints] and [MemoryBreakPoints] sections
    file: PathBuf,
    /// More log output: -v for debug, -vv for trace. Overrides RUST_LOG.
    #[clap(short, long, action = ArgAction::Count)]
    verbose: u8,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every loaded record
    List {
        /// Print as JSON instead of saved-line form
        #[clap(long)]
        json: bool,
    },
    /// Rewrite the session in canonical form, dropping lines that do not load
    Normalize {
        /// Write here instead of stdout
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the first watchpoint touched by an access
    Find {
        #[clap(value_parser = parse_address)]
        address: u32,
        #[clap(value_parser = parse_int)]
        length: u32,
    },
    /// Test whether any watchpoint touches the page holding an address
    Overlaps {
        #[clap(value_parser = parse_address)]
        address: u32,
        #[clap(value_parser = parse_int)]
        page_size: u32,
    },
}

#[derive(Debug, thiserror::Error)]
enum ArgError {
    #[error("Page size {0:#x} is not a power of two")]
    PageSize(u32),
}

#[derive(Serialize)]
struct Listing<'a> {
    breakpoints: Vec<&'a Breakpoint>,
    watchpoints: Vec<Watchpoint>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::parse();
    init_logging(opt.verbose);

    let session = Session::load(&opt.file)?;
    let mut debugger = Debugger::new(Arc::new(NullHost));
    // No emulator is running, so this thread is the execution thread.
    debugger.load_session(&Inline, &session, &ComparisonParser);

    match opt.command {
        Command::List { json } => {
            if json {
                let listing = Listing {
                    breakpoints: debugger.breakpoints.iter().collect(),
                    watchpoints: debugger.watchpoints.snapshot(),
                };
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                for bp in debugger.breakpoints.iter() {
                    println!("{}", codec::encode_breakpoint(bp));
                }
                for wp in debugger.watchpoints.snapshot() {
                    println!("{}  # {} hits", codec::encode_watchpoint(&wp), wp.hit_count);
                }
            }
        }
        Command::Normalize { output } => {
            let normalized = debugger.save_session();
            match output {
                Some(path) => {
                    normalized.save(&path)?;
                    log::info!("wrote {}", path.display());
                }
                None => print!("{}", normalized.render()),
            }
        }
        Command::Find { address, length } => match debugger.watchpoints.find(address, length) {
            Some(wp) => println!("{}", codec::encode_watchpoint(&wp)),
            None => println!("No watchpoint at {address:08x}"),
        },
        Command::Overlaps { address, page_size } => {
            if !page_size.is_power_of_two() {
                return Err(Box::new(ArgError::PageSize(page_size)));
            }
            println!("{}", debugger.watchpoints.overlaps(address, page_size));
        }
    }

    Ok(())
}

/// RUST_LOG, default `info`. Verbosity flags take precedence.
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .init();
}

/// Hex address with optional `$` or `0x` prefix.
fn parse_address(s: &str) -> Result<u32, String> {
    let digits = s
        .strip_prefix('$')
        .or_else(|| s.strip_prefix("0x"))
        .unwrap_or(s);
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid address `{s}`: {e}"))
}

/// Decimal, or hex with `0x`.
fn parse_int(s: &str) -> Result<u32, String> {
    let (digits, radix) = match s.strip_prefix("0x") {
        Some(stripped) => (stripped, 16),
        None => (s, 10),
    };
    let digits = digits.replace('_', "");
    u32::from_str_radix(&digits, radix).map_err(|e| format!("invalid number `{s}`: {e}"))
}
