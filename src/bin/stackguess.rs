use clap::Parser;
use stackstride::cli::{self, GlobalOpts};
use stackstride::guess::{self, GuessConfig, GuessMode};
use stackstride::{Driver, Error};
use std::process::ExitCode;

const USAGE: &str = "[--log LEVEL] [--seed SEED] [--mode MODE] <offset | --calibrate>";

/// T1 guesses where T0's secret lives from the address of one of its own
/// locals plus OFFSET, and overwrites it. A bad guess scribbles on something
/// else or crashes.
#[derive(Debug, Parser)]
#[command(name = "stackguess", version)]
struct Args {
  #[command(flatten)]
  global: GlobalOpts,

  /// Bytes from T1's local to T0's buffer.
  #[arg(value_name = "OFFSET", allow_negative_numbers = true)]
  offset: Option<String>,

  /// Don't write anything; print the offset that would have been right.
  #[arg(long, conflicts_with = "offset")]
  calibrate: bool,
}

fn main() -> ExitCode {
  let args = match cli::parse_args::<Args>() {
    Ok(args) => args,
    Err(code) => return code,
  };
  args.global.init_tracing();
  match run(&args) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => cli::report("stackguess", USAGE, &err),
  }
}

fn run(args: &Args) -> Result<(), Error> {
  // Usage problems are caught before any thread exists.
  let mode = if args.calibrate {
    GuessMode::Calibrate
  } else {
    GuessMode::Strike(guess::parse_offset(args.offset.as_deref())?)
  };
  let config = args.global.config();
  let report = guess::run(&Driver::new(&config), mode, &GuessConfig::new(&config))?;

  println!("T0 is at {}", report.victim.address);
  println!("T0 says its random number is    : {}", report.victim.initial);
  println!("T1 is at {}", report.guesser.anchor);
  if let (Some(target), Some(found)) = (report.guesser.guessed, &report.guesser.observed) {
    println!("T1 guesses T0 is at {}", target);
    println!("T1 says T0's random number is   : {}", found);
  }
  println!("Now T0 says its random number is: {}", report.victim.final_secret);
  println!("Observed offset: {}", report.observed_offset());
  Ok(())
}
