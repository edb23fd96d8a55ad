//! Bits shared by the three binaries: global flags, tracing, exit codes.

use crate::config::{Config, Mode, LOG_ENV, MODE_ENV, SEED_ENV};
use crate::error::{Error, EXIT_USAGE};
use clap::error::ErrorKind;
use clap::{Args, Parser};
use std::io::{self, IsTerminal};
use std::process::ExitCode;
use tracing::metadata::LevelFilter;
use tracing_subscriber::EnvFilter;

const DEFAULT_TRACE_LEVEL: LevelFilter = LevelFilter::WARN;

/// Options common to every binary.
#[derive(Debug, Clone, Args)]
pub struct GlobalOpts {
  /// The verbosity level of log output.
  #[arg(short, long, value_name = "LEVEL", env = LOG_ENV)]
  pub log: Option<LevelFilter>,

  /// Seed for the secrets, instead of the clock and pid.
  #[arg(long, value_name = "SEED", env = SEED_ENV)]
  pub seed: Option<u64>,

  /// `test` bounds every wait and treats missing stack queries as errors.
  #[arg(long, value_enum, value_name = "MODE", env = MODE_ENV, default_value_t = Mode::Demo)]
  pub mode: Mode,
}

impl GlobalOpts {
  pub fn config(&self) -> Config { Config::for_mode(self.mode, self.seed) }

  pub fn init_tracing(&self) { init_stderr_tracing(self.log) }
}

/// Installs a `fmt` subscriber on stderr. `RUST_LOG` still applies on top.
pub fn init_stderr_tracing(level: Option<LevelFilter>) {
  let filter = EnvFilter::from_default_env().add_directive(level.unwrap_or(DEFAULT_TRACE_LEVEL).into());
  // A second install (e.g. from a test) just keeps the first one.
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .with_ansi(io::stderr().is_terminal())
    .try_init();
}

/// Parses the command line, turning clap's own failures into our usage exit code.
pub fn parse_args<P: Parser>() -> Result<P, ExitCode> {
  P::try_parse().map_err(|err| {
    let _ = err.print();
    match err.kind() {
      ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
      _ => ExitCode::from(EXIT_USAGE),
    }
  })
}

/// Prints `err` to stderr (with `usage` for usage errors) and picks the exit code.
pub fn report(program: &str, usage: &str, err: &Error) -> ExitCode {
  eprintln!("{}: {}", program, err);
  if err.is_usage() {
    eprintln!("Usage: {} {}", program, usage);
  }
  ExitCode::from(err.exit_code())
}
