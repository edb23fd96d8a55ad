//! Runs the binaries as child processes. Anything that might write through a
//! guessed address only ever runs out here.

use std::ffi::OsString;
use std::io::Read;
use stackstride::config::{MODE_ENV, SEED_ENV};
use std::time::Duration;
use subprocess::{ExitStatus, Popen, PopenConfig, Redirection};

const BOUND: Duration = Duration::from_secs(30);
const SEED: &str = "631";

struct Outcome {
  status: ExitStatus,
  stdout: String,
  stderr: String,
}

impl Outcome {
  fn code(&self) -> Option<u32> {
    match self.status {
      ExitStatus::Exited(code) => Some(code),
      _ => None,
    }
  }

  fn lines_starting(&self, prefix: &str) -> Vec<&str> {
    self.stdout.lines().filter(|l| l.starts_with(prefix)).collect()
  }
}

/// Runs `bin` in test mode with a pinned seed, killing it if it overstays.
fn run(bin: &str, args: &[&str]) -> Outcome { run_seeded(bin, args, Some(SEED)) }

/// Like [`run`], but `None` leaves the seed unset.
fn run_seeded(bin: &str, args: &[&str], seed: Option<&str>) -> Outcome {
  let mut env: Vec<(OsString, OsString)> = PopenConfig::current_env()
    .into_iter()
    .filter(|(k, _)| k.as_os_str() != MODE_ENV && k.as_os_str() != SEED_ENV)
    .collect();
  env.push((MODE_ENV.into(), "test".into()));
  if let Some(seed) = seed {
    env.push((SEED_ENV.into(), seed.into()));
  }

  let mut argv = vec![bin];
  argv.extend_from_slice(args);
  let mut p = Popen::create(
    &argv,
    PopenConfig { stdout: Redirection::Pipe, stderr: Redirection::Pipe, env: Some(env), ..Default::default() },
  )
  .unwrap();

  let status = match p.wait_timeout(BOUND).unwrap() {
    Some(status) => status,
    None => {
      p.kill().unwrap();
      p.wait().unwrap();
      panic!("{} {:?} still running after {:?}", bin, args, BOUND);
    }
  };
  let mut stdout = String::new();
  let mut stderr = String::new();
  p.stdout.take().unwrap().read_to_string(&mut stdout).unwrap();
  p.stderr.take().unwrap().read_to_string(&mut stderr).unwrap();
  Outcome { status, stdout, stderr }
}

fn stackguess(args: &[&str]) -> Outcome { run(env!("CARGO_BIN_EXE_stackguess"), args) }

fn observed_offset(out: &Outcome) -> isize {
  let line = out.lines_starting("Observed offset: ");
  assert_eq!(line.len(), 1, "stdout:\n{}", out.stdout);
  line[0].trim_start_matches("Observed offset: ").parse().unwrap()
}

#[test]
fn stackguess_without_an_offset_is_a_usage_error() {
  let out = stackguess(&[]);
  assert_eq!(out.code(), Some(64));
  assert!(out.stderr.contains("missing required argument"), "{}", out.stderr);
  assert!(out.stderr.contains("Usage"), "{}", out.stderr);
  assert!(out.stdout.is_empty());
}

#[test]
fn stackguess_refuses_a_zero_or_garbled_offset() {
  for bad in ["0", "twelve"] {
    let out = stackguess(&[bad]);
    assert_eq!(out.code(), Some(64), "{:?}", bad);
    assert!(out.stderr.contains("Invalid offset"), "{}", out.stderr);
    assert!(out.stdout.is_empty());
  }
}

#[test]
fn stackguess_calibrates() {
  let out = stackguess(&["--calibrate"]);
  assert!(out.status.success(), "{}", out.stderr);
  assert_ne!(observed_offset(&out), 0);
  assert_eq!(out.lines_starting("T1 guesses").len(), 0);
}

#[test]
fn stackguess_with_the_calibrated_offset_overwrites_the_secret() {
  let calibrated = observed_offset(&stackguess(&["--calibrate"]));
  let offset = calibrated.to_string();
  let out = stackguess(&[offset.as_str()]);
  assert!(out.status.success(), "{}", out.stderr);
  // Thread stacks land the same distance apart from one process to the next.
  // If that ever stops holding, the observed offset says by how much.
  assert_eq!(observed_offset(&out), calibrated, "stdout:\n{}", out.stdout);
  assert_eq!(out.lines_starting("Now T0 says its random number is: 1111111111").len(), 1, "{}", out.stdout);
  assert_eq!(out.lines_starting("T1 guesses T0 is at").len(), 1);
}

#[test]
fn stackguess_with_a_wild_offset_terminates() {
  // Far outside anything mapped: expect a crash, accept anything that ends.
  let _ = stackguess(&["1099511627776"]);
}

#[test]
fn stackpeek_is_deterministic_under_a_seed() {
  let first = run(env!("CARGO_BIN_EXE_stackpeek"), &[]);
  let second = run(env!("CARGO_BIN_EXE_stackpeek"), &[]);
  assert!(first.status.success(), "{}", first.stderr);
  assert!(second.status.success(), "{}", second.stderr);

  assert_eq!(peek_secrets(&first).len(), 2);
  assert_eq!(peek_secrets(&first), peek_secrets(&second));
  assert_eq!(first.lines_starting("Now T1 says its random number is: 1111111111").len(), 1);
}

fn peek_secrets(o: &Outcome) -> Vec<String> {
  o.stdout.lines().filter(|l| l.starts_with('T') && l.contains("says its random number is")).map(str::to_owned).collect()
}

#[test]
fn stackpeek_in_test_mode_is_reproducible_without_a_seed() {
  let bin = env!("CARGO_BIN_EXE_stackpeek");
  let first = run_seeded(bin, &[], None);
  std::thread::sleep(Duration::from_millis(1100));
  let second = run_seeded(bin, &[], None);
  assert!(first.status.success(), "{}", first.stderr);
  assert!(second.status.success(), "{}", second.stderr);
  assert_eq!(peek_secrets(&first).len(), 2);
  assert_eq!(peek_secrets(&first), peek_secrets(&second));
}

#[test]
fn stackstride_prints_one_line_per_thread_and_pairwise_deltas() {
  let out = run(env!("CARGO_BIN_EXE_stackstride"), &["4"]);
  assert!(out.status.success(), "{}", out.stderr);
  assert_eq!(out.stdout.lines().filter(|l| l.starts_with("Thread ") && l.contains(" is at ")).count(), 4);
  assert_eq!(out.stdout.lines().filter(|l| l.ends_with(" bytes")).count(), 3);
  assert_eq!(out.lines_starting("Guard size:").len(), 1);
  assert_eq!(out.lines_starting("main at ").len(), 1);
  assert_eq!(out.lines_starting("args at ").len(), 1);
  if cfg!(target_os = "linux") {
    assert_eq!(out.lines_starting("environ at ").len(), 1, "{}", out.stdout);
  }
}

#[test]
fn stackstride_defaults_to_three_threads() {
  let out = run(env!("CARGO_BIN_EXE_stackstride"), &[]);
  assert!(out.status.success(), "{}", out.stderr);
  assert_eq!(out.stdout.lines().filter(|l| l.ends_with(" bytes")).count(), 2);
}

#[test]
fn stackstride_rejects_bad_thread_counts() {
  for bad in ["0", "many"] {
    let out = run(env!("CARGO_BIN_EXE_stackstride"), &[bad]);
    assert_eq!(out.code(), Some(64), "{:?}: {}", bad, out.stderr);
    assert!(out.stdout.is_empty(), "{:?} printed:\n{}", bad, out.stdout);
  }
}
