use clap::Parser;
use stackstride::cli::{self, GlobalOpts};
use stackstride::handoff::{self, HandoffConfig, LEADER, FOLLOWER};
use stackstride::{Driver, Error};
use std::process::ExitCode;

const USAGE: &str = "[--log LEVEL] [--seed SEED] [--mode MODE]";

/// Two threads read each other's secrets straight off each other's stacks,
/// then T0 rewrites T1's.
#[derive(Debug, Parser)]
#[command(name = "stackpeek", version)]
struct Args {
  #[command(flatten)]
  global: GlobalOpts,
}

fn main() -> ExitCode {
  let args = match cli::parse_args::<Args>() {
    Ok(args) => args,
    Err(code) => return code,
  };
  args.global.init_tracing();
  match run(&args) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => cli::report("stackpeek", USAGE, &err),
  }
}

fn run(args: &Args) -> Result<(), Error> {
  let config = args.global.config();
  let reports = handoff::peek(&Driver::new(&config), &HandoffConfig::new(&config))?;

  for r in &reports {
    let (me, peer) = (r.index, 1 - r.index);
    println!("T{} says it's at                 : {}", me, r.address);
    println!("T{} says T{} is at                : {}", me, peer, r.peer_address);
    println!("T{} says its random number is    : {}", me, r.initial);
    println!("T{} says T{}'s random number is   : {}\n", me, peer, r.observed_peer);
  }
  println!("T{} changed T{}'s number.", LEADER, FOLLOWER);
  for r in &reports {
    println!("Now T{} says its random number is: {}", r.index, r.final_secret);
  }
  Ok(())
}
