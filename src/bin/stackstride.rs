use clap::Parser;
use stackstride::cli::{self, GlobalOpts};
use stackstride::stack::{self, OsProbe};
use stackstride::driver::check_thread_count;
use stackstride::{Driver, Error};
use std::hint::black_box;
use std::process::ExitCode;

const USAGE: &str = "[--log LEVEL] [--seed SEED] [--mode MODE] [threads]";

/// Spawns a handful of threads and prints how far apart their stacks landed.
#[derive(Debug, Parser)]
#[command(name = "stackstride", version)]
struct Args {
  #[command(flatten)]
  global: GlobalOpts,

  /// How many threads to spawn.
  #[arg(value_name = "THREADS", default_value_t = 3)]
  threads: usize,
}

fn main() -> ExitCode {
  let args = match cli::parse_args::<Args>() {
    Ok(args) => args,
    Err(code) => return code,
  };
  args.global.init_tracing();
  match run(&args) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => cli::report("stackstride", USAGE, &err),
  }
}

fn run(args: &Args) -> Result<(), Error> {
  let threads = check_thread_count(args.threads)?;
  let config = args.global.config();
  let marker = 0u8;
  println!("main at {:p}", black_box(&marker));
  println!("args at {:p}", args);
  if let Some(env) = stack::environment() {
    println!("environ at {}", env);
  }
  println!();

  let process = stack::process_stack(config.mode, &OsProbe)?;
  let guard = process.guard_size.to_string();
  let limit = process.stack_limit.map_or_else(|| "unlimited".to_owned(), |l| l.to_string());
  let width = guard.len().max(limit.len());
  match process.page_size {
    Some(page) => {
      println!("Guard size: {:>w$} ({} pages)", guard, page.pages(process.guard_size), w = width);
      println!("Stack size: {:>w$}", limit, w = width);
      println!("Page size:  {:>w$}\n", page.size(), w = width);
    }
    None => {
      println!("Guard size: {:>w$}", guard, w = width);
      println!("Stack size: {:>w$}\n", limit, w = width);
    }
  }

  let report = Driver::new(&config).run(threads)?;
  for sample in &report.samples {
    let d = &sample.descriptor;
    println!("Thread {} is at {}.", sample.index, d.local);
    println!("Thread {} stack size: {}, guard size: {}.", sample.index, d.stack_size, d.guard_size);
  }

  println!("\nStack address differences between threads:");
  for (i, delta) in report.deltas.iter().enumerate() {
    println!("Thread {} - Thread {}: {} bytes", i, i + 1, delta);
  }
  Ok(())
}
