//! Example CLI driver: `sd-watch root1 [root2 ...]`.
//!
//! Not part of the core; a thin demonstration of [`sd_fs_watcher::Watcher`].
//! Prints one line per event to stdout and terminates on the first error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sd_fs_watcher::{Event, Op, WatchOptions, Watcher};
use tracing_subscriber::EnvFilter;

/// Watch one or more directories and print normalized change events.
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Directory roots to watch.
    #[arg(required = true)]
    roots: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    // clap exits with code 2 itself on a missing/invalid argument, matching
    // this driver's documented exit code.
    let args = Args::parse();

    let mut watcher = match Watcher::new(args.roots, WatchOptions::default()) {
        Ok(watcher) => watcher,
        Err(err) => {
            eprintln!("sd-watch: {err}");
            return ExitCode::FAILURE;
        }
    };

    loop {
        tokio::select! {
            event = watcher.next_event() => {
                match event {
                    Some(event) => print_event(&event),
                    None => break,
                }
            }
            error = watcher.next_error() => {
                match error {
                    Some(err) => {
                        eprintln!("sd-watch: {err}");
                        watcher.close().await;
                        return ExitCode::FAILURE;
                    }
                    None => break,
                }
            }
        }
    }

    watcher.close().await;
    ExitCode::SUCCESS
}

fn print_event(event: &Event) {
    match event.op {
        Op::Create => println!("CREATE: {}", event.path.display()),
        Op::Write => println!("WRITE: {}", event.path.display()),
        Op::Remove => println!("REMOVE: {}", event.path.display()),
        Op::Rename => println!(
            "RENAME: from {} to {}",
            event.old_path.as_ref().expect("Rename event always has old_path").display(),
            event.path.display()
        ),
    }
}
