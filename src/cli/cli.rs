use std::path::PathBuf;
use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use polycount::scheduler::{self, Checkpoint, Outcome, ParallelOptions};

/// Count the free polycubes of every size up to N (OEIS A000162).
#[derive(Clone, Parser)]
pub struct Opts {
    /// The largest polycube size to count. Required unless resuming
    /// from a checkpoint, which remembers it.
    #[clap(short)]
    pub n: Option<usize>,

    /// Worker thread count. 0 runs single-threaded; 2 or more split the
    /// search across workers. 1 is rejected. Defaults to the logical
    /// CPU count, or to single-threaded on a one-core machine.
    #[clap(long)]
    pub threads: Option<usize>,

    /// Polycube size at which the search splits into independent jobs.
    /// Defaults to 8, clamped below the target size.
    #[clap(long = "spawn-n")]
    pub spawn_n: Option<usize>,

    /// Continue a halted run from its checkpoint file.
    #[clap(long = "resume-from-file")]
    pub resume_from_file: Option<PathBuf>,
}

/// Sentinel file that requests a clean halt: `halt-signal.txt` next to
/// the executable, falling back to the working directory.
fn halt_file() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| Some(exe.parent()?.join("halt-signal.txt")))
        .unwrap_or_else(|| PathBuf::from("halt-signal.txt"))
}

fn bad_args(message: &str) -> ! {
    eprintln!("{message}");
    exit(1);
}

fn print_results(counts: &[u64], elapsed_sec: f64) {
    println!("\nresults:");
    for (n, &count) in counts.iter().enumerate() {
        if n > 0 && count > 0 {
            println!("n = {n:>2}: {count}");
        }
    }
    println!("elapsed seconds: {elapsed_sec}");
}

fn main() {
    let opts = Opts::parse();

    let checkpoint = opts.resume_from_file.as_ref().map(|path| {
        match Checkpoint::read(path) {
            Ok(checkpoint) => checkpoint,
            Err(e) => bad_args(&format!("cannot read checkpoint {}: {e}", path.display())),
        }
    });

    let n = match (opts.n, &checkpoint) {
        (Some(n), Some(checkpoint)) if n != checkpoint.n => {
            bad_args("-n disagrees with the checkpoint; drop the flag when resuming")
        }
        (_, Some(checkpoint)) => checkpoint.n,
        (Some(n), None) => n,
        (None, None) => bad_args("-n is required (use --resume-from-file to continue a halted run)"),
    };
    if n < 2 {
        bad_args("-n must be at least 2");
    }

    // the default must never collide with the rejected value, so a
    // one-core machine maps to the single-threaded path
    let mut threads = match opts.threads {
        Some(1) => {
            bad_args("--threads 1 is rejected; use 0 for single-threaded or 2+ for parallel")
        }
        Some(threads) => threads,
        None => match num_cpus::get() {
            0 | 1 => 0,
            cores => cores,
        },
    };

    if checkpoint.is_some() && threads < 2 {
        bad_args("--resume-from-file needs --threads 2 or more");
    }

    // the split size can only be defaulted once n is known
    let spawn_n = if let Some(checkpoint) = &checkpoint {
        checkpoint.spawn_n
    } else if let Some(spawn_n) = opts.spawn_n {
        spawn_n
    } else {
        (n - 1).min(8).max(4)
    };
    if threads >= 2 && !(4..n).contains(&spawn_n) {
        let all_defaulted =
            checkpoint.is_none() && opts.spawn_n.is_none() && opts.threads.is_none();
        if all_defaulted {
            // nothing to split at this size; run single-threaded
            threads = 0;
        } else if opts.spawn_n.is_none() {
            bad_args(&format!("n = {n} is too small to split; use --threads 0"));
        } else {
            bad_args(&format!("--spawn-n must satisfy 4 <= spawn_n < {n}"));
        }
    }

    let halt_file = halt_file();
    if halt_file.exists() {
        bad_args(&format!(
            "halt signal {} already present; remove it to run",
            halt_file.display()
        ));
    }

    let halt_flag = Arc::new(AtomicBool::new(false));
    {
        let halt_flag = halt_flag.clone();
        thread::spawn(move || loop {
            if halt_file.exists() {
                halt_flag.store(true, Ordering::Relaxed);
                return;
            }
            thread::sleep(Duration::from_millis(500));
        });
    }

    let prior_elapsed = checkpoint
        .as_ref()
        .map(|checkpoint| checkpoint.total_elapsed_sec)
        .unwrap_or(0.0);
    let prior_counts = checkpoint.as_ref().map(|checkpoint| checkpoint.counts.clone());
    let seed_jobs = checkpoint.map(|checkpoint| checkpoint.unevaluated_polycubes);

    let start = Instant::now();
    let mut outcome: Outcome = if threads == 0 {
        scheduler::run_single(n, halt_flag)
    } else {
        scheduler::run_parallel(ParallelOptions {
            n,
            threads,
            spawn_n,
            seed_jobs,
            halt_flag,
            quiet: false,
        })
    };
    let elapsed_sec = prior_elapsed + start.elapsed().as_secs_f64();

    if let Some(prior) = prior_counts {
        for (total, prior) in outcome.counts.iter_mut().zip(&prior) {
            *total += prior;
        }
    }

    if let Some(message) = &outcome.failure {
        eprintln!("worker failed: {message}");
        print_results(&outcome.counts, elapsed_sec);
        exit(1);
    }

    if outcome.halted && !outcome.unevaluated.is_empty() {
        let checkpoint = Checkpoint {
            n,
            spawn_n,
            counts: outcome.counts.clone(),
            total_elapsed_sec: elapsed_sec,
            unevaluated_polycubes: std::mem::take(&mut outcome.unevaluated),
        };
        let name = checkpoint.file_name();
        match checkpoint.write(&name) {
            Ok(()) => println!("halted; checkpoint written to {name}"),
            Err(e) => {
                eprintln!("failed to write checkpoint {name}: {e}");
                print_results(&outcome.counts, elapsed_sec);
                exit(1);
            }
        }
    } else if outcome.halted && threads == 0 {
        // parallel runs with nothing left unevaluated finished all
        // their work before the halt landed; only the single-threaded
        // path loses progress without a checkpoint
        println!("halted before completion; partial counts follow");
    }

    print_results(&outcome.counts, elapsed_sec);
}
