//! Splitting the search across worker threads.
//!
//! One delegator thread runs the growth recursion only up to a cutoff
//! size and queues every polycube of exactly that size as an
//! independent job. Worker threads drain the job queue, each running an
//! unbounded enumeration and reporting a private per-size tally back on
//! a response channel; only the main thread touches the global totals.
//! A raised halt flag makes workers hand their current job back
//! unevaluated, which is exactly what a checkpoint needs to resume.

mod checkpoint;
pub use checkpoint::Checkpoint;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use indicatif::ProgressBar;

use crate::enumerate::{extend, grow, HaltWatch, Halted};
use crate::polycube::{Polycube, Pos};

/// Published values of A000162, indexed by polycube size. Provides the
/// expected job total (and with it the ETA) when splitting at
/// `spawn_n`, and the reference sequence for the tests.
pub const KNOWN_COUNTS: [u64; 17] = [
    0,
    1,
    1,
    2,
    8,
    29,
    166,
    1023,
    6922,
    48311,
    346543,
    2522522,
    18598427,
    138462649,
    1039496297,
    7859514470,
    59795121480,
];

/// Queue poll timeout for workers and the main drain loop.
const POLL: Duration = Duration::from_secs(1);

pub struct ParallelOptions {
    /// Largest polycube size to count.
    pub n: usize,
    /// Total thread count, delegator included. At least 2.
    pub threads: usize,
    /// Size at which children become independent jobs.
    pub spawn_n: usize,
    /// Checkpointed jobs to run instead of delegating.
    pub seed_jobs: Option<Vec<Vec<Pos>>>,
    /// Raised by the sentinel monitor (or a worker failure) to stop.
    pub halt_flag: Arc<AtomicBool>,
    /// Suppress the progress bar.
    pub quiet: bool,
}

pub struct Outcome {
    pub counts: Vec<u64>,
    /// The run stopped on the halt flag; `unevaluated` holds every job
    /// that was queued or in flight when it did.
    pub halted: bool,
    pub unevaluated: Vec<Vec<Pos>>,
    /// A worker died; reported instead of silently losing its jobs.
    pub failure: Option<String>,
}

/// What comes back on the response channel.
enum Reply {
    /// Per-size counts from one fully evaluated job.
    Job(Vec<u64>),
    /// The delegator's tally for the sizes below the cutoff.
    Local(Vec<u64>),
    /// A job abandoned after a halt, as its cube positions.
    Unevaluated(Vec<Pos>),
    /// A job that brought its worker down.
    Failed(String),
}

/// Single-threaded enumeration, the `--threads 0` path.
pub fn run_single(n: usize, halt_flag: Arc<AtomicBool>) -> Outcome {
    let mut counts = vec![0u64; n + 1];
    let halt = HaltWatch::new(halt_flag);
    let halted = extend(&mut Polycube::new(), n, &mut counts, &halt).is_err();
    Outcome {
        counts,
        halted,
        unevaluated: Vec::new(),
        failure: None,
    }
}

pub fn run_parallel(opts: ParallelOptions) -> Outcome {
    let ParallelOptions {
        n,
        threads,
        spawn_n,
        seed_jobs,
        halt_flag,
        quiet,
    } = opts;
    assert!(threads >= 2, "parallel mode needs a delegator and a worker");

    let (submit_tx, submit_rx) = unbounded::<Vec<Pos>>();
    let (reply_tx, reply_rx) = unbounded::<Reply>();

    let expected = match &seed_jobs {
        Some(jobs) => Some(jobs.len() as u64),
        None => KNOWN_COUNTS.get(spawn_n).copied(),
    };

    let mut counts = vec![0u64; n + 1];
    let mut unevaluated: Vec<Vec<Pos>> = Vec::new();
    let mut failure: Option<String> = None;

    thread::scope(|scope| {
        for _ in 0..threads - 1 {
            let submit_rx = submit_rx.clone();
            let reply_tx = reply_tx.clone();
            let halt_flag = halt_flag.clone();
            scope.spawn(move || worker_loop(n, submit_rx, reply_tx, halt_flag));
        }

        match seed_jobs {
            // resuming: the frontier is already known
            Some(jobs) => {
                for job in jobs {
                    submit_tx
                        .send(job)
                        .expect("workers hold the submit receiver");
                }
                drop(submit_tx);
            }
            None => {
                let submit_rx = submit_rx.clone();
                let reply_tx = reply_tx.clone();
                let halt_flag = halt_flag.clone();
                scope.spawn(move || {
                    delegate(n, spawn_n, submit_tx, &reply_tx);
                    // nothing left to delegate; help drain the queue
                    worker_loop(n, submit_rx, reply_tx, halt_flag);
                });
            }
        }
        drop(reply_tx);

        let bar = if quiet {
            ProgressBar::hidden()
        } else if let Some(total) = expected {
            crate::make_bar(total)
        } else {
            ProgressBar::new_spinner()
        };
        bar.set_message(format!("jobs evaluated for N = {n}"));

        let mut completed = 0u64;
        loop {
            match reply_rx.recv_timeout(POLL) {
                Ok(Reply::Job(job_counts)) => {
                    completed += 1;
                    merge(&mut counts, &job_counts);
                    bar.inc(1);
                    if let Some(total) = expected {
                        bar.set_message(format!(
                            "jobs evaluated for N = {n} ({} outstanding, a({n}) = {})",
                            total.saturating_sub(completed),
                            counts[n],
                        ));
                    } else {
                        bar.set_message(format!(
                            "jobs evaluated for N = {n} (a({n}) = {})",
                            counts[n],
                        ));
                    }
                }
                Ok(Reply::Local(local)) => merge(&mut counts, &local),
                Ok(Reply::Unevaluated(job)) => unevaluated.push(job),
                Ok(Reply::Failed(message)) => {
                    // stop dispatching; idle workers exit on the flag
                    halt_flag.store(true, Ordering::Relaxed);
                    failure.get_or_insert(message);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        if halt_flag.load(Ordering::Relaxed) {
            bar.abandon();
        } else {
            bar.finish();
        }
    });

    // jobs still queued after every thread exited were never picked up
    while let Ok(job) = submit_rx.try_recv() {
        unevaluated.push(job);
    }

    let halted = halt_flag.load(Ordering::Relaxed) && failure.is_none();
    Outcome {
        counts,
        halted,
        unevaluated,
        failure,
    }
}

/// Run the bounded search that queues every canonical polycube of size
/// `spawn_n` as an independent job and tallies the smaller sizes
/// locally. The halt flag is deliberately ignored here: delegation is
/// bounded by `spawn_n` and completing it keeps the frontier, and with
/// it any checkpoint, complete.
fn delegate(n: usize, spawn_n: usize, submit: Sender<Vec<Pos>>, reply: &Sender<Reply>) {
    let mut local = vec![0u64; n + 1];
    let halt = HaltWatch::disabled();
    grow(&mut Polycube::new(), n, &mut local, &halt, &mut |child| {
        if child.size() == spawn_n {
            let _ = submit.send(child.positions().collect());
            true
        } else {
            false
        }
    })
    .expect("delegation watches a flag nobody raises");
    let _ = reply.send(Reply::Local(local));
}

fn worker_loop(
    n: usize,
    submit: Receiver<Vec<Pos>>,
    reply: Sender<Reply>,
    halt_flag: Arc<AtomicBool>,
) {
    loop {
        if halt_flag.load(Ordering::Relaxed) {
            return;
        }
        let job = match submit.recv_timeout(POLL) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return,
        };

        let halt = HaltWatch::new(halt_flag.clone());
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| run_job(&job, n, &halt)));
        let message = match outcome {
            Ok(Ok(job_counts)) => Reply::Job(job_counts),
            Ok(Err(Halted)) => Reply::Unevaluated(job),
            Err(payload) => Reply::Failed(panic_message(payload)),
        };
        if reply.send(message).is_err() {
            return;
        }
    }
}

fn run_job(job: &[Pos], n: usize, halt: &HaltWatch) -> Result<Vec<u64>, Halted> {
    let mut polycube = match Polycube::from_positions(job) {
        Some(polycube) => polycube,
        None => panic!("job {job:?} is not a face-connected polycube"),
    };
    let mut job_counts = vec![0u64; n + 1];
    extend(&mut polycube, n, &mut job_counts, halt)?;
    Ok(job_counts)
}

fn merge(totals: &mut [u64], part: &[u64]) {
    for (total, part) in totals.iter_mut().zip(part) {
        *total += part;
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(n: usize, threads: usize, spawn_n: usize) -> ParallelOptions {
        ParallelOptions {
            n,
            threads,
            spawn_n,
            seed_jobs: None,
            halt_flag: Arc::new(AtomicBool::new(false)),
            quiet: true,
        }
    }

    fn expected_counts(n: usize) -> Vec<u64> {
        KNOWN_COUNTS[..=n].to_vec()
    }

    #[test]
    fn single_threaded_matches_published_counts() {
        let outcome = run_single(6, Arc::new(AtomicBool::new(false)));
        assert!(!outcome.halted);
        assert_eq!(outcome.counts, expected_counts(6));
    }

    #[test]
    fn parallel_matches_single_threaded() {
        for threads in [2, 3, 4] {
            let outcome = run_parallel(options(7, threads, 4));
            assert!(!outcome.halted, "threads = {threads}");
            assert!(outcome.unevaluated.is_empty());
            assert_eq!(outcome.counts, expected_counts(7), "threads = {threads}");
        }
    }

    #[test]
    fn cutoff_just_below_the_limit_still_works() {
        let outcome = run_parallel(options(6, 3, 5));
        assert_eq!(outcome.counts, expected_counts(6));
    }

    #[test]
    fn a_pre_raised_flag_returns_the_whole_frontier_unevaluated() {
        let halt_flag = Arc::new(AtomicBool::new(true));
        let outcome = run_parallel(ParallelOptions {
            halt_flag,
            ..options(7, 3, 5)
        });

        assert!(outcome.halted);
        // the delegator still finishes, so every size-5 job comes back
        assert_eq!(outcome.unevaluated.len() as u64, KNOWN_COUNTS[5]);
        // and the local tally covers everything below the cutoff
        assert_eq!(outcome.counts[..5], expected_counts(4)[..]);
        assert_eq!(outcome.counts[5..], [0, 0, 0]);
    }

    #[test]
    fn resuming_the_halted_frontier_completes_the_counts() {
        let n = 7;
        let halted = run_parallel(ParallelOptions {
            halt_flag: Arc::new(AtomicBool::new(true)),
            ..options(n, 3, 5)
        });

        let resumed = run_parallel(ParallelOptions {
            seed_jobs: Some(halted.unevaluated.clone()),
            ..options(n, 3, 5)
        });
        assert!(!resumed.halted);
        assert!(resumed.unevaluated.is_empty());

        let mut totals = halted.counts.clone();
        merge(&mut totals, &resumed.counts);
        assert_eq!(totals, expected_counts(n));
    }

    #[test]
    fn a_corrupt_job_is_surfaced_not_swallowed() {
        let outcome = run_parallel(ParallelOptions {
            // 0 and 7 are not face-adjacent
            seed_jobs: Some(vec![vec![0, 7]]),
            ..options(5, 2, 4)
        });
        assert!(outcome.failure.is_some());
        assert!(!outcome.halted);
    }
}
