use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::scheduler::{self, Checkpoint, ParallelOptions, KNOWN_COUNTS};

fn fresh_flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

fn parallel(n: usize, threads: usize, spawn_n: usize) -> ParallelOptions {
    ParallelOptions {
        n,
        threads,
        spawn_n,
        seed_jobs: None,
        halt_flag: fresh_flag(),
        quiet: true,
    }
}

#[test]
fn sequence_to_eight_single_threaded() {
    let outcome = scheduler::run_single(8, fresh_flag());
    assert_eq!(outcome.counts, KNOWN_COUNTS[..=8].to_vec());
}

#[test]
fn sequence_to_eight_parallel() {
    let outcome = scheduler::run_parallel(parallel(8, 4, 5));
    assert_eq!(outcome.counts, KNOWN_COUNTS[..=8].to_vec());
}

#[test]
fn splitting_one_below_the_limit_gives_single_step_jobs() {
    let outcome = scheduler::run_parallel(parallel(6, 2, 5));
    assert_eq!(outcome.counts, KNOWN_COUNTS[..=6].to_vec());
}

/// Halt with the whole frontier outstanding, write the checkpoint to
/// disk, read it back, resume, and land on the published counts.
#[test]
fn halt_checkpoint_resume_round_trip() {
    let n = 7;
    let spawn_n = 5;

    let halted = scheduler::run_parallel(ParallelOptions {
        halt_flag: Arc::new(AtomicBool::new(true)),
        ..parallel(n, 3, spawn_n)
    });
    assert!(halted.halted);
    assert!(!halted.unevaluated.is_empty());

    let checkpoint = Checkpoint {
        n,
        spawn_n,
        counts: halted.counts,
        total_elapsed_sec: 0.25,
        unevaluated_polycubes: halted.unevaluated,
    };
    let path = std::env::temp_dir().join(format!("polycount-{}-resume.json.gz", std::process::id()));
    checkpoint.write(&path).expect("write checkpoint");
    let reread = Checkpoint::read(&path).expect("read checkpoint");
    std::fs::remove_file(&path).ok();

    let resumed = scheduler::run_parallel(ParallelOptions {
        seed_jobs: Some(reread.unevaluated_polycubes),
        ..parallel(n, 3, spawn_n)
    });
    assert!(!resumed.halted);

    let totals: Vec<u64> = reread
        .counts
        .iter()
        .zip(&resumed.counts)
        .map(|(a, b)| a + b)
        .collect();
    assert_eq!(totals, KNOWN_COUNTS[..=n].to_vec());
}

/// Slow: the full sequence through a(10) = 346543.
#[test]
#[ignore]
fn sequence_to_ten_parallel() {
    let outcome = scheduler::run_parallel(parallel(10, 4, 6));
    assert_eq!(outcome.counts, KNOWN_COUNTS[..=10].to_vec());
}
