//! Redelmeier-style growth with the canonical-parent test.
//!
//! Each polycube reached here is canonical by construction, so it is
//! counted, then grown by one cube in every rotationally distinct way.
//! An extension survives only if removing the canonical last cube of
//! the grown polycube gives back the one we grew, which makes every
//! free polycube the child of exactly one parent and therefore counted
//! exactly once.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hashbrown::HashSet;

use crate::polycube::{Fingerprint, Polycube, Pos};
use crate::rotations::DIRECTION_COSTS;

/// The one condition that unwinds the recursion: the shared halt flag
/// was observed. Not an error; the caller abandons the polycube and
/// reports it unevaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Halted;

/// Cooperative cancellation. Samples the shared flag once every 1024
/// ticks so the recursion hot path stays free of atomic reads.
pub struct HaltWatch {
    flag: Arc<AtomicBool>,
    ticks: Cell<u32>,
}

impl HaltWatch {
    pub fn new(flag: Arc<AtomicBool>) -> Self {
        Self {
            flag,
            ticks: Cell::new(0),
        }
    }

    /// A watch on a flag nobody raises.
    pub fn disabled() -> Self {
        Self::new(Arc::new(AtomicBool::new(false)))
    }

    pub fn raised(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    fn tick(&self) -> Result<(), Halted> {
        let ticks = self.ticks.get().wrapping_add(1);
        self.ticks.set(ticks);
        if ticks & 0x3ff == 0 && self.raised() {
            return Err(Halted);
        }
        Ok(())
    }
}

/// Count `p`, then recursively grow it towards `limit`, bumping
/// `counts[n]` once for every canonical polycube of size n reached.
///
/// Every canonical child is offered to `hand_off` before recursing;
/// returning `true` claims the child (the delegator queues it as an
/// independent job) and skips both its count and its subtree here.
///
/// On a normal return `p` is restored exactly: every add in the loop
/// body is matched by a remove, including the temporary tail removal of
/// the parent test. Only [`Halted`] unwinds without restoring.
pub fn grow<F>(
    p: &mut Polycube,
    limit: usize,
    counts: &mut [u64],
    halt: &HaltWatch,
    hand_off: &mut F,
) -> Result<(), Halted>
where
    F: FnMut(&mut Polycube) -> bool,
{
    counts[p.size()] += 1;
    if p.size() >= limit {
        return Ok(());
    }

    let parent = p.canonical_info().fingerprint;

    // candidates come from the entry snapshot; the loop mutates p
    let snapshot: Vec<Pos> = p.positions().collect();
    let mut tried: HashSet<Pos> = snapshot.iter().copied().collect();
    let mut seen: HashSet<Fingerprint> = HashSet::new();

    for &pos in &snapshot {
        for cost in DIRECTION_COSTS {
            let try_pos = pos + cost;
            if !tried.insert(try_pos) {
                continue;
            }
            halt.tick()?;

            p.add(try_pos);
            let (child, tail) = {
                let info = p.canonical_info();
                let tail = info
                    .tails
                    .iter()
                    .copied()
                    .min()
                    .expect("canonical info carries at least one tail");
                (info.fingerprint, tail)
            };

            // rotationally equivalent to an extension already handled
            // at this level
            if !seen.insert(child) {
                p.remove(try_pos);
                continue;
            }

            // the parent test: removing the canonical last cube must
            // give back p. When the tail is the cube just added that
            // holds trivially.
            let is_child_of_p = if tail == try_pos {
                true
            } else {
                p.remove(tail);
                let reduced = p.canonical_info().fingerprint;
                p.add(tail);
                reduced == parent
            };

            if is_child_of_p && !hand_off(p) {
                grow(p, limit, counts, halt, hand_off)?;
            }
            p.remove(try_pos);
        }
    }

    Ok(())
}

/// Full recursive enumeration from `p` up to `limit`.
pub fn extend(
    p: &mut Polycube,
    limit: usize,
    counts: &mut [u64],
    halt: &HaltWatch,
) -> Result<(), Halted> {
    grow(p, limit, counts, halt, &mut |_| false)
}
