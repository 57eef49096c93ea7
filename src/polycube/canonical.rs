//! Rotation-invariant fingerprinting.
//!
//! A polycube's fingerprint is the largest integer obtainable by
//! serializing the cube graph depth-first: 6 bits of rotated neighbor
//! mask per cube, most significant cube first. Starts and rotations are
//! restricted to the pairs that can reach the per-cube maximum, and a
//! candidate is abandoned as soon as its partial encoding falls strictly
//! below the best one found so far.

use hashbrown::HashSet;

use crate::rotations::{self, RotationTables, ROTATIONS};

use super::{Polycube, Pos};

/// Words needed for 6 bits per cube at the largest supported size
/// (22 cubes -> 132 bits).
const WORDS: usize = 3;

/// A serialized polycube value: 6 bits per cube, left-aligned in fixed
/// words so comparing encodings of equal length is plain word
/// comparison.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    words: [u64; WORDS],
    bits: u32,
}

impl Fingerprint {
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Append one 6-bit group at the current end.
    fn push(&mut self, group: u8) {
        debug_assert!(group < 64);
        debug_assert!((self.bits as usize) + 6 <= WORDS * 64);

        let used = (self.bits as usize) % 64;
        let word = (self.bits as usize) / 64;
        let group = group as u64;
        if used <= 58 {
            self.words[word] |= group << (58 - used);
        } else {
            // the group straddles a word boundary
            self.words[word] |= group >> (used - 58);
            self.words[word + 1] |= group << (122 - used);
        }
        self.bits += 6;
    }

    /// `true` when the bits written so far are strictly below the
    /// same-length prefix of `best`. Equal prefixes return `false`, so
    /// a candidate that could still tie is never abandoned.
    fn prefix_below(&self, best: &Fingerprint) -> bool {
        debug_assert!(self.bits <= best.bits);

        let full = (self.bits as usize) / 64;
        for word in 0..full {
            if self.words[word] != best.words[word] {
                return self.words[word] < best.words[word];
            }
        }

        let partial = (self.bits as usize) % 64;
        if partial == 0 {
            return false;
        }
        let mask = !0u64 << (64 - partial);
        (self.words[full] & mask) < (best.words[full] & mask)
    }
}

/// The cached canonical view of one polycube.
#[derive(Clone, Debug)]
pub struct CanonicalInfo {
    pub fingerprint: Fingerprint,
    /// Positions of the cube serialized last, across every (start,
    /// rotation) pair that reached `fingerprint`.
    pub tails: Vec<Pos>,
    /// Sorted per-cube maximum rotated masks. Redundant given the
    /// fingerprint; kept because it is cheap and handy when debugging.
    pub max_values: Vec<u8>,
}

impl Polycube {
    /// The canonical fingerprint, tail set, and per-cube maxima.
    ///
    /// Computed lazily; any `add` or `remove` drops the cache.
    pub fn canonical_info(&mut self) -> &CanonicalInfo {
        if self.canonical.is_none() {
            self.canonical = Some(self.compute_canonical());
        }
        self.canonical.as_ref().expect("cache populated above")
    }

    fn compute_canonical(&self) -> CanonicalInfo {
        let tables = rotations::tables();

        let mut max_values: Vec<u8> = self
            .cubes()
            .map(|cube| tables.max_value[cube.enc as usize])
            .collect();
        max_values.sort_unstable();
        let best_start = *max_values
            .last()
            .expect("an empty polycube has no canonical form");

        let mut fingerprint = Fingerprint::default();
        let mut tails: Vec<Pos> = Vec::new();

        // only cubes reaching the global maximum can open a maximal
        // encoding, and only with the rotations that get them there
        for cube in self.cubes() {
            if tables.max_value[cube.enc as usize] != best_start {
                continue;
            }
            for &rotation in &tables.max_indices[cube.enc as usize] {
                let Some((candidate, tail)) = self.serialize(cube.pos, rotation, tables, &fingerprint)
                else {
                    continue;
                };
                if fingerprint.is_empty() || candidate > fingerprint {
                    fingerprint = candidate;
                    tails.clear();
                    tails.push(tail);
                } else if candidate == fingerprint && !tails.contains(&tail) {
                    tails.push(tail);
                }
            }
        }

        CanonicalInfo {
            fingerprint,
            tails,
            max_values,
        }
    }

    /// Serialize the whole polycube depth-first from `start` under one
    /// rotation. Returns the encoding and the last position appended,
    /// or `None` if the candidate was pruned against `best`.
    fn serialize(
        &self,
        start: Pos,
        rotation: u8,
        tables: &RotationTables,
        best: &Fingerprint,
    ) -> Option<(Fingerprint, Pos)> {
        let mut fingerprint = Fingerprint::default();
        let mut visited: HashSet<Pos> = HashSet::with_capacity(self.n);
        let mut tail = start;
        self.serialize_from(
            start,
            rotation,
            tables,
            best,
            &mut fingerprint,
            &mut visited,
            &mut tail,
        )
        .then_some((fingerprint, tail))
    }

    /// Returns `false` when the partial encoding fell strictly below
    /// `best` and the candidate was abandoned.
    #[allow(clippy::too_many_arguments)]
    fn serialize_from(
        &self,
        pos: Pos,
        rotation: u8,
        tables: &RotationTables,
        best: &Fingerprint,
        fingerprint: &mut Fingerprint,
        visited: &mut HashSet<Pos>,
        tail: &mut Pos,
    ) -> bool {
        visited.insert(pos);
        let cube = self.cube(pos);
        fingerprint.push(tables.rotated[cube.enc as usize][rotation as usize]);
        *tail = pos;

        if !best.is_empty() && fingerprint.prefix_below(best) {
            return false;
        }

        for &dir in &ROTATIONS[rotation as usize] {
            if let Some(neighbor) = cube.neighbors[dir] {
                if !visited.contains(&neighbor)
                    && !self.serialize_from(
                        neighbor,
                        rotation,
                        tables,
                        best,
                        fingerprint,
                        visited,
                        tail,
                    )
                {
                    return false;
                }
            }
        }

        true
    }
}
