//! Direction constants and the precomputed rotation tables consulted by
//! the canonicalizer.
//!
//! Every cube summarizes its six face neighbors as a 6-bit mask, bit
//! (5 - d) for direction d. A rotation of the whole polycube permutes
//! the six directions, so rotating a mask is a bit permutation and all
//! 64 x 24 outcomes can be tabulated once at startup.

use std::sync::OnceLock;

/// Signed position offset for each face direction, in the order
/// (-x, +x, -y, +y, -z, +z). Opposite directions differ by XOR 1.
pub const DIRECTION_COSTS: [i32; 6] = [-1, 1, -100, 100, -10_000, 10_000];

/// The 24 proper rotations of the cube, each written as a permutation of
/// the six face directions: entry j names the source direction that ends
/// up in slot j.
pub const ROTATIONS: [[usize; 6]; 24] = [
    [0, 1, 2, 3, 4, 5],
    [0, 1, 3, 2, 5, 4],
    [0, 1, 4, 5, 3, 2],
    [0, 1, 5, 4, 2, 3],
    [1, 0, 2, 3, 5, 4],
    [1, 0, 3, 2, 4, 5],
    [1, 0, 4, 5, 2, 3],
    [1, 0, 5, 4, 3, 2],
    [2, 3, 0, 1, 5, 4],
    [2, 3, 1, 0, 4, 5],
    [2, 3, 4, 5, 0, 1],
    [2, 3, 5, 4, 1, 0],
    [3, 2, 0, 1, 4, 5],
    [3, 2, 1, 0, 5, 4],
    [3, 2, 4, 5, 1, 0],
    [3, 2, 5, 4, 0, 1],
    [4, 5, 0, 1, 2, 3],
    [4, 5, 1, 0, 3, 2],
    [4, 5, 2, 3, 1, 0],
    [4, 5, 3, 2, 0, 1],
    [5, 4, 0, 1, 3, 2],
    [5, 4, 1, 0, 2, 3],
    [5, 4, 2, 3, 0, 1],
    [5, 4, 3, 2, 1, 0],
];

/// Rotate a 6-bit neighbor mask: bit (5 - j) of the result is bit
/// (5 - rotation[j]) of the input, matching the slot order the
/// serializer walks neighbors in.
#[inline]
pub fn rotate_mask(enc: u8, rotation: &[usize; 6]) -> u8 {
    let mut out = 0;
    for (j, &d) in rotation.iter().enumerate() {
        if enc & (1 << (5 - d)) != 0 {
            out |= 1 << (5 - j);
        }
    }
    out
}

pub struct RotationTables {
    /// `rotated[enc][r]` is mask `enc` under rotation `r`.
    pub rotated: [[u8; 24]; 64],
    /// Largest entry of `rotated[enc]`.
    pub max_value: [u8; 64],
    /// Rotation indices reaching `max_value[enc]`.
    pub max_indices: [Vec<u8>; 64],
}

impl RotationTables {
    fn build() -> Self {
        let mut rotated = [[0u8; 24]; 64];
        let mut max_value = [0u8; 64];
        let mut max_indices: [Vec<u8>; 64] = std::array::from_fn(|_| Vec::new());

        for enc in 0..64 {
            for (r, rotation) in ROTATIONS.iter().enumerate() {
                rotated[enc][r] = rotate_mask(enc as u8, rotation);
            }
            let max = *rotated[enc].iter().max().expect("24 rotations per mask");
            max_value[enc] = max;
            max_indices[enc] = (0..24u8)
                .filter(|&r| rotated[enc][r as usize] == max)
                .collect();
        }

        Self {
            rotated,
            max_value,
            max_indices,
        }
    }
}

/// The process-wide tables, built on first use and immutable afterwards.
pub fn tables() -> &'static RotationTables {
    static TABLES: OnceLock<RotationTables> = OnceLock::new();
    TABLES.get_or_init(RotationTables::build)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotations_are_distinct_permutations() {
        for rotation in &ROTATIONS {
            let mut seen = [false; 6];
            for &d in rotation {
                assert!(!seen[d]);
                seen[d] = true;
            }
        }
        for (i, a) in ROTATIONS.iter().enumerate() {
            for b in &ROTATIONS[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    /// Proper rotations map opposite faces to opposite faces.
    #[test]
    fn rotations_preserve_opposite_pairs() {
        for rotation in &ROTATIONS {
            for d in 0..6 {
                assert_eq!(rotation[d ^ 1], rotation[d] ^ 1);
            }
        }
    }

    /// Composing any two table entries lands back in the table.
    #[test]
    fn rotations_are_closed_under_composition() {
        for a in &ROTATIONS {
            for b in &ROTATIONS {
                let composed: [usize; 6] = std::array::from_fn(|j| a[b[j]]);
                assert!(ROTATIONS.contains(&composed));
            }
        }
    }

    #[test]
    fn identity_rotation_is_first() {
        for enc in 0..64 {
            assert_eq!(tables().rotated[enc][0], enc as u8);
        }
    }

    #[test]
    fn single_bit_masks_rotate_to_single_bits() {
        let tables = tables();
        for d in 0..6 {
            let enc = 1u8 << (5 - d);
            for r in 0..24 {
                assert_eq!(tables.rotated[enc as usize][r].count_ones(), 1);
            }
            // the -x bit is the most significant, so it is the maximum
            assert_eq!(tables.max_value[enc as usize], 0b100000);
        }
    }

    #[test]
    fn extreme_masks_are_rotation_invariant() {
        let tables = tables();
        assert_eq!(tables.max_value[0], 0);
        assert_eq!(tables.max_value[63], 63);
        assert_eq!(tables.max_indices[0].len(), 24);
        assert_eq!(tables.max_indices[63].len(), 24);
    }

    #[test]
    fn max_indices_reach_the_maximum() {
        let tables = tables();
        for enc in 0..64 {
            assert!(!tables.max_indices[enc].is_empty());
            for &r in &tables.max_indices[enc] {
                assert_eq!(tables.rotated[enc][r as usize], tables.max_value[enc]);
            }
        }
    }
}
