//! Tables of every ordering of the rows or columns of a square.

use crate::alphabet::Dim;
use itertools::Itertools;

/// All `DIM!` permutations of `0..DIM` in lexicographic order, stored flat.
#[derive(Clone, Debug)]
pub struct Permutations {
    dim: usize,
    table: Vec<u8>,
}

impl Permutations {
    /// Generates the table for a square size
    #[must_use]
    pub fn new(dim: Dim) -> Self {
        let dim = dim.len();
        let table: Vec<u8> = (0..dim as u8).permutations(dim).flatten().collect();
        Self { dim, table }
    }

    /// Number of permutations, 120 for 5 × 5 and 720 for 6 × 6
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len() / self.dim
    }

    /// Always false
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Permutation number `index`; `perm[i]` is the old position moved to position `i`.
    ///
    /// # Panics
    ///
    /// If `index >= self.len()`
    #[must_use]
    pub fn get(&self, index: usize) -> &[u8] {
        &self.table[index * self.dim..(index + 1) * self.dim]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn counts() {
        assert_eq!(Permutations::new(Dim::Five).len(), 120);
        assert_eq!(Permutations::new(Dim::Six).len(), 720);
    }

    #[test]
    fn first_is_identity() {
        let perms = Permutations::new(Dim::Five);
        assert_eq!(perms.get(0), &[0, 1, 2, 3, 4]);
        assert_eq!(perms.get(perms.len() - 1), &[4, 3, 2, 1, 0]);
    }

    #[test]
    fn all_distinct_and_valid() {
        let perms = Permutations::new(Dim::Six);
        let mut seen = HashSet::new();
        for i in 0..perms.len() {
            let perm = perms.get(i);
            let mut sorted = perm.to_vec();
            sorted.sort_unstable();
            assert_eq!(sorted, vec![0, 1, 2, 3, 4, 5]);
            assert!(seen.insert(perm.to_vec()));
        }
    }
}
