//! Playfair key squares and the moves used to explore them.

use crate::alphabet::{Alphabet, Dim, MAX_SQUARE};
use crate::error::{Error, Result};
use crate::perms::Permutations;
use crate::symbols::SymbolSet;
use rand::Rng;

/// A key square, a permutation of the symbol codes `0..SQUARE` laid out row by row.
///
/// Keys are small `Copy` values. Every mutation returns a new child and leaves `self` untouched.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    dim: Dim,
    cells: [u8; MAX_SQUARE],
}

impl Key {
    /// The symbols in alphabet order
    #[must_use]
    pub fn simple(dim: Dim) -> Self {
        let mut cells = [0; MAX_SQUARE];
        for (cell, code) in cells.iter_mut().zip(0u8..).take(dim.square()) {
            *cell = code;
        }
        Self { dim, cells }
    }

    /// A uniformly random key, shuffled from [`Key::simple`] with `rng`
    pub fn random(dim: Dim, rng: &mut impl Rng) -> Self {
        let mut key = Self::simple(dim);
        for i in (1..dim.square()).rev() {
            let j = rng.gen_range(0..=i);
            if i != j {
                key = key.swap(i, j);
            }
        }
        key
    }

    /// Builds a key from a keyword: its letters in order without repeats, then the rest of the
    /// alphabet. A complete square written row by row is accepted as its own keyword.
    pub fn from_keyword(alphabet: &Alphabet, keyword: &str) -> Result<Self> {
        let dim = alphabet.dim();
        let mut seen = SymbolSet::<1>::new();
        let mut cells = [0; MAX_SQUARE];
        let mut len = 0;

        let all = (0..).take(alphabet.len());
        for code in alphabet.filter(keyword).into_iter().chain(all) {
            if seen.insert(code) {
                cells[len] = code;
                len += 1;
            }
        }

        let key = Self { dim, cells };
        if len == dim.square() {
            Ok(key)
        } else {
            Err(Error::InvalidKey(format!("expected {} symbols, got {}", dim.square(), len)))
        }
    }

    /// Builds a key from raw cells, checking that they form a permutation
    pub fn from_cells(dim: Dim, cells: &[u8]) -> Result<Self> {
        if cells.len() != dim.square() {
            return Err(Error::InvalidKey(format!(
                "expected {} cells, got {}",
                dim.square(),
                cells.len()
            )));
        }
        let mut key = Self::simple(dim);
        key.cells[..cells.len()].copy_from_slice(cells);
        if key.is_permutation() {
            Ok(key)
        } else {
            Err(Error::InvalidKey("cells are not a permutation".into()))
        }
    }

    /// Square size
    #[must_use]
    pub fn dim(&self) -> Dim {
        self.dim
    }

    /// Cells in row-major order
    #[must_use]
    pub fn cells(&self) -> &[u8] {
        &self.cells[..self.dim.square()]
    }

    /// Symbol at a row and a column
    #[must_use]
    pub fn at(&self, row: usize, col: usize) -> u8 {
        self.cells[row * self.dim.len() + col]
    }

    /// Maps every symbol code to its position in the square
    #[must_use]
    pub fn inverse(&self) -> [u8; MAX_SQUARE] {
        let mut inverse = [0; MAX_SQUARE];
        for (pos, &code) in (0u8..).zip(self.cells()) {
            inverse[usize::from(code)] = pos;
        }
        inverse
    }

    /// Checks that every code `0..SQUARE` appears exactly once
    #[must_use]
    pub fn is_permutation(&self) -> bool {
        let square = self.dim.square();
        let mut seen = SymbolSet::<1>::new();
        self.cells()
            .iter()
            .all(|&code| usize::from(code) < square && seen.insert(code))
    }

    /// Exchanges two cells
    #[must_use]
    pub fn swap(&self, i: usize, j: usize) -> Self {
        let mut child = *self;
        child.cells.swap(i, j);
        child
    }

    /// Rotates three distinct cells: `i` takes the symbol of `j`, `j` the symbol of `k`, `k` the
    /// symbol of `i`
    #[must_use]
    pub fn swap3(&self, i: usize, j: usize, k: usize) -> Self {
        debug_assert!(i != j && j != k && i != k);
        let mut child = *self;
        child.cells[i] = self.cells[j];
        child.cells[j] = self.cells[k];
        child.cells[k] = self.cells[i];
        child
    }

    /// Exchanges two rows
    #[must_use]
    pub fn swap_rows(&self, r1: usize, r2: usize) -> Self {
        let dim = self.dim.len();
        let mut child = *self;
        for c in 0..dim {
            child.cells.swap(r1 * dim + c, r2 * dim + c);
        }
        child
    }

    /// Exchanges two columns
    #[must_use]
    pub fn swap_cols(&self, c1: usize, c2: usize) -> Self {
        let dim = self.dim.len();
        let mut child = *self;
        for r in 0..dim {
            child.cells.swap(r * dim + c1, r * dim + c2);
        }
        child
    }

    /// Reorders all rows: row `r` of the child is row `perm[r]` of `self`
    #[must_use]
    pub fn permute_rows(&self, perms: &Permutations, index: usize) -> Self {
        let dim = self.dim.len();
        let perm = perms.get(index);
        let mut child = *self;
        for (r, &from) in perm.iter().enumerate() {
            let from = usize::from(from);
            child.cells[r * dim..(r + 1) * dim]
                .copy_from_slice(&self.cells[from * dim..(from + 1) * dim]);
        }
        child
    }

    /// Reorders all columns: column `c` of the child is column `perm[c]` of `self`
    #[must_use]
    pub fn permute_cols(&self, perms: &Permutations, index: usize) -> Self {
        let dim = self.dim.len();
        let perm = perms.get(index);
        let mut child = *self;
        for r in 0..dim {
            for (c, &from) in perm.iter().enumerate() {
                child.cells[r * dim + c] = self.cells[r * dim + usize::from(from)];
            }
        }
        child
    }

    /// Reorders the cells inside one row
    #[must_use]
    pub fn permute_row_cols(&self, row: usize, perms: &Permutations, index: usize) -> Self {
        let dim = self.dim.len();
        let perm = perms.get(index);
        let mut child = *self;
        for (c, &from) in perm.iter().enumerate() {
            child.cells[row * dim + c] = self.cells[row * dim + usize::from(from)];
        }
        child
    }

    /// Reorders the cells inside one column
    #[must_use]
    pub fn permute_col_rows(&self, col: usize, perms: &Permutations, index: usize) -> Self {
        let dim = self.dim.len();
        let perm = perms.get(index);
        let mut child = *self;
        for (r, &from) in perm.iter().enumerate() {
            child.cells[r * dim + col] = self.cells[usize::from(from) * dim + col];
        }
        child
    }

    /// The square as rows of characters
    #[must_use]
    pub fn grid(&self) -> Vec<Vec<char>> {
        let alphabet = Alphabet::new(self.dim);
        self.cells()
            .chunks(self.dim.len())
            .map(|row| row.iter().map(|&code| alphabet.char(code)).collect())
            .collect()
    }

    /// The cells as one line of text, usable with [`Key::from_keyword`]
    #[must_use]
    pub fn to_keyword(&self) -> String {
        Alphabet::new(self.dim).decode(self.cells())
    }
}

/// One row per line, symbols separated by spaces
impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (r, row) in self.grid().iter().enumerate() {
            if r > 0 {
                writeln!(f)?;
            }
            for (c, symbol) in row.iter().enumerate() {
                if c > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{symbol}")?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Key({})", self.to_keyword())
    }
}
