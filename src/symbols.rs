//! Fixed size bit set over small symbol codes.

/// A set of symbol codes below `64 * N`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SymbolSet<const N: usize> {
    buf: [u64; N],
}

impl<const N: usize> SymbolSet<N> {
    /// Empty set
    #[must_use]
    pub fn new() -> Self {
        Self { buf: [0; N] }
    }

    /// Adds a code, returns false if it was already present
    pub fn insert<T: Into<u32> + Copy>(&mut self, value: T) -> bool {
        let value = value.into();
        let idx = (value / u64::BITS) as usize;
        let bit = 1 << (value % u64::BITS);
        let fresh = self.buf[idx] & bit == 0;
        self.buf[idx] |= bit;
        fresh
    }
}

impl<const N: usize> Default for SymbolSet<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insert_reports_duplicates() {
        let mut set = SymbolSet::<1>::new();
        assert!(set.insert(3u8));
        assert!(!set.insert(3u8));
        assert!(set.insert(4u8));
        assert!(set.insert(63u8));
    }

    #[test]
    fn spans_words() {
        let mut set = SymbolSet::<2>::default();
        assert!(set.insert(70u32));
        assert!(set.insert(6u32));
        assert!(!set.insert(70u32));
        assert_eq!(set, {
            let mut other = SymbolSet::<2>::new();
            other.insert(6u32);
            other.insert(70u32);
            other
        });
    }
}
