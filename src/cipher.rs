//! The Playfair digraph substitution.
//!
//! Both directions are driven by lookup tables indexed with a pair of square positions, so a
//! digraph costs two table reads once the positions of its symbols are known.

use crate::alphabet::{Alphabet, Dim};
use crate::error::{Error, Result};
use crate::key::Key;

/// Result positions for every pair of input positions, `SQUARE × SQUARE` entries each.
#[derive(Clone, Debug)]
struct DigraphTable {
    first: Vec<u8>,
    second: Vec<u8>,
}

impl DigraphTable {
    /// `shift` is +1 for encryption (right, down) and -1 for decryption (left, up)
    fn new(dim: Dim, shift: isize) -> Self {
        let n = dim.len();
        let square = dim.square();
        let step = |x: usize| (x as isize + shift).rem_euclid(n as isize) as usize;

        let mut first = vec![0; square * square];
        let mut second = vec![0; square * square];
        for p1 in 0..square {
            let (r1, c1) = (p1 / n, p1 % n);
            for p2 in 0..square {
                let (r2, c2) = (p2 / n, p2 % n);
                let (q1, q2) = if r1 == r2 {
                    (r1 * n + step(c1), r2 * n + step(c2))
                } else if c1 == c2 {
                    (step(r1) * n + c1, step(r2) * n + c2)
                } else {
                    (r1 * n + c2, r2 * n + c1)
                };
                first[p1 * square + p2] = q1 as u8;
                second[p1 * square + p2] = q2 as u8;
            }
        }
        Self { first, second }
    }

    /// Substitutes `input` into `out` under `key`. `input` must have even length.
    fn apply(&self, key: &Key, input: &[u8], out: &mut [u8]) {
        let square = key.dim().square();
        let inverse = key.inverse();
        let cells = key.cells();
        for (pair, dst) in input.chunks_exact(2).zip(out.chunks_exact_mut(2)) {
            let p1 = usize::from(inverse[usize::from(pair[0])]);
            let p2 = usize::from(inverse[usize::from(pair[1])]);
            let idx = p1 * square + p2;
            dst[0] = cells[usize::from(self.first[idx])];
            dst[1] = cells[usize::from(self.second[idx])];
        }
    }
}

/// Encryption and decryption for one square size.
///
/// Construct once and share, the tables never change.
#[derive(Clone, Debug)]
pub struct Playfair {
    dim: Dim,
    encipher: DigraphTable,
    decipher: DigraphTable,
}

impl Playfair {
    /// Builds the lookup tables for a square size
    #[must_use]
    pub fn new(dim: Dim) -> Self {
        Self {
            dim,
            encipher: DigraphTable::new(dim, 1),
            decipher: DigraphTable::new(dim, -1),
        }
    }

    /// Square size
    #[must_use]
    pub fn dim(&self) -> Dim {
        self.dim
    }

    /// Decrypts `ciphertext` into the front of `out` without allocating and returns the number of
    /// symbols written.
    ///
    /// # Errors
    ///
    /// [`Error::OddLength`] for an odd number of symbols, [`Error::InvalidSymbol`] for codes outside
    /// of the square, [`Error::InvalidKey`] if `key` belongs to another square size or `out` is too
    /// short.
    pub fn decrypt_into(&self, key: &Key, ciphertext: &[u8], out: &mut [u8]) -> Result<usize> {
        self.check(key, ciphertext, out)?;
        self.decipher.apply(key, ciphertext, out);
        Ok(ciphertext.len())
    }

    /// Decrypts without validation. Callers guarantee even length, matching dimensions and
    /// `out.len() >= ciphertext.len()`.
    pub(crate) fn decrypt_unchecked(&self, key: &Key, ciphertext: &[u8], out: &mut [u8]) {
        self.decipher.apply(key, ciphertext, out);
    }

    /// Decrypts `ciphertext`, optionally removing fillers afterwards (see [`remove_fillers`]).
    ///
    /// # Errors
    ///
    /// Same as [`Playfair::decrypt_into`]
    pub fn decrypt(&self, key: &Key, ciphertext: &[u8], remove: bool) -> Result<Vec<u8>> {
        let mut out = vec![0; ciphertext.len()];
        self.decrypt_into(key, ciphertext, &mut out)?;
        if remove {
            out = remove_fillers(&Alphabet::new(self.dim), &out);
        }
        Ok(out)
    }

    /// Encrypts prepared plaintext, see [`Alphabet::encode`].
    ///
    /// # Errors
    ///
    /// Same as [`Playfair::decrypt_into`]
    pub fn encrypt(&self, key: &Key, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut out = vec![0; plaintext.len()];
        self.check(key, plaintext, &out)?;
        self.encipher.apply(key, plaintext, &mut out);
        Ok(out)
    }

    fn check(&self, key: &Key, input: &[u8], out: &[u8]) -> Result<()> {
        if input.len() % 2 != 0 {
            return Err(Error::OddLength(input.len()));
        }
        if key.dim() != self.dim {
            return Err(Error::InvalidKey(format!(
                "{} key used with a {} cipher",
                key.dim(),
                self.dim
            )));
        }
        if out.len() < input.len() {
            return Err(Error::InvalidKey(format!(
                "output buffer holds {} of {} symbols",
                out.len(),
                input.len()
            )));
        }
        if let Some(&bad) = input.iter().find(|&&s| usize::from(s) >= self.dim.square()) {
            return Err(Error::InvalidSymbol(bad));
        }
        Ok(())
    }
}

/// Undoes the preparation done by [`Alphabet::encode`] as far as possible.
///
/// A filler in the second half of a digraph is dropped when the letters around it are equal,
/// and fillers at the end are trimmed. A final alternate filler after the filler letter is the
/// padding of a text ending in that letter. Genuine text can look the same (`AXA`), so this is
/// a heuristic for display only.
#[must_use]
pub fn remove_fillers(alphabet: &Alphabet, text: &[u8]) -> Vec<u8> {
    let fillers = [alphabet.filler(), alphabet.alt_filler()];
    let mut out = Vec::with_capacity(text.len());
    for (i, &symbol) in text.iter().enumerate() {
        let separates = i % 2 == 1
            && fillers.contains(&symbol)
            && i + 1 < text.len()
            && text[i - 1] == text[i + 1];
        if !separates {
            out.push(symbol);
        }
    }
    if out.ends_with(&[alphabet.filler(), alphabet.alt_filler()]) {
        out.pop();
    } else {
        while out.last() == Some(&alphabet.filler()) {
            out.pop();
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn example() -> (Alphabet, Key, Playfair) {
        let alphabet = Alphabet::new(Dim::Five);
        let key = Key::from_keyword(&alphabet, "PLAYFAIREXAMPLE").unwrap();
        (alphabet, key, Playfair::new(Dim::Five))
    }

    #[test]
    fn golden_vector() {
        let (alphabet, key, cipher) = example();
        let plaintext = alphabet.encode("HIDETHEGOLDINTHETREESTUMP");
        let ciphertext = cipher.encrypt(&key, &plaintext).unwrap();
        assert_eq!(alphabet.decode(&ciphertext), "BMODZBXDNABEKUDMUIXMMOUVIF");

        let decrypted = cipher.decrypt(&key, &ciphertext, false).unwrap();
        assert_eq!(decrypted, plaintext);
        assert_eq!(alphabet.decode(&decrypted), "HIDETHEGOLDINTHETREXESTUMP");
    }

    #[test]
    fn golden_vector_without_fillers() {
        let (alphabet, key, cipher) = example();
        let ciphertext = alphabet.filter("BMODZBXDNABEKUDMUIXMMOUVIF");
        let decrypted = cipher.decrypt(&key, &ciphertext, true).unwrap();
        assert_eq!(alphabet.decode(&decrypted), "HIDETHEGOLDINTHETREESTUMP");
    }

    #[test]
    fn rectangle_same_row_same_column() {
        let (alphabet, key, cipher) = example();
        let encrypt = |text: &str| {
            alphabet.decode(&cipher.encrypt(&key, &alphabet.filter(text)).unwrap())
        };
        // H(2,4) I(1,0): rectangle
        assert_eq!(encrypt("HI"), "BM");
        // P(0,0) F(0,4): same row wraps right
        assert_eq!(encrypt("PF"), "LP");
        // Y(0,3) W(4,3): same column wraps down
        assert_eq!(encrypt("YW"), "XY");
    }

    #[test]
    fn rejects_odd_length() {
        let (alphabet, key, cipher) = example();
        let ciphertext = alphabet.filter("BMO");
        assert!(matches!(
            cipher.decrypt(&key, &ciphertext, false),
            Err(Error::OddLength(3))
        ));
    }

    #[test]
    fn rejects_foreign_key() {
        let cipher = Playfair::new(Dim::Six);
        let key = Key::simple(Dim::Five);
        assert!(cipher.decrypt(&key, &[0, 1], false).is_err());
    }

    #[test]
    fn round_trip_random_digraphs() {
        for dim in [Dim::Five, Dim::Six] {
            let cipher = Playfair::new(dim);
            let square = dim.square() as u8;
            let mut rng = StdRng::seed_from_u64(11);
            for _ in 0..50 {
                let key = Key::random(dim, &mut rng);
                let mut plaintext = Vec::new();
                while plaintext.len() < 200 {
                    let a = rng.gen_range(0..square);
                    let b = rng.gen_range(0..square);
                    if a != b {
                        plaintext.extend([a, b]);
                    }
                }
                let ciphertext = cipher.encrypt(&key, &plaintext).unwrap();
                assert_eq!(cipher.decrypt(&key, &ciphertext, false).unwrap(), plaintext);
            }
        }
    }

    #[test]
    fn decrypt_into_reuses_buffer() {
        let (alphabet, key, cipher) = example();
        let ciphertext = alphabet.filter("BMODZBXDNABEKUDMUIXMMOUVIF");
        let mut out = vec![0; 64];
        let n = cipher.decrypt_into(&key, &ciphertext, &mut out).unwrap();
        assert_eq!(alphabet.decode(&out[..n]), "HIDETHEGOLDINTHETREXESTUMP");
        assert!(cipher.decrypt_into(&key, &ciphertext, &mut out[..4]).is_err());
    }

    #[test]
    fn remove_fillers_keeps_text_without_fillers() {
        let alphabet = Alphabet::new(Dim::Five);
        let text = alphabet.filter("BALXLOON");
        assert_eq!(alphabet.decode(&remove_fillers(&alphabet, &text)), "BALLOON");
        let text = alphabet.filter("TAXI");
        assert_eq!(alphabet.decode(&remove_fillers(&alphabet, &text)), "TAXI");
        let text = alphabet.filter("ABCX");
        assert_eq!(alphabet.decode(&remove_fillers(&alphabet, &text)), "ABC");
    }

    #[test]
    fn trailing_alternate_filler_is_padding() {
        let (alphabet, key, cipher) = example();
        for (text, expected) in [("abx", "ABX"), ("xx", "XX"), ("tax", "TAX"), ("boy", "BOY")] {
            let ciphertext = cipher.encrypt(&key, &alphabet.encode(text)).unwrap();
            let plaintext = cipher.decrypt(&key, &ciphertext, true).unwrap();
            assert_eq!(alphabet.decode(&plaintext), expected);
        }
    }
}
