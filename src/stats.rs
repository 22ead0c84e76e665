//! N-gram statistics used to rate candidate plaintexts.
//!
//! # File format, version 1
//!
//! A gzip stream containing, little endian:
//!
//! | bytes | content                          |
//! |-------|----------------------------------|
//! | 4     | magic `PFNG`                     |
//! | 2     | format version, `1`              |
//! | 1     | gram length `N`, 3 to 6          |
//! | 1     | alphabet size, `26`              |
//! | 8     | entry count, `26^N`              |
//! | 4 × count | weights as `u32`             |
//!
//! Entry `((s1 * 26 + s2) * 26 + ...) * 26 + sN` holds the weight of the n-gram `s1..sN`, where
//! `A` is 0 and `Z` is 25.

use crate::alphabet::{FALLBACK_LETTER, LETTERS};
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 4] = b"PFNG";
const VERSION: u16 = 1;
const HEADER_LEN: usize = 16;
const CHUNK: usize = 1 << 16;

/// Largest weight produced by [`NgramTable::from_corpus`]
pub const WEIGHT_SCALE: u32 = 10_000_000;

/// Read-only table of n-gram weights.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NgramTable {
    n: usize,
    weights: Vec<u32>,
    max_weight: u32,
}

impl NgramTable {
    /// Wraps raw weights. `weights` must hold `26^n` entries.
    ///
    /// # Errors
    ///
    /// If `n` is outside of 3..=6 or the length does not match
    pub fn from_weights(n: usize, weights: Vec<u32>) -> Result<Self> {
        let expected = entries(n)?;
        if weights.len() != expected {
            return Err(Error::MalformedTable(format!(
                "{n}-gram table needs {expected} entries, got {}",
                weights.len()
            )));
        }
        let max_weight = weights.iter().copied().max().unwrap_or_default();
        Ok(Self {
            n,
            weights,
            max_weight,
        })
    }

    /// Counts the n-grams of the letters A-Z in `corpus` and scales the counts logarithmically to
    /// `0..=WEIGHT_SCALE`.
    ///
    /// # Errors
    ///
    /// If `n` is unsupported or the corpus has fewer than `n` letters
    pub fn from_corpus(n: usize, corpus: &str) -> Result<Self> {
        let size = entries(n)?;
        let modulus = size / LETTERS;
        let mut counts = vec![0u32; size];

        let mut idx = 0;
        let mut seen = 0;
        for c in corpus.chars().filter(char::is_ascii_alphabetic) {
            let letter = usize::from(c.to_ascii_uppercase() as u8 - b'A');
            idx = (idx % modulus) * LETTERS + letter;
            seen += 1;
            if seen >= n {
                counts[idx] = counts[idx].saturating_add(1);
            }
        }
        if seen < n {
            return Err(Error::MalformedTable(format!(
                "corpus has {seen} letters, at least {n} needed"
            )));
        }

        let max = counts.iter().copied().max().unwrap_or_default();
        let denominator = f64::from(max).ln_1p();
        let weights = counts
            .into_iter()
            .map(|count| {
                let scaled = f64::from(count).ln_1p() / denominator * f64::from(WEIGHT_SCALE);
                scaled.round() as u32
            })
            .collect();
        debug!("counted {} {n}-grams, most frequent seen {max} times", seen + 1 - n);
        Self::from_weights(n, weights)
    }

    /// Reads a table file.
    ///
    /// # Errors
    ///
    /// [`Error::TableIo`] if the file cannot be opened, [`Error::MalformedTable`] if its content
    /// is not a valid table
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::TableIo {
            path: path.to_owned(),
            source,
        })?;
        let table = Self::read(BufReader::new(file))?;
        info!(
            "loaded {}-gram table from {} ({} entries)",
            table.n,
            path.display(),
            table.weights.len()
        );
        Ok(table)
    }

    /// Decodes a table from a gzip stream
    ///
    /// # Errors
    ///
    /// [`Error::MalformedTable`] for any decoding problem
    pub fn read(reader: impl Read) -> Result<Self> {
        let mut decoder = GzDecoder::new(reader);

        let mut header = [0; HEADER_LEN];
        decoder.read_exact(&mut header).map_err(malformed)?;
        if &header[0..4] != MAGIC {
            return Err(Error::MalformedTable("bad magic".into()));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(Error::MalformedTable(format!("unsupported version {version}")));
        }
        let n = usize::from(header[6]);
        let alphabet = usize::from(header[7]);
        if alphabet != LETTERS {
            return Err(Error::MalformedTable(format!("alphabet size {alphabet}, expected 26")));
        }
        let mut count = [0; 8];
        count.copy_from_slice(&header[8..16]);
        let count = u64::from_le_bytes(count);
        let expected = entries(n)?;
        if count != expected as u64 {
            return Err(Error::MalformedTable(format!(
                "{count} entries, expected {expected}"
            )));
        }

        let mut weights = Vec::with_capacity(expected);
        let mut buf = vec![0; CHUNK * 4];
        while weights.len() < expected {
            let take = (expected - weights.len()).min(CHUNK);
            let bytes = &mut buf[..take * 4];
            decoder.read_exact(bytes).map_err(malformed)?;
            weights.extend(
                bytes
                    .chunks_exact(4)
                    .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            );
        }

        if decoder.read(&mut buf[..1]).map_err(malformed)? != 0 {
            return Err(Error::MalformedTable("trailing data".into()));
        }

        Self::from_weights(n, weights)
    }

    /// Encodes the table as a gzip stream
    ///
    /// # Errors
    ///
    /// On write failure
    pub fn write(&self, writer: impl Write) -> std::io::Result<()> {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        encoder.write_all(MAGIC)?;
        encoder.write_all(&VERSION.to_le_bytes())?;
        encoder.write_all(&[self.n as u8, LETTERS as u8])?;
        encoder.write_all(&(self.weights.len() as u64).to_le_bytes())?;

        let mut buf = Vec::with_capacity(CHUNK * 4);
        for chunk in self.weights.chunks(CHUNK) {
            buf.clear();
            buf.extend(chunk.iter().flat_map(|w| w.to_le_bytes()));
            encoder.write_all(&buf)?;
        }
        encoder.finish()?.flush()
    }

    /// Writes the table to a file
    ///
    /// # Errors
    ///
    /// [`Error::TableIo`] on failure
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let io_error = |source: std::io::Error| Error::TableIo {
            path: path.to_owned(),
            source,
        };
        let file = File::create(path).map_err(io_error)?;
        self.write(BufWriter::new(file)).map_err(io_error)?;
        info!("saved {}-gram table to {}", self.n, path.display());
        Ok(())
    }

    /// Gram length
    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Weight of one n-gram given as letter indices
    #[must_use]
    pub fn weight(&self, gram: &[u8]) -> u32 {
        let idx = gram
            .iter()
            .fold(0, |idx, &s| idx * LETTERS + usize::from(coerce(s)));
        self.weights[idx]
    }

    /// Largest score a single window can contribute, see [`NgramTable::score`]
    #[must_use]
    pub fn ceiling(&self) -> i64 {
        i64::from(self.max_weight) / LETTERS as i64
    }

    /// Scores letter indices (A=0 .. Z=25).
    ///
    /// Sums the weights of every window of `N` consecutive letters and divides by
    /// `(windows * 26)`, so texts of different lengths compare. Values above 25 count as
    /// [`FALLBACK_LETTER`]. Texts shorter than `N` score 0.
    #[must_use]
    pub fn score(&self, text: &[u8]) -> i64 {
        self.score_letters(text.iter().copied())
    }

    /// Same as [`NgramTable::score`] over an iterator, so callers can map symbols on the fly
    #[must_use]
    pub fn score_letters(&self, text: impl ExactSizeIterator<Item = u8>) -> i64 {
        let len = text.len();
        if len < self.n {
            return 0;
        }
        let modulus = self.weights.len() / LETTERS;
        let mut idx = 0;
        let mut sum = 0i64;
        for (i, s) in text.enumerate() {
            idx = (idx % modulus) * LETTERS + usize::from(coerce(s));
            if i + 1 >= self.n {
                sum += i64::from(self.weights[idx]);
            }
        }
        sum / ((len - self.n + 1) as i64 * LETTERS as i64)
    }
}

fn coerce(letter: u8) -> u8 {
    if usize::from(letter) < LETTERS {
        letter
    } else {
        FALLBACK_LETTER
    }
}

fn entries(n: usize) -> Result<usize> {
    if (3..=6).contains(&n) {
        Ok(LETTERS.pow(n as u32))
    } else {
        Err(Error::UnsupportedGramLength(n))
    }
}

fn malformed(err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::MalformedTable("truncated stream".into())
    } else {
        Error::MalformedTable(err.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const ENGLISH: &str = include_str!("../testdata/english.txt");

    fn letters(text: &str) -> Vec<u8> {
        text.chars()
            .filter(char::is_ascii_alphabetic)
            .map(|c| c.to_ascii_uppercase() as u8 - b'A')
            .collect()
    }

    #[test]
    fn rejects_unsupported_lengths() {
        assert!(matches!(
            NgramTable::from_weights(2, vec![0; 676]),
            Err(Error::UnsupportedGramLength(2))
        ));
        assert!(NgramTable::from_weights(3, vec![0; 100]).is_err());
    }

    #[test]
    fn synthetic_scores() {
        let mut weights = vec![0; 26 * 26 * 26];
        // "ABC" and "BCD"
        weights[2 + 26] = 2600;
        weights[(26 + 2) * 26 + 3] = 5200;
        let table = NgramTable::from_weights(3, weights).unwrap();

        assert_eq!(table.score(&[0, 1, 2]), 100);
        // two windows: (2600 + 5200) / (2 * 26)
        assert_eq!(table.score(&[0, 1, 2, 3]), 150);
        assert_eq!(table.score(&[0, 1]), 0);
        assert_eq!(table.ceiling(), 200);
        assert_eq!(table.weight(&[1, 2, 3]), 5200);
    }

    #[test]
    fn out_of_range_symbols_use_fallback() {
        let mut weights = vec![0; 26 * 26 * 26];
        let x = usize::from(FALLBACK_LETTER);
        weights[x * 26 * 26 + x * 26 + x] = 26;
        let table = NgramTable::from_corpus(3, "xxx").unwrap();
        assert!(table.score(&[30, 31, 200]) > 0);
        let table = NgramTable::from_weights(3, weights).unwrap();
        assert_eq!(table.score(&[30, 31, 200]), 1);
    }

    #[test]
    fn corpus_weights_are_logarithmic() {
        let table = NgramTable::from_corpus(3, "abcabcabcxyz").unwrap();
        assert_eq!(table.weight(&[0, 1, 2]), WEIGHT_SCALE);
        assert!(table.weight(&[23, 24, 25]) > 0);
        assert!(table.weight(&[23, 24, 25]) < WEIGHT_SCALE);
        assert_eq!(table.weight(&[25, 25, 25]), 0);
    }

    #[test]
    fn corpus_too_short() {
        assert!(NgramTable::from_corpus(5, "abc").is_err());
    }

    #[test]
    fn english_beats_random_text() {
        let table = NgramTable::from_corpus(4, ENGLISH).unwrap();
        let english = letters(ENGLISH);
        let mut rng = StdRng::seed_from_u64(5);
        let len = 120;

        let mut wins = 0;
        let trials = 100;
        for _ in 0..trials {
            let start = rng.gen_range(0..english.len() - len);
            let natural = table.score(&english[start..start + len]);
            let noise: Vec<u8> = (0..len).map(|_| rng.gen_range(0..26)).collect();
            if natural > table.score(&noise) {
                wins += 1;
            }
        }
        assert!(wins >= 95, "english won {wins} of {trials}");
    }

    #[test]
    fn pentagrams_rate_english_higher() {
        let table = NgramTable::from_corpus(5, ENGLISH).unwrap();
        let english = table.score(&letters("it was the best of times it was the worst of times"));
        let shuffled = table.score(&letters("tsw ti eht fo tseb semit saw ti eht tsrow fo semit"));
        assert!(english > shuffled);
    }

    #[test]
    fn stream_round_trip() {
        let table = NgramTable::from_corpus(3, ENGLISH).unwrap();
        let mut buf = Vec::new();
        table.write(&mut buf).unwrap();
        assert_eq!(NgramTable::read(buf.as_slice()).unwrap(), table);
    }

    #[test]
    fn malformed_streams() {
        let table = NgramTable::from_corpus(3, "the quick brown fox").unwrap();
        let mut good = Vec::new();
        table.write(&mut good).unwrap();

        // not gzip at all
        assert!(matches!(
            NgramTable::read(b"PFNG".as_slice()),
            Err(Error::MalformedTable(_))
        ));

        // truncated compressed stream
        let truncated = &good[..good.len() / 2];
        assert!(matches!(
            NgramTable::read(truncated),
            Err(Error::MalformedTable(_))
        ));

        // valid gzip, wrong magic
        let mut bad = Vec::new();
        let mut encoder = GzEncoder::new(&mut bad, Compression::fast());
        encoder.write_all(b"NOPE0000000000000000").unwrap();
        encoder.finish().unwrap();
        assert!(matches!(
            NgramTable::read(bad.as_slice()),
            Err(Error::MalformedTable(_))
        ));
    }

    #[test]
    fn load_missing_file() {
        let err = NgramTable::load("does/not/exist.bin").unwrap_err();
        assert!(matches!(err, Error::TableIo { .. }));
    }

    #[test]
    fn save_and_load() {
        let table = NgramTable::from_corpus(3, ENGLISH).unwrap();
        let path = std::env::temp_dir().join(format!("playfair-{}.bin", std::process::id()));
        table.save(&path).unwrap();
        let loaded = NgramTable::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded.unwrap(), table);
    }
}
