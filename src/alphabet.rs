//! Symbol codes for Playfair squares and the text preparation rules.

use crate::error::{Error, Result};

/// Largest supported square, 6 × 6
pub const MAX_SQUARE: usize = 36;

/// Number of letters indexing the n-gram tables (A-Z)
pub const LETTERS: usize = 26;

/// Letter used in place of symbols which have no n-gram statistics (digits)
pub const FALLBACK_LETTER: u8 = b'X' - b'A';

const SYMBOLS_5: &[u8; 25] = b"ABCDEFGHIKLMNOPQRSTUVWXYZ";
const SYMBOLS_6: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Side length of the key square.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dim {
    /// 5 × 5, letters with J merged into I
    Five,
    /// 6 × 6, letters and digits
    Six,
}

impl Dim {
    /// Number of rows (and columns)
    #[must_use]
    pub const fn len(self) -> usize {
        match self {
            Self::Five => 5,
            Self::Six => 6,
        }
    }

    /// Number of cells in the square
    #[must_use]
    pub const fn square(self) -> usize {
        self.len() * self.len()
    }

    /// Number of distinct keys, `square()!`
    #[must_use]
    pub fn key_space(self) -> f64 {
        (1..=self.square()).map(|n| n as f64).product()
    }
}

impl TryFrom<usize> for Dim {
    type Error = Error;

    fn try_from(value: usize) -> Result<Self> {
        match value {
            5 => Ok(Self::Five),
            6 => Ok(Self::Six),
            other => Err(Error::InvalidDim(other)),
        }
    }
}

impl std::fmt::Display for Dim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{0}x{0}", self.len())
    }
}

/// Mapping between characters and the symbol codes `0..SQUARE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Alphabet {
    dim: Dim,
    symbols: &'static [u8],
    codes: [Option<u8>; 128],
    letters: [u8; MAX_SQUARE],
    filler: u8,
    alt_filler: u8,
}

impl Alphabet {
    /// Alphabet filling a square of the given size
    #[must_use]
    pub fn new(dim: Dim) -> Self {
        let symbols: &'static [u8] = match dim {
            Dim::Five => SYMBOLS_5,
            Dim::Six => SYMBOLS_6,
        };

        let mut codes = [None; 128];
        let mut letters = [FALLBACK_LETTER; MAX_SQUARE];
        for (code, &symbol) in (0u8..).zip(symbols) {
            codes[usize::from(symbol)] = Some(code);
            if symbol.is_ascii_uppercase() {
                letters[usize::from(code)] = symbol - b'A';
            }
        }
        // J shares a cell with I
        if dim == Dim::Five {
            codes[usize::from(b'J')] = codes[usize::from(b'I')];
        }

        let code = |c: u8| codes[usize::from(c)].unwrap_or_default();
        Self {
            dim,
            symbols,
            codes,
            letters,
            filler: code(b'X'),
            alt_filler: code(b'Y'),
        }
    }

    /// Square size this alphabet fills
    #[must_use]
    pub fn dim(&self) -> Dim {
        self.dim
    }

    /// Number of symbols
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Always false, every alphabet fills a whole square
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Filler inserted between doubled letters and after a lone final letter
    #[must_use]
    pub fn filler(&self) -> u8 {
        self.filler
    }

    /// Filler used when the letter to separate is the filler itself
    #[must_use]
    pub fn alt_filler(&self) -> u8 {
        self.alt_filler
    }

    /// Code of a character, case-insensitive. J maps to I in a 5 × 5 square.
    #[must_use]
    pub fn symbol(&self, c: char) -> Option<u8> {
        let c = c.to_ascii_uppercase();
        if c.is_ascii() {
            self.codes[c as usize]
        } else {
            None
        }
    }

    /// Character of a code
    #[must_use]
    pub fn char(&self, code: u8) -> char {
        self.symbols
            .get(usize::from(code))
            .map_or('?', |&b| char::from(b))
    }

    /// Letter index (A=0 .. Z=25) used for n-gram statistics.
    /// Symbols without statistics map to [`FALLBACK_LETTER`].
    #[must_use]
    pub fn letter(&self, code: u8) -> u8 {
        self.letters
            .get(usize::from(code))
            .copied()
            .unwrap_or(FALLBACK_LETTER)
    }

    /// Converts text to symbol codes, dropping every character outside of the alphabet.
    ///
    /// Umlauts and ß are spelled out as AE, OE, UE and SS first.
    #[must_use]
    pub fn filter(&self, text: &str) -> Vec<u8> {
        self.codes(text).collect()
    }

    /// Prepares plaintext for encryption.
    ///
    /// Filters the text, separates two equal letters falling in the same digraph with a filler
    /// and pads the result to an even length.
    #[must_use]
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(text.len() + text.len() / 8 + 1);
        for symbol in self.codes(text) {
            if buf.len() % 2 == 1 && buf.last() == Some(&symbol) {
                buf.push(self.separator_for(symbol));
            }
            buf.push(symbol);
        }
        if let Some(&last) = buf.last() {
            if buf.len() % 2 == 1 {
                buf.push(self.separator_for(last));
            }
        }
        buf
    }

    /// Converts symbol codes back to text
    #[must_use]
    pub fn decode(&self, symbols: &[u8]) -> String {
        symbols.iter().map(|&code| self.char(code)).collect()
    }

    fn codes<'a>(&'a self, text: &'a str) -> impl Iterator<Item = u8> + 'a {
        text.chars().flat_map(move |c| {
            let (first, second) = match c {
                'Ä' | 'ä' => ('A', Some('E')),
                'Ö' | 'ö' => ('O', Some('E')),
                'Ü' | 'ü' => ('U', Some('E')),
                'ß' | 'ẞ' => ('S', Some('S')),
                other => (other, None),
            };
            std::iter::once(first)
                .chain(second)
                .filter_map(|c| self.symbol(c))
        })
    }

    fn separator_for(&self, symbol: u8) -> u8 {
        if symbol == self.filler {
            self.alt_filler
        } else {
            self.filler
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dim_from_usize() {
        assert_eq!(Dim::try_from(5).unwrap(), Dim::Five);
        assert_eq!(Dim::try_from(6).unwrap(), Dim::Six);
        assert!(matches!(Dim::try_from(4), Err(Error::InvalidDim(4))));
    }

    #[test]
    fn alphabet_sizes() {
        assert_eq!(Alphabet::new(Dim::Five).len(), 25);
        assert_eq!(Alphabet::new(Dim::Six).len(), 36);
    }

    #[test]
    fn j_merges_into_i_in_small_square() {
        let alphabet = Alphabet::new(Dim::Five);
        assert_eq!(alphabet.symbol('J'), alphabet.symbol('I'));
        assert_eq!(alphabet.decode(&alphabet.filter("jump")), "IUMP");

        let alphabet = Alphabet::new(Dim::Six);
        assert_ne!(alphabet.symbol('J'), alphabet.symbol('I'));
    }

    #[test]
    fn filter_keeps_alphabet_symbols() {
        let alphabet = Alphabet::new(Dim::Five);
        assert_eq!(alphabet.decode(&alphabet.filter("Hello, world! 42 😊")), "HELLOWORLD");

        let alphabet = Alphabet::new(Dim::Six);
        assert_eq!(alphabet.decode(&alphabet.filter("Agent 007")), "AGENT007");
    }

    #[test]
    fn encode_separates_doubled_letters() {
        let alphabet = Alphabet::new(Dim::Five);
        let encoded = alphabet.encode("Hide the gold in the tree stump");
        assert_eq!(alphabet.decode(&encoded), "HIDETHEGOLDINTHETREXESTUMP");
    }

    #[test]
    fn encode_pads_odd_length() {
        let alphabet = Alphabet::new(Dim::Five);
        assert_eq!(alphabet.decode(&alphabet.encode("abc")), "ABCX");
        assert_eq!(alphabet.decode(&alphabet.encode("abx")), "ABXY");
    }

    #[test]
    fn encode_uses_alternate_filler_for_doubled_filler() {
        let alphabet = Alphabet::new(Dim::Five);
        assert_eq!(alphabet.decode(&alphabet.encode("xx")), "XYXY");
    }

    #[test]
    fn encode_only_separates_within_digraph() {
        let alphabet = Alphabet::new(Dim::Five);
        // BA LX LO ON, while the BB of ABBA sits across two digraphs
        assert_eq!(alphabet.decode(&alphabet.encode("balloon")), "BALXLOON");
        assert_eq!(alphabet.decode(&alphabet.encode("abba")), "ABBA");
    }

    #[test]
    fn encode_empty_input() {
        let alphabet = Alphabet::new(Dim::Six);
        assert!(alphabet.encode("").is_empty());
        assert!(alphabet.encode("!?").is_empty());
    }

    #[test]
    fn encoded_digraphs_never_repeat_a_symbol() {
        let alphabet = Alphabet::new(Dim::Five);
        let encoded = alphabet.encode("aaaa bookkeeper mississippi xxxx");
        assert_eq!(encoded.len() % 2, 0);
        for pair in encoded.chunks(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn umlauts_are_spelled_out() {
        let alphabet = Alphabet::new(Dim::Five);
        assert_eq!(alphabet.decode(&alphabet.filter("Größe")), "GROESSE");
        assert_eq!(alphabet.decode(&alphabet.filter("ÄRGER über")), "AERGERUEBER");
        // MA SX S, the SS of ß lands in one digraph
        assert_eq!(alphabet.decode(&alphabet.encode("Maß")), "MASXSX");
    }

    #[test]
    fn key_space_is_square_factorial() {
        assert!((Dim::Five.key_space() / 1.551_121_004_333_099e25 - 1.0).abs() < 1e-9);
        assert!(Dim::Six.key_space() > 3.7e41);
    }

    #[test]
    fn letters_for_statistics() {
        let alphabet = Alphabet::new(Dim::Five);
        let k = alphabet.symbol('K').unwrap();
        assert_eq!(alphabet.letter(k), b'K' - b'A');

        let alphabet = Alphabet::new(Dim::Six);
        let seven = alphabet.symbol('7').unwrap();
        assert_eq!(alphabet.letter(seven), FALLBACK_LETTER);
    }
}
