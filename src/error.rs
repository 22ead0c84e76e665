//! Error type shared by every part of the library.

use std::path::PathBuf;

/// Errors produced while configuring or starting an analysis.
///
/// Cancelling a running search is not an error, see [`crate::search::Status`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Grid dimension other than 5 or 6
    #[error("invalid grid dimension {0}, expected 5 or 6")]
    InvalidDim(usize),

    /// Reading or writing an n-gram table failed
    #[error("cannot access n-gram table {path}")]
    TableIo {
        /// File that was being accessed
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: std::io::Error,
    },

    /// An n-gram table stream could not be decoded
    #[error("malformed n-gram table: {0}")]
    MalformedTable(String),

    /// Gram length outside of the supported range
    #[error("unsupported n-gram length {0}, expected 3 to 6")]
    UnsupportedGramLength(usize),

    /// A key is not a permutation of the alphabet
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A symbol code does not belong to the square
    #[error("symbol code {0} is outside of the alphabet")]
    InvalidSymbol(u8),

    /// No ciphertext symbols were left after filtering
    #[error("ciphertext is empty")]
    EmptyCiphertext,

    /// Digraph streams need an even number of symbols
    #[error("ciphertext length must be even, found {0} symbols")]
    OddLength(usize),

    /// Ciphertext is too short to be analyzed at all
    #[error("ciphertext must have at least {min} symbols, found {found}")]
    CiphertextTooShort {
        /// Required length
        min: usize,
        /// Actual length
        found: usize,
    },

    /// A crib was given but no symbols remained after filtering
    #[error("crib is empty")]
    EmptyCrib,

    /// The crib cannot be placed at the requested offsets
    #[error("crib of length {crib} cannot be placed at offset {offset} of a {text} symbol ciphertext")]
    CribDoesNotFit {
        /// Crib length
        crib: usize,
        /// Largest requested offset
        offset: usize,
        /// Ciphertext length
        text: usize,
    },

    /// Crib offset range is reversed
    #[error("minimum crib offset {min} is larger than maximum offset {max}")]
    InvalidCribRange {
        /// Smallest offset
        min: usize,
        /// Largest offset
        max: usize,
    },

    /// A search parameter is out of range
    #[error("invalid search parameter: {0}")]
    InvalidConfig(&'static str),

    /// The worker pool could not be created
    #[error("cannot start worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Every restart terminated abnormally
    #[error("all {0} restarts failed")]
    WorkersFailed(usize),
}

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_odd_length() {
        assert_eq!(
            Error::OddLength(7).to_string(),
            "ciphertext length must be even, found 7 symbols"
        );
    }

    #[test]
    fn display_crib_does_not_fit() {
        let err = Error::CribDoesNotFit {
            crib: 10,
            offset: 20,
            text: 24,
        };
        assert_eq!(
            err.to_string(),
            "crib of length 10 cannot be placed at offset 20 of a 24 symbol ciphertext"
        );
    }

    #[test]
    fn table_io_keeps_source() {
        use std::error::Error as _;
        let err = Error::TableIo {
            path: "missing.bin".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("missing.bin"));
    }
}
