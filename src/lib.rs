//! Library for encrypting, decrypting and breaking Playfair ciphers.
//!
//! Keys are searched with simulated annealing. Candidate decryptions are scored against an
//! n-gram table built from a plain text corpus, see [`NgramTable`] and [`Solver`].
//!
//! ```no_run
//! use playfair::{CancelToken, Config, NgramTable, Solver};
//! use std::sync::Arc;
//!
//! # fn main() -> playfair::Result<()> {
//! let table = Arc::new(NgramTable::load("english.pfng")?);
//! let solver = Solver::new(table, Config::default())?;
//! let report = solver.solve_text("BMODZBXDNABEKUDMUIXMMOUVIF", &CancelToken::new(), |_| {})?;
//! if let Some(best) = report.best {
//!     println!("{}\n{}", best.key, best.text);
//! }
//! # Ok(())
//! # }
//! ```

// Forbid unsafe code (https://doc.rust-lang.org/book/ch19-01-unsafe-rust.html)
#![forbid(unsafe_code)]
// Disallow all missing docs and rustdoc lints
#![deny(missing_docs)]
#![deny(rustdoc::all)]
// Error from most clippy warnings (https://github.com/rust-lang/rust-clippy)
#![deny(clippy::all)]
// Warnings from pedantic clippy lints
#![warn(clippy::pedantic)]
// Warnings about missing Cargo.toml fields
#![warn(clippy::cargo)]
// More about lint levels https://doc.rust-lang.org/rustc/lints/levels.html

pub mod alphabet;
pub mod cipher;
pub mod error;
pub mod key;
pub mod perms;
pub mod search;
pub mod stats;
pub mod symbols;

pub use alphabet::{Alphabet, Dim};
pub use cipher::{remove_fillers, Playfair};
pub use error::{Error, Result};
pub use key::Key;
pub use perms::Permutations;
pub use search::{CancelToken, Config, Crib, Event, Progress, Report, Solution, Solver, Status};
pub use stats::NgramTable;
