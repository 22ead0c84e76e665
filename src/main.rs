//! CLI program to encrypt, decrypt and break Playfair ciphers.
//!
//! Run with --help for usage and options.

#![deny(rustdoc::all)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]

mod io;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use io::{Input, Output};
use playfair::{
    Alphabet, CancelToken, Config, Crib, Dim, Event, Key, NgramTable, Playfair, Solution, Solver,
    Status,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Parses the square size and a keyword into a key
fn parse_key(dim: usize, keyword: &str) -> Result<(Alphabet, Key)> {
    let alphabet = Alphabet::new(Dim::try_from(dim)?);
    let key = Key::from_keyword(&alphabet, keyword)
        .wrap_err_with(|| format!("Cannot use {keyword:?} as a key"))?;
    Ok((alphabet, key))
}

/// Encrypt text, doubled letters are separated and odd length padded with fillers
#[derive(Parser)]
struct Encrypt {
    /// Keyword, or a complete square row by row
    #[clap(short, long)]
    key: String,
    /// Square size, 5 merges J into I, 6 adds digits
    #[clap(short, long, default_value_t = 5)]
    dim: usize,
    /// Plaintext file, stdin if omitted
    input: Option<PathBuf>,
    /// Output file, stdout if omitted
    #[clap(short, long)]
    output: Option<PathBuf>,
}

impl Encrypt {
    fn run(self) -> Result<()> {
        let (alphabet, key) = parse_key(self.dim, &self.key)?;
        let plaintext = alphabet.encode(&Input::try_from(self.input)?.read_text()?);
        let ciphertext = Playfair::new(alphabet.dim()).encrypt(&key, &plaintext)?;
        Output::try_from(self.output)?.write_line(alphabet.decode(&ciphertext))
    }
}

/// Decrypt text with a known key
#[derive(Parser)]
struct Decrypt {
    /// Keyword, or a complete square row by row
    #[clap(short, long)]
    key: String,
    /// Square size, 5 or 6
    #[clap(short, long, default_value_t = 5)]
    dim: usize,
    /// Drop fillers between doubled letters and at the end
    #[clap(short, long)]
    remove_fillers: bool,
    /// Ciphertext file, stdin if omitted
    input: Option<PathBuf>,
    /// Output file, stdout if omitted
    #[clap(short, long)]
    output: Option<PathBuf>,
}

impl Decrypt {
    fn run(self) -> Result<()> {
        let (alphabet, key) = parse_key(self.dim, &self.key)?;
        let ciphertext = alphabet.filter(&Input::try_from(self.input)?.read_text()?);
        let plaintext =
            Playfair::new(alphabet.dim()).decrypt(&key, &ciphertext, self.remove_fillers)?;
        Output::try_from(self.output)?.write_line(alphabet.decode(&plaintext))
    }
}

/// Recover the key of a ciphertext by simulated annealing
#[derive(Parser)]
struct Solve {
    /// N-gram table built with build-stats
    #[clap(short, long)]
    stats: PathBuf,
    /// Ciphertext file, stdin if omitted
    input: Option<PathBuf>,
    /// Output file, stdout if omitted
    #[clap(short, long)]
    output: Option<PathBuf>,
    /// Square size, 5 or 6
    #[clap(short, long, default_value_t = 5)]
    dim: usize,
    /// Known plaintext
    #[clap(long)]
    crib: Option<String>,
    /// First position the crib may start at, 0 if omitted
    #[clap(long, requires = "crib")]
    min_offset: Option<usize>,
    /// Last position the crib may start at, defaults to the minimum offset
    #[clap(long, requires = "crib")]
    max_offset: Option<usize>,
    /// Cooling cycles per restart
    #[clap(long, default_value_t = 100)]
    cycles: usize,
    /// Candidate keys per cycle
    #[clap(long, default_value_t = 5_000)]
    steps: usize,
    /// Independent restarts
    #[clap(short, long, default_value_t = 8)]
    restarts: usize,
    /// Worker threads, all cores if omitted
    #[clap(short, long)]
    threads: Option<usize>,
    /// Seed for reproducible runs
    #[clap(long)]
    seed: Option<u64>,
    /// Only analyze this many leading symbols
    #[clap(long)]
    max_length: Option<usize>,
    /// Number of ranked solutions to print
    #[clap(short, long, default_value_t = 10)]
    best_list: usize,
    /// Keep keys whose plaintext is already in the best list
    #[clap(long)]
    keep_same_plaintexts: bool,
    /// Hide the progress bar
    #[clap(short, long)]
    quiet: bool,
}

impl Solve {
    fn config(&self) -> Result<Config> {
        Ok(Config {
            dim: Dim::try_from(self.dim)?,
            cycles: self.cycles,
            steps: self.steps,
            restarts: self.restarts,
            threads: self.threads,
            seed: self.seed,
            max_length: self.max_length,
            best_list_size: self.best_list,
            discard_same_plaintexts: !self.keep_same_plaintexts,
            crib: self.crib.as_ref().map(|text| {
                let min_offset = self.min_offset.unwrap_or_default();
                Crib {
                    text: text.clone(),
                    min_offset,
                    max_offset: self.max_offset.unwrap_or(min_offset),
                }
            }),
            ..Config::default()
        })
    }

    fn run(self) -> Result<()> {
        let config = self.config()?;
        let table = NgramTable::load(&self.stats)
            .wrap_err_with(|| format!("Cannot load statistics from {}", self.stats.display()))?;
        let solver = Solver::new(Arc::new(table), config)?;

        let input = Input::try_from(self.input)?;
        let ciphertext = input.read_text()?;
        let mut output = Output::try_from(self.output)?;

        // Ctrl-C stops the search, the best key so far is still printed
        let cancel = CancelToken::new();
        let handler = cancel.clone();
        ctrlc::set_handler(move || handler.cancel()).wrap_err("Cannot install Ctrl-C handler")?;

        let bar = if self.quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(1000)
        };
        bar.set_style(
            ProgressStyle::with_template("{elapsed_precise} [{wide_bar}] {percent}% {msg}")?
                .progress_chars("=> "),
        );

        let report = solver.solve_text(&ciphertext, &cancel, |event| match event {
            Event::Progress(progress) => {
                bar.set_position((progress.fraction * 1000.0) as u64);
                if let Some(score) = progress.best_score {
                    bar.set_message(format!("best {score}"));
                }
            }
            Event::NewBest(solution) => {
                bar.println(format!("{}: {}", solution.score, solution.text));
            }
            Event::Warning(message) => bar.println(format!("warning: {message}")),
        })?;
        bar.finish_and_clear();

        if report.status == Status::Cancelled {
            eprintln!("Cancelled, printing the best key found so far");
        }
        eprintln!("{} candidates in {:.1?}", report.evaluations, report.elapsed);
        match report.best {
            Some(best) => {
                write_solution(&mut output, &best)?;
                write_best_list(&mut output, &report.best_list)
            }
            None => {
                eprintln!("No key scored above zero");
                Ok(())
            }
        }
    }
}

fn write_solution(output: &mut Output, best: &Solution) -> Result<()> {
    output.write_line(format_args!(
        "score {} (restart {}, cycle {})",
        best.score, best.restart, best.cycle
    ))?;
    output.write_line(format_args!("key {}", best.key.to_keyword()))?;
    output.write_line(best.key)?;
    output.write_line(&best.text)
}

/// One line per ranked solution: rank, score, time, evaluations, key and plaintext
fn write_best_list(output: &mut Output, list: &[Solution]) -> Result<()> {
    if list.len() < 2 {
        return Ok(());
    }
    output.write_line("")?;
    for (rank, solution) in (1..).zip(list) {
        output.write_line(format_args!(
            "{rank:>3} {:>10} {:>8} {:>12} {} {}",
            solution.score,
            format!("{:.1?}", solution.elapsed),
            solution.evaluations,
            solution.key.to_keyword(),
            solution.text
        ))?;
    }
    Ok(())
}

/// Build an n-gram table from a plain text corpus
#[derive(Parser)]
struct BuildStats {
    /// Corpus file, stdin if omitted
    #[clap(short, long)]
    corpus: Option<PathBuf>,
    /// Table file, stdout if omitted
    #[clap(short, long)]
    output: Option<PathBuf>,
    /// Gram length, 3 to 6
    #[clap(short, default_value_t = 5)]
    n: usize,
}

impl BuildStats {
    fn run(self) -> Result<()> {
        let corpus = Input::try_from(self.corpus)?;
        let name = corpus.to_string();
        let table = NgramTable::from_corpus(self.n, &corpus.read_text()?)
            .wrap_err_with(|| format!("Cannot build statistics from {name}"))?;

        let mut output = Output::try_from(self.output)?;
        let name = output.to_string();
        let writer: &mut dyn Write = output.as_mut();
        table
            .write(writer)
            .wrap_err_with(|| format!("Cannot write statistics to {name}"))
    }
}

#[derive(Parser)]
#[clap(author, version, about)]
enum Opts {
    Encrypt(Encrypt),
    Decrypt(Decrypt),
    Solve(Solve),
    BuildStats(BuildStats),
}

fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let opts = Opts::parse();
    match opts {
        Opts::Encrypt(e) => e.run()?,
        Opts::Decrypt(d) => d.run()?,
        Opts::Solve(s) => s.run()?,
        Opts::BuildStats(b) => b.run()?,
    };
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_consistent() {
        Opts::command().debug_assert();
    }

    #[test]
    fn parse_key_checks_dimension() {
        assert!(parse_key(5, "playfair example").is_ok());
        assert!(parse_key(6, "playfair example 2024").is_ok());
        assert!(parse_key(7, "playfair example").is_err());
    }

    #[test]
    fn solve_flags_build_config() {
        let opts = Opts::try_parse_from([
            "playfair",
            "solve",
            "--stats",
            "english.pfng",
            "--crib",
            "attack",
            "--min-offset",
            "4",
            "--cycles",
            "7",
            "--seed",
            "1",
            "--dim",
            "6",
            "-b",
            "3",
        ])
        .unwrap();
        let Opts::Solve(solve) = opts else {
            panic!("expected solve");
        };
        let config = solve.config().unwrap();
        assert_eq!(config.dim, Dim::Six);
        assert_eq!(config.cycles, 7);
        assert_eq!(config.steps, Config::default().steps);
        assert_eq!(config.seed, Some(1));
        assert_eq!(config.best_list_size, 3);
        assert!(config.discard_same_plaintexts);
        let crib = config.crib.unwrap();
        assert_eq!(crib.text, "attack");
        assert_eq!((crib.min_offset, crib.max_offset), (4, 4));
    }

    #[test]
    fn offsets_require_crib() {
        assert!(Opts::try_parse_from(["playfair", "solve", "-s", "t", "--min-offset", "3"]).is_err());
    }
}
