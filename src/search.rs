//! Key recovery by simulated annealing.
//!
//! Every restart anneals from its own random key with its own random generator. Restarts run on
//! a rayon pool and only share the read-only tables, a cancellation flag and the best solution
//! found so far.
//!
//! A restart runs `cycles` cycles of `steps` candidate keys each. The temperature is fixed within
//! a cycle and cools geometrically from `start_temperature` to `end_temperature` over the cycles.
//! Both are fractions of [`NgramTable::ceiling`], so the schedule follows the scale of the table.
//!
//! Besides the best key, a search keeps a ranked list of the highest scoring keys with distinct
//! plaintexts, see [`Report::best_list`].

use crate::alphabet::{Alphabet, Dim};
use crate::cipher::{remove_fillers, Playfair};
use crate::error::{Error, Result};
use crate::key::Key;
use crate::perms::Permutations;
use crate::stats::NgramTable;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Shortest ciphertext accepted at all
pub const MIN_LENGTH: usize = 6;

/// Below this length the n-gram score is too noisy to be trusted
pub const USEFUL_LENGTH: usize = 100;

/// Seeds of consecutive restarts are this far apart (2^64 / golden ratio)
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Known plaintext expected somewhere in the message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Crib {
    /// Plaintext, filtered like ciphertext (no fillers added)
    pub text: String,
    /// First position the crib may start at
    pub min_offset: usize,
    /// Last position the crib may start at
    pub max_offset: usize,
}

/// Search parameters.
#[derive(Clone, Debug)]
pub struct Config {
    /// Square size
    pub dim: Dim,
    /// Cycles per restart
    pub cycles: usize,
    /// Candidate keys per cycle
    pub steps: usize,
    /// Independent restarts
    pub restarts: usize,
    /// Worker threads, all cores when `None`
    pub threads: Option<usize>,
    /// Base seed, random when `None`
    pub seed: Option<u64>,
    /// Only analyze this many leading symbols
    pub max_length: Option<usize>,
    /// Temperature of the first cycle, relative to the table ceiling
    pub start_temperature: f64,
    /// Temperature of the last cycle, relative to the table ceiling
    pub end_temperature: f64,
    /// Minimum time between two progress events of one worker
    pub report_interval: Duration,
    /// Optional known plaintext
    pub crib: Option<Crib>,
    /// Length of the ranked best list
    pub best_list_size: usize,
    /// Keep only the best key of each plaintext in the best list
    pub discard_same_plaintexts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dim: Dim::Five,
            cycles: 100,
            steps: 5_000,
            restarts: 8,
            threads: None,
            seed: None,
            max_length: None,
            start_temperature: 0.01,
            end_temperature: 0.0005,
            report_interval: Duration::from_millis(250),
            crib: None,
            best_list_size: 10,
            discard_same_plaintexts: true,
        }
    }
}

/// Cooperative stop signal shared between the caller and all workers.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that is not cancelled
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every worker to stop after its current candidate
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// True once [`CancelToken::cancel`] was called
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Best key found, with its decryption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Solution {
    /// Key square
    pub key: Key,
    /// Decrypted symbols; fillers are removed when a crib was given
    pub plaintext: Vec<u8>,
    /// `plaintext` as text
    pub text: String,
    /// Score of the key, higher is better
    pub score: i64,
    /// Restart that found the key
    pub restart: usize,
    /// Cycle of that restart in which the key was found
    pub cycle: usize,
    /// Time since the search started
    pub elapsed: Duration,
    /// Candidate keys evaluated by all restarts before this one was recorded
    pub evaluations: u64,
}

/// How a search ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Every restart ran all of its cycles
    Converged,
    /// Stopped through a [`CancelToken`]
    Cancelled,
}

/// Outcome of [`Solver::solve`].
#[derive(Clone, Debug)]
pub struct Report {
    /// Terminal state
    pub status: Status,
    /// Best solution, `None` if no key ever scored above zero
    pub best: Option<Solution>,
    /// Highest scoring solutions, best first, at most `best_list_size`. The first entry is
    /// `best`.
    pub best_list: Vec<Solution>,
    /// Number of decrypted candidate keys
    pub evaluations: u64,
    /// Wall time
    pub elapsed: Duration,
}

/// Periodic progress of one worker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    /// Restart reporting
    pub restart: usize,
    /// Cycles completed by that restart
    pub cycle: usize,
    /// Best score of that restart so far
    pub restart_best: i64,
    /// Best score of the whole search so far
    pub best_score: Option<i64>,
    /// Completed cycles of all restarts, 0 to 1
    pub fraction: f64,
    /// Candidate keys evaluated by all restarts
    pub evaluations: u64,
    /// Time since the search started
    pub elapsed: Duration,
}

/// Notifications sent while a search runs. Events of different workers may arrive in any order.
#[derive(Clone, Debug)]
pub enum Event {
    /// Rate limited progress
    Progress(Progress),
    /// A better solution replaced the global best
    NewBest(Solution),
    /// Something suspicious that does not stop the search
    Warning(String),
}

/// A crib converted to symbols.
struct PreparedCrib {
    symbols: Vec<u8>,
    min_offset: usize,
    max_offset: usize,
    weight: i64,
}

impl PreparedCrib {
    /// Bonus for the offset where most crib symbols match
    fn bonus(&self, plaintext: &[u8]) -> i64 {
        let matches = (self.min_offset..=self.max_offset)
            .map(|offset| {
                plaintext[offset..offset + self.symbols.len()]
                    .iter()
                    .zip(&self.symbols)
                    .filter(|(a, b)| a == b)
                    .count()
            })
            .max()
            .unwrap_or_default();
        matches as i64 * self.weight
    }
}

/// Highest scoring solutions, best first.
struct BestList {
    entries: Vec<Solution>,
    capacity: usize,
    discard_same_plaintexts: bool,
}

impl BestList {
    fn new(config: &Config) -> Self {
        Self {
            entries: Vec::new(),
            capacity: config.best_list_size,
            discard_same_plaintexts: config.discard_same_plaintexts,
        }
    }

    /// Ranks `solution`. Returns true if it became the new best, which requires a strictly
    /// higher score than the previous best.
    fn offer(&mut self, solution: Solution) -> bool {
        if self.discard_same_plaintexts {
            let same = self
                .entries
                .iter()
                .position(|e| e.plaintext == solution.plaintext);
            if let Some(pos) = same {
                if self.entries[pos].score >= solution.score {
                    return false;
                }
                self.entries.remove(pos);
            }
        }
        let rank = self.entries.partition_point(|e| e.score >= solution.score);
        if rank >= self.capacity {
            return false;
        }
        self.entries.insert(rank, solution);
        self.entries.truncate(self.capacity);
        rank == 0
    }

    /// Scores at or below this cannot enter, `i64::MIN` while the list has room
    fn threshold(&self) -> i64 {
        match self.entries.last() {
            Some(last) if self.entries.len() == self.capacity => last.score,
            _ => i64::MIN,
        }
    }
}

/// State shared by all workers of one search.
struct Shared {
    best: Mutex<BestList>,
    best_score: AtomicI64,
    threshold: AtomicI64,
    interrupted: AtomicBool,
    completed: AtomicU64,
    evaluations: AtomicU64,
    start: Instant,
}

impl Shared {
    fn new(config: &Config) -> Self {
        Self {
            best: Mutex::new(BestList::new(config)),
            best_score: AtomicI64::new(i64::MIN),
            threshold: AtomicI64::new(i64::MIN),
            interrupted: AtomicBool::new(false),
            completed: AtomicU64::new(0),
            evaluations: AtomicU64::new(0),
            start: Instant::now(),
        }
    }
}

/// Read-only inputs of one search.
struct Job<'a> {
    text: &'a [u8],
    crib: Option<PreparedCrib>,
    seed: u64,
    cancel: &'a CancelToken,
    shared: Shared,
}

/// Playfair key search with a fixed configuration and statistics table.
pub struct Solver {
    config: Config,
    table: Arc<NgramTable>,
    alphabet: Alphabet,
    cipher: Playfair,
    perms: Permutations,
}

impl Solver {
    /// Prepares the tables for `config.dim`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] for zero cycles, steps, restarts or best list size,
    /// non-positive temperatures or a `max_length` below [`MIN_LENGTH`]
    pub fn new(table: Arc<NgramTable>, config: Config) -> Result<Self> {
        if config.cycles == 0 {
            return Err(Error::InvalidConfig("cycles must be positive"));
        }
        if config.steps == 0 {
            return Err(Error::InvalidConfig("steps must be positive"));
        }
        if config.restarts == 0 {
            return Err(Error::InvalidConfig("restarts must be positive"));
        }
        if config.best_list_size == 0 {
            return Err(Error::InvalidConfig("best list size must be positive"));
        }
        if config.threads == Some(0) {
            return Err(Error::InvalidConfig("threads must be positive"));
        }
        let positive = |t: f64| t > 0.0;
        if !positive(config.start_temperature) || !positive(config.end_temperature) {
            return Err(Error::InvalidConfig("temperatures must be positive"));
        }
        if config.max_length.map_or(false, |max| max < MIN_LENGTH) {
            return Err(Error::InvalidConfig("max length is shorter than 6 symbols"));
        }

        let dim = config.dim;
        Ok(Self {
            config,
            table,
            alphabet: Alphabet::new(dim),
            cipher: Playfair::new(dim),
            perms: Permutations::new(dim),
        })
    }

    /// Search parameters
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Filters `ciphertext` with the alphabet of the square and runs [`Solver::solve`]
    ///
    /// # Errors
    ///
    /// Same as [`Solver::solve`]
    pub fn solve_text<R>(&self, ciphertext: &str, cancel: &CancelToken, report: R) -> Result<Report>
    where
        R: Fn(Event) + Sync,
    {
        self.solve(&self.alphabet.filter(ciphertext), cancel, report)
    }

    /// Searches for the key of `ciphertext`, given as symbol codes.
    ///
    /// Returns when every restart finished or soon after `cancel` was triggered. `report`
    /// receives [`Event`]s from all worker threads.
    ///
    /// # Errors
    ///
    /// Input validation errors before anything runs, [`Error::WorkersFailed`] if every restart
    /// panicked
    pub fn solve<R>(&self, ciphertext: &[u8], cancel: &CancelToken, report: R) -> Result<Report>
    where
        R: Fn(Event) + Sync,
    {
        let text = self.validate(ciphertext)?;
        let crib = self.prepare_crib(text.len())?;

        if text.len() < USEFUL_LENGTH {
            let message = format!(
                "ciphertext has only {} symbols, n-gram scores may be unreliable",
                text.len()
            );
            warn!("{message}");
            report(Event::Warning(message));
        }

        let seed = self.config.seed.unwrap_or_else(|| rand::thread_rng().gen());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads.unwrap_or(0))
            .build()?;
        info!(
            "searching {} square ({:.3e} keys): {} symbols, {} restarts of {} x {} candidates on {} threads, seed {}",
            self.config.dim,
            self.config.dim.key_space(),
            text.len(),
            self.config.restarts,
            self.config.cycles,
            self.config.steps,
            pool.current_num_threads(),
            seed
        );

        let job = Job {
            text,
            crib,
            seed,
            cancel,
            shared: Shared::new(&self.config),
        };

        let failures = pool.install(|| {
            (0..self.config.restarts)
                .into_par_iter()
                .filter(|&restart| {
                    let outcome = catch_unwind(AssertUnwindSafe(|| {
                        self.anneal(restart, &job, &report);
                    }));
                    if outcome.is_err() {
                        error!("restart {restart} panicked, its results are lost");
                    }
                    outcome.is_err()
                })
                .count()
        });
        if failures == self.config.restarts {
            return Err(Error::WorkersFailed(failures));
        }

        let Job { shared, .. } = job;
        let status = if shared.interrupted.into_inner() {
            Status::Cancelled
        } else {
            Status::Converged
        };
        let mut best_list = shared
            .best
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .entries;
        best_list.retain(|solution| solution.score > 0);
        let report = Report {
            status,
            best: best_list.first().cloned(),
            best_list,
            evaluations: shared.evaluations.into_inner(),
            elapsed: shared.start.elapsed(),
        };
        info!(
            "search {:?} after {:.1?}, {} candidates evaluated",
            report.status, report.elapsed, report.evaluations
        );
        Ok(report)
    }

    fn validate<'a>(&self, ciphertext: &'a [u8]) -> Result<&'a [u8]> {
        if ciphertext.is_empty() {
            return Err(Error::EmptyCiphertext);
        }
        if ciphertext.len() % 2 != 0 {
            return Err(Error::OddLength(ciphertext.len()));
        }
        if ciphertext.len() < MIN_LENGTH {
            return Err(Error::CiphertextTooShort {
                min: MIN_LENGTH,
                found: ciphertext.len(),
            });
        }
        let square = self.config.dim.square();
        if let Some(&bad) = ciphertext.iter().find(|&&s| usize::from(s) >= square) {
            return Err(Error::InvalidSymbol(bad));
        }

        Ok(match self.config.max_length {
            Some(max) if max < ciphertext.len() => {
                debug!("analyzing the first {} of {} symbols", max & !1, ciphertext.len());
                &ciphertext[..max & !1]
            }
            _ => ciphertext,
        })
    }

    fn prepare_crib(&self, len: usize) -> Result<Option<PreparedCrib>> {
        let Some(crib) = &self.config.crib else {
            return Ok(None);
        };
        let symbols = self.alphabet.filter(&crib.text);
        if symbols.is_empty() {
            return Err(Error::EmptyCrib);
        }
        if crib.min_offset > crib.max_offset {
            return Err(Error::InvalidCribRange {
                min: crib.min_offset,
                max: crib.max_offset,
            });
        }
        let fits = crib
            .max_offset
            .checked_add(symbols.len())
            .map_or(false, |end| end <= len);
        if !fits {
            return Err(Error::CribDoesNotFit {
                crib: symbols.len(),
                offset: crib.max_offset,
                text: len,
            });
        }
        Ok(Some(PreparedCrib {
            symbols,
            min_offset: crib.min_offset,
            max_offset: crib.max_offset,
            weight: (self.table.ceiling() / 100).max(1),
        }))
    }

    /// Score of `key`, decrypting into `scratch`
    fn evaluate(&self, key: &Key, job: &Job<'_>, scratch: &mut [u8]) -> i64 {
        self.cipher.decrypt_unchecked(key, job.text, scratch);
        let plaintext = &scratch[..job.text.len()];
        let mut score = self
            .table
            .score_letters(plaintext.iter().map(|&s| self.alphabet.letter(s)));
        if let Some(crib) = &job.crib {
            score += crib.bonus(plaintext);
        }
        score
    }

    /// Random child of `key`
    fn mutate(&self, key: &Key, rng: &mut StdRng) -> Key {
        let n = self.config.dim.len();
        let square = self.config.dim.square();
        match rng.gen_range(0..100) {
            0..=79 => {
                let (i, j) = distinct_pair(rng, square);
                key.swap(i, j)
            }
            80..=87 => {
                let (i, j) = distinct_pair(rng, square);
                let (lo, hi) = (i.min(j), i.max(j));
                let mut k = rng.gen_range(0..square - 2);
                if k >= lo {
                    k += 1;
                }
                if k >= hi {
                    k += 1;
                }
                key.swap3(i, j, k)
            }
            88..=90 => {
                let (a, b) = distinct_pair(rng, n);
                key.swap_rows(a, b)
            }
            91..=93 => {
                let (a, b) = distinct_pair(rng, n);
                key.swap_cols(a, b)
            }
            94 => key.permute_rows(&self.perms, rng.gen_range(1..self.perms.len())),
            95 => key.permute_cols(&self.perms, rng.gen_range(1..self.perms.len())),
            96 | 97 => key.permute_row_cols(
                rng.gen_range(0..n),
                &self.perms,
                rng.gen_range(1..self.perms.len()),
            ),
            _ => key.permute_col_rows(
                rng.gen_range(0..n),
                &self.perms,
                rng.gen_range(1..self.perms.len()),
            ),
        }
    }

    /// Temperature of a cycle, geometric between the configured bounds
    fn temperature(&self, cycle: usize) -> f64 {
        let ceiling = self.table.ceiling().max(1) as f64;
        let start = self.config.start_temperature * ceiling;
        let end = self.config.end_temperature * ceiling;
        if self.config.cycles < 2 {
            return start;
        }
        let progress = cycle as f64 / (self.config.cycles - 1) as f64;
        start * (end / start).powf(progress)
    }

    /// One restart from a random key, runs until converged or cancelled
    fn anneal<R>(&self, restart: usize, job: &Job<'_>, report: &R)
    where
        R: Fn(Event) + Sync,
    {
        if job.cancel.is_cancelled() {
            job.shared.interrupted.store(true, Ordering::Relaxed);
            return;
        }

        let seed = job
            .seed
            .wrapping_add((restart as u64).wrapping_mul(SEED_STRIDE));
        let mut rng = StdRng::seed_from_u64(seed);
        let mut scratch = vec![0; job.text.len()];

        let mut current = Key::random(self.config.dim, &mut rng);
        let mut current_score = self.evaluate(&current, job, &mut scratch);
        let mut best = (current, current_score, 0);
        let mut improved = true;
        let mut last_report = Instant::now();

        for cycle in 0..self.config.cycles {
            let temperature = self.temperature(cycle);
            let mut evaluated = 0;

            for _ in 0..self.config.steps {
                if job.cancel.is_cancelled() {
                    job.shared
                        .evaluations
                        .fetch_add(evaluated, Ordering::Relaxed);
                    job.shared.interrupted.store(true, Ordering::Relaxed);
                    self.publish(restart, best, improved, job, report);
                    debug!("restart {restart} cancelled in cycle {cycle}");
                    return;
                }

                let child = self.mutate(&current, &mut rng);
                let score = self.evaluate(&child, job, &mut scratch);
                evaluated += 1;

                let delta = score - current_score;
                if delta > 0 || rng.gen::<f64>() < (delta as f64 / temperature).exp() {
                    current = child;
                    current_score = score;
                    if current_score > best.1 {
                        best = (current, current_score, cycle);
                        improved = true;
                    }
                }
            }

            let evaluations =
                job.shared.evaluations.fetch_add(evaluated, Ordering::Relaxed) + evaluated;
            let completed = job.shared.completed.fetch_add(1, Ordering::Relaxed) + 1;
            self.publish(restart, best, improved, job, report);
            improved = false;

            let last = cycle + 1 == self.config.cycles;
            if last || last_report.elapsed() >= self.config.report_interval {
                last_report = Instant::now();
                let best_score = job.shared.best_score.load(Ordering::Relaxed);
                let total = (self.config.cycles * self.config.restarts) as f64;
                report(Event::Progress(Progress {
                    restart,
                    cycle: cycle + 1,
                    restart_best: best.1,
                    best_score: (best_score != i64::MIN).then_some(best_score),
                    fraction: completed as f64 / total,
                    evaluations,
                    elapsed: job.shared.start.elapsed(),
                }));
            }
        }
        debug!("restart {restart} converged, best score {}", best.1);
    }

    /// Offers the local best of a restart to the best list. Does nothing unless the local best
    /// improved since the last call.
    fn publish<R>(
        &self,
        restart: usize,
        (key, score, cycle): (Key, i64, usize),
        improved: bool,
        job: &Job<'_>,
        report: &R,
    )
    where
        R: Fn(Event) + Sync,
    {
        if !improved || score <= job.shared.threshold.load(Ordering::Relaxed) {
            return;
        }

        let mut plaintext = vec![0; job.text.len()];
        self.cipher.decrypt_unchecked(&key, job.text, &mut plaintext);
        if job.crib.is_some() {
            plaintext = remove_fillers(&self.alphabet, &plaintext);
        }
        let solution = Solution {
            key,
            text: self.alphabet.decode(&plaintext),
            plaintext,
            score,
            restart,
            cycle,
            elapsed: job.shared.start.elapsed(),
            evaluations: job.shared.evaluations.load(Ordering::Relaxed),
        };

        {
            let mut list = job.shared.best.lock().unwrap_or_else(PoisonError::into_inner);
            let new_best = list.offer(solution.clone());
            job.shared
                .threshold
                .store(list.threshold(), Ordering::Relaxed);
            if !new_best {
                return;
            }
            job.shared.best_score.store(score, Ordering::Relaxed);
        }

        info!("new best {score} from restart {restart}: {}", solution.text);
        report(Event::NewBest(solution));
    }
}

/// Two different values below `n`
fn distinct_pair(rng: &mut StdRng, n: usize) -> (usize, usize) {
    let i = rng.gen_range(0..n);
    let mut j = rng.gen_range(0..n - 1);
    if j >= i {
        j += 1;
    }
    (i, j)
}
