//! Monte Carlo drivers over many independent balls.
//!
//! Every run consumes `n_rows` uniform draws. The sequential drivers pull
//! them from one generator in run order. The parallel drivers give each run
//! a private ChaCha stream indexed by the run number, so their output does
//! not depend on how rayon schedules the runs.
//!
//! A failing run aborts the whole batch and its error is returned.

use itertools::izip;
use log::{debug, trace};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Open01;
use rayon::prelude::*;

use crate::{
    board::BoardConfig,
    error::{GaltonError, Result},
    trace::{run_and_grad, GradientBundle, TraceResult},
};

/// Where the uniform draws come from.
pub enum RandomState<'a> {
    /// Seed a fresh `ChaCha8Rng`.
    Seed(u64),
    /// Draw from a generator owned by the caller.
    Rng(&'a mut dyn RngCore),
}

impl From<u64> for RandomState<'static> {
    fn from(seed: u64) -> Self {
        RandomState::Seed(seed)
    }
}

impl<'a, R: RngCore> From<&'a mut R> for RandomState<'a> {
    fn from(rng: &'a mut R) -> Self {
        RandomState::Rng(rng)
    }
}

/// Settings for a batch of simulations.
#[derive(Debug, Clone, Copy)]
pub struct SampleSettings {
    /// Number of balls to drop.
    pub n_runs: usize,
    pub seed: u64,
    pub board: BoardConfig,
    /// Distribute the runs over the rayon thread pool. Each run then uses
    /// its own random stream, so results differ from the sequential driver
    /// with the same seed.
    pub parallel: bool,
}

impl Default for SampleSettings {
    fn default() -> Self {
        Self {
            n_runs: 100,
            seed: 0,
            board: BoardConfig::default(),
            parallel: false,
        }
    }
}

/// Results of [`sample`], one entry per run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Samples {
    /// Terminal lanes.
    pub outcomes: Vec<usize>,
    pub log_probs: Vec<f64>,
    /// `d log p / d theta` of every path.
    pub scores: Vec<f64>,
    /// `d p / d theta` of every path.
    pub prob_grads: Vec<f64>,
    /// `[begin, steps..., end]` of every path.
    pub trajectories: Vec<Vec<usize>>,
}

impl FromIterator<(TraceResult, GradientBundle)> for Samples {
    fn from_iter<I: IntoIterator<Item = (TraceResult, GradientBundle)>>(iter: I) -> Self {
        let mut samples = Samples::default();
        for (trace, grads) in iter {
            samples.outcomes.push(trace.outcome());
            samples.log_probs.push(trace.log_prob);
            samples.scores.push(grads.log_prob_grad);
            samples.prob_grads.push(grads.prob_grad);
            samples.trajectories.push(trace.path.trajectory());
        }
        samples
    }
}

impl Samples {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn mean_outcome(&self) -> f64 {
        mean_outcome(&self.outcomes)
    }

    /// Number of balls that ended in each lane `0..=n_nails`.
    ///
    /// Fails if an outcome does not fit on `board`, which happens when the
    /// samples were drawn on a wider board.
    pub fn outcome_histogram(&self, board: &BoardConfig) -> Result<Vec<usize>> {
        outcome_histogram(&self.outcomes, board)
    }
}

/// Results of [`sample_ratio`]. Both parameters are evaluated on the same
/// realised paths, which were decided by the first parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatioSamples {
    pub outcomes: Vec<usize>,
    pub log_p0: Vec<f64>,
    pub log_p1: Vec<f64>,
    pub score0: Vec<f64>,
    pub score1: Vec<f64>,
    pub grad_p0: Vec<f64>,
    pub grad_p1: Vec<f64>,
    pub trajectories: Vec<Vec<usize>>,
}

struct PairedRun {
    trace0: TraceResult,
    grads0: GradientBundle,
    log_p1: f64,
    grads1: GradientBundle,
}

impl FromIterator<PairedRun> for RatioSamples {
    fn from_iter<I: IntoIterator<Item = PairedRun>>(iter: I) -> Self {
        let mut samples = RatioSamples::default();
        for run in iter {
            samples.outcomes.push(run.trace0.outcome());
            samples.log_p0.push(run.trace0.log_prob);
            samples.log_p1.push(run.log_p1);
            samples.score0.push(run.grads0.log_prob_grad);
            samples.score1.push(run.grads1.log_prob_grad);
            samples.grad_p0.push(run.grads0.prob_grad);
            samples.grad_p1.push(run.grads1.prob_grad);
            samples.trajectories.push(run.trace0.path.trajectory());
        }
        samples
    }
}

impl RatioSamples {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn mean_outcome(&self) -> f64 {
        mean_outcome(&self.outcomes)
    }

    /// `log p0(path) - log p1(path)` for every run.
    pub fn log_ratios(&self) -> Vec<f64> {
        izip!(&self.log_p0, &self.log_p1)
            .map(|(lp0, lp1)| lp0 - lp1)
            .collect()
    }

    /// Importance weights `p1(path) / p0(path)` for reweighting paths drawn
    /// under the first parameter to the second one.
    pub fn weights(&self) -> Vec<f64> {
        izip!(&self.log_p0, &self.log_p1)
            .map(|(lp0, lp1)| (lp1 - lp0).exp())
            .collect()
    }
}

fn mean_outcome(outcomes: &[usize]) -> f64 {
    if outcomes.is_empty() {
        return f64::NAN;
    }
    outcomes.iter().sum::<usize>() as f64 / outcomes.len() as f64
}

fn outcome_histogram(outcomes: &[usize], board: &BoardConfig) -> Result<Vec<usize>> {
    let mut counts = vec![0; board.n_lanes()];
    for &lane in outcomes {
        let Some(count) = counts.get_mut(lane) else {
            return Err(GaltonError::InvalidConfiguration {
                n_rows: board.n_rows(),
                n_nails: board.n_nails(),
                reason: "an outcome lies outside the board",
            });
        };
        *count += 1;
    }
    Ok(counts)
}

fn uniform_draws<R: Rng + ?Sized>(rng: &mut R, board: &BoardConfig) -> Vec<f64> {
    (0..board.n_rows()).map(|_| rng.sample(Open01)).collect()
}

/// The private random stream of run `run` in the parallel drivers.
fn run_rng(seed: u64, run: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(run as u64);
    rng
}

/// One ball decided and evaluated under `theta` itself.
fn single_run(
    theta: f64,
    draws: &[f64],
    board: &BoardConfig,
) -> Result<(TraceResult, GradientBundle)> {
    run_and_grad(theta, draws, board, theta)
}

fn paired_run(theta0: f64, theta1: f64, draws: &[f64], board: &BoardConfig) -> Result<PairedRun> {
    let (trace0, grads0) = run_and_grad(theta0, draws, board, theta0)?;
    // Same draws, decided by theta0: the path is the one above.
    let (trace1, grads1) = run_and_grad(theta1, draws, board, theta0)?;
    debug_assert_eq!(trace0.path, trace1.path);
    Ok(PairedRun {
        trace0,
        grads0,
        log_p1: trace1.log_prob,
        grads1,
    })
}

fn with_rng<'a, T>(
    random_state: impl Into<RandomState<'a>>,
    f: impl FnOnce(&mut dyn RngCore) -> T,
) -> T {
    match random_state.into() {
        RandomState::Seed(seed) => f(&mut ChaCha8Rng::seed_from_u64(seed)),
        RandomState::Rng(rng) => f(rng),
    }
}

/// Drop `n_runs` balls with parameter `theta`.
pub fn sample<'a>(
    theta: f64,
    n_runs: usize,
    board: BoardConfig,
    random_state: impl Into<RandomState<'a>>,
) -> Result<Samples> {
    debug!(
        "Sampling {} runs on a {}x{} board with theta={}",
        n_runs,
        board.n_rows(),
        board.n_nails(),
        theta
    );
    let samples = with_rng(random_state, |rng| {
        (0..n_runs)
            .map(|run| -> Result<_> {
                let draws = uniform_draws(rng, &board);
                let result = single_run(theta, &draws, &board)?;
                trace!("run {}: outcome {}", run, result.0.outcome());
                Ok(result)
            })
            .collect::<Result<Samples>>()
    })?;
    debug!("Finished {} runs, mean outcome {}", samples.len(), samples.mean_outcome());
    Ok(samples)
}

/// Drop `n_runs` balls with parameter `theta0` and evaluate every path
/// under both `theta0` and `theta1`, reusing the same draws.
pub fn sample_ratio<'a>(
    theta0: f64,
    theta1: f64,
    n_runs: usize,
    board: BoardConfig,
    random_state: impl Into<RandomState<'a>>,
) -> Result<RatioSamples> {
    debug!(
        "Sampling {} paired runs on a {}x{} board with theta0={} theta1={}",
        n_runs,
        board.n_rows(),
        board.n_nails(),
        theta0,
        theta1
    );
    let samples = with_rng(random_state, |rng| {
        (0..n_runs)
            .map(|run| -> Result<_> {
                let draws = uniform_draws(rng, &board);
                let paired = paired_run(theta0, theta1, &draws, &board)?;
                trace!("run {}: outcome {}", run, paired.trace0.outcome());
                Ok(paired)
            })
            .collect::<Result<RatioSamples>>()
    })?;
    debug!("Finished {} paired runs, mean outcome {}", samples.len(), samples.mean_outcome());
    Ok(samples)
}

/// [`sample`] with the runs spread over the rayon thread pool.
pub fn sample_parallel(
    theta: f64,
    n_runs: usize,
    board: BoardConfig,
    seed: u64,
) -> Result<Samples> {
    debug!(
        "Sampling {} runs in parallel on a {}x{} board with theta={}",
        n_runs,
        board.n_rows(),
        board.n_nails(),
        theta
    );
    let results: Vec<_> = (0..n_runs)
        .into_par_iter()
        .map(|run| {
            let draws = uniform_draws(&mut run_rng(seed, run), &board);
            single_run(theta, &draws, &board)
        })
        .collect();
    let samples = results.into_iter().collect::<Result<Samples>>()?;
    debug!("Finished {} runs, mean outcome {}", samples.len(), samples.mean_outcome());
    Ok(samples)
}

/// [`sample_ratio`] with the runs spread over the rayon thread pool.
pub fn sample_ratio_parallel(
    theta0: f64,
    theta1: f64,
    n_runs: usize,
    board: BoardConfig,
    seed: u64,
) -> Result<RatioSamples> {
    debug!(
        "Sampling {} paired runs in parallel on a {}x{} board with theta0={} theta1={}",
        n_runs,
        board.n_rows(),
        board.n_nails(),
        theta0,
        theta1
    );
    let results: Vec<_> = (0..n_runs)
        .into_par_iter()
        .map(|run| {
            let draws = uniform_draws(&mut run_rng(seed, run), &board);
            paired_run(theta0, theta1, &draws, &board)
        })
        .collect();
    let samples = results.into_iter().collect::<Result<RatioSamples>>()?;
    debug!("Finished {} paired runs, mean outcome {}", samples.len(), samples.mean_outcome());
    Ok(samples)
}

pub fn sample_with_settings(theta: f64, settings: &SampleSettings) -> Result<Samples> {
    if settings.parallel {
        sample_parallel(theta, settings.n_runs, settings.board, settings.seed)
    } else {
        sample(theta, settings.n_runs, settings.board, settings.seed)
    }
}

pub fn sample_ratio_with_settings(
    theta0: f64,
    theta1: f64,
    settings: &SampleSettings,
) -> Result<RatioSamples> {
    if settings.parallel {
        sample_ratio_parallel(theta0, theta1, settings.n_runs, settings.board, settings.seed)
    } else {
        sample_ratio(theta0, theta1, settings.n_runs, settings.board, settings.seed)
    }
}
