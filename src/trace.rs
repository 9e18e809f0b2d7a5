//! Simulation of a single ball and the derivative of its path probability.
//!
//! The decision at every nail is made by comparing an external uniform draw
//! against the threshold of a *reference* parameter, while the probability of
//! the path is evaluated under the parameter of interest. With the draws and
//! the reference fixed the path does not depend on the parameter at all, so
//! the path probability is a smooth function of it (apart from pinned lanes,
//! which are constant) and can be differentiated along the realised path.

use crate::{
    board::{lane_after_step, BoardConfig, Path, Step},
    error::{GaltonError, Result},
    math::{Dual, Scalar},
    threshold::threshold_at,
};

/// Outcome of one simulated ball.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceResult {
    /// Log probability of `path` under the evaluated parameter.
    pub log_prob: f64,
    pub path: Path,
}

impl TraceResult {
    /// The terminal lane.
    pub fn outcome(&self) -> usize {
        self.path.end
    }
}

/// Derivatives of a trace with respect to the evaluated parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientBundle {
    /// `d log p(path) / d theta`, the score of the path.
    pub log_prob_grad: f64,
    /// `d p(path) / d theta`.
    pub prob_grad: f64,
}

struct Accumulated<S> {
    log_prob: S,
    prob: S,
    path: Path,
}

/// Check that `draws` holds a uniform draw in `[0, 1)` for every row.
///
/// Draws after the first `n_rows` are never read and are not checked.
pub fn validate_draws(draws: &[f64], board: &BoardConfig) -> Result<()> {
    if draws.len() < board.n_rows() {
        return Err(GaltonError::TooFewDraws {
            expected: board.n_rows(),
            got: draws.len(),
        });
    }
    if let Some((index, &value)) = draws[..board.n_rows()]
        .iter()
        .enumerate()
        .find(|(_, u)| !(0f64..1f64).contains(*u))
    {
        return Err(GaltonError::DrawOutOfRange { index, value });
    }
    Ok(())
}

fn simulate<S: Scalar>(
    theta: S,
    draws: &[f64],
    board: &BoardConfig,
    reference: f64,
) -> Result<Accumulated<S>> {
    validate_draws(draws, board)?;

    let begin = board.start_lane();
    let mut lane = begin;
    let mut steps = Vec::with_capacity(board.n_rows());
    let mut log_prob = S::constant(0.);
    let mut prob = S::constant(1.);

    for (level, &u) in draws[..board.n_rows()].iter().enumerate() {
        let t_ref = threshold_at(reference, board, level, lane);
        let t = threshold_at(theta, board, level, lane);

        // A saturated threshold always goes left, whatever the draw.
        let step = if u < t_ref || t_ref == 1.0 {
            log_prob = log_prob + t.ln();
            prob = prob * t;
            Step::Left
        } else {
            let t_right = S::constant(1.) - t;
            log_prob = log_prob + t_right.ln();
            prob = prob * t_right;
            Step::Right
        };

        lane = lane_after_step(lane, level, step);
        steps.push(step);
    }

    Ok(Accumulated {
        log_prob,
        prob,
        path: Path {
            begin,
            steps,
            end: lane,
        },
    })
}

/// Drop a ball through the board, deciding every row with `draws`.
pub fn run(theta: f64, draws: &[f64], board: &BoardConfig) -> Result<TraceResult> {
    run_with_reference(theta, draws, board, theta)
}

/// Like [`run`], but the path is decided by the thresholds of `reference`
/// while its log probability is evaluated under `theta`.
pub fn run_with_reference(
    theta: f64,
    draws: &[f64],
    board: &BoardConfig,
    reference: f64,
) -> Result<TraceResult> {
    let acc = simulate(theta, draws, board, reference)?;
    Ok(TraceResult {
        log_prob: acc.log_prob,
        path: acc.path,
    })
}

/// [`run_with_reference`] together with the derivatives of the path
/// probability with respect to `theta`, holding `draws` and `reference`
/// fixed.
pub fn run_and_grad(
    theta: f64,
    draws: &[f64],
    board: &BoardConfig,
    reference: f64,
) -> Result<(TraceResult, GradientBundle)> {
    let acc = simulate(Dual::variable(theta), draws, board, reference)?;
    let trace = TraceResult {
        log_prob: acc.log_prob.primal(),
        path: acc.path,
    };
    let grads = GradientBundle {
        log_prob_grad: acc.log_prob.tangent(),
        prob_grad: acc.prob.tangent(),
    };
    Ok((trace, grads))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::replay_lane;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn default_draws(seed: u64) -> Vec<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..BoardConfig::DEFAULT_ROWS).map(|_| rng.random()).collect()
    }

    #[test]
    fn single_row_goes_left() {
        let board = BoardConfig::new(1, 3).unwrap();
        let trace = run(0., &[0.3], &board).unwrap();
        assert_eq!(
            trace.path,
            Path {
                begin: 1,
                steps: vec![Step::Left],
                end: 1
            }
        );
        assert_eq!(trace.log_prob, 0.5f64.ln());
    }

    #[test]
    fn single_row_goes_right() {
        let board = BoardConfig::new(1, 3).unwrap();
        let trace = run(0., &[0.7], &board).unwrap();
        assert_eq!(trace.path.steps, vec![Step::Right]);
        assert_eq!(trace.outcome(), 2);
        assert_eq!(trace.log_prob, 0.5f64.ln());
    }

    #[test]
    fn deterministic() {
        let board = BoardConfig::default();
        let draws = default_draws(42);
        let a = run_and_grad(1.3, &draws, &board, 1.3).unwrap();
        let b = run_and_grad(1.3, &draws, &board, 1.3).unwrap();
        assert_eq!(a.0.log_prob.to_bits(), b.0.log_prob.to_bits());
        assert_eq!(a, b);
        assert_eq!(run(1.3, &draws, &board).unwrap(), a.0);
    }

    #[test]
    fn rejects_bad_draws() {
        let board = BoardConfig::new(3, 5).unwrap();
        assert_eq!(
            run(0., &[0.1, 0.2], &board).unwrap_err(),
            GaltonError::TooFewDraws {
                expected: 3,
                got: 2
            }
        );
        assert_eq!(
            run(0., &[0.1, 1.0, 0.3], &board).unwrap_err(),
            GaltonError::DrawOutOfRange {
                index: 1,
                value: 1.0
            }
        );
        assert!(run(0., &[0.1, 0.2, -0.1], &board)
            .unwrap_err()
            .is_invalid_input());
        assert!(matches!(
            run_and_grad(0., &[f64::NAN, 0.2, 0.3], &board, 0.).unwrap_err(),
            GaltonError::DrawOutOfRange { index: 0, .. }
        ));
    }

    #[test]
    fn extra_draws_are_ignored() {
        let board = BoardConfig::new(3, 5).unwrap();
        let short = run(0.4, &[0.1, 0.9, 0.5], &board).unwrap();
        let long = run(0.4, &[0.1, 0.9, 0.5, 7.0], &board).unwrap();
        assert_eq!(short, long);
    }

    #[test]
    fn saturated_threshold_goes_left() {
        // One nail per row: lane 0 is pinned to the left edge and lane 1 to
        // the right edge on odd rows.
        let board = BoardConfig::new(2, 1).unwrap();
        let trace = run(0., &[0.9, 0.999], &board).unwrap();
        // Row 0 goes right into lane 1, row 1 is pinned at t == 1.
        assert_eq!(trace.path.steps, vec![Step::Right, Step::Left]);
        assert_eq!(trace.outcome(), 0);
        assert_eq!(trace.log_prob, 0.5f64.ln());
    }

    #[test]
    fn reference_decides_the_path() {
        let board = BoardConfig::default();
        let draws = default_draws(7);
        let base = run(0.5, &draws, &board).unwrap();
        let moved = run_with_reference(-1.0, &draws, &board, 0.5).unwrap();
        assert_eq!(base.path, moved.path);
        assert!(base.log_prob != moved.log_prob);
    }

    #[test]
    fn prob_grad_matches_score() {
        let board = BoardConfig::default();
        for seed in 0..20 {
            let draws = default_draws(seed);
            let (trace, grads) = run_and_grad(0.8, &draws, &board, 0.8).unwrap();
            assert_relative_eq!(
                grads.prob_grad,
                trace.log_prob.exp() * grads.log_prob_grad,
                max_relative = 1e-9
            );
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn path_is_consistent(
            theta in -5f64..5f64,
            draws in prop::collection::vec(0f64..1f64, 20),
        ) {
            let board = BoardConfig::default();
            let trace = run(theta, &draws, &board).unwrap();
            let path = &trace.path;
            prop_assert_eq!(path.steps.len(), board.n_rows());
            prop_assert_eq!(path.begin, board.start_lane());
            prop_assert_eq!(path.end, replay_lane(path.begin, &path.steps));

            let right_on_even = path
                .steps
                .iter()
                .step_by(2)
                .filter(|&&s| s == Step::Right)
                .count();
            let left_on_odd = path
                .steps
                .iter()
                .skip(1)
                .step_by(2)
                .filter(|&&s| s == Step::Left)
                .count();
            prop_assert_eq!(path.end + left_on_odd, path.begin + right_on_even);
            prop_assert!(path.end <= board.n_nails());
            prop_assert_eq!(path.trajectory().len(), board.n_rows() + 2);
        }

        #[test]
        fn score_matches_finite_difference(
            theta in -1.5f64..1.5f64,
            draws in prop::collection::vec(0f64..1f64, 20),
        ) {
            let board = BoardConfig::default();
            let h = 1e-5;
            let (trace, grads) = run_and_grad(theta, &draws, &board, theta).unwrap();
            let up = run_with_reference(theta + h, &draws, &board, theta).unwrap();
            let down = run_with_reference(theta - h, &draws, &board, theta).unwrap();
            prop_assert_eq!(&up.path, &trace.path);
            prop_assert_eq!(&down.path, &trace.path);

            let fd = (up.log_prob - down.log_prob) / (2. * h);
            let tol = 1e-4 * grads.log_prob_grad.abs().max(1.);
            prop_assert!(
                (fd - grads.log_prob_grad).abs() < tol,
                "finite difference {} vs dual {}", fd, grads.log_prob_grad
            );

            let fd_prob = (up.log_prob.exp() - down.log_prob.exp()) / (2. * h);
            let tol = 1e-4 * grads.prob_grad.abs().max(trace.log_prob.exp());
            prop_assert!((fd_prob - grads.prob_grad).abs() < tol.max(1e-12));
        }
    }
}
