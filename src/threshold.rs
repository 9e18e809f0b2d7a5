//! Probability that the ball goes left at the next nail.

use std::f64::consts::PI;

use crate::{
    board::{replay_lane, BoardConfig, Step},
    math::Scalar,
};

/// Smooth branching probability at row `level` and lane `lane`.
///
/// Row 0 carries no information and is exactly 0.5. Deeper rows blend
/// towards a logistic response in the lane, sharpened by the parameter.
/// No boundary pinning is applied here.
pub fn smooth_threshold<S: Scalar>(theta: S, board: &BoardConfig, level: usize, lane: usize) -> S {
    let depth = (PI * board.level_rel(level)).sin();
    let response = theta.scale(10.).scale(board.nail_rel(lane)).sigmoid();
    S::constant((1. - depth) * 0.5) + response.scale(depth)
}

/// Probability that the ball moves left after following `steps` from `begin`.
///
/// On odd rows the outermost lanes are pinned: lane 0 never goes further
/// left and lane `n_nails` always goes left. Pinned values are constants and
/// carry no derivative.
pub fn threshold<S: Scalar>(theta: S, board: &BoardConfig, begin: usize, steps: &[Step]) -> S {
    let lane = replay_lane(begin, steps);
    threshold_at(theta, board, steps.len(), lane)
}

/// [`threshold`] for a lane that is already known.
#[inline]
pub(crate) fn threshold_at<S: Scalar>(
    theta: S,
    board: &BoardConfig,
    level: usize,
    lane: usize,
) -> S {
    if level % 2 == 1 {
        if lane == 0 {
            return S::constant(0.);
        } else if lane == board.n_nails() {
            return S::constant(1.);
        }
    }
    smooth_threshold(theta, board, level, lane)
}
