use ndarray::Array2;

use crate::{board::BoardConfig, threshold::smooth_threshold};

/// Left probability of the smooth model over the whole board, with shape
/// `(n_rows, n_nails)`. Cell `(level, nail)` is evaluated at lane `nail`
/// without boundary pinning and without replaying any path.
pub fn field(theta: f64, board: &BoardConfig) -> Array2<f64> {
    Array2::from_shape_fn((board.n_rows(), board.n_nails()), |(level, nail)| {
        smooth_threshold(theta, board, level, nail)
    })
}
