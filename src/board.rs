//! Board geometry and the discrete path of a ball through it.
//!
//! Nails are laid out in staggered rows. The lane index only tracks the
//! zig-zag layout if it is updated with a rule that alternates by row
//! parity: on even rows a step to the right moves the lane up by one and a
//! step to the left keeps it, on odd rows a step to the left moves the lane
//! down by one and a step to the right keeps it.

use crate::error::{GaltonError, Result};

/// Shape of the board.
///
/// The configuration is validated once on construction and is immutable
/// afterwards, every entry point of the crate takes it by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardConfig {
    n_rows: usize,
    n_nails: usize,
}

impl BoardConfig {
    pub const DEFAULT_ROWS: usize = 20;
    pub const DEFAULT_NAILS: usize = 31;

    /// Create a board with `n_rows` rows of `n_nails` nails.
    ///
    /// The number of nails must be odd so that the ball can start in a
    /// centered lane, and there must be at least one row.
    pub fn new(n_rows: usize, n_nails: usize) -> Result<Self> {
        if n_rows < 1 {
            return Err(GaltonError::InvalidConfiguration {
                n_rows,
                n_nails,
                reason: "the board needs at least one row",
            });
        }
        if n_nails % 2 == 0 {
            return Err(GaltonError::InvalidConfiguration {
                n_rows,
                n_nails,
                reason: "the number of nails must be odd",
            });
        }
        Ok(Self { n_rows, n_nails })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_nails(&self) -> usize {
        self.n_nails
    }

    /// The lane every ball starts in.
    pub fn start_lane(&self) -> usize {
        self.n_nails / 2
    }

    /// Number of distinct terminal lanes, `0..=n_nails`.
    pub fn n_lanes(&self) -> usize {
        self.n_nails + 1
    }

    /// Row index scaled to `[0, 1]`.
    ///
    /// A board with a single row only ever decides row 0, which maps to 0.
    pub(crate) fn level_rel(&self, level: usize) -> f64 {
        if self.n_rows == 1 {
            return 0.;
        }
        level as f64 / (self.n_rows - 1) as f64
    }

    /// Lane scaled to `[-1, 1]`, with the start lane at 0.
    pub(crate) fn nail_rel(&self, lane: usize) -> f64 {
        if self.n_nails == 1 {
            return 0.;
        }
        2. * lane as f64 / (self.n_nails - 1) as f64 - 1.
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            n_rows: Self::DEFAULT_ROWS,
            n_nails: Self::DEFAULT_NAILS,
        }
    }
}

/// Decision of the ball at a single nail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Step {
    Left = 0,
    Right = 1,
}

impl Step {
    pub fn as_index(self) -> usize {
        self as usize
    }
}

/// Lane after taking `step` on row `level`.
#[inline]
pub(crate) fn lane_after_step(lane: usize, level: usize, step: Step) -> usize {
    match (step, level % 2) {
        (Step::Right, 0) => lane + 1,
        // Lane 0 is pinned to the right on odd rows, so this never
        // saturates for paths produced by the simulator.
        (Step::Left, 1) => lane.saturating_sub(1),
        _ => lane,
    }
}

/// Replay `steps` from `begin` and return the lane the ball ends up in.
pub fn replay_lane(begin: usize, steps: &[Step]) -> usize {
    steps
        .iter()
        .enumerate()
        .fold(begin, |lane, (level, &step)| {
            lane_after_step(lane, level, step)
        })
}

/// The full discrete path of one ball.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub begin: usize,
    pub steps: Vec<Step>,
    pub end: usize,
}

impl Path {
    /// The path as `[begin, steps..., end]`, with steps encoded as 0 (left)
    /// and 1 (right). It has `n_rows + 2` entries.
    pub fn trajectory(&self) -> Vec<usize> {
        std::iter::once(self.begin)
            .chain(self.steps.iter().map(|step| step.as_index()))
            .chain(std::iter::once(self.end))
            .collect()
    }
}
