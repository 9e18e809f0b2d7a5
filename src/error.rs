use thiserror::Error;

/// Errors of board construction and simulation.
///
/// `TooFewDraws` and `DrawOutOfRange` are the two kinds of `InvalidInput`:
/// bad random draws handed to a run. [`GaltonError::is_invalid_input`]
/// matches both.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GaltonError {
    #[error("Invalid board configuration ({n_rows} rows, {n_nails} nails): {reason}")]
    InvalidConfiguration {
        n_rows: usize,
        n_nails: usize,
        reason: &'static str,
    },
    #[error("Expected at least {expected} random draws, got {got}")]
    TooFewDraws { expected: usize, got: usize },
    #[error("Random draw {index} is {value}, expected a value in [0, 1)")]
    DrawOutOfRange { index: usize, value: f64 },
}

impl GaltonError {
    /// Whether the error was caused by the random draws handed to a run,
    /// as opposed to the board itself.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            GaltonError::TooFewDraws { .. } | GaltonError::DrawOutOfRange { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GaltonError>;
