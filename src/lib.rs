//! A Galton board as a differentiable stochastic process.
//!
//! A ball falls through staggered rows of nails and at every nail goes left
//! with a probability that depends on a single parameter `theta`. All
//! randomness comes from externally supplied uniform draws, so a run is a
//! deterministic function of the parameter and the draws. This makes the
//! log probability of the realised path differentiable in `theta`, and lets
//! the same draws be replayed under a second parameter for paired
//! (common random number) comparisons.

pub(crate) mod board;
pub(crate) mod error;
pub(crate) mod field;
pub(crate) mod math;
pub(crate) mod sampler;
pub(crate) mod threshold;
pub(crate) mod trace;

pub use board::{replay_lane, BoardConfig, Path, Step};
pub use error::{GaltonError, Result};
pub use field::field;
pub use math::{sigmoid, Dual, Scalar};
pub use sampler::{
    sample, sample_parallel, sample_ratio, sample_ratio_parallel, sample_ratio_with_settings,
    sample_with_settings, RandomState, RatioSamples, SampleSettings, Samples,
};
pub use threshold::{smooth_threshold, threshold};
pub use trace::{run, run_and_grad, run_with_reference, validate_draws, GradientBundle, TraceResult};
