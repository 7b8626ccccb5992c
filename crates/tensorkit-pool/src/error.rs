use thiserror::Error;

/// Error type for pooling configuration and gradient routing.
///
/// Configuration variants are raised at shape-calculation time and are fatal
/// to the call; nothing in this crate retries. `EmptyWindow` is an internal
/// invariant violation: the shape calculator's eligibility checks are meant
/// to make it unreachable.
#[derive(Debug, Error, Clone)]
pub enum PoolError {
    #[error("kernel/stride/pad lengths {kernel}/{stride}/{pad} do not all match spatial rank {expected}")]
    RankMismatch {
        expected: usize,
        kernel: usize,
        stride: usize,
        pad: usize,
    },

    #[error("kernel size must be positive along axis {axis}")]
    ZeroKernel { axis: usize },

    #[error("stride must be positive along axis {axis}")]
    ZeroStride { axis: usize },

    #[error("padding {pad} along axis {axis} must be smaller than the kernel {kernel}")]
    PadTooLarge {
        axis: usize,
        pad: usize,
        kernel: usize,
    },

    #[error(
        "pooled extent along axis {axis} is empty (input {input}, kernel {kernel}, \
         stride {stride}, pad {pad})"
    )]
    EmptyOutput {
        axis: usize,
        input: usize,
        kernel: usize,
        stride: usize,
        pad: usize,
    },

    #[error("trailing pooling window along axis {axis} lies entirely outside the input")]
    UnreachableTrailingWindow { axis: usize },

    #[error("pooled input must have rank {expected} (batch, channels, {spatial} spatial), got rank {got}")]
    BadInputRank {
        expected: usize,
        spatial: usize,
        got: usize,
    },

    #[error("tensor shape {got:?} does not match the paired pooling shape {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("pooling window at output index {index:?} has no valid input element")]
    EmptyWindow { index: Vec<usize> },
}

pub type PoolResult<T> = Result<T, PoolError>;
