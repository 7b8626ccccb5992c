use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};

/// Compute the pooled spatial extents for `in_dims` under `config`.
///
/// Per dimension with input `n`, kernel `k`, stride `s`, pad `p`:
///
/// - standard: `out = (n + 2p - k) / s + 1` (floor division);
/// - cover_all: one extra trailing step whenever `(n + 2p - k) % s != 0`,
///   so that the last input elements are still reached by a window.
///
/// Validation rejects every configuration that could leave an output element
/// without a single valid input contributor: zero kernel or stride entries,
/// rank mismatches, padding that swallows a whole window, empty outputs, and
/// cover-all trailing steps that start past the end of the input.
pub fn pooled_dims(in_dims: &[usize], config: &PoolConfig) -> PoolResult<Vec<usize>> {
    let rank = in_dims.len();
    if config.kernel.len() != rank || config.stride.len() != rank || config.pad.len() != rank {
        return Err(PoolError::RankMismatch {
            expected: rank,
            kernel: config.kernel.len(),
            stride: config.stride.len(),
            pad: config.pad.len(),
        });
    }

    let mut out = Vec::with_capacity(rank);
    for axis in 0..rank {
        let (n, k, s, p) = (
            in_dims[axis],
            config.kernel[axis],
            config.stride[axis],
            config.pad[axis],
        );
        if k == 0 {
            return Err(PoolError::ZeroKernel { axis });
        }
        if s == 0 {
            return Err(PoolError::ZeroStride { axis });
        }
        if p >= k {
            // The first window would lie entirely inside the padding.
            return Err(PoolError::PadTooLarge { axis, pad: p, kernel: k });
        }
        if n == 0 || n + 2 * p < k {
            return Err(PoolError::EmptyOutput {
                axis,
                input: n,
                kernel: k,
                stride: s,
                pad: p,
            });
        }

        let span = n + 2 * p - k;
        let extent = if config.cover_all && span % s != 0 {
            span / s + 2
        } else {
            span / s + 1
        };

        // Cover-all eligibility: the last window must still reach real input.
        if (extent - 1) * s >= n + p {
            return Err(PoolError::UnreachableTrailingWindow { axis });
        }
        out.push(extent);
    }
    Ok(out)
}
