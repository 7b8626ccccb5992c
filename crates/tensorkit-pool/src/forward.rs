use rayon::prelude::*;
use tensorkit_core::{Float, Tensor};

use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::outsize::pooled_dims;
use crate::window::window;

/// Per-output-element record of which input element realized the maximum.
///
/// Stored as a dense parallel array indexed by output flat position; each
/// entry is the flat spatial offset of the winner within the unpadded input
/// slice of its (batch, channel). Computed once by [`max_pool_nd`], immutable
/// afterwards, and the only state the gradient routing passes share with the
/// forward pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgmaxMap {
    batch: usize,
    channels: usize,
    in_dims: Vec<usize>,
    out_dims: Vec<usize>,
    offsets: Vec<usize>,
}

impl ArgmaxMap {
    /// Full shape of the forward input, `(batch, channels, spatial...)`.
    pub fn in_shape(&self) -> Vec<usize> {
        let mut shape = vec![self.batch, self.channels];
        shape.extend_from_slice(&self.in_dims);
        shape
    }

    /// Full shape of the forward output, `(batch, channels, spatial...)`.
    pub fn out_shape(&self) -> Vec<usize> {
        let mut shape = vec![self.batch, self.channels];
        shape.extend_from_slice(&self.out_dims);
        shape
    }

    /// Spatial extents of the forward input.
    pub fn in_dims(&self) -> &[usize] {
        &self.in_dims
    }

    /// Spatial extents of the forward output.
    pub fn out_dims(&self) -> &[usize] {
        &self.out_dims
    }

    /// The recorded winner offsets, one per (batch, channel, output index).
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub(crate) fn in_spatial_numel(&self) -> usize {
        self.in_dims.iter().product()
    }

    pub(crate) fn out_spatial_numel(&self) -> usize {
        self.out_dims.iter().product()
    }
}

/// N-dimensional max pooling forward pass.
///
/// `x` has shape `(batch, channels, spatial...)`; the two leading dimensions
/// are never pooled. Every output element is the maximum of its clipped
/// window, and the offset of the element that realized it is recorded in the
/// returned [`ArgmaxMap`]. When several window elements are exactly equal the
/// lowest flat offset wins; the gradient router relies on that choice being
/// deterministic.
///
/// The reduction is independent per (batch, channel) slice and runs in
/// parallel across slices. The input is only read.
pub fn max_pool_nd<T: Float>(
    x: &Tensor<T>,
    config: &PoolConfig,
) -> PoolResult<(Tensor<T>, ArgmaxMap)> {
    let rank = config.spatial_rank();
    let dims = x.shape().dims();
    if dims.len() != rank + 2 {
        return Err(PoolError::BadInputRank {
            expected: rank + 2,
            spatial: rank,
            got: dims.len(),
        });
    }
    let (batch, channels) = (dims[0], dims[1]);
    let in_dims = dims[2..].to_vec();
    let out_dims = pooled_dims(&in_dims, config)?;

    let in_sp: usize = in_dims.iter().product();
    let out_sp: usize = out_dims.iter().product();
    let slices = batch * channels;
    let in_strides = spatial_strides(&in_dims);

    let mut out_data = vec![T::ZERO; slices * out_sp];
    let mut offsets = vec![0usize; slices * out_sp];

    out_data
        .par_chunks_mut(out_sp)
        .zip(offsets.par_chunks_mut(out_sp))
        .zip(x.data().par_chunks(in_sp))
        .try_for_each(|((out_chunk, off_chunk), x_slice)| {
            let mut out_index = vec![0usize; rank];
            for opos in 0..out_sp {
                let win = window(&out_index, &in_dims, config);
                let mut scan = win.offsets(&in_strides);
                let first = scan.next().ok_or_else(|| PoolError::EmptyWindow {
                    index: out_index.clone(),
                })?;
                let mut best_off = first;
                let mut best_val = x_slice[first];
                for off in scan {
                    if x_slice[off] > best_val {
                        best_val = x_slice[off];
                        best_off = off;
                    }
                }
                out_chunk[opos] = best_val;
                off_chunk[opos] = best_off;
                next_index(&mut out_index, &out_dims);
            }
            Ok(())
        })?;

    let mut out_shape = vec![batch, channels];
    out_shape.extend_from_slice(&out_dims);
    let out = Tensor::new(out_data, out_shape).expect("pooled buffer matches pooled shape");

    Ok((
        out,
        ArgmaxMap {
            batch,
            channels,
            in_dims,
            out_dims,
            offsets,
        },
    ))
}

/// Row-major strides over spatial extents only.
pub(crate) fn spatial_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; dims.len()];
    for i in (0..dims.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * dims[i + 1];
    }
    strides
}

/// Advance a row-major multi-index by one position.
pub(crate) fn next_index(index: &mut [usize], dims: &[usize]) {
    for d in (0..dims.len()).rev() {
        index[d] += 1;
        if index[d] < dims[d] {
            return;
        }
        index[d] = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn config(kernel: &[usize], stride: &[usize], pad: &[usize], cover_all: bool) -> PoolConfig {
        PoolConfig::new(kernel.to_vec(), stride.to_vec(), pad.to_vec()).with_cover_all(cover_all)
    }

    #[test]
    fn test_simple_2x2() {
        let data: Vec<f64> = (0..16).map(|i| i as f64).collect();
        let x = Tensor::new(data, vec![1, 1, 4, 4]).unwrap();
        let c = config(&[2, 2], &[2, 2], &[0, 0], false);
        let (out, map) = max_pool_nd(&x, &c).unwrap();
        assert_eq!(out.shape_vec(), vec![1, 1, 2, 2]);
        assert_eq!(out.data(), &[5.0, 7.0, 13.0, 15.0]);
        assert_eq!(map.offsets(), &[5, 7, 13, 15]);
    }

    #[test]
    fn test_selected_offsets_lie_inside_their_window() {
        let x: Tensor<f64> = Tensor::rand(vec![2, 3, 5, 6], Some(7));
        let c = config(&[3, 2], &[2, 2], &[1, 0], true);
        let (out, map) = max_pool_nd(&x, &c).unwrap();

        let in_dims = map.in_dims().to_vec();
        let out_dims = map.out_dims().to_vec();
        let strides = spatial_strides(&in_dims);
        let out_sp: usize = out_dims.iter().product();

        for slice in 0..6 {
            let mut out_index = vec![0usize; out_dims.len()];
            for opos in 0..out_sp {
                let win = window(&out_index, &in_dims, &c);
                let selected = map.offsets()[slice * out_sp + opos];
                assert!(win.offsets(&strides).any(|off| off == selected));

                // And the output value really is the window max.
                let x_slice = &x.data()[slice * in_dims.iter().product::<usize>()..];
                let max = win
                    .offsets(&strides)
                    .map(|off| x_slice[off])
                    .fold(f64::NEG_INFINITY, f64::max);
                assert_eq!(out.data()[slice * out_sp + opos], max);
                next_index(&mut out_index, &out_dims);
            }
        }
    }

    #[test]
    fn test_tie_break_lowest_offset() {
        // All four window elements equal: offset 0 must win.
        let x = Tensor::new(vec![2.0, 2.0, 2.0, 2.0], vec![1, 1, 2, 2]).unwrap();
        let c = config(&[2, 2], &[2, 2], &[0, 0], false);
        let (out, map) = max_pool_nd(&x, &c).unwrap();
        assert_eq!(out.data(), &[2.0]);
        assert_eq!(map.offsets(), &[0]);

        // A tie between two positions in overlapping windows: each window
        // keeps its own earliest maximum.
        let x = Tensor::new(vec![1.0, 5.0, 5.0, 0.0], vec![1, 1, 1, 4]).unwrap();
        let c = config(&[2], &[1], &[0], false);
        let (_, map) = max_pool_nd(&x, &c).unwrap();
        assert_eq!(map.offsets(), &[1, 1, 2]);
    }

    #[test]
    fn test_cover_all_trailing_window() {
        // Input extent 4, kernel 3, stride 2: cover_all adds a second step
        // whose window is clipped to the final element.
        let x = Tensor::new(vec![0.0, 1.0, 2.0, 9.0], vec![1, 1, 4]).unwrap();
        let c = config(&[3], &[2], &[0], true);
        let (out, map) = max_pool_nd(&x, &c).unwrap();
        assert_eq!(out.shape_vec(), vec![1, 1, 2]);
        assert_eq!(out.data(), &[2.0, 9.0]);
        assert_eq!(map.offsets(), &[2, 3]);
    }

    #[test]
    fn test_batch_channel_slices_independent() {
        let mut data = vec![0.0f64; 2 * 2 * 4];
        for (i, v) in data.iter_mut().enumerate() {
            *v = i as f64;
        }
        let x = Tensor::new(data, vec![2, 2, 4]).unwrap();
        let c = config(&[2], &[2], &[0], false);
        let (out, map) = max_pool_nd(&x, &c).unwrap();
        assert_eq!(out.shape_vec(), vec![2, 2, 2]);
        assert_eq!(out.data(), &[1.0, 3.0, 5.0, 7.0, 9.0, 11.0, 13.0, 15.0]);
        // Offsets are slice-local.
        assert_eq!(map.offsets(), &[1, 3, 1, 3, 1, 3, 1, 3]);
    }

    #[test]
    fn test_input_rank_must_match_config() {
        let x: Tensor<f64> = Tensor::zeros(vec![1, 1, 4, 4]);
        let c = config(&[2], &[2], &[0], false);
        assert!(matches!(
            max_pool_nd(&x, &c),
            Err(PoolError::BadInputRank { .. })
        ));
    }

    #[test]
    fn test_reference_2d_cover_all() {
        let x = Tensor::new(fixtures::INPUT_2D_COVER_ALL.to_vec(), vec![3, 4, 4, 4]).unwrap();
        let c = config(&[3, 2], &[2, 1], &[1, 0], true);
        let (out, _) = max_pool_nd(&x, &c).unwrap();
        assert_eq!(out.shape_vec(), vec![3, 4, 3, 3]);
        assert_eq!(out.data(), &fixtures::EXPECTED_2D_COVER_ALL[..]);
    }

    #[test]
    fn test_reference_2d_no_cover_all() {
        let x = Tensor::new(fixtures::INPUT_2D_NO_COVER_ALL.to_vec(), vec![3, 4, 4, 4]).unwrap();
        let c = config(&[3, 2], &[2, 1], &[1, 0], false);
        let (out, _) = max_pool_nd(&x, &c).unwrap();
        assert_eq!(out.shape_vec(), vec![3, 4, 2, 3]);
        assert_eq!(out.data(), &fixtures::EXPECTED_2D_NO_COVER_ALL[..]);
    }

    #[test]
    fn test_reference_3d_no_cover_all() {
        let x = Tensor::new(fixtures::INPUT_3D.to_vec(), vec![3, 4, 3, 4, 2]).unwrap();
        let c = config(&[2, 3, 2], &[2, 1, 1], &[1, 0, 0], false);
        let (out, _) = max_pool_nd(&x, &c).unwrap();
        assert_eq!(out.shape_vec(), vec![3, 4, 2, 2, 1]);
        assert_eq!(out.data(), &fixtures::EXPECTED_3D[..]);
    }
}
