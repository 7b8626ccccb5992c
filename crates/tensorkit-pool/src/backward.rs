use rayon::prelude::*;
use tensorkit_core::{Float, Tensor};

use crate::error::{PoolError, PoolResult};
use crate::forward::ArgmaxMap;

/// Max pooling backward pass: scatter the upstream gradient through the
/// argmax map recorded at forward time.
///
/// `gy` is shaped like the forward output; the result is shaped like the
/// forward input. Every output element adds its gradient into the input
/// position that won its window; overlapping windows make a single input
/// cell accumulate several contributions, by addition, never overwrite. The
/// argmax is not recomputed — a backward call is only valid with the map of
/// the forward call that produced it.
///
/// The scatter is parallel across (batch, channel) slices. Recorded offsets
/// are slice-local, so per-slice chunks never write into each other and no
/// synchronization is needed.
pub fn max_pool_nd_backward<T: Float>(gy: &Tensor<T>, map: &ArgmaxMap) -> PoolResult<Tensor<T>> {
    let expected = map.out_shape();
    if gy.shape().dims() != expected.as_slice() {
        return Err(PoolError::ShapeMismatch {
            expected,
            got: gy.shape_vec(),
        });
    }

    let in_sp = map.in_spatial_numel();
    let out_sp = map.out_spatial_numel();
    let mut gx = vec![T::ZERO; gy.numel() / out_sp * in_sp];

    gx.par_chunks_mut(in_sp)
        .zip(gy.data().par_chunks(out_sp))
        .zip(map.offsets().par_chunks(out_sp))
        .for_each(|((gx_chunk, gy_chunk), off_chunk)| {
            for (&g, &off) in gy_chunk.iter().zip(off_chunk) {
                gx_chunk[off] += g;
            }
        });

    Ok(Tensor::new(gx, map.in_shape()).expect("gradient buffer matches input shape"))
}

/// Max pooling double backward: the derivative of [`max_pool_nd_backward`]
/// with respect to its own upstream gradient.
///
/// The backward pass is linear in `gy` with fixed, data-independent scatter
/// targets once the argmax map is frozen, so differentiating it re-applies
/// the identical scatter to the second-order upstream tensor `ggy` (shaped
/// like the forward output). The path through "the argmax selection changes"
/// contributes zero: the argmax is treated as locally constant under
/// infinitesimal perturbation, the standard sub-gradient treatment of max.
/// Tests that probe this operator numerically must keep window elements away
/// from exact ties.
pub fn max_pool_nd_double_backward<T: Float>(
    ggy: &Tensor<T>,
    map: &ArgmaxMap,
) -> PoolResult<Tensor<T>> {
    max_pool_nd_backward(ggy, map)
}

impl ArgmaxMap {
    /// Gather an input-shaped tensor through the recorded winner offsets:
    /// the transpose of the backward scatter.
    ///
    /// `out[b, c, o] = v[b, c, offset(b, c, o)]`. Together with
    /// [`max_pool_nd_backward`] this forms the adjoint pair of the frozen
    /// selection: `sum(scatter(g) * v) == sum(g * gather(v))`.
    pub fn gather<T: Float>(&self, v: &Tensor<T>) -> PoolResult<Tensor<T>> {
        let expected = self.in_shape();
        if v.shape().dims() != expected.as_slice() {
            return Err(PoolError::ShapeMismatch {
                expected,
                got: v.shape_vec(),
            });
        }

        let in_sp = self.in_spatial_numel();
        let out_sp = self.out_spatial_numel();
        let out: Vec<T> = v
            .data()
            .chunks(in_sp)
            .zip(self.offsets().chunks(out_sp))
            .flat_map(|(v_chunk, off_chunk)| off_chunk.iter().map(|&off| v_chunk[off]))
            .collect();

        Ok(Tensor::new(out, self.out_shape()).expect("gathered buffer matches output shape"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::forward::max_pool_nd;

    fn config(kernel: &[usize], stride: &[usize], pad: &[usize], cover_all: bool) -> PoolConfig {
        PoolConfig::new(kernel.to_vec(), stride.to_vec(), pad.to_vec()).with_cover_all(cover_all)
    }

    #[test]
    fn test_backward_routes_to_argmax() {
        let data: Vec<f64> = (0..16).map(|i| i as f64).collect();
        let x = Tensor::new(data, vec![1, 1, 4, 4]).unwrap();
        let c = config(&[2, 2], &[2, 2], &[0, 0], false);
        let (_, map) = max_pool_nd(&x, &c).unwrap();

        let gy = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![1, 1, 2, 2]).unwrap();
        let gx = max_pool_nd_backward(&gy, &map).unwrap();
        assert_eq!(gx.shape_vec(), vec![1, 1, 4, 4]);

        let mut expected = vec![0.0; 16];
        expected[5] = 1.0;
        expected[7] = 2.0;
        expected[13] = 3.0;
        expected[15] = 4.0;
        assert_eq!(gx.data(), &expected[..]);
    }

    #[test]
    fn test_backward_accumulates_overlapping_windows() {
        // Stride 1 windows over [1, 5, 2]: both windows select offset 1.
        let x = Tensor::new(vec![1.0, 5.0, 2.0], vec![1, 1, 3]).unwrap();
        let c = config(&[2], &[1], &[0], false);
        let (_, map) = max_pool_nd(&x, &c).unwrap();
        assert_eq!(map.offsets(), &[1, 1]);

        let gy = Tensor::new(vec![0.25, 4.0], vec![1, 1, 2]).unwrap();
        let gx = max_pool_nd_backward(&gy, &map).unwrap();
        // Contributions add; the never-selected cells stay zero.
        assert_eq!(gx.data(), &[0.0, 4.25, 0.0]);
    }

    #[test]
    fn test_backward_shape_is_checked() {
        let x: Tensor<f64> = Tensor::rand(vec![1, 1, 4, 4], Some(3));
        let c = config(&[2, 2], &[2, 2], &[0, 0], false);
        let (_, map) = max_pool_nd(&x, &c).unwrap();

        let bad = Tensor::<f64>::zeros(vec![1, 1, 3, 3]);
        assert!(matches!(
            max_pool_nd_backward(&bad, &map),
            Err(PoolError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_backward_is_adjoint_of_gather() {
        let x: Tensor<f64> = Tensor::rand(vec![2, 3, 5, 4], Some(11));
        let c = config(&[3, 2], &[2, 1], &[1, 0], true);
        let (_, map) = max_pool_nd(&x, &c).unwrap();

        let gy: Tensor<f64> = Tensor::rand(map.out_shape(), Some(12));
        let v: Tensor<f64> = Tensor::rand(map.in_shape(), Some(13));

        let gx = max_pool_nd_backward(&gy, &map).unwrap();
        let gathered = map.gather(&v).unwrap();

        let lhs = gx.mul(&v).unwrap().sum_all();
        let rhs = gy.mul(&gathered).unwrap().sum_all();
        approx::assert_relative_eq!(lhs, rhs, max_relative = 1e-12);
    }

    #[test]
    fn test_gather_reproduces_forward_values() {
        let x: Tensor<f64> = Tensor::rand(vec![2, 2, 4, 4], Some(21));
        let c = config(&[2, 2], &[2, 2], &[0, 0], false);
        let (out, map) = max_pool_nd(&x, &c).unwrap();
        let gathered = map.gather(&x).unwrap();
        assert_eq!(gathered, out);
    }

    #[test]
    fn test_double_backward_is_the_same_scatter() {
        let x: Tensor<f64> = Tensor::rand(vec![1, 2, 6], Some(31));
        let c = config(&[3], &[2], &[1], true);
        let (_, map) = max_pool_nd(&x, &c).unwrap();

        let ggy: Tensor<f64> = Tensor::rand(map.out_shape(), Some(32));
        let through_backward = max_pool_nd_backward(&ggy, &map).unwrap();
        let through_double = max_pool_nd_double_backward(&ggy, &map).unwrap();
        assert_eq!(through_double, through_backward);
    }

    #[test]
    fn test_scatter_linearity() {
        // Backward is linear: B(a*g + h) == a*B(g) + B(h).
        let x: Tensor<f64> = Tensor::rand(vec![1, 1, 5, 5], Some(41));
        let c = config(&[2, 2], &[1, 1], &[0, 0], false);
        let (_, map) = max_pool_nd(&x, &c).unwrap();

        let g: Tensor<f64> = Tensor::rand(map.out_shape(), Some(42));
        let h: Tensor<f64> = Tensor::rand(map.out_shape(), Some(43));
        let combined = g.mul_scalar(2.5).add(&h).unwrap();

        let lhs = max_pool_nd_backward(&combined, &map).unwrap();
        let rhs = max_pool_nd_backward(&g, &map)
            .unwrap()
            .mul_scalar(2.5)
            .add(&max_pool_nd_backward(&h, &map).unwrap())
            .unwrap();
        for (&a, &b) in lhs.data().iter().zip(rhs.data()) {
            approx::assert_relative_eq!(a, b, max_relative = 1e-12);
        }
    }
}
