use std::collections::HashMap;

use tensorkit_core::{Float, Tensor};
use tensorkit_pool::max_pool_nd_backward;

use crate::graph::{with_graph, NodeId, Op};
use crate::variable::Variable;

/// Compute gradients via reverse-mode automatic differentiation.
///
/// Returns a map from NodeId to gradient Tensor for all nodes reached by the
/// sweep.
pub fn backward(loss: &Variable) -> HashMap<NodeId, Tensor<f64>> {
    with_graph(|graph| {
        let n = graph.len();
        let mut grads: HashMap<NodeId, Tensor<f64>> = HashMap::new();

        // Seed: gradient of loss w.r.t. itself is 1
        let loss_shape = graph.get(loss.node_id).shape.clone();
        let seed = if loss_shape.is_empty() || (loss_shape.len() == 1 && loss_shape[0] == 1) {
            Tensor::scalar(1.0)
        } else {
            Tensor::ones(loss_shape)
        };
        grads.insert(loss.node_id, seed);

        // Reverse topological order (nodes are added in forward order)
        for idx in (0..n).rev() {
            let node_id = NodeId(idx);
            let grad = match grads.get(&node_id) {
                Some(g) => g.clone(),
                None => continue,
            };

            let op = graph.get(node_id).op.clone();

            match op {
                Op::Leaf => {
                    // Leaf nodes accumulate gradients — already stored
                }
                Op::Add(a, b) => {
                    accumulate_grad(&mut grads, a, &grad);
                    accumulate_grad(&mut grads, b, &grad);
                }
                Op::Sub(a, b) => {
                    accumulate_grad(&mut grads, a, &grad);
                    let neg_grad = grad.mul_scalar(-1.0);
                    accumulate_grad(&mut grads, b, &neg_grad);
                }
                Op::Mul(a, b) => {
                    // d/da (a*b) = b * grad
                    let ga = grad.mul(&graph.get(b).value).expect("mul grad");
                    accumulate_grad(&mut grads, a, &ga);
                    // d/db (a*b) = a * grad
                    let gb = grad.mul(&graph.get(a).value).expect("mul grad");
                    accumulate_grad(&mut grads, b, &gb);
                }
                Op::Neg(a) => {
                    let ga = grad.mul_scalar(-1.0);
                    accumulate_grad(&mut grads, a, &ga);
                }
                Op::Pow(a, n) => {
                    // d/da a^n = n * a^(n-1) * grad
                    let am1 = graph.get(a).value.powf(Float::from_f64(n - 1.0));
                    let ga = am1.mul_scalar(n).mul(&grad).expect("pow grad");
                    accumulate_grad(&mut grads, a, &ga);
                }
                Op::MulScalar(a, s) => {
                    let ga = grad.mul_scalar(s);
                    accumulate_grad(&mut grads, a, &ga);
                }
                Op::AddScalar(a, _s) => {
                    accumulate_grad(&mut grads, a, &grad);
                }
                Op::SumAll(a) => {
                    // Gradient of sum: ones with the shape of a
                    let ga = Tensor::ones(graph.get(a).shape.clone());
                    let ga = ga.mul_scalar(grad.item().unwrap_or(1.0));
                    accumulate_grad(&mut grads, a, &ga);
                }
                Op::MeanAll(a) => {
                    let numel = graph.get(a).value.numel();
                    let scale = 1.0 / numel as f64;
                    let ga = Tensor::full(graph.get(a).shape.clone(), scale);
                    let ga = ga.mul_scalar(grad.item().unwrap_or(1.0));
                    accumulate_grad(&mut grads, a, &ga);
                }
                Op::MaxPool(a, ref map) => {
                    // Scatter the upstream gradient through the selection
                    // frozen at forward time.
                    let ga = max_pool_nd_backward(&grad, map).expect("max_pool grad");
                    accumulate_grad(&mut grads, a, &ga);
                }
            }
        }

        grads
    })
}

/// Accumulate gradient into the map, adding to any existing contribution.
fn accumulate_grad(
    grads: &mut HashMap<NodeId, Tensor<f64>>,
    node_id: NodeId,
    incoming_grad: &Tensor<f64>,
) {
    grads
        .entry(node_id)
        .and_modify(|existing| {
            *existing = existing.add(incoming_grad).expect("grad accumulation");
        })
        .or_insert_with(|| incoming_grad.clone());
}
