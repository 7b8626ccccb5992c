//! Numerical gradient checking harness.
//!
//! Validates analytic gradients against central finite differences. The
//! caller supplies a forward closure, the primal inputs, one upstream
//! gradient per output, one perturbation magnitude per input, and a
//! relative/absolute tolerance pair; every gradient entry is compared
//! individually and the failures are reported with both values.
//!
//! Probe points matter: for non-smooth operators (max selections) the inputs
//! must keep competing elements further apart than the perturbation, or the
//! finite difference will step across a kink.

use thiserror::Error;

use tensorkit_autodiff::{backward, reset_graph, Variable};
use tensorkit_core::Tensor;

/// One gradient entry that fell outside tolerance.
#[derive(Debug, Clone)]
pub struct GradMismatch {
    /// Which input tensor the entry belongs to.
    pub input: usize,
    /// Flat position within that input.
    pub entry: usize,
    pub numerical: f64,
    pub analytic: f64,
}

/// Failure report of [`check_backward`]: every compared entry outside
/// `atol + rtol * |numerical|`.
#[derive(Debug, Clone, Error)]
#[error("gradient check failed: {} entries outside tolerance (first: {:?})", .mismatches.len(), .mismatches.first())]
pub struct GradCheckError {
    pub mismatches: Vec<GradMismatch>,
}

/// Central-difference gradients of `f` with respect to every input entry,
/// contracted with `grad_outputs`.
///
/// For input `i`, entry `j`: perturb by `±eps[i]`, re-evaluate, and take
/// `sum_k((y⁺_k - y⁻_k) · gy_k) / (2 eps[i])`.
pub fn numerical_grad<F>(
    f: &mut F,
    inputs: &[Tensor<f64>],
    grad_outputs: &[Tensor<f64>],
    eps: &[f64],
) -> Vec<Tensor<f64>>
where
    F: FnMut(&[Tensor<f64>]) -> Vec<Tensor<f64>>,
{
    assert_eq!(eps.len(), inputs.len(), "one eps per input");

    let mut work: Vec<Tensor<f64>> = inputs.to_vec();
    let mut grads = Vec::with_capacity(inputs.len());

    for i in 0..inputs.len() {
        let mut g = Tensor::zeros(inputs[i].shape_vec());
        for j in 0..inputs[i].numel() {
            let orig = work[i].data()[j];

            work[i].data_mut()[j] = orig + eps[i];
            let y_pos = f(&work);
            work[i].data_mut()[j] = orig - eps[i];
            let y_neg = f(&work);
            work[i].data_mut()[j] = orig;

            let mut acc = 0.0;
            for (k, gy) in grad_outputs.iter().enumerate() {
                let dy = y_pos[k].sub(&y_neg[k]).expect("output shapes must agree");
                acc += dy.mul(gy).expect("grad_output shape must match output").sum_all();
            }
            g.data_mut()[j] = acc / (2.0 * eps[i]);
        }
        grads.push(g);
    }
    grads
}

/// Check the analytic gradients of a forward closure against central finite
/// differences.
///
/// The closure runs twice: once on graph-recording [`Variable`]s to obtain
/// the analytic gradients (outputs are contracted with `grad_outputs` into a
/// scalar and swept in reverse), and once per perturbed entry on plain
/// tensors for the numerical side. An entry passes when
/// `|analytic - numerical| <= atol + rtol * |numerical|`.
pub fn check_backward<F>(
    mut f: F,
    inputs: &[Tensor<f64>],
    grad_outputs: &[Tensor<f64>],
    eps: &[f64],
    rtol: f64,
    atol: f64,
) -> Result<(), GradCheckError>
where
    F: FnMut(&[Variable]) -> Vec<Variable>,
{
    // Analytic side.
    reset_graph();
    let vars: Vec<Variable> = inputs.iter().map(|t| Variable::param(t.clone())).collect();
    let ys = f(&vars);
    assert_eq!(
        ys.len(),
        grad_outputs.len(),
        "one grad_output per forward output"
    );

    let mut loss: Option<Variable> = None;
    for (y, gy) in ys.iter().zip(grad_outputs) {
        let weighted = y.mul(&Variable::input(gy.clone())).sum();
        loss = Some(match loss {
            Some(l) => l.add(&weighted),
            None => weighted,
        });
    }
    let loss = loss.expect("at least one forward output");
    let grads = backward(&loss);
    let analytic: Vec<Tensor<f64>> = vars
        .iter()
        .map(|v| {
            grads
                .get(&v.node_id)
                .cloned()
                .unwrap_or_else(|| Tensor::zeros(v.shape_vec()))
        })
        .collect();

    // Numerical side, through the same closure on plain tensors.
    let mut tensor_f = |xs: &[Tensor<f64>]| -> Vec<Tensor<f64>> {
        reset_graph();
        let vs: Vec<Variable> = xs.iter().map(|t| Variable::input(t.clone())).collect();
        f(&vs).into_iter().map(|v| v.data).collect()
    };
    let numerical = numerical_grad(&mut tensor_f, inputs, grad_outputs, eps);

    let mut mismatches = Vec::new();
    for (i, (num, ana)) in numerical.iter().zip(&analytic).enumerate() {
        for (j, (&n, &a)) in num.data().iter().zip(ana.data()).enumerate() {
            if (a - n).abs() > atol + rtol * n.abs() {
                mismatches.push(GradMismatch {
                    input: i,
                    entry: j,
                    numerical: n,
                    analytic: a,
                });
            }
        }
    }

    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(GradCheckError { mismatches })
    }
}
