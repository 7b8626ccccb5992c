use tensorkit_core::{Float, Tensor};
use tensorkit_pool::{max_pool_nd, PoolConfig, PoolError};

use crate::graph::{with_graph, NodeId, Op};

/// A variable in the computation graph — wraps a tensor with grad tracking.
#[derive(Debug, Clone)]
pub struct Variable {
    pub node_id: NodeId,
    pub data: Tensor<f64>,
}

impl Variable {
    /// Create a new leaf variable.
    pub fn new(data: Tensor<f64>, requires_grad: bool) -> Self {
        let node_id = with_graph(|g| g.add_node(Op::Leaf, data.clone(), requires_grad));
        Variable { node_id, data }
    }

    /// Create a parameter (requires grad by default).
    pub fn param(data: Tensor<f64>) -> Self {
        Self::new(data, true)
    }

    /// Create an input (no grad by default).
    pub fn input(data: Tensor<f64>) -> Self {
        Self::new(data, false)
    }

    pub fn shape_vec(&self) -> Vec<usize> {
        self.data.shape_vec()
    }

    pub fn numel(&self) -> usize {
        self.data.numel()
    }

    /// Element-wise addition.
    pub fn add(&self, other: &Variable) -> Variable {
        let result = self.data.add(&other.data).expect("add: shape mismatch");
        let node_id = with_graph(|g| {
            g.add_node(Op::Add(self.node_id, other.node_id), result.clone(), true)
        });
        Variable {
            node_id,
            data: result,
        }
    }

    /// Element-wise subtraction.
    pub fn sub(&self, other: &Variable) -> Variable {
        let result = self.data.sub(&other.data).expect("sub: shape mismatch");
        let node_id = with_graph(|g| {
            g.add_node(Op::Sub(self.node_id, other.node_id), result.clone(), true)
        });
        Variable {
            node_id,
            data: result,
        }
    }

    /// Element-wise multiplication.
    pub fn mul(&self, other: &Variable) -> Variable {
        let result = self.data.mul(&other.data).expect("mul: shape mismatch");
        let node_id = with_graph(|g| {
            g.add_node(Op::Mul(self.node_id, other.node_id), result.clone(), true)
        });
        Variable {
            node_id,
            data: result,
        }
    }

    /// Negation.
    pub fn neg(&self) -> Variable {
        let result = self.data.mul_scalar(Float::NEG_ONE);
        let node_id = with_graph(|g| g.add_node(Op::Neg(self.node_id), result.clone(), true));
        Variable {
            node_id,
            data: result,
        }
    }

    /// Power (element-wise, scalar exponent).
    pub fn pow(&self, n: f64) -> Variable {
        let result = self.data.powf(n);
        let node_id =
            with_graph(|g| g.add_node(Op::Pow(self.node_id, n), result.clone(), true));
        Variable {
            node_id,
            data: result,
        }
    }

    /// Multiply by scalar.
    pub fn mul_scalar(&self, s: f64) -> Variable {
        let result = self.data.mul_scalar(s);
        let node_id = with_graph(|g| {
            g.add_node(Op::MulScalar(self.node_id, s), result.clone(), true)
        });
        Variable {
            node_id,
            data: result,
        }
    }

    /// Add scalar.
    pub fn add_scalar(&self, s: f64) -> Variable {
        let result = self.data.add_scalar(s);
        let node_id = with_graph(|g| {
            g.add_node(Op::AddScalar(self.node_id, s), result.clone(), true)
        });
        Variable {
            node_id,
            data: result,
        }
    }

    /// Sum all elements to a scalar.
    pub fn sum(&self) -> Variable {
        let s = self.data.sum_all();
        let result = Tensor::scalar(s);
        let node_id =
            with_graph(|g| g.add_node(Op::SumAll(self.node_id), result.clone(), true));
        Variable {
            node_id,
            data: result,
        }
    }

    /// Mean of all elements.
    pub fn mean(&self) -> Variable {
        let m = self.data.mean_all();
        let result = Tensor::scalar(m);
        let node_id =
            with_graph(|g| g.add_node(Op::MeanAll(self.node_id), result.clone(), true));
        Variable {
            node_id,
            data: result,
        }
    }

    /// N-dimensional max pooling.
    ///
    /// Configuration errors surface here, at shape-calculation time; a
    /// successful call records a `MaxPool` node that retains the argmax map
    /// for the reverse sweep.
    pub fn max_pool(&self, config: &PoolConfig) -> Result<Variable, PoolError> {
        let (result, map) = max_pool_nd(&self.data, config)?;
        let node_id = with_graph(|g| {
            g.add_node(Op::MaxPool(self.node_id, map), result.clone(), true)
        });
        Ok(Variable {
            node_id,
            data: result,
        })
    }
}
