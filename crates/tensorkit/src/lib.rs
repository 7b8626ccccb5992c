//! # tensorkit
//!
//! A small array workspace built around one operator: N-dimensional max
//! pooling with first- and second-order gradients.
//!
//! ## Modules
//!
//! - **core** — Tensor engine: dense row-major N-dimensional arrays
//! - **pool** — Max pooling: shape calculation, window enumeration, forward
//!   reduction with argmax tracking, gradient scatter and double backward
//! - **autodiff** — Automatic differentiation: computation graph with
//!   reverse-mode AD, hosting the pooling operator as a graph node
//! - **gradcheck** — Numerical gradient checking against finite differences

/// Core tensor engine.
pub use tensorkit_core as core;

/// Max pooling operator.
pub use tensorkit_pool as pool;

/// Automatic differentiation.
pub use tensorkit_autodiff as autodiff;

/// Gradient checking harness.
pub use tensorkit_gradcheck as gradcheck;
