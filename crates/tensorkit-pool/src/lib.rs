//! N-dimensional max pooling with gradient routing.
//!
//! The operator is split into four pieces, leaves first:
//!
//! - [`outsize::pooled_dims`] — pooled output extents under kernel, stride,
//!   padding, and the cover-all policy, with full parameter validation;
//! - [`window::window`] — the boundary-clamped input window one output
//!   element reduces over, as a pure value;
//! - [`forward::max_pool_nd`] — the windowed max reduction, recording the
//!   winning input offset per output element in an [`ArgmaxMap`];
//! - [`backward`] — the gradient router: first-order scatter and the
//!   double-backward re-application of the same linear map.
//!
//! The argmax map is the only state flowing from forward to backward.

pub mod backward;
pub mod config;
pub mod error;
pub mod forward;
pub mod outsize;
pub mod window;

#[cfg(test)]
mod fixtures;

pub use backward::{max_pool_nd_backward, max_pool_nd_double_backward};
pub use config::PoolConfig;
pub use error::{PoolError, PoolResult};
pub use forward::{max_pool_nd, ArgmaxMap};
pub use outsize::pooled_dims;
pub use window::{window, Window};
