/// Pooling parameters, one entry per spatial dimension.
///
/// `cover_all` defaults to true: the output grows by one trailing step per
/// dimension where needed so that every input element participates in at
/// least one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub kernel: Vec<usize>,
    pub stride: Vec<usize>,
    pub pad: Vec<usize>,
    pub cover_all: bool,
}

impl PoolConfig {
    pub fn new(kernel: Vec<usize>, stride: Vec<usize>, pad: Vec<usize>) -> Self {
        PoolConfig {
            kernel,
            stride,
            pad,
            cover_all: true,
        }
    }

    pub fn with_cover_all(mut self, cover_all: bool) -> Self {
        self.cover_all = cover_all;
        self
    }

    /// Number of pooled (spatial) dimensions.
    pub fn spatial_rank(&self) -> usize {
        self.kernel.len()
    }
}
