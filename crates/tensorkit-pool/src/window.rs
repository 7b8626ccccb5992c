use std::ops::Range;

use crate::config::PoolConfig;

/// The clipped input region one output element reduces over: a half-open
/// range of spatial coordinates per dimension.
///
/// Positions outside `[0, in)` are clipped away before the reduction ever
/// sees them, so padding and cover-all overhang are never selectable as an
/// argmax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    ranges: Vec<Range<usize>>,
}

/// Resolve the window for the output multi-index `out_index`.
///
/// Unclipped, dimension `d` spans `[o*s - p, o*s - p + k)`; the returned
/// window is the intersection with the valid input extent.
pub fn window(out_index: &[usize], in_dims: &[usize], config: &PoolConfig) -> Window {
    let ranges = out_index
        .iter()
        .zip(in_dims)
        .enumerate()
        .map(|(d, (&o, &n))| {
            let start = (o * config.stride[d]) as isize - config.pad[d] as isize;
            let end = start + config.kernel[d] as isize;
            let lo = start.max(0) as usize;
            let hi = end.clamp(0, n as isize) as usize;
            lo..hi.max(lo)
        })
        .collect();
    Window { ranges }
}

impl Window {
    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    /// True when the clipped window contains no input position in some
    /// dimension.
    pub fn is_empty(&self) -> bool {
        self.ranges.iter().any(|r| r.is_empty())
    }

    /// Number of input positions in the clipped window.
    pub fn numel(&self) -> usize {
        self.ranges.iter().map(|r| r.len()).product()
    }

    /// Iterate the flat spatial offsets of the window in ascending row-major
    /// order, given the row-major strides of the input's spatial dims.
    pub fn offsets<'a>(&'a self, strides: &'a [usize]) -> WindowOffsets<'a> {
        WindowOffsets {
            ranges: &self.ranges,
            strides,
            cursor: self.ranges.iter().map(|r| r.start).collect(),
            exhausted: self.is_empty(),
        }
    }
}

/// Odometer over a window's positions, yielding flat spatial offsets.
pub struct WindowOffsets<'a> {
    ranges: &'a [Range<usize>],
    strides: &'a [usize],
    cursor: Vec<usize>,
    exhausted: bool,
}

impl Iterator for WindowOffsets<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.exhausted {
            return None;
        }
        let offset = self
            .cursor
            .iter()
            .zip(self.strides)
            .map(|(&i, &s)| i * s)
            .sum();

        // Advance the innermost dimension first, carrying outward.
        self.exhausted = true;
        for d in (0..self.cursor.len()).rev() {
            self.cursor[d] += 1;
            if self.cursor[d] < self.ranges[d].end {
                self.exhausted = false;
                break;
            }
            self.cursor[d] = self.ranges[d].start;
        }
        Some(offset)
    }
}
