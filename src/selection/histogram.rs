//! 2D histogram of two event channels.
//!
//! Binning follows the usual histogram convention: every bin is the
//! half-open interval `[e_k, e_{k+1})` except the last one, which also
//! includes its right edge. Values outside the edge range are dropped.

use ndarray::{Array2, ArrayView2};
use tracing::{debug, warn};

use crate::error::{GateError, Result};

/// Strictly increasing bin boundaries along one axis.
#[derive(Clone, Debug, PartialEq)]
pub struct BinEdges {
    edges: Vec<f64>,
}

impl BinEdges {
    /// Validate and wrap a sequence of bin edges.
    ///
    /// Requires at least two finite, strictly increasing values.
    pub fn new(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(GateError::InvalidInput(format!(
                "bin edges need at least 2 values, got {}",
                edges.len()
            )));
        }
        if let Some(bad) = edges.iter().position(|e| !e.is_finite()) {
            return Err(GateError::InvalidInput(format!(
                "bin edge {} is not finite",
                bad
            )));
        }
        if let Some(k) = edges.windows(2).position(|w| w[1] <= w[0]) {
            return Err(GateError::InvalidInput(format!(
                "bin edges must be strictly increasing (edge {} = {} >= edge {} = {})",
                k,
                edges[k],
                k + 1,
                edges[k + 1]
            )));
        }
        Ok(Self { edges })
    }

    /// Unit-width bins centered on the integers `0..count`.
    ///
    /// `unit_centered(1024)` yields the edges `-0.5, 0.5, ..., 1023.5`.
    pub fn unit_centered(count: usize) -> Self {
        let edges = (0..=count.max(1)).map(|i| i as f64 - 0.5).collect();
        Self { edges }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.edges
    }

    pub fn num_bins(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn first(&self) -> f64 {
        self.edges[0]
    }

    pub fn last(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Bin index for `value`, or `None` when it lies outside the edges.
    ///
    /// Both binning passes of the gate go through this function so that a
    /// value sitting exactly on an edge always lands in the same bin.
    #[inline]
    pub fn locate(&self, value: f64) -> Option<usize> {
        // NaN fails both comparisons.
        if !(value >= self.first() && value <= self.last()) {
            return None;
        }
        if value == self.last() {
            return Some(self.num_bins() - 1);
        }
        Some(self.edges.partition_point(|&e| e <= value) - 1)
    }
}

impl Default for BinEdges {
    fn default() -> Self {
        Self::unit_centered(1024)
    }
}

/// Event counts over a grid of (x-bin, y-bin) cells.
#[derive(Clone, Debug)]
pub struct Histogram2d {
    /// Counts indexed as `[x_bin, y_bin]`.
    pub counts: Array2<u64>,
    pub x_edges: BinEdges,
    pub y_edges: BinEdges,
    /// Number of events that landed inside the grid.
    pub total: u64,
}

impl Histogram2d {
    pub fn shape(&self) -> (usize, usize) {
        self.counts.dim()
    }

    /// Cell containing the event `(x, y)`, if any.
    #[inline]
    pub fn cell_of(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        Some((self.x_edges.locate(x)?, self.y_edges.locate(y)?))
    }
}

/// Check that the channel selection names exactly two columns of `points`.
pub fn validate_channels(points: &ArrayView2<f64>, channels: &[usize]) -> Result<[usize; 2]> {
    if channels.len() != 2 {
        return Err(GateError::InvalidInput(format!(
            "2 channels should be specified, got {}",
            channels.len()
        )));
    }
    let dims = points.ncols();
    if let Some(&ch) = channels.iter().find(|&&ch| ch >= dims) {
        return Err(GateError::InvalidInput(format!(
            "channel {} out of range for data with {} channels",
            ch, dims
        )));
    }
    Ok([channels[0], channels[1]])
}

/// Build the 2D histogram of two channels of `points`.
///
/// # Arguments
/// * `points` - Event matrix (events, channels)
/// * `channels` - Exactly two column indices: x first, then y
/// * `x_edges` - Bin edges for the x channel
/// * `y_edges` - Bin edges for the y channel
///
/// # Returns
/// Histogram whose cell `[i, j]` counts events in x-bin `i` and y-bin `j`.
pub fn histogram2d(
    points: ArrayView2<f64>,
    channels: &[usize],
    x_edges: &BinEdges,
    y_edges: &BinEdges,
) -> Result<Histogram2d> {
    let [cx, cy] = validate_channels(&points, channels)?;
    let n_events = points.nrows();
    if n_events < 2 {
        return Err(GateError::InvalidInput(format!(
            "data must have more than 1 event, got {}",
            n_events
        )));
    }

    let mut counts = Array2::<u64>::zeros((x_edges.num_bins(), y_edges.num_bins()));
    let mut total = 0u64;

    for row in points.rows() {
        if let (Some(i), Some(j)) = (x_edges.locate(row[cx]), y_edges.locate(row[cy])) {
            counts[[i, j]] += 1;
            total += 1;
        }
    }

    let dropped = n_events as u64 - total;
    if dropped > 0 {
        warn!(dropped, n_events, "events outside the bin range were not counted");
    }
    debug!(
        x_bins = x_edges.num_bins(),
        y_bins = y_edges.num_bins(),
        total,
        "built 2d histogram"
    );

    Ok(Histogram2d {
        counts,
        x_edges: x_edges.clone(),
        y_edges: y_edges.clone(),
        total,
    })
}
