//! Density gate: keep the events in the densest region of a 2D projection.
//!
//! The gate runs four stages on two channels of the event matrix:
//! 1. Bin the channels into a 2D histogram.
//! 2. Blur the histogram with a Gaussian and normalize it into a
//!    probability mass function.
//! 3. Accept cells in descending density until their raw counts cover
//!    `ceil(gate_fraction * n_events)` events, then keep every event that
//!    re-bins into an accepted cell.
//! 4. Trace the isoline of the density at the last accepted cell's value.

use ndarray::{Array2, ArrayView2, Axis};
use tracing::debug;

use super::histogram::{histogram2d, validate_channels, BinEdges};
use super::marching_squares::{trace_isoline, Contour};
use super::ranking::{gate_mask, select_cells, target_count};
use crate::error::{GateError, Result};
use crate::filters::core::{smooth_counts, DEFAULT_TRUNCATE};

/// Parameters of the density gate.
#[derive(Debug, Clone, PartialEq)]
pub struct Density2dParams {
    /// Column indices to gate on; exactly two are required.
    pub channels: Vec<usize>,
    /// Bin edges for the first channel (and the second unless `bins_y` is set).
    pub bins: BinEdges,
    /// Separate bin edges for the second channel.
    pub bins_y: Option<BinEdges>,
    /// Gaussian standard deviation, in bins.
    pub sigma: f64,
    /// Fraction of events to keep, in (0, 1].
    pub gate_fraction: f64,
    /// Gaussian kernel half-width, in standard deviations.
    pub truncate: f64,
}

impl Default for Density2dParams {
    fn default() -> Self {
        Self {
            channels: vec![0, 1],
            bins: BinEdges::default(),
            bins_y: None,
            sigma: 10.0,
            gate_fraction: 0.65,
            truncate: DEFAULT_TRUNCATE,
        }
    }
}

impl Density2dParams {
    /// Check the scalar parameters and the channel count.
    pub fn validate(&self) -> Result<()> {
        if self.channels.len() != 2 {
            return Err(GateError::InvalidInput(format!(
                "2 channels should be specified, got {}",
                self.channels.len()
            )));
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(GateError::InvalidInput(format!(
                "sigma must be positive, got {}",
                self.sigma
            )));
        }
        if !(self.gate_fraction > 0.0 && self.gate_fraction <= 1.0) {
            return Err(GateError::InvalidInput(format!(
                "gate_fraction must be in (0, 1], got {}",
                self.gate_fraction
            )));
        }
        if !(self.truncate.is_finite() && self.truncate > 0.0) {
            return Err(GateError::InvalidInput(format!(
                "truncate must be positive, got {}",
                self.truncate
            )));
        }
        Ok(())
    }

    pub fn y_bins(&self) -> &BinEdges {
        self.bins_y.as_ref().unwrap_or(&self.bins)
    }
}

/// Result of the density gate.
#[derive(Debug, Clone)]
pub struct Density2dGate {
    /// Kept events, rows copied verbatim in their original order.
    pub gated: Array2<f64>,
    /// Isoline pieces around the kept region, in lattice coordinates.
    pub contours: Vec<Contour>,
    /// Per-event keep flag.
    pub mask: Vec<bool>,
    /// Row indices of the kept events.
    pub indices: Vec<usize>,
    /// Density level at which the contours were traced.
    pub boundary_density: f64,
    /// Number of accepted histogram cells.
    pub accepted_cells: usize,
    /// `ceil(gate_fraction * n_events)`.
    pub target_count: u64,
}

/// Lattice coordinate of histogram cell `[0, 0]` along one axis.
///
/// Cell `k` is drawn at `ceil(first_edge) + k`; for the default edges that is
/// the bin center.
pub fn lattice_origin(edges: &BinEdges) -> f64 {
    edges.first().ceil()
}

/// Gate `points` on the densest region of two channels.
///
/// # Arguments
/// * `points` - Event matrix (events, channels)
/// * `params` - Channels, bins, smoothing and retained fraction
///
/// # Returns
/// Kept events and the contour(s) of the kept region.
pub fn select_dense_region(points: ArrayView2<f64>, params: &Density2dParams) -> Result<Density2dGate> {
    params.validate()?;
    let channels = validate_channels(&points, &params.channels)?;
    let n_events = points.nrows();

    let histogram = histogram2d(points, &params.channels, &params.bins, params.y_bins())?;
    let density = smooth_counts(histogram.counts.view(), params.sigma, params.truncate)?;

    let target = target_count(params.gate_fraction, n_events);
    let selection = select_cells(density.view(), histogram.counts.view(), target)?;

    let mask = gate_mask(points, channels, &histogram, &selection.accepted);
    let indices: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter(|&(_, &keep)| keep)
        .map(|(i, _)| i)
        .collect();
    let gated = points.select(Axis(0), &indices);

    let origin = (lattice_origin(&histogram.x_edges), lattice_origin(&histogram.y_edges));
    let contours = trace_isoline(density.view(), origin, selection.boundary_density)?;

    debug!(
        n_events,
        kept = indices.len(),
        target,
        contours = contours.len(),
        "density gate applied"
    );

    Ok(Density2dGate {
        gated,
        contours,
        mask,
        indices,
        boundary_density: selection.boundary_density,
        accepted_cells: selection.accepted.len(),
        target_count: target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small_params() -> Density2dParams {
        Density2dParams {
            bins: BinEdges::unit_centered(16),
            sigma: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_params() {
        let params = Density2dParams::default();
        assert_eq!(params.channels, vec![0, 1]);
        assert_eq!(params.bins.num_bins(), 1024);
        assert_eq!(params.sigma, 10.0);
        assert_eq!(params.gate_fraction, 0.65);
        assert_eq!(params.truncate, 6.0);
        assert!(params.validate().is_ok());
        assert_eq!(lattice_origin(&params.bins), 0.0);
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        let bad = [
            Density2dParams { channels: vec![0], ..Default::default() },
            Density2dParams { channels: vec![0, 1, 2], ..Default::default() },
            Density2dParams { sigma: 0.0, ..Default::default() },
            Density2dParams { sigma: f64::NAN, ..Default::default() },
            Density2dParams { gate_fraction: 0.0, ..Default::default() },
            Density2dParams { gate_fraction: 1.5, ..Default::default() },
            Density2dParams { gate_fraction: f64::NAN, ..Default::default() },
            Density2dParams { truncate: -1.0, ..Default::default() },
        ];
        for params in bad {
            assert!(matches!(params.validate(), Err(GateError::InvalidInput(_))));
        }
    }

    #[test]
    fn test_keeps_dense_block_and_drops_scatter() {
        // 12 events stacked on (4, 4) and its neighbours, 4 loners far away
        let mut rows = Vec::new();
        for &(x, y, n) in &[(4.0, 4.0, 4), (4.0, 5.0, 3), (5.0, 4.0, 3), (5.0, 5.0, 2)] {
            for _ in 0..n {
                rows.push([x, y, 1.0]);
            }
        }
        for &(x, y) in &[(0.0, 15.0), (15.0, 0.0), (15.0, 15.0), (12.0, 1.0)] {
            rows.push([x, y, 2.0]);
        }
        let points = Array2::from_shape_fn((rows.len(), 3), |(i, c)| rows[i][c]);

        let params = Density2dParams { gate_fraction: 0.75, ..small_params() };
        let gate = select_dense_region(points.view(), &params).unwrap();

        assert_eq!(gate.target_count, 12);
        assert_eq!(gate.gated.nrows(), 12);
        assert!(gate.gated.column(2).iter().all(|&v| v == 1.0));
        assert_eq!(gate.indices, (0..12).collect::<Vec<_>>());
        assert!(!gate.contours.is_empty());
    }

    #[test]
    fn test_channel_selection_uses_requested_columns() {
        // Column 0 is constant, columns 1 and 2 hold the structure
        let points = array![
            [7.0, 2.0, 2.0],
            [7.0, 2.0, 2.0],
            [7.0, 2.0, 3.0],
            [7.0, 12.0, 12.0],
        ];
        let params = Density2dParams {
            channels: vec![1, 2],
            gate_fraction: 0.5,
            ..small_params()
        };
        let gate = select_dense_region(points.view(), &params).unwrap();
        assert_eq!(gate.indices, vec![0, 1]);
    }

    #[test]
    fn test_region_in_lattice_corner_is_outlined() {
        let mut rows = Vec::new();
        for &(x, y, n) in &[(0.0, 0.0, 40), (1.0, 0.0, 30), (0.0, 1.0, 20)] {
            for _ in 0..n {
                rows.push([x, y]);
            }
        }
        let points = Array2::from_shape_fn((rows.len(), 2), |(i, c)| rows[i][c]);

        let params = Density2dParams {
            bins: BinEdges::unit_centered(64),
            sigma: 1.0,
            gate_fraction: 0.65,
            ..Default::default()
        };
        let gate = select_dense_region(points.view(), &params).unwrap();

        assert_eq!(gate.accepted_cells, 2);
        assert_eq!(gate.indices, (0..70).collect::<Vec<_>>());

        // Only the corner node is above the level; its isoline cuts the corner
        assert_eq!(gate.contours.len(), 1);
        let cut = &gate.contours[0];
        assert!(!cut.is_closed);
        assert_eq!(cut.len(), 2);
        assert!((cut.points[0].x - 1.0).abs() < 1e-9 && cut.points[0].y.abs() < 1e-9);
        assert!(cut.points[1].x.abs() < 1e-9);
        assert!(cut.points[1].y > 0.0 && cut.points[1].y < 1.0);
    }

    #[test]
    fn test_separate_y_bins() {
        let points = array![[1.0, 100.0], [1.0, 100.0], [2.0, 250.0]];
        let params = Density2dParams {
            bins: BinEdges::unit_centered(8),
            bins_y: Some(BinEdges::new(vec![0.0, 50.0, 150.0, 300.0]).unwrap()),
            sigma: 0.5,
            gate_fraction: 0.5,
            ..Default::default()
        };
        let gate = select_dense_region(points.view(), &params).unwrap();
        assert_eq!(gate.indices, vec![0, 1]);
    }

    #[test]
    fn test_errors_propagate() {
        let points = array![[1.0, 1.0], [2.0, 2.0]];

        let params = Density2dParams { channels: vec![0, 1, 0], ..small_params() };
        assert!(matches!(
            select_dense_region(points.view(), &params),
            Err(GateError::InvalidInput(_))
        ));

        let outside = array![[100.0, 100.0], [200.0, 200.0]];
        assert_eq!(
            select_dense_region(outside.view(), &small_params()).unwrap_err(),
            GateError::EmptyDistribution
        );
    }

    #[test]
    fn test_partially_out_of_range_target_unreachable() {
        // Only 1 of 4 events is binned but 3 are requested
        let points = array![[1.0, 1.0], [99.0, 1.0], [99.0, 2.0], [99.0, 3.0]];
        assert!(matches!(
            select_dense_region(points.view(), &small_params()),
            Err(GateError::InternalInvariantViolation { reached: 1, target: 3 })
        ));
    }
}
