//! Density ranking and cell acceptance.
//!
//! Cells are visited in descending smoothed density; their raw counts are
//! accumulated until the requested number of events is covered. The cells
//! visited so far form the accepted region, and the density of the last one
//! is the level at which the region boundary is traced.

use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use tracing::debug;

use super::histogram::Histogram2d;
use crate::error::{GateError, Result};

/// Set of accepted histogram cells.
///
/// Stored as a dense membership grid with the histogram's shape.
#[derive(Clone, Debug, PartialEq)]
pub struct AcceptedCells {
    members: Array2<bool>,
    len: usize,
}

impl AcceptedCells {
    /// Build the set from row-major linear cell indices.
    pub fn from_linear(shape: (usize, usize), indices: &[usize]) -> Self {
        let mut members = Array2::<bool>::from_elem(shape, false);
        let cols = shape.1;
        for &idx in indices {
            members[[idx / cols, idx % cols]] = true;
        }
        let len = members.iter().filter(|&&m| m).count();
        Self { members, len }
    }

    #[inline]
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.members.get((row, col)).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Accepted cells as (row, col) pairs in row-major order.
    pub fn cells(&self) -> Vec<(usize, usize)> {
        self.members
            .indexed_iter()
            .filter(|&(_, &m)| m)
            .map(|(ij, _)| ij)
            .collect()
    }
}

/// Outcome of the density-ranked cell selection.
#[derive(Clone, Debug)]
pub struct CellSelection {
    pub accepted: AcceptedCells,
    /// Smoothed density of the last accepted cell.
    pub boundary_density: f64,
    /// Number of events the selection had to cover.
    pub target: u64,
    /// Events contained in the accepted cells.
    pub covered: u64,
}

/// Number of events to keep: `ceil(fraction * n_events)`.
pub fn target_count(fraction: f64, n_events: usize) -> u64 {
    (fraction * n_events as f64).ceil() as u64
}

/// Order linear cell indices by descending density.
///
/// The sort is stable: cells with equal density keep their row-major order.
pub fn rank_cells(density: ArrayView2<f64>) -> Vec<usize> {
    let flat: Vec<f64> = density.iter().copied().collect();
    let mut ranking: Vec<usize> = (0..flat.len()).collect();
    ranking.par_sort_by(|&a, &b| flat[b].total_cmp(&flat[a]));
    ranking
}

/// Select the smallest density-ranked prefix of cells covering `target`
/// events.
///
/// # Arguments
/// * `density` - Smoothed, normalized density field
/// * `counts` - Raw histogram counts with the same shape
/// * `target` - Number of events the accepted cells must contain
pub fn select_cells(
    density: ArrayView2<f64>,
    counts: ArrayView2<u64>,
    target: u64,
) -> Result<CellSelection> {
    if density.dim() != counts.dim() {
        return Err(GateError::InvalidInput(format!(
            "density shape {:?} does not match histogram shape {:?}",
            density.dim(),
            counts.dim()
        )));
    }

    let ranking = rank_cells(density);
    let raw: Vec<u64> = counts.iter().copied().collect();

    let mut cumulative = 0u64;
    let mut boundary = None;
    for (k, &idx) in ranking.iter().enumerate() {
        cumulative += raw[idx];
        if cumulative >= target {
            boundary = Some(k);
            break;
        }
    }

    let Some(k) = boundary else {
        return Err(GateError::InternalInvariantViolation {
            reached: cumulative,
            target,
        });
    };

    let boundary_idx = ranking[k];
    let cols = density.len_of(Axis(1));
    let boundary_density = density[[boundary_idx / cols, boundary_idx % cols]];
    let accepted = AcceptedCells::from_linear(density.dim(), &ranking[..=k]);

    debug!(
        accepted = accepted.len(),
        target,
        covered = cumulative,
        boundary_density,
        "selected densest cells"
    );

    Ok(CellSelection {
        accepted,
        boundary_density,
        target,
        covered: cumulative,
    })
}

/// Re-bin every event and mark those whose cell was accepted.
///
/// Uses the histogram's own edges, so an event is kept exactly when the
/// histogram counted it in an accepted cell.
pub fn gate_mask(
    points: ArrayView2<f64>,
    channels: [usize; 2],
    histogram: &Histogram2d,
    accepted: &AcceptedCells,
) -> Vec<bool> {
    let [cx, cy] = channels;
    (0..points.nrows())
        .into_par_iter()
        .map(|i| {
            histogram
                .cell_of(points[[i, cx]], points[[i, cy]])
                .is_some_and(|(r, c)| accepted.contains(r, c))
        })
        .collect()
}
