//! Density-based event selection.
//!
//! This module provides the 2D density gate and its stages:
//! - **Histogram**: binning two event channels into a count grid
//! - **Ranking**: density-ordered cell acceptance and per-event masking
//! - **Marching squares**: isoline extraction around the kept region
//!
//! The smoothing stage lives in [`crate::filters::core`].

pub mod density2d;
pub mod histogram;
pub mod marching_squares;
pub mod ranking;

pub use density2d::{select_dense_region, Density2dGate, Density2dParams};
pub use histogram::{histogram2d, BinEdges, Histogram2d};
pub use marching_squares::{contours_to_flat, trace_isoline, Contour, Point};
pub use ranking::{gate_mask, rank_cells, select_cells, AcceptedCells, CellSelection};
