//! Flowgate Rust Extensions
//!
//! Density-based gating of flow-cytometry events, implemented in Rust
//! with Python bindings via PyO3 and WASM bindings for JavaScript.
//!
//! ## Data Format
//! Events are a 2D array of shape (events, channels) with `f64` readings.
//! Gates read two channels by column index and never modify the input;
//! gated output is a copy of the kept rows in their original order.
//!
//! ## Density Gate
//! [`select_dense_region`] keeps the events in the densest region of two
//! channels:
//! - **Histogram**: the channels are binned into a 2D count grid
//! - **Smoothing**: the grid is blurred with a Gaussian and normalized
//! - **Selection**: cells are accepted in descending density until
//!   `ceil(gate_fraction * n_events)` events are covered
//! - **Contour**: the isoline at the last accepted density outlines the gate
//!
//! Every call is self-contained and deterministic.

pub mod error;
pub mod filters;
pub mod selection;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::{GateError, Result};
pub use selection::{
    select_dense_region, BinEdges, Contour, Density2dGate, Density2dParams, Point,
};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
mod python {
    use ndarray::Array2;
    use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
    use pyo3::prelude::*;

    use crate::selection::{select_dense_region, BinEdges, Contour, Density2dParams};

    /// Convert a contour to an (M, 2) array of x-y vertices.
    ///
    /// Closed contours repeat their first vertex so they plot as loops.
    fn contour_to_array(contour: &Contour) -> Array2<f64> {
        let vertices = contour.closed_vertices();
        Array2::from_shape_fn((vertices.len(), 2), |(i, c)| {
            if c == 0 {
                vertices[i].x
            } else {
                vertices[i].y
            }
        })
    }

    // ========================================================================
    // Density Gate
    // ========================================================================

    /// Gate that preserves the events in the region with highest density.
    ///
    /// Bins two channels into a 2D histogram, blurs it with a Gaussian,
    /// normalizes it into a probability mass function and keeps the events
    /// in the densest cells until `gate_fraction` of them are covered.
    ///
    /// # Arguments
    /// * `data` - Event array (events, channels)
    /// * `channels` - Two channel indices to gate on
    /// * `bins` - Bin edges for both channels (default: -0.5, 0.5, ..., 1023.5)
    /// * `sigma` - Gaussian standard deviation, in bins
    /// * `gate_fraction` - Fraction of events to keep, in (0, 1]
    ///
    /// # Returns
    /// Tuple of (gated events, list of (M, 2) contour vertex arrays)
    #[pyfunction]
    #[pyo3(signature = (data, channels=vec![0, 1], bins=None, sigma=10.0, gate_fraction=0.65))]
    pub fn density2d<'py>(
        py: Python<'py>,
        data: PyReadonlyArray2<'py, f64>,
        channels: Vec<usize>,
        bins: Option<Vec<f64>>,
        sigma: f64,
        gate_fraction: f64,
    ) -> PyResult<(Bound<'py, PyArray2<f64>>, Vec<Bound<'py, PyArray2<f64>>>)> {
        let bins = match bins {
            Some(edges) => BinEdges::new(edges)?,
            None => BinEdges::default(),
        };
        let params = Density2dParams {
            channels,
            bins,
            sigma,
            gate_fraction,
            ..Default::default()
        };

        let input = data.as_array();
        let gate = select_dense_region(input, &params)?;

        let contours = gate
            .contours
            .iter()
            .map(|c| contour_to_array(c).into_pyarray(py))
            .collect();
        Ok((gate.gated.into_pyarray(py), contours))
    }

    /// Flowgate Rust extension module
    #[pymodule]
    pub fn flowgate(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(density2d, m)?)?;
        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python::flowgate;
