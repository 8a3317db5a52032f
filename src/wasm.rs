//! WebAssembly exports for the density gate.
//!
//! These functions are exposed to JavaScript via wasm-bindgen.
//!
//! Events are passed as a flat row-major `Float64Array` of length
//! `n_events * n_channels`. Rayon falls back to a single thread when no
//! thread pool is available, so the same Rust implementation runs here.

use ndarray::ArrayView2;
use wasm_bindgen::prelude::*;

use crate::selection::{contours_to_flat, select_dense_region, BinEdges, Density2dGate, Density2dParams};

fn run_gate(
    data: &[f64],
    n_channels: usize,
    channel_x: usize,
    channel_y: usize,
    sigma: f64,
    gate_fraction: f64,
) -> Result<Density2dGate, JsValue> {
    if n_channels == 0 || data.len() % n_channels != 0 {
        return Err(JsValue::from_str(&format!(
            "data length {} is not a multiple of {} channels",
            data.len(),
            n_channels
        )));
    }
    let points = ArrayView2::from_shape((data.len() / n_channels, n_channels), data)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    let params = Density2dParams {
        channels: vec![channel_x, channel_y],
        bins: BinEdges::default(),
        sigma,
        gate_fraction,
        ..Default::default()
    };
    select_dense_region(points, &params).map_err(|e| JsValue::from_str(&e.to_string()))
}

// ============================================================================
// Density Gate
// ============================================================================

/// Keep-mask of the density gate.
///
/// # Arguments
/// * `data` - Flat row-major event array (length = n_events * n_channels)
/// * `n_channels` - Channels per event
/// * `channel_x` - First gating channel
/// * `channel_y` - Second gating channel
/// * `sigma` - Gaussian standard deviation, in bins
/// * `gate_fraction` - Fraction of events to keep, in (0, 1]
///
/// # Returns
/// One byte per event: 1 = kept, 0 = gated out
#[wasm_bindgen]
pub fn density2d_mask_wasm(
    data: &[f64],
    n_channels: usize,
    channel_x: usize,
    channel_y: usize,
    sigma: f64,
    gate_fraction: f64,
) -> Result<Vec<u8>, JsValue> {
    let gate = run_gate(data, n_channels, channel_x, channel_y, sigma, gate_fraction)?;
    Ok(gate.mask.iter().map(|&keep| keep as u8).collect())
}

/// Contours of the density gate.
///
/// # Returns
/// Flat array: [num_contours, is_closed_1, num_points_1, x1, y1, ..., is_closed_2, ...]
#[wasm_bindgen]
pub fn density2d_contours_wasm(
    data: &[f64],
    n_channels: usize,
    channel_x: usize,
    channel_y: usize,
    sigma: f64,
    gate_fraction: f64,
) -> Result<Vec<f64>, JsValue> {
    let gate = run_gate(data, n_channels, channel_x, channel_y, sigma, gate_fraction)?;
    Ok(contours_to_flat(&gate.contours))
}
