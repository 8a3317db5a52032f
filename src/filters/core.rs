//! Gaussian smoothing for 2D count grids.
//!
//! This module provides the smoothing stage of the density gate:
//! - Gaussian kernel generation with an explicit truncation radius
//! - Separable zero-padded Gaussian filtering of a 2D grid
//! - Normalization of a smoothed grid into a probability mass function

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use tracing::debug;

use crate::error::{GateError, Result};

/// Default kernel truncation, in standard deviations.
pub const DEFAULT_TRUNCATE: f64 = 6.0;

/// Generate a normalized 1D Gaussian kernel.
///
/// The radius is `floor(truncate * sigma + 0.5)`, so the kernel has
/// `2 * radius + 1` taps and sums to 1.
///
/// # Arguments
/// * `sigma` - Standard deviation of the Gaussian
/// * `truncate` - Kernel half-width in standard deviations
pub fn gaussian_kernel_1d(sigma: f64, truncate: f64) -> Vec<f64> {
    if sigma <= 0.0 {
        return vec![1.0];
    }

    let radius = (truncate * sigma + 0.5).floor() as usize;
    let two_var = 2.0 * sigma * sigma;

    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_var).exp()
        })
        .collect();

    let sum: f64 = kernel.iter().sum();
    for v in kernel.iter_mut() {
        *v /= sum;
    }

    kernel
}

/// Convolve one line with a symmetric kernel, treating samples outside the
/// line as zero.
///
/// Works by scattering every non-zero sample, so sparse lines cost little.
fn convolve_line_zero_padded(src: &[f64], kernel: &[f64], dst: &mut [f64]) {
    let n = src.len();
    let radius = kernel.len() / 2;

    for (i, &v) in src.iter().enumerate() {
        if v == 0.0 {
            continue;
        }
        let lo = i.saturating_sub(radius);
        let hi = (i + radius).min(n - 1);
        for (j, out) in dst.iter_mut().enumerate().take(hi + 1).skip(lo) {
            *out += v * kernel[j + radius - i];
        }
    }
}

/// Transpose a row-major `rows x cols` buffer.
fn transpose(data: &[f64], rows: usize, cols: usize) -> Vec<f64> {
    let mut out = vec![0.0f64; data.len()];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = data[r * cols + c];
        }
    }
    out
}

/// Apply a separable Gaussian filter with zero padding.
///
/// The 1D kernel runs along each row first, then along each column.
/// Both passes are parallelized per line with Rayon; every line is summed
/// sequentially so results do not depend on the thread count.
///
/// # Arguments
/// * `grid` - 2D input values
/// * `sigma` - Standard deviation of the Gaussian (in cells)
/// * `truncate` - Kernel half-width in standard deviations
///
/// # Returns
/// Filtered grid with the same shape
pub fn gaussian_filter(grid: ArrayView2<f64>, sigma: f64, truncate: f64) -> Array2<f64> {
    let (rows, cols) = grid.dim();
    if rows == 0 || cols == 0 {
        return grid.to_owned();
    }

    let kernel = gaussian_kernel_1d(sigma, truncate);
    let src: Vec<f64> = grid.iter().copied().collect();

    // Pass 1: along rows
    let mut along_rows = vec![0.0f64; rows * cols];
    along_rows
        .par_chunks_mut(cols)
        .zip(src.par_chunks(cols))
        .for_each(|(dst, line)| convolve_line_zero_padded(line, &kernel, dst));

    // Pass 2: along columns, on the transposed buffer
    let columns = transpose(&along_rows, rows, cols);
    let mut along_cols = vec![0.0f64; rows * cols];
    along_cols
        .par_chunks_mut(rows)
        .zip(columns.par_chunks(rows))
        .for_each(|(dst, line)| convolve_line_zero_padded(line, &kernel, dst));

    debug!(rows, cols, sigma, taps = kernel.len(), "gaussian filter applied");

    Array2::from_shape_fn((rows, cols), |(r, c)| along_cols[c * rows + r])
}

/// Divide every cell by the grid total so the cells sum to 1.
///
/// Fails with [`GateError::EmptyDistribution`] when the grid holds no mass.
pub fn normalize_density(smoothed: Array2<f64>) -> Result<Array2<f64>> {
    let total: f64 = smoothed.sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(GateError::EmptyDistribution);
    }
    Ok(smoothed.mapv_into(|v| v / total))
}

/// Smooth a count grid into a probability mass function.
///
/// # Arguments
/// * `counts` - Raw histogram counts
/// * `sigma` - Gaussian standard deviation (in cells)
/// * `truncate` - Kernel half-width in standard deviations
pub fn smooth_counts(counts: ArrayView2<u64>, sigma: f64, truncate: f64) -> Result<Array2<f64>> {
    if counts.iter().all(|&c| c == 0) {
        return Err(GateError::EmptyDistribution);
    }
    let as_float = counts.mapv(|c| c as f64);
    normalize_density(gaussian_filter(as_float.view(), sigma, truncate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_radius_and_normalization() {
        let kernel = gaussian_kernel_1d(10.0, 6.0);
        assert_eq!(kernel.len(), 121); // radius 60

        let sum: f64 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);

        // Symmetric and peaked in the middle
        assert!((kernel[0] - kernel[120]).abs() < 1e-15);
        assert!(kernel[60] > kernel[59]);

        let tiny = gaussian_kernel_1d(1.2, 4.0);
        assert_eq!(tiny.len(), 11); // floor(4.8 + 0.5) = 5
    }

    #[test]
    fn test_kernel_degenerate_sigma() {
        assert_eq!(gaussian_kernel_1d(0.0, 6.0), vec![1.0]);
        assert_eq!(gaussian_kernel_1d(0.01, 6.0), vec![1.0]);
    }

    #[test]
    fn test_convolve_line_zero_padding() {
        let src = [1.0, 2.0, 3.0];
        let kernel = [1.0, 1.0, 1.0];
        let mut dst = [0.0; 3];
        convolve_line_zero_padded(&src, &kernel, &mut dst);
        assert_eq!(dst, [3.0, 6.0, 5.0]);
    }

    #[test]
    fn test_filter_preserves_mass_away_from_border() {
        let mut grid = Array2::<f64>::zeros((41, 41));
        grid[[20, 20]] = 1.0;

        let out = gaussian_filter(grid.view(), 2.0, 4.0);
        assert!((out.sum() - 1.0).abs() < 1e-9);

        // Radially symmetric around the impulse
        assert!((out[[18, 20]] - out[[20, 18]]).abs() < 1e-12);
        assert!((out[[22, 20]] - out[[18, 20]]).abs() < 1e-12);
        assert!(out[[20, 20]] > out[[21, 20]]);
    }

    #[test]
    fn test_filter_zero_padding_loses_mass_at_border() {
        let mut grid = Array2::<f64>::zeros((20, 20));
        grid[[0, 0]] = 1.0;

        let out = gaussian_filter(grid.view(), 2.0, 6.0);
        // Only the quadrant inside the grid survives
        assert!(out.sum() < 0.4);
        assert!(out.sum() > 0.3);
    }

    #[test]
    fn test_smooth_counts_is_pmf() {
        let mut counts = Array2::<u64>::zeros((32, 32));
        counts[[10, 10]] = 5;
        counts[[20, 5]] = 3;

        let density = smooth_counts(counts.view(), 3.0, 6.0).unwrap();
        assert!((density.sum() - 1.0).abs() < 1e-9);
        assert!(density.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_smooth_counts_empty() {
        let counts = Array2::<u64>::zeros((8, 8));
        assert_eq!(
            smooth_counts(counts.view(), 1.0, 6.0),
            Err(GateError::EmptyDistribution)
        );
    }
}
