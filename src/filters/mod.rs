//! Grid filters used by the density gate.
//!
//! - **Gaussian smoothing**: separable, zero-padded, truncated kernel
//! - **Normalization**: turning a smoothed count grid into a probability
//!   mass function
//!
//! Filters run their per-line passes on the Rayon pool.

pub mod core;

pub use self::core::{gaussian_filter, gaussian_kernel_1d, normalize_density, smooth_counts};
