//! Ordered-dithering engine for monodither.
//!
//! Converts RGBA pixel buffers to pure black/white using perceptual
//! lightness (CIE L*) against a fixed 16×16 Bayer threshold matrix.

pub mod ditherer;
pub mod luminance;
pub mod matrix;

pub use ditherer::Ditherer;
pub use matrix::ThresholdMatrix;
