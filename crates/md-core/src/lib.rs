//! Types, traits, and configuration shared across the monodither workspace.
//!
//! Everything a pipeline stage exchanges with another stage lives here:
//! the RGBA `PixelBuffer`, the `FrameSource`/`FrameSink` seams, the
//! validated `ScaleFactor`, and the error kinds.

pub mod config;
pub mod error;
pub mod frame;
pub mod scale;
pub mod traits;

pub use config::DitherConfig;
pub use error::CoreError;
pub use frame::{PixelBuffer, SampledImage};
pub use scale::ScaleFactor;
pub use traits::{FrameSink, FrameSource, SourceInfo};
