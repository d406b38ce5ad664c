//! Frame sinks: still image file, per-frame sequence reassembled by ffmpeg,
//! and direct ffmpeg video stream.

pub mod image;
pub mod muxer;
pub mod sequence;

pub use self::image::ImageFileSink;
pub use muxer::VideoStreamSink;
pub use sequence::{FrameSequenceSink, TranscodeSettings};
