//! Frame sources (still image, ffmpeg-decoded video) and the resampling stage.

pub mod image;
pub mod resize;
pub mod video;

pub use self::image::ImageSource;
pub use resize::Scaler;
pub use video::VideoSource;
