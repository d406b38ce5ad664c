use std::path::Path;

use md_core::error::CoreError;
use md_core::frame::PixelBuffer;
use md_core::traits::{FrameSource, SourceInfo};

/// Source d'image fixe : produit exactement une frame.
///
/// # Example
/// ```
/// use md_core::frame::PixelBuffer;
/// use md_core::traits::FrameSource;
/// use md_source::image::ImageSource;
///
/// let mut source = ImageSource::from_buffer(PixelBuffer::new(4, 3));
/// assert_eq!(source.info().width, 4);
/// assert!(source.has_next());
/// let _frame = source.next_frame().unwrap();
/// assert!(!source.has_next());
/// ```
pub struct ImageSource {
    frame: Option<PixelBuffer>,
    info: SourceInfo,
}

impl ImageSource {
    /// Décode une image depuis le disque (PNG, JPEG, BMP, GIF).
    ///
    /// # Errors
    /// [`CoreError::Decode`] si le fichier est illisible ou d'un format non supporté.
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        let frame = load_image(path)?;
        log::info!(
            "Image chargée : {}x{} — {}",
            frame.width,
            frame.height,
            path.display()
        );
        Ok(Self::from_buffer(frame))
    }

    /// Enveloppe un buffer déjà décodé.
    #[must_use]
    pub fn from_buffer(frame: PixelBuffer) -> Self {
        let info = SourceInfo {
            width: frame.width,
            height: frame.height,
            frame_rate: None,
            frame_count: Some(1),
        };
        Self {
            frame: Some(frame),
            info,
        }
    }
}

impl FrameSource for ImageSource {
    fn has_next(&mut self) -> bool {
        self.frame.is_some()
    }

    fn next_frame(&mut self) -> Result<PixelBuffer, CoreError> {
        self.frame
            .take()
            .ok_or_else(|| CoreError::Decode("image déjà consommée".to_string()))
    }

    fn info(&self) -> SourceInfo {
        self.info
    }
}

/// Décode un fichier image en RGBA8.
///
/// # Errors
/// [`CoreError::Decode`] si le fichier est illisible, vide ou malformé.
///
/// # Example
/// ```no_run
/// use md_source::image::load_image;
/// use std::path::Path;
/// let frame = load_image(Path::new("photo.png")).unwrap();
/// ```
pub fn load_image(path: &Path) -> Result<PixelBuffer, CoreError> {
    let img = image::open(path)
        .map_err(|e| CoreError::Decode(format!("impossible de charger {}: {e}", path.display())))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    PixelBuffer::from_raw(width, height, rgba.into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_decodes_png_to_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.png");
        let img = image::RgbImage::from_fn(3, 2, |x, y| image::Rgb([x as u8 * 10, y as u8, 7]));
        img.save(&path).unwrap();

        let mut source = ImageSource::open(&path).unwrap();
        let info = source.info();
        assert_eq!((info.width, info.height), (3, 2));
        assert_eq!(info.frame_count, Some(1));

        let frame = source.next_frame().unwrap();
        assert_eq!(frame.pixel(2, 1), (20, 1, 7, 255));
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageSource::open(&dir.path().join("absent.png"));
        assert!(matches!(err, Err(CoreError::Decode(_))));
    }

    #[test]
    fn garbage_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert!(matches!(load_image(&path), Err(CoreError::Decode(_))));
    }
}
