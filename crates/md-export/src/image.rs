use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
use md_core::error::CoreError;
use md_core::frame::{PixelBuffer, SampledImage};
use md_core::traits::FrameSink;

/// Copie une image échantillonnée en RGB8 (l'alpha est toujours opaque).
///
/// # Example
/// ```
/// use md_core::frame::PixelBuffer;
/// use md_export::image::to_rgb_image;
/// let img = to_rgb_image(&PixelBuffer::filled(3, 2, (9, 8, 7)));
/// assert_eq!(img.dimensions(), (3, 2));
/// assert_eq!(img.get_pixel(2, 1).0, [9, 8, 7]);
/// ```
#[must_use]
pub fn to_rgb_image<S: SampledImage>(img: &S) -> RgbImage {
    ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b, _] = img.sample(x, y);
        Rgb([r, g, b])
    })
}

/// Encode `img` dans `path`, format déduit de l'extension.
///
/// `jpeg_quality` n'est utilisé que pour les sorties JPEG.
///
/// # Errors
/// [`CoreError::Sink`] si l'extension est inconnue ou si l'écriture échoue.
pub fn save_frame<S: SampledImage>(
    img: &S,
    path: &Path,
    jpeg_quality: u8,
) -> Result<(), CoreError> {
    let format = ImageFormat::from_path(path)
        .map_err(|e| CoreError::Sink(format!("format de sortie de {}: {e}", path.display())))?;
    let rgb = to_rgb_image(img);
    let sink_err = |e: image::ImageError| CoreError::Sink(format!("{}: {e}", path.display()));

    if format == ImageFormat::Jpeg {
        let file = File::create(path)
            .map_err(|e| CoreError::Sink(format!("création de {}: {e}", path.display())))?;
        let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), jpeg_quality);
        rgb.write_with_encoder(encoder).map_err(sink_err)
    } else {
        rgb.save_with_format(path, format).map_err(sink_err)
    }
}

/// Sortie image fixe : exactement une frame, écrite à la soumission.
pub struct ImageFileSink {
    path: PathBuf,
    jpeg_quality: u8,
    written: bool,
}

impl ImageFileSink {
    /// Prépare l'écriture de `path`.
    ///
    /// # Errors
    /// [`CoreError::Sink`] si l'extension ne correspond à aucun encodeur.
    pub fn new(path: &Path, jpeg_quality: u8) -> Result<Self, CoreError> {
        ImageFormat::from_path(path).map_err(|e| {
            CoreError::Sink(format!("format de sortie de {}: {e}", path.display()))
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            jpeg_quality,
            written: false,
        })
    }
}

impl FrameSink for ImageFileSink {
    fn submit(&mut self, frame: PixelBuffer) -> Result<(), CoreError> {
        if self.written {
            return Err(CoreError::Sink(format!(
                "{} : une seule image attendue",
                self.path.display()
            )));
        }
        frame.check_shape()?;
        save_frame(&frame, &self.path, self.jpeg_quality)?;
        self.written = true;
        log::info!(
            "Image écrite : {}x{} — {}",
            frame.width,
            frame.height,
            self.path.display()
        );
        Ok(())
    }

    fn close(&mut self) -> Result<(), CoreError> {
        if self.written {
            Ok(())
        } else {
            Err(CoreError::Sink(format!(
                "aucune image écrite dans {}",
                self.path.display()
            )))
        }
    }

    fn abort(&mut self) -> Result<(), CoreError> {
        if self.written {
            std::fs::remove_file(&self.path).map_err(|e| {
                CoreError::Sink(format!("suppression de {}: {e}", self.path.display()))
            })?;
            self.written = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: u32, height: u32) -> PixelBuffer {
        let mut fb = PixelBuffer::new(width, height);
        for y in 0..height {
            for x in 0..width {
                if (x + y) % 2 == 0 {
                    let idx = ((y * width + x) * 4) as usize;
                    fb.data[idx..idx + 3].copy_from_slice(&[255, 255, 255]);
                }
            }
        }
        fb
    }

    #[test]
    fn png_output_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let mut sink = ImageFileSink::new(&path, 90).unwrap();
        sink.submit(checker(5, 4)).unwrap();
        sink.close().unwrap();

        let back = image::open(&path).unwrap().to_rgb8();
        assert_eq!(back.dimensions(), (5, 4));
        assert_eq!(back.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(back.get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[test]
    fn jpeg_output_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jpg");
        let mut sink = ImageFileSink::new(&path, 95).unwrap();
        sink.submit(PixelBuffer::filled(16, 16, (255, 255, 255))).unwrap();
        sink.close().unwrap();
        let back = image::open(&path).unwrap();
        assert_eq!((back.width(), back.height()), (16, 16));
    }

    #[test]
    fn unknown_extension_is_rejected_up_front() {
        assert!(ImageFileSink::new(Path::new("out.nope"), 90).is_err());
    }

    #[test]
    fn second_frame_and_empty_close_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut empty = ImageFileSink::new(&dir.path().join("never.png"), 90).unwrap();
        assert!(empty.close().is_err());

        let mut sink = ImageFileSink::new(&dir.path().join("once.png"), 90).unwrap();
        sink.submit(PixelBuffer::new(1, 1)).unwrap();
        assert!(sink.submit(PixelBuffer::new(1, 1)).is_err());
    }

    #[test]
    fn abort_removes_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.png");
        let mut sink = ImageFileSink::new(&path, 90).unwrap();
        sink.submit(PixelBuffer::new(2, 2)).unwrap();
        assert!(path.exists());
        sink.abort().unwrap();
        assert!(!path.exists());
    }
}
