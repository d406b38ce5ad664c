use crate::error::CoreError;

/// Buffer de pixels possédé, transmis d'étage en étage par move.
///
/// Stocke les pixels en RGBA row-major, 4 bytes par pixel, sans padding.
/// Invariant : `data.len() == width * height * 4`, `width > 0`, `height > 0`.
/// Les champs sont publics comme pour tout buffer brut du pipeline ; les
/// étages qui indexent vérifient la forme via [`PixelBuffer::check_shape`].
///
/// # Example
/// ```
/// use md_core::frame::PixelBuffer;
/// let fb = PixelBuffer::new(10, 10);
/// assert_eq!(fb.data.len(), 400);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Pixels RGBA, row-major, 4 bytes par pixel.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelBuffer {
    /// Crée un buffer noir opaque aux dimensions données.
    ///
    /// # Example
    /// ```
    /// use md_core::frame::PixelBuffer;
    /// let fb = PixelBuffer::new(100, 50);
    /// assert_eq!(fb.width, 100);
    /// assert_eq!(fb.height, 50);
    /// assert_eq!(fb.pixel(99, 49), (0, 0, 0, 255));
    /// ```
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let mut data = vec![0u8; width as usize * height as usize * 4];
        for px in data.chunks_exact_mut(4) {
            px[3] = 255;
        }
        Self {
            data,
            width,
            height,
        }
    }

    /// Adopte un buffer RGBA existant après validation de sa forme.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidBufferShape`] if the length does not equal
    /// `width * height * 4` or if either dimension is zero.
    ///
    /// # Example
    /// ```
    /// use md_core::frame::PixelBuffer;
    /// assert!(PixelBuffer::from_raw(2, 1, vec![0; 8]).is_ok());
    /// assert!(PixelBuffer::from_raw(2, 1, vec![0; 7]).is_err());
    /// ```
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CoreError> {
        let fb = Self {
            data,
            width,
            height,
        };
        fb.check_shape()?;
        Ok(fb)
    }

    /// Buffer de couleur uniforme. Utile pour les tests et les mires.
    #[must_use]
    pub fn filled(width: u32, height: u32, rgb: (u8, u8, u8)) -> Self {
        let mut fb = Self::new(width, height);
        for px in fb.data.chunks_exact_mut(4) {
            px[0] = rgb.0;
            px[1] = rgb.1;
            px[2] = rgb.2;
        }
        fb
    }

    /// Vérifie l'invariant de forme.
    ///
    /// La hauteur est recalculée depuis la longueur (`len / (width * 4)`) et
    /// doit correspondre à `height`.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidBufferShape`] on any mismatch.
    pub fn check_shape(&self) -> Result<(), CoreError> {
        let stride = self.width as usize * 4;
        let bad = stride == 0
            || self.height == 0
            || self.data.len() % stride != 0
            || self.data.len() / stride != self.height as usize;
        if bad {
            return Err(CoreError::InvalidBufferShape {
                len: self.data.len(),
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Accès au pixel (x, y) → (r, g, b, a).
    ///
    /// # Example
    /// ```
    /// use md_core::frame::PixelBuffer;
    /// let fb = PixelBuffer::filled(4, 4, (10, 20, 30));
    /// assert_eq!(fb.pixel(3, 3), (10, 20, 30, 255));
    /// ```
    #[inline(always)]
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8, u8) {
        debug_assert!(x < self.width && y < self.height, "pixel out of bounds");
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        if idx + 3 >= self.data.len() {
            return (0, 0, 0, 0);
        }
        (
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        )
    }
}

/// Vue « image » sur un buffer de samples : dimensions + échantillonnage par pixel.
///
/// Les encodeurs et les outils de resampling génériques consomment ce trait
/// au lieu d'un adaptateur par variante de sortie. L'alpha retourné est
/// toujours 255.
///
/// # Example
/// ```
/// use md_core::frame::{PixelBuffer, SampledImage};
/// let fb = PixelBuffer::filled(2, 2, (1, 2, 3));
/// assert_eq!(fb.dimensions(), (2, 2));
/// assert_eq!(fb.sample(1, 1), [1, 2, 3, 255]);
/// ```
pub trait SampledImage {
    /// Width in pixels.
    fn width(&self) -> u32;

    /// Height in pixels.
    fn height(&self) -> u32;

    /// RGBA du pixel (x, y), alpha forcé à 255.
    fn sample(&self, x: u32, y: u32) -> [u8; 4];

    /// (width, height).
    fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }
}

impl SampledImage for PixelBuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn sample(&self, x: u32, y: u32) -> [u8; 4] {
        let (r, g, b, _) = self.pixel(x, y);
        [r, g, b, 255]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_shape_rejects_zero_width() {
        let fb = PixelBuffer {
            data: Vec::new(),
            width: 0,
            height: 3,
        };
        assert!(matches!(
            fb.check_shape(),
            Err(CoreError::InvalidBufferShape { width: 0, .. })
        ));
    }

    #[test]
    fn check_shape_rejects_partial_row() {
        let fb = PixelBuffer {
            data: vec![0; 3 * 4 * 2 + 4],
            width: 3,
            height: 2,
        };
        assert!(fb.check_shape().is_err());
    }

    #[test]
    fn check_shape_rejects_height_mismatch() {
        let fb = PixelBuffer {
            data: vec![0; 3 * 4 * 2],
            width: 3,
            height: 5,
        };
        assert!(fb.check_shape().is_err());
    }

    #[test]
    fn sample_forces_opaque_alpha() {
        let fb = PixelBuffer::from_raw(1, 1, vec![9, 8, 7, 0]).unwrap();
        assert_eq!(fb.sample(0, 0), [9, 8, 7, 255]);
        assert_eq!(fb.pixel(0, 0), (9, 8, 7, 0));
    }
}
