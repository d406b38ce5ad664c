use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer as FirResizer};
use md_core::config::DownscaleFilter;
use md_core::error::CoreError;
use md_core::frame::PixelBuffer;
use md_core::scale::ScaleFactor;

/// Étage de resampling autour du tramage, sur fast_image_resize.
///
/// - réduction avant tramage : filtre cubique (moyenne de zone → plus de niveaux
///   de gris apparents) ;
/// - agrandissement après tramage : plus proche voisin (blocs nets, aucune
///   valeur intermédiaire).
///
/// Dimensions tronquées (`trunc(w / k)`, `trunc(w * k)`). Un facteur 1 rend le
/// buffer tel quel, sans copie. Non `Sync` : un `Scaler` par worker.
///
/// # Example
/// ```
/// use md_core::config::DownscaleFilter;
/// use md_core::frame::PixelBuffer;
/// use md_core::scale::ScaleFactor;
/// use md_source::resize::Scaler;
///
/// let mut scaler = Scaler::new(DownscaleFilter::CatmullRom);
/// let k = ScaleFactor::new(3.0).unwrap();
/// let small = scaler.downscale(PixelBuffer::new(101, 50), k).unwrap();
/// assert_eq!((small.width, small.height), (33, 16));
/// let big = scaler.upscale(small, k).unwrap();
/// assert_eq!((big.width, big.height), (99, 48));
/// ```
pub struct Scaler {
    inner: FirResizer,
    filter: FilterType,
}

impl Scaler {
    /// Create a scaler with the given downscale filter.
    #[must_use]
    pub fn new(filter: DownscaleFilter) -> Self {
        let filter_type = match filter {
            DownscaleFilter::CatmullRom => FilterType::CatmullRom,
            DownscaleFilter::Mitchell => FilterType::Mitchell,
        };
        Self {
            inner: FirResizer::new(),
            filter: filter_type,
        }
    }

    /// Réduit `frame` à `(trunc(w / k), trunc(h / k))`.
    ///
    /// # Errors
    /// [`CoreError::InvalidDimensions`] si une dimension tombe à 0,
    /// [`CoreError::InvalidBufferShape`] si `frame` est malformé.
    pub fn downscale(
        &mut self,
        frame: PixelBuffer,
        factor: ScaleFactor,
    ) -> Result<PixelBuffer, CoreError> {
        if factor.is_identity() {
            return Ok(frame);
        }
        let (w, h) = downscaled_size(frame.width, frame.height, factor)?;
        let alg = ResizeAlg::Convolution(self.filter);
        self.resample(frame, w, h, alg)
    }

    /// Agrandit `frame` à `(trunc(w * k), trunc(h * k))` au plus proche voisin.
    ///
    /// # Errors
    /// Voir [`Scaler::downscale`].
    pub fn upscale(
        &mut self,
        frame: PixelBuffer,
        factor: ScaleFactor,
    ) -> Result<PixelBuffer, CoreError> {
        if factor.is_identity() {
            return Ok(frame);
        }
        let (w, h) = upscaled_size(frame.width, frame.height, factor)?;
        self.resample(frame, w, h, ResizeAlg::Nearest)
    }

    fn resample(
        &mut self,
        mut frame: PixelBuffer,
        width: u32,
        height: u32,
        alg: ResizeAlg,
    ) -> Result<PixelBuffer, CoreError> {
        frame.check_shape()?;
        if frame.width == width && frame.height == height {
            return Ok(frame);
        }

        // Alpha toujours opaque : pas de prémultiplication.
        let options = ResizeOptions::new().resize_alg(alg).use_alpha(false);
        let mut dst = PixelBuffer::new(width, height);
        {
            let src_image =
                Image::from_slice_u8(frame.width, frame.height, &mut frame.data, PixelType::U8x4)
                    .map_err(|e| CoreError::Resample(format!("source : {e}")))?;
            let mut dst_image =
                Image::from_slice_u8(width, height, &mut dst.data, PixelType::U8x4)
                    .map_err(|e| CoreError::Resample(format!("destination : {e}")))?;
            self.inner
                .resize(&src_image, &mut dst_image, Some(&options))
                .map_err(|e| CoreError::Resample(e.to_string()))?;
        }
        log::trace!(
            "resample {}x{} -> {width}x{height}",
            frame.width,
            frame.height
        );
        Ok(dst)
    }
}

impl Default for Scaler {
    fn default() -> Self {
        Self::new(DownscaleFilter::CatmullRom)
    }
}

/// Dimensions après réduction.
///
/// # Errors
/// [`CoreError::InvalidDimensions`] si le résultat est vide ou trop grand
/// pour être alloué.
pub fn downscaled_size(
    width: u32,
    height: u32,
    factor: ScaleFactor,
) -> Result<(u32, u32), CoreError> {
    checked_size(factor.shrink(width), factor.shrink(height))
}

/// Dimensions après agrandissement.
///
/// # Errors
/// Voir [`downscaled_size`].
pub fn upscaled_size(
    width: u32,
    height: u32,
    factor: ScaleFactor,
) -> Result<(u32, u32), CoreError> {
    checked_size(factor.grow(width), factor.grow(height))
}

/// Taille maximale d'un buffer RGBA, en octets.
const MAX_BUFFER_BYTES: u64 = isize::MAX as u64;

fn checked_size(width: Option<u32>, height: Option<u32>) -> Result<(u32, u32), CoreError> {
    let (Some(w), Some(h)) = (width, height) else {
        return Err(CoreError::InvalidDimensions {
            width: width.unwrap_or(u32::MAX),
            height: height.unwrap_or(u32::MAX),
        });
    };
    let bytes = u64::from(w) * u64::from(h) * 4;
    if w == 0 || h == 0 || bytes > MAX_BUFFER_BYTES {
        return Err(CoreError::InvalidDimensions {
            width: w,
            height: h,
        });
    }
    Ok((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k(v: f64) -> ScaleFactor {
        ScaleFactor::new(v).unwrap()
    }

    #[test]
    fn identity_returns_same_allocation() {
        let mut scaler = Scaler::default();
        let frame = PixelBuffer::filled(7, 5, (1, 2, 3));
        let ptr = frame.data.as_ptr();
        let out = scaler.downscale(frame, ScaleFactor::IDENTITY).unwrap();
        assert_eq!(out.data.as_ptr(), ptr);
        let out = scaler.upscale(out, ScaleFactor::IDENTITY).unwrap();
        assert_eq!(out.data.as_ptr(), ptr);
    }

    #[test]
    fn round_trip_truncates_non_divisible_sizes() {
        let mut scaler = Scaler::default();
        let small = scaler.downscale(PixelBuffer::new(101, 50), k(3.0)).unwrap();
        assert_eq!((small.width, small.height), (33, 16));
        let back = scaler.upscale(small, k(3.0)).unwrap();
        assert_eq!((back.width, back.height), (99, 48));
    }

    #[test]
    fn fractional_factor_truncates() {
        let mut scaler = Scaler::default();
        let out = scaler.upscale(PixelBuffer::new(5, 3), k(1.5)).unwrap();
        assert_eq!((out.width, out.height), (7, 4));
    }

    #[test]
    fn downscale_of_uniform_color_stays_uniform() {
        let mut scaler = Scaler::new(DownscaleFilter::Mitchell);
        let out = scaler
            .downscale(PixelBuffer::filled(64, 48, (200, 100, 50)), k(4.0))
            .unwrap();
        assert_eq!((out.width, out.height), (16, 12));
        for px in out.data.chunks_exact(4) {
            assert!(px[0].abs_diff(200) <= 1, "{px:?}");
            assert!(px[1].abs_diff(100) <= 1, "{px:?}");
            assert!(px[2].abs_diff(50) <= 1, "{px:?}");
        }
    }

    #[test]
    fn nearest_upscale_replicates_blocks() {
        let mut scaler = Scaler::default();
        let mut src = PixelBuffer::new(2, 1);
        src.data[0..4].copy_from_slice(&[255, 255, 255, 255]);
        let out = scaler.upscale(src, k(2.0)).unwrap();
        assert_eq!((out.width, out.height), (4, 2));
        for y in 0..2 {
            assert_eq!(out.pixel(0, y), (255, 255, 255, 255));
            assert_eq!(out.pixel(1, y), (255, 255, 255, 255));
            assert_eq!(out.pixel(2, y), (0, 0, 0, 255));
            assert_eq!(out.pixel(3, y), (0, 0, 0, 255));
        }
    }

    #[test]
    fn collapse_to_zero_is_rejected() {
        let mut scaler = Scaler::default();
        let err = scaler.downscale(PixelBuffer::new(2, 2), k(3.0));
        assert!(matches!(
            err,
            Err(CoreError::InvalidDimensions { width: 0, height: 0 })
        ));
    }

    #[test]
    fn huge_upscale_is_rejected_before_allocation() {
        let mut scaler = Scaler::default();
        let err = scaler.upscale(PixelBuffer::new(1, 1), k(1e12));
        assert!(matches!(err, Err(CoreError::InvalidDimensions { .. })));

        let wide = k(f64::from(u32::MAX));
        assert!(matches!(
            upscaled_size(2, 2, wide),
            Err(CoreError::InvalidDimensions { .. })
        ));
        // Chaque côté tient dans un u32, mais pas le buffer RGBA.
        assert!(matches!(
            upscaled_size(65_536, 65_536, k(65_535.0)),
            Err(CoreError::InvalidDimensions { .. })
        ));
        assert!(downscaled_size(1, 1, k(1e-12)).is_err());
        assert_eq!(upscaled_size(4, 3, k(2.0)).unwrap(), (8, 6));
    }

    #[test]
    fn malformed_input_is_rejected() {
        let mut scaler = Scaler::default();
        let bad = PixelBuffer {
            data: vec![0; 12],
            width: 2,
            height: 2,
        };
        assert!(matches!(
            scaler.upscale(bad, k(2.0)),
            Err(CoreError::InvalidBufferShape { .. })
        ));
    }
}
