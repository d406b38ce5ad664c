use md_core::error::CoreError;
use md_core::frame::PixelBuffer;
use rayon::prelude::*;

use crate::luminance::lightness_rgb;
use crate::matrix::ThresholdMatrix;

/// Pixel noir opaque.
pub const BLACK: [u8; 4] = [0, 0, 0, 255];
/// Pixel blanc opaque.
pub const WHITE: [u8; 4] = [255, 255, 255, 255];

/// Décision de trame pour une luminosité en `(x, y)`.
///
/// Comparaison stricte : à égalité avec le seuil, le pixel est blanc.
///
/// # Example
/// ```
/// use md_dither::ditherer::is_white;
/// // Seuil 0 en (0, 0) : un noir absolu tombe pile sur le seuil → blanc.
/// assert!(is_white(0.0, 0, 0));
/// assert!(!is_white(0.0, 1, 0));
/// ```
#[inline(always)]
#[must_use]
pub fn is_white(lightness: f64, x: u32, y: u32) -> bool {
    lightness >= ThresholdMatrix::threshold_percent(x, y)
}

/// Tramage ordonné noir/blanc d'un buffer RGBA.
///
/// Sans état : la seule donnée partagée est la table constante. Les lignes
/// sont traitées en parallèle (rayon), chaque pixel ne dépendant que de sa
/// propre couleur et de sa position.
///
/// # Example
/// ```
/// use md_core::frame::PixelBuffer;
/// use md_dither::Ditherer;
///
/// let white = PixelBuffer::filled(32, 32, (255, 255, 255));
/// let out = Ditherer::new().process(&white).unwrap();
/// assert!(out.data.iter().all(|&b| b == 255));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Ditherer;

impl Ditherer {
    /// Create a ditherer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Trame `input` dans un nouveau buffer de mêmes dimensions.
    ///
    /// # Errors
    /// [`CoreError::InvalidBufferShape`] si la longueur ne correspond pas à
    /// `width * height * 4` ou si `width == 0`.
    pub fn process(&self, input: &PixelBuffer) -> Result<PixelBuffer, CoreError> {
        let mut out = input.clone();
        self.process_in_place(&mut out)?;
        Ok(out)
    }

    /// Trame un buffer possédé en réutilisant son allocation.
    ///
    /// # Errors
    /// Voir [`Ditherer::process`].
    pub fn process_owned(&self, mut frame: PixelBuffer) -> Result<PixelBuffer, CoreError> {
        self.process_in_place(&mut frame)?;
        Ok(frame)
    }

    /// Trame sur place : chaque pixel devient [`BLACK`] ou [`WHITE`].
    ///
    /// # Errors
    /// Voir [`Ditherer::process`].
    pub fn process_in_place(&self, frame: &mut PixelBuffer) -> Result<(), CoreError> {
        frame.check_shape()?;
        let stride = frame.width as usize * 4;

        // Ligne y = index de chunk, colonne x = index dans la ligne :
        // (x, y) découle de l'index plat du pixel, sans compteur séparé.
        frame
            .data
            .par_chunks_exact_mut(stride)
            .enumerate()
            .for_each(|(y, row)| {
                let y = y as u32;
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let lightness = lightness_rgb(px[0], px[1], px[2]);
                    let out = if is_white(lightness, x as u32, y) {
                        WHITE
                    } else {
                        BLACK
                    };
                    px.copy_from_slice(&out);
                }
            });

        log::trace!("dither {}x{}", frame.width, frame.height);
        Ok(())
    }
}
