//! sRGB → lumière linéaire → luminance relative → luminosité perceptuelle (L*).
//!
//! Toute l'arithmétique est en `f64` : les constantes et les seuils de branche
//! doivent rester identiques pour reproduire la sortie au bit près.

/// Seuil de la branche linéaire de l'EOTF sRGB inverse.
const SRGB_LINEAR_CUTOFF: f64 = 0.04045;

/// Seuil de la branche linéaire de L* (ε CIE arrondi).
const LSTAR_LINEAR_CUTOFF: f64 = 0.008_856;

/// Convertit un échantillon 8 bits sRGB en lumière linéaire [0, 1].
///
/// # Example
/// ```
/// use md_dither::luminance::linearize;
/// assert_eq!(linearize(0), 0.0);
/// assert_eq!(linearize(255), 1.0);
/// ```
#[inline(always)]
#[must_use]
pub fn linearize(sample: u8) -> f64 {
    let l = f64::from(sample) / 255.0;
    if l <= SRGB_LINEAR_CUTOFF {
        l / 12.92
    } else {
        ((l + 0.055) / 1.055).powf(2.4)
    }
}

/// Luminance relative BT.709 à partir de trois échantillons sRGB.
///
/// # Example
/// ```
/// use md_dither::luminance::relative_luminance;
/// assert_eq!(relative_luminance(0, 0, 0), 0.0);
/// assert!((relative_luminance(255, 255, 255) - 1.0).abs() < 1e-12);
/// ```
#[inline(always)]
#[must_use]
pub fn relative_luminance(r: u8, g: u8, b: u8) -> f64 {
    0.2126 * linearize(r) + 0.7152 * linearize(g) + 0.0722 * linearize(b)
}

/// Luminosité perceptuelle (≈ CIE L*) d'une luminance relative, ≈ [0, 100].
///
/// À la frontière exacte `Y == 0.008856`, la branche linéaire s'applique.
///
/// # Example
/// ```
/// use md_dither::luminance::perceptual_lightness;
/// assert_eq!(perceptual_lightness(0.0), 0.0);
/// assert!((perceptual_lightness(1.0) - 100.0).abs() < 1e-9);
/// ```
#[inline(always)]
#[must_use]
pub fn perceptual_lightness(y: f64) -> f64 {
    if y <= LSTAR_LINEAR_CUTOFF {
        y * 903.3
    } else {
        y.powf(1.0 / 3.0) * 116.0 - 16.0
    }
}

/// Raccourci `perceptual_lightness(relative_luminance(r, g, b))`.
#[inline(always)]
#[must_use]
pub fn lightness_rgb(r: u8, g: u8, b: u8) -> f64 {
    perceptual_lightness(relative_luminance(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linearize_endpoints() {
        assert_eq!(linearize(0), 0.0);
        assert_eq!(linearize(255), 1.0);
    }

    #[test]
    fn linearize_is_monotonic() {
        let mut prev = linearize(0);
        for v in 1..=255u8 {
            let cur = linearize(v);
            assert!(cur >= prev, "linearize({v}) = {cur} < {prev}");
            prev = cur;
        }
    }

    #[test]
    fn linearize_uses_linear_branch_for_dark_samples() {
        // 10/255 ≈ 0.0392 <= 0.04045
        assert_eq!(linearize(10), 10.0 / 255.0 / 12.92);
        // 11/255 ≈ 0.0431 > 0.04045
        let l = 11.0 / 255.0;
        assert_eq!(linearize(11), ((l + 0.055) / 1.055f64).powf(2.4));
    }

    #[test]
    fn lightness_is_monotonic_over_unit_range() {
        let mut prev = perceptual_lightness(0.0);
        for i in 1..=10_000 {
            let y = f64::from(i) / 10_000.0;
            let cur = perceptual_lightness(y);
            assert!(cur >= prev, "L*({y}) = {cur} < {prev}");
            prev = cur;
        }
    }

    #[test]
    fn lightness_boundary_takes_linear_branch() {
        assert_eq!(perceptual_lightness(0.008_856), 0.008_856 * 903.3);
        // Les deux branches se rejoignent à la frontière.
        let cubic = 0.008_856f64.powf(1.0 / 3.0) * 116.0 - 16.0;
        assert!((perceptual_lightness(0.008_856) - cubic).abs() < 0.01);
    }

    #[test]
    fn mid_gray_lightness() {
        let l = lightness_rgb(128, 128, 128);
        assert!((l - 53.585).abs() < 0.001, "L*(128) = {l}");
    }

    #[test]
    fn green_dominates_luminance() {
        assert!(relative_luminance(0, 255, 0) > relative_luminance(255, 0, 0));
        assert!(relative_luminance(255, 0, 0) > relative_luminance(0, 0, 255));
    }
}
