use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// Facteur de redimensionnement validé : réel fini strictement positif.
///
/// `1.0` = pas de resampling. Les dimensions résultantes sont tronquées
/// (cast entier après calcul flottant), jamais arrondies. Un résultat qui ne
/// tient pas dans un `u32` donne `None`.
///
/// # Example
/// ```
/// use md_core::scale::ScaleFactor;
/// let k = ScaleFactor::new(3.0).unwrap();
/// assert_eq!(k.shrink(101), Some(33));
/// assert_eq!(k.grow(33), Some(99));
/// assert!(ScaleFactor::new(0.0).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct ScaleFactor(f64);

impl ScaleFactor {
    /// Pas de redimensionnement.
    pub const IDENTITY: Self = Self(1.0);

    /// Valide un facteur.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidScaleFactor`] for `<= 0`, NaN, or infinite values.
    pub fn new(value: f64) -> Result<Self, CoreError> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(CoreError::InvalidScaleFactor(value.to_string()))
        }
    }

    /// Valeur brute.
    #[inline]
    #[must_use]
    pub fn get(self) -> f64 {
        self.0
    }

    /// `true` si le facteur vaut exactement 1.
    #[inline]
    #[must_use]
    pub fn is_identity(self) -> bool {
        #[allow(clippy::float_cmp)]
        let identity = self.0 == 1.0;
        identity
    }

    /// Dimension après réduction : `trunc(dim / k)`.
    #[inline]
    #[must_use]
    pub fn shrink(self, dim: u32) -> Option<u32> {
        to_dimension(f64::from(dim) / self.0)
    }

    /// Dimension après agrandissement : `trunc(dim * k)`.
    #[inline]
    #[must_use]
    pub fn grow(self, dim: u32) -> Option<u32> {
        to_dimension(f64::from(dim) * self.0)
    }
}

// `as u32` sature : hors plage → `None`.
fn to_dimension(value: f64) -> Option<u32> {
    let value = value.trunc();
    (value <= f64::from(u32::MAX)).then_some(value as u32)
}

impl Default for ScaleFactor {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for ScaleFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ScaleFactor {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| CoreError::InvalidScaleFactor(s.to_string()))?;
        Self::new(value)
    }
}

impl Serialize for ScaleFactor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0)
    }
}

impl<'de> Deserialize<'de> for ScaleFactor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Self::new(value).map_err(serde::de::Error::custom)
    }
}
