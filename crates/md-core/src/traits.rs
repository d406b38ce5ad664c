use crate::error::CoreError;
use crate::frame::PixelBuffer;

/// Métadonnées d'une source, pour le dimensionnement des sorties et la progression.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SourceInfo {
    /// Largeur native en pixels.
    pub width: u32,
    /// Hauteur native en pixels.
    pub height: u32,
    /// Images par seconde (vidéo uniquement).
    pub frame_rate: Option<f64>,
    /// Nombre de frames estimé (vidéo uniquement, progression).
    pub frame_count: Option<u64>,
}

/// Fournit des frames RGBA au pipeline, une à la fois, dans l'ordre de présentation.
///
/// Implémenté par : `ImageSource`, `VideoSource`.
///
/// # Example
/// ```
/// use md_core::traits::{FrameSource, SourceInfo};
/// use md_core::frame::PixelBuffer;
/// use md_core::error::CoreError;
///
/// struct OneShot(Option<PixelBuffer>);
/// impl FrameSource for OneShot {
///     fn has_next(&mut self) -> bool { self.0.is_some() }
///     fn next_frame(&mut self) -> Result<PixelBuffer, CoreError> {
///         self.0.take().ok_or_else(|| CoreError::Decode("épuisée".into()))
///     }
///     fn info(&self) -> SourceInfo { SourceInfo::default() }
/// }
///
/// let mut src = OneShot(Some(PixelBuffer::new(1, 1)));
/// assert!(src.has_next());
/// assert!(src.next_frame().is_ok());
/// assert!(!src.has_next());
/// ```
pub trait FrameSource: Send {
    /// `true` s'il reste au moins une frame à lire.
    ///
    /// Peut lire en avance d'une frame ; une erreur rencontrée pendant cette
    /// lecture est rendue par le `next_frame` suivant.
    fn has_next(&mut self) -> bool;

    /// Retourne la prochaine frame.
    ///
    /// # Errors
    /// [`CoreError::Decode`] si l'entrée est malformée ou si la source est épuisée.
    fn next_frame(&mut self) -> Result<PixelBuffer, CoreError>;

    /// Dimensions natives, fps et nombre de frames estimé.
    fn info(&self) -> SourceInfo;
}

/// Consomme les frames traitées, dans l'ordre d'entrée.
///
/// Implémenté par : `ImageFileSink`, `FrameSequenceSink`, `VideoStreamSink`.
pub trait FrameSink: Send {
    /// Accepte une frame (transfert de propriété).
    ///
    /// # Errors
    /// [`CoreError::Sink`] si l'écriture échoue.
    fn submit(&mut self, frame: PixelBuffer) -> Result<(), CoreError>;

    /// Vide et finalise la sortie (ex : lancer le transcodage externe).
    ///
    /// Les ressources temporaires sont libérées que la finalisation réussisse ou non.
    ///
    /// # Errors
    /// [`CoreError::Sink`] si la finalisation ou le nettoyage échoue.
    fn close(&mut self) -> Result<(), CoreError>;

    /// Abandonne la sortie : jette ce qui a été écrit et libère les ressources.
    ///
    /// Appelé à la place de `close` quand le traitement échoue ou est interrompu.
    ///
    /// # Errors
    /// [`CoreError::Sink`] si le nettoyage échoue.
    fn abort(&mut self) -> Result<(), CoreError> {
        Ok(())
    }
}
