use thiserror::Error;

/// Errors originating from the pipeline stages.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Buffer length does not match its declared geometry.
    #[error("Buffer invalide : {len} octets pour une largeur de {width} px (hauteur {height})")]
    InvalidBufferShape {
        /// Length of the sample buffer, in bytes.
        len: usize,
        /// Declared width in pixels.
        width: u32,
        /// Declared height in pixels.
        height: u32,
    },

    /// The source could not produce a frame.
    #[error("Décodage impossible : {0}")]
    Decode(String),

    /// Scale factor is non-positive, non-finite, or not a number.
    #[error("Facteur d'échelle invalide : {0} (attendu : nombre réel > 0)")]
    InvalidScaleFactor(String),

    /// A resize would produce an empty image.
    #[error("Dimensions invalides : {width}×{height}")]
    InvalidDimensions {
        /// Width value.
        width: u32,
        /// Height value.
        height: u32,
    },

    /// The resampling backend rejected the operation.
    #[error("Redimensionnement échoué : {0}")]
    Resample(String),

    /// Write or finalize failure in a sink (including a failing transcoder).
    #[error("Écriture de sortie échouée : {0}")]
    Sink(String),

    /// Invalid configuration value or structure.
    #[error("Configuration invalide : {0}")]
    Config(String),

    /// The run was interrupted before the source was exhausted.
    #[error("Traitement interrompu après {frames} frame(s)")]
    Cancelled {
        /// Frames delivered to the sink before the interruption.
        frames: u64,
    },
}
