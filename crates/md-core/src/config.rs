use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::scale::ScaleFactor;

/// Configuration complète d'un passage de tramage.
///
/// Chargée depuis TOML (toutes les clés optionnelles), puis surchargée par la CLI.
///
/// # Example
/// ```
/// use md_core::config::DitherConfig;
/// let config = DitherConfig::default();
/// assert!(config.downscale.is_identity());
/// assert_eq!(config.crf, 0);
/// ```
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DitherConfig {
    // === Échelle ===
    /// Réduction avant tramage (diviseur des dimensions).
    pub downscale: ScaleFactor,
    /// Agrandissement après tramage (multiplicateur, plus proche voisin).
    pub upscale: ScaleFactor,
    /// Filtre de réduction.
    pub filter: DownscaleFilter,

    // === Pipeline ===
    /// Nombre de frames traitées en parallèle. 1 = séquentiel strict.
    pub workers: usize,
    /// Frames en vol maximum (entrée + réordonnancement).
    pub queue_depth: usize,

    // === Export ===
    /// Exécutable ffmpeg.
    pub ffmpeg: String,
    /// Exécutable ffprobe.
    pub ffprobe: String,
    /// Format des frames intermédiaires du mode séquence.
    pub frame_format: FrameFormat,
    /// Qualité JPEG [1, 100] quand `frame_format = "jpeg"`.
    pub jpeg_quality: u8,
    /// CRF x264 [0, 51]. 0 = sans perte.
    pub crf: u8,
    /// FPS imposé en sortie. `None` = fps sondé de la source.
    pub frame_rate: Option<f64>,
}

impl Default for DitherConfig {
    fn default() -> Self {
        Self {
            downscale: ScaleFactor::IDENTITY,
            upscale: ScaleFactor::IDENTITY,
            filter: DownscaleFilter::CatmullRom,
            workers: default_workers(),
            queue_depth: 8,
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            frame_format: FrameFormat::Png,
            jpeg_quality: 90,
            crf: 0,
            frame_rate: None,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map_or(1, std::num::NonZeroUsize::get)
        .min(8)
}

impl DitherConfig {
    /// Clamp all numeric fields to their valid ranges.
    /// Called after TOML deserialization to prevent out-of-range values.
    pub fn clamp_all(&mut self) {
        self.workers = self.workers.clamp(1, 64);
        self.queue_depth = self.queue_depth.clamp(1, 256).max(self.workers);
        self.jpeg_quality = self.jpeg_quality.clamp(1, 100);
        self.crf = self.crf.min(51);
        self.frame_rate = self.frame_rate.filter(|f| f.is_finite() && *f > 0.0);
    }
}

/// Filtre cubique utilisé pour la réduction avant tramage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DownscaleFilter {
    /// Catmull-Rom (B=0, C=0.5).
    CatmullRom,
    /// Mitchell-Netravali (B=C=1/3).
    Mitchell,
}

impl FromStr for DownscaleFilter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "catmull-rom" | "catmullrom" | "cubic" => Ok(Self::CatmullRom),
            "mitchell" => Ok(Self::Mitchell),
            other => Err(CoreError::Config(format!("filtre inconnu '{other}'"))),
        }
    }
}

/// Format des images intermédiaires écrites avant transcodage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    /// PNG sans perte.
    Png,
    /// JPEG (comportement historique).
    Jpeg,
}

impl FrameFormat {
    /// Extension de fichier sans point.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

impl FromStr for FrameFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(CoreError::Config(format!("format de frame inconnu '{other}'"))),
        }
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    scale: Option<ScaleSection>,
    pipeline: Option<PipelineSection>,
    export: Option<ExportSection>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ScaleSection {
    downscale: Option<ScaleFactor>,
    upscale: Option<ScaleFactor>,
    filter: Option<DownscaleFilter>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PipelineSection {
    workers: Option<usize>,
    queue_depth: Option<usize>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ExportSection {
    ffmpeg: Option<String>,
    ffprobe: Option<String>,
    frame_format: Option<FrameFormat>,
    jpeg_quality: Option<u8>,
    crf: Option<u8>,
    frame_rate: Option<f64>,
}

/// Parse un document TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the document is not valid TOML, has unknown keys,
/// or carries an invalid scale factor.
///
/// # Example
/// ```
/// use md_core::config::parse_config;
/// let config = parse_config("[scale]\ndownscale = 2.0\n").unwrap();
/// assert_eq!(config.downscale.get(), 2.0);
/// assert!(config.upscale.is_identity());
/// ```
pub fn parse_config(content: &str) -> Result<DitherConfig> {
    let file: ConfigFile = toml::from_str(content).context("Erreur de parsing TOML")?;
    let mut config = DitherConfig::default();

    if let Some(s) = file.scale {
        if let Some(v) = s.downscale {
            config.downscale = v;
        }
        if let Some(v) = s.upscale {
            config.upscale = v;
        }
        if let Some(v) = s.filter {
            config.filter = v;
        }
    }

    if let Some(p) = file.pipeline {
        if let Some(v) = p.workers {
            config.workers = v;
        }
        if let Some(v) = p.queue_depth {
            config.queue_depth = v;
        }
    }

    if let Some(e) = file.export {
        if let Some(v) = e.ffmpeg {
            config.ffmpeg = v;
        }
        if let Some(v) = e.ffprobe {
            config.ffprobe = v;
        }
        if let Some(v) = e.frame_format {
            config.frame_format = v;
        }
        if let Some(v) = e.jpeg_quality {
            config.jpeg_quality = v;
        }
        if let Some(v) = e.crf {
            config.crf = v;
        }
        if e.frame_rate.is_some() {
            config.frame_rate = e.frame_rate;
        }
    }

    config.clamp_all();
    Ok(config)
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
/// ```no_run
/// use md_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<DitherConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    let config = parse_config(&content).with_context(|| format!("Config {}", path.display()))?;
    log::debug!("Config chargée depuis {}: {config:?}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = parse_config("").unwrap();
        assert!(config.downscale.is_identity());
        assert!(config.upscale.is_identity());
        assert_eq!(config.filter, DownscaleFilter::CatmullRom);
        assert_eq!(config.frame_format, FrameFormat::Png);
    }

    #[test]
    fn full_document_overrides_every_section() {
        let doc = r#"
[scale]
downscale = 2.0
upscale = 4
filter = "mitchell"

[pipeline]
workers = 3
queue_depth = 6

[export]
ffmpeg = "/opt/ffmpeg/bin/ffmpeg"
frame_format = "jpeg"
jpeg_quality = 75
crf = 18
frame_rate = 24.0
"#;
        let config = parse_config(doc).unwrap();
        assert_eq!(config.downscale.get(), 2.0);
        assert_eq!(config.upscale.get(), 4.0);
        assert_eq!(config.filter, DownscaleFilter::Mitchell);
        assert_eq!(config.workers, 3);
        assert_eq!(config.queue_depth, 6);
        assert_eq!(config.ffmpeg, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(config.ffprobe, "ffprobe");
        assert_eq!(config.frame_format, FrameFormat::Jpeg);
        assert_eq!(config.jpeg_quality, 75);
        assert_eq!(config.crf, 18);
        assert_eq!(config.frame_rate, Some(24.0));
    }

    #[test]
    fn negative_scale_is_rejected() {
        assert!(parse_config("[scale]\ndownscale = -2.0\n").is_err());
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert!(parse_config("[scale]\nzoom = 2.0\n").is_err());
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config =
            parse_config("[pipeline]\nworkers = 0\n[export]\ncrf = 99\nframe_rate = -5.0\n")
                .unwrap();
        assert_eq!(config.workers, 1);
        assert_eq!(config.crf, 51);
        assert_eq!(config.frame_rate, None);
    }

    #[test]
    fn load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monodither.toml");
        std::fs::write(&path, "[scale]\nupscale = 3.0\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.upscale.get(), 3.0);
        assert!(load_config(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn shipped_default_config_parses() {
        let config = parse_config(include_str!("../../../config/default.toml")).unwrap();
        assert!(config.downscale.is_identity());
        assert_eq!(config.workers, 4);
        assert_eq!(config.frame_format, FrameFormat::Png);
        assert_eq!(config.frame_rate, None);
    }

    #[test]
    fn enums_parse_from_cli_text() {
        assert_eq!(
            "Catmull-Rom".parse::<DownscaleFilter>().unwrap(),
            DownscaleFilter::CatmullRom
        );
        assert_eq!("jpg".parse::<FrameFormat>().unwrap(), FrameFormat::Jpeg);
        assert!("lanczos".parse::<DownscaleFilter>().is_err());
    }
}
