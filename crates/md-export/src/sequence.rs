use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use md_core::config::FrameFormat;
use md_core::error::CoreError;
use md_core::frame::PixelBuffer;
use md_core::scale::ScaleFactor;
use md_core::traits::FrameSink;
use tempfile::TempDir;

use crate::image::save_frame;

/// Paramètres du réassemblage ffmpeg d'une séquence d'images.
#[derive(Clone, Debug)]
pub struct TranscodeSettings {
    /// Exécutable ffmpeg.
    pub ffmpeg: String,
    /// FPS de la séquence (arrondi à l'entier à l'appel).
    pub frame_rate: f64,
    /// Agrandissement plus proche voisin appliqué par ffmpeg.
    pub upscale: ScaleFactor,
    /// CRF x264. 0 = sans perte.
    pub crf: u8,
}

/// Arguments ffmpeg : séquence `pattern` → `output`, agrandie au plus proche voisin.
///
/// # Example
/// ```
/// use md_core::scale::ScaleFactor;
/// use md_export::sequence::{transcode_args, TranscodeSettings};
///
/// let settings = TranscodeSettings {
///     ffmpeg: "ffmpeg".into(),
///     frame_rate: 29.97,
///     upscale: ScaleFactor::new(2.0).unwrap(),
///     crf: 0,
/// };
/// let args = transcode_args("/tmp/x/%05d.png", "out.mp4", &settings);
/// assert!(args.windows(2).any(|w| w[0] == "-framerate" && w[1] == "30"));
/// assert!(args.contains(&"scale=2*iw:2*ih:flags=neighbor".to_string()));
/// ```
#[must_use]
pub fn transcode_args(pattern: &str, output: &str, settings: &TranscodeSettings) -> Vec<String> {
    let fps = settings.frame_rate.round().max(1.0) as u32;
    let k = settings.upscale;
    vec![
        "-y".to_string(),
        "-nostdin".to_string(),
        "-framerate".to_string(),
        fps.to_string(),
        "-i".to_string(),
        pattern.to_string(),
        "-vf".to_string(),
        format!("scale={k}*iw:{k}*ih:flags=neighbor"),
        "-crf".to_string(),
        settings.crf.to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        output.to_string(),
    ]
}

/// Écrit chaque frame en image dans un dossier temporaire, puis réassemble la
/// vidéo avec ffmpeg à la fermeture.
///
/// Le dossier est supprimé après ffmpeg, qu'il réussisse ou non, ainsi que sur
/// `abort` et au drop.
pub struct FrameSequenceSink {
    dir: Option<TempDir>,
    output: PathBuf,
    format: FrameFormat,
    jpeg_quality: u8,
    settings: TranscodeSettings,
    count: u64,
}

impl FrameSequenceSink {
    /// Crée le dossier temporaire de la séquence.
    ///
    /// # Errors
    /// [`CoreError::Sink`] si le dossier ne peut pas être créé.
    pub fn new(
        output: &Path,
        format: FrameFormat,
        jpeg_quality: u8,
        settings: TranscodeSettings,
    ) -> Result<Self, CoreError> {
        let dir = tempfile::Builder::new()
            .prefix("monodither-frames-")
            .tempdir()
            .map_err(|e| CoreError::Sink(format!("dossier temporaire: {e}")))?;
        log::debug!("Séquence temporaire : {}", dir.path().display());
        Ok(Self {
            dir: Some(dir),
            output: output.to_path_buf(),
            format,
            jpeg_quality,
            settings,
            count: 0,
        })
    }

    /// Dossier temporaire courant (`None` une fois nettoyé).
    #[must_use]
    pub fn frame_dir(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    /// Frames écrites jusqu'ici.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.count
    }

    fn pattern(&self, dir: &Path) -> PathBuf {
        dir.join(format!("%05d.{}", self.format.extension()))
    }

    fn transcode(&self, dir: &Path) -> Result<(), CoreError> {
        if self.count == 0 {
            return Err(CoreError::Sink("aucune frame à transcoder".to_string()));
        }
        let pattern = self.pattern(dir);
        let pattern = pattern
            .to_str()
            .ok_or_else(|| CoreError::Sink("chemin temporaire non-UTF8".to_string()))?;
        let output = self
            .output
            .to_str()
            .ok_or_else(|| CoreError::Sink("chemin de sortie non-UTF8".to_string()))?;

        log::info!(
            "Transcodage de {} frame(s) vers {}",
            self.count,
            self.output.display()
        );
        let result = Command::new(&self.settings.ffmpeg)
            .args(transcode_args(pattern, output, &self.settings))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                CoreError::Sink(format!(
                    "impossible de lancer {} ({e}). Est-il dans PATH ?",
                    self.settings.ffmpeg
                ))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(CoreError::Sink(format!(
                "ffmpeg a échoué ({}): {}",
                result.status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn cleanup(&mut self) -> Result<(), CoreError> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        let path = dir.path().to_path_buf();
        dir.close().map_err(|e| {
            CoreError::Sink(format!(
                "suppression du dossier temporaire {}: {e}",
                path.display()
            ))
        })?;
        log::debug!("Dossier temporaire supprimé : {}", path.display());
        Ok(())
    }
}

impl FrameSink for FrameSequenceSink {
    fn submit(&mut self, frame: PixelBuffer) -> Result<(), CoreError> {
        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| CoreError::Sink("séquence déjà fermée".to_string()))?;
        frame.check_shape()?;
        let path = dir
            .path()
            .join(format!("{:05}.{}", self.count, self.format.extension()));
        save_frame(&frame, &path, self.jpeg_quality)?;
        self.count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), CoreError> {
        let transcoded = match self.dir.as_ref() {
            Some(dir) => self.transcode(dir.path()),
            None => Err(CoreError::Sink("séquence déjà fermée".to_string())),
        };
        let cleaned = self.cleanup();

        match (transcoded, cleaned) {
            (Ok(()), cleaned) => cleaned,
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup_err)) => {
                log::error!("{cleanup_err}");
                Err(e)
            }
        }
    }

    fn abort(&mut self) -> Result<(), CoreError> {
        log::info!("Séquence abandonnée après {} frame(s)", self.count);
        self.cleanup()
    }
}
