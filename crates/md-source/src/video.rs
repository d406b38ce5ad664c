// Décodage vidéo via subprocess ffmpeg (std::process::Command), sans binding C.
// Prérequis : `ffmpeg` et `ffprobe` accessibles dans PATH (ou chemins configurés).
//
// Architecture :
//   - `probe_video`      : interroge ffprobe pour width/height/fps/durée
//   - `spawn_ffmpeg_pipe`: lance ffmpeg → flux raw RGBA sur stdout, taille native
//   - `VideoSource`      : lit une frame d'avance pour répondre à `has_next`

use std::io::Read;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use md_core::error::CoreError;
use md_core::frame::PixelBuffer;
use md_core::traits::{FrameSource, SourceInfo};

/// FPS supposé quand ffprobe n'en rapporte pas d'exploitable.
const FALLBACK_FPS: f64 = 30.0;

/// Métadonnées extraites via ffprobe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Images par seconde (ex: 23.976, 24.0, 30.0, 60.0).
    pub fps: f64,
    /// Durée du conteneur en secondes, si connue.
    pub duration: Option<f64>,
}

impl VideoInfo {
    /// Nombre de frames estimé : `ceil(durée × fps)`.
    ///
    /// # Example
    /// ```
    /// use md_source::video::VideoInfo;
    /// let info = VideoInfo { width: 4, height: 4, fps: 24.0, duration: Some(2.01) };
    /// assert_eq!(info.estimated_frames(), Some(49));
    /// ```
    #[must_use]
    pub fn estimated_frames(&self) -> Option<u64> {
        self.duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| (d * self.fps).ceil() as u64)
    }

    /// Taille d'une frame RGBA en octets.
    #[must_use]
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Interroge `ffprobe` pour obtenir les métadonnées du flux vidéo principal.
///
/// # Errors
/// [`CoreError::Decode`] si `ffprobe` est introuvable, échoue, ou si le fichier
/// ne contient aucun flux vidéo décodable.
pub fn probe_video(ffprobe: &str, path: &Path) -> Result<VideoInfo, CoreError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| CoreError::Decode("chemin vidéo invalide (non-UTF8)".to_string()))?;

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate:format=duration",
            "-of",
            "default=noprint_wrappers=1",
            "-i",
            path_str,
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| {
            CoreError::Decode(format!(
                "impossible de lancer {ffprobe} ({e}). Vérifiez que ffprobe est installé et dans le PATH."
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CoreError::Decode(format!(
            "ffprobe a échoué sur {}: {}",
            path.display(),
            stderr.trim()
        )));
    }

    let info = parse_probe_output(&String::from_utf8_lossy(&output.stdout)).map_err(|e| {
        CoreError::Decode(format!("{} : {e}", path.display()))
    })?;

    log::info!(
        "probe_video: {}x{} @ {:.3}fps, ~{} frames — {}",
        info.width,
        info.height,
        info.fps,
        info.estimated_frames().map_or_else(|| "?".to_string(), |n| n.to_string()),
        path.display()
    );
    Ok(info)
}

/// Parse la sortie `key=value` de ffprobe.
///
/// # Errors
/// [`CoreError::Decode`] si la largeur ou la hauteur manque ou vaut 0.
///
/// # Example
/// ```
/// use md_source::video::parse_probe_output;
/// let info = parse_probe_output("width=640\nheight=360\nr_frame_rate=30000/1001\nduration=10.0\n").unwrap();
/// assert_eq!((info.width, info.height), (640, 360));
/// assert!((info.fps - 29.97).abs() < 0.01);
/// ```
pub fn parse_probe_output(text: &str) -> Result<VideoInfo, CoreError> {
    let mut width: u32 = 0;
    let mut height: u32 = 0;
    let mut fps: Option<f64> = None;
    let mut duration: Option<f64> = None;

    for line in text.lines() {
        if let Some(val) = line.strip_prefix("width=") {
            width = val.trim().parse().unwrap_or(0);
        } else if let Some(val) = line.strip_prefix("height=") {
            height = val.trim().parse().unwrap_or(0);
        } else if let Some(val) = line.strip_prefix("r_frame_rate=") {
            fps = parse_frame_rate(val);
        } else if let Some(val) = line.strip_prefix("duration=") {
            duration = val.trim().parse().ok();
        }
    }

    if width == 0 || height == 0 {
        return Err(CoreError::Decode("aucun flux vidéo trouvé".to_string()));
    }

    let fps = fps.unwrap_or_else(|| {
        log::warn!("Fréquence d'images inconnue, utilisation de {FALLBACK_FPS}fps");
        FALLBACK_FPS
    });

    Ok(VideoInfo {
        width,
        height,
        fps,
        duration,
    })
}

/// Parse un `r_frame_rate` ffprobe : "24/1", "30000/1001" ou "25".
///
/// Retourne `None` pour un dénominateur nul ou une valeur non positive.
#[must_use]
pub fn parse_frame_rate(val: &str) -> Option<f64> {
    let mut parts = val.trim().splitn(2, '/');
    let num: f64 = parts.next()?.trim().parse().ok()?;
    let den: f64 = match parts.next() {
        Some(d) => d.trim().parse().ok()?,
        None => 1.0,
    };
    let fps = num / den;
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Arguments ffmpeg pour décoder `path` en RGBA brut sur stdout, à la taille native.
#[must_use]
pub fn decode_args(path_str: &str) -> Vec<String> {
    [
        "-nostdin",
        "-i",
        path_str,
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
        "-an",
        "-hide_banner",
        "-loglevel",
        "error",
        "pipe:1",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

/// Lance un processus `ffmpeg` qui écrit des frames RGBA brutes sur stdout.
///
/// Chaque frame = `w × h × 4` bytes (RGBA row-major, sans padding).
///
/// # Errors
/// [`CoreError::Decode`] si ffmpeg ne peut pas être lancé.
pub fn spawn_ffmpeg_pipe(ffmpeg: &str, path: &Path) -> Result<Child, CoreError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| CoreError::Decode("chemin vidéo invalide (non-UTF8)".to_string()))?;

    let child = Command::new(ffmpeg)
        .args(decode_args(path_str))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| CoreError::Decode(format!("impossible de lancer {ffmpeg}: {e}")))?;
    log::debug!("ffmpeg (décodage) spawné pour {}", path.display());
    Ok(child)
}

/// Lit exactement `buf.len()` bytes depuis `reader`.
///
/// # Errors
/// Retourne `Ok(true)` si lu avec succès, `Ok(false)` sur EOF avant complétion,
/// `Err` sur erreur I/O fatale.
pub fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut total = 0usize;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => {
                if total > 0 {
                    log::warn!("Frame tronquée en fin de flux ({total}/{} octets)", buf.len());
                }
                return Ok(false);
            }
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

/// Source vidéo décodée par un subprocess ffmpeg, une frame à la fois.
///
/// Lit une frame d'avance : `has_next` est exact, y compris en fin de flux.
/// Le processus est tué et récolté au drop.
pub struct VideoSource {
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    info: VideoInfo,
    pending: Option<Result<PixelBuffer, CoreError>>,
    exhausted: bool,
    frames_read: u64,
}

impl VideoSource {
    /// Sonde puis ouvre `path` en décodage.
    ///
    /// # Errors
    /// [`CoreError::Decode`] si la sonde ou le lancement de ffmpeg échoue.
    pub fn open(ffmpeg: &str, ffprobe: &str, path: &Path) -> Result<Self, CoreError> {
        let info = probe_video(ffprobe, path)?;
        let mut child = spawn_ffmpeg_pipe(ffmpeg, path)?;
        let stdout = child.stdout.take();
        Ok(Self::from_parts(Some(child), stdout, info))
    }

    fn from_parts(child: Option<Child>, stdout: Option<ChildStdout>, info: VideoInfo) -> Self {
        Self {
            child,
            stdout,
            info,
            pending: None,
            exhausted: false,
            frames_read: 0,
        }
    }

    fn fill(&mut self) {
        if self.pending.is_some() || self.exhausted {
            return;
        }
        let Some(stdout) = self.stdout.as_mut() else {
            self.exhausted = true;
            return;
        };

        let mut data = vec![0u8; self.info.frame_bytes()];
        match read_exact_or_eof(stdout, &mut data) {
            Ok(true) => {
                self.frames_read += 1;
                self.pending = Some(PixelBuffer::from_raw(
                    self.info.width,
                    self.info.height,
                    data,
                ));
            }
            Ok(false) => {
                self.exhausted = true;
                if let Err(e) = self.finish_child() {
                    self.pending = Some(Err(e));
                }
            }
            Err(e) => {
                self.exhausted = true;
                self.kill_child();
                self.pending = Some(Err(CoreError::Decode(format!(
                    "lecture du pipe ffmpeg après {} frame(s): {e}",
                    self.frames_read
                ))));
            }
        }
    }

    /// Récolte ffmpeg en fin de flux et vérifie son code de sortie.
    fn finish_child(&mut self) -> Result<(), CoreError> {
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| CoreError::Decode(format!("attente de ffmpeg: {e}")))?;
        log::info!("Décodage terminé : {} frame(s) lues", self.frames_read);
        if status.success() {
            Ok(())
        } else {
            Err(CoreError::Decode(format!(
                "ffmpeg (décodage) a échoué ({status}) après {} frame(s)",
                self.frames_read
            )))
        }
    }

    fn kill_child(&mut self) {
        self.stdout = None;
        if let Some(mut c) = self.child.take() {
            let _ = c.kill();
            let _ = c.wait();
        }
    }
}

impl FrameSource for VideoSource {
    fn has_next(&mut self) -> bool {
        self.fill();
        self.pending.is_some()
    }

    fn next_frame(&mut self) -> Result<PixelBuffer, CoreError> {
        self.fill();
        self.pending
            .take()
            .unwrap_or_else(|| Err(CoreError::Decode("flux vidéo épuisé".to_string())))
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            width: self.info.width,
            height: self.info.height,
            frame_rate: Some(self.info.fps),
            frame_count: self.info.estimated_frames(),
        }
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        self.kill_child();
    }
}
