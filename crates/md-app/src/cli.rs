use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use md_core::config::DownscaleFilter;
use md_core::scale::ScaleFactor;

/// Extensions traitées comme des images fixes en mode `auto`.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

/// monodither — tramage ordonné noir et blanc (Bayer 16×16) d'images et de vidéos.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Fichier d'entrée : image (PNG, JPEG, BMP, GIF) ou vidéo lisible par ffmpeg.
    pub input: PathBuf,

    /// Fichier de sortie. L'extension choisit l'encodeur.
    pub output: PathBuf,

    /// Facteur d'échelle. Image : réduction avant et agrandissement après le
    /// tramage. Séquence : agrandissement au réassemblage.
    pub scale: Option<ScaleFactor>,

    /// Variante de traitement. `auto` choisit d'après l'extension d'entrée.
    #[arg(long, value_enum, default_value_t = Mode::Auto)]
    pub mode: Mode,

    /// Réduction avant tramage (prioritaire sur le facteur positionnel).
    #[arg(long)]
    pub downscale: Option<ScaleFactor>,

    /// Agrandissement après tramage (prioritaire sur le facteur positionnel).
    #[arg(long)]
    pub upscale: Option<ScaleFactor>,

    /// Filtre de réduction : catmull-rom, mitchell.
    #[arg(long)]
    pub filter: Option<DownscaleFilter>,

    /// Frames traitées en parallèle. 1 = séquentiel.
    #[arg(long)]
    pub workers: Option<usize>,

    /// FPS de sortie (défaut : fps de la source).
    #[arg(long)]
    pub fps: Option<f64>,

    /// Fichier de configuration TOML.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Variante de déploiement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Image si l'entrée a une extension d'image, séquence sinon.
    Auto,
    /// Image → image.
    Image,
    /// Vidéo → images temporaires → ffmpeg.
    Sequence,
    /// Vidéo → ffmpeg en flux continu.
    Stream,
}

impl Mode {
    /// Résout `Auto` d'après l'extension de `input`.
    ///
    /// # Example
    /// ```
    /// use std::path::Path;
    /// use md_app::cli::Mode;
    /// assert_eq!(Mode::Auto.resolve(Path::new("a.JPG")), Mode::Image);
    /// assert_eq!(Mode::Auto.resolve(Path::new("a.mov")), Mode::Sequence);
    /// assert_eq!(Mode::Stream.resolve(Path::new("a.png")), Mode::Stream);
    /// ```
    #[must_use]
    pub fn resolve(self, input: &Path) -> Self {
        if self != Self::Auto {
            return self;
        }
        if is_image_path(input) {
            Self::Image
        } else {
            Self::Sequence
        }
    }
}

/// Code de sortie d'une erreur de parsing : 1 pour une erreur d'usage,
/// 0 pour `--help` / `--version`.
///
/// # Example
/// ```
/// use clap::Parser;
/// use md_app::cli::{Cli, exit_code};
/// let err = Cli::try_parse_from(["monodither", "a.png"]).unwrap_err();
/// assert_eq!(exit_code(&err), 1);
/// ```
#[must_use]
pub fn exit_code(err: &clap::Error) -> i32 {
    i32::from(err.use_stderr())
}

/// `true` si l'extension de `path` est une extension d'image reconnue.
#[must_use]
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|i| e.eq_ignore_ascii_case(i)))
}
