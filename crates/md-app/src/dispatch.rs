use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use md_core::config::{DitherConfig, load_config};
use md_core::scale::ScaleFactor;
use md_core::traits::FrameSource;
use md_export::{FrameSequenceSink, ImageFileSink, TranscodeSettings, VideoStreamSink};
use md_source::{ImageSource, VideoSource};

use crate::cli::{Cli, Mode};
use crate::pipeline::{FrameProcessor, RunStats};

/// FPS de sortie quand ni la CLI, ni la config, ni la source n'en fournissent.
pub const DEFAULT_FPS: f64 = 30.0;

/// Facteurs d'échelle effectifs d'un passage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scales {
    /// Réduction avant tramage.
    pub downscale: ScaleFactor,
    /// Agrandissement après tramage, dans le pipeline.
    pub upscale: ScaleFactor,
    /// Agrandissement confié à ffmpeg au réassemblage (mode séquence).
    pub transcode: ScaleFactor,
}

/// Charge la config (fichier explicite ou défauts) puis applique les options CLI.
///
/// # Errors
/// Fichier `--config` illisible ou invalide, ou `--fps` non positif.
pub fn resolve_config(cli: &Cli) -> Result<DitherConfig> {
    let mut config = match cli.config {
        Some(ref path) => load_config(path)?,
        None => DitherConfig::default(),
    };

    if let Some(filter) = cli.filter {
        config.filter = filter;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(fps) = cli.fps {
        anyhow::ensure!(
            fps.is_finite() && fps > 0.0,
            "FPS invalide : {fps} (attendu : nombre réel > 0)"
        );
        config.frame_rate = Some(fps);
    }
    config.clamp_all();
    Ok(config)
}

/// Répartit facteur positionnel, options et config selon la variante.
///
/// - image : le facteur positionnel sert à la réduction et à l'agrandissement ;
/// - séquence : il sert à l'agrandissement ffmpeg, la réduction ne vient que
///   de `--downscale` ou de la config ;
/// - flux : il est ignoré.
///
/// `--downscale` / `--upscale` priment sur le facteur positionnel, qui prime
/// sur la config.
#[must_use]
pub fn resolve_scales(mode: Mode, cli: &Cli, config: &DitherConfig) -> Scales {
    let flag_down = cli.downscale.unwrap_or(config.downscale);
    let flag_up = cli.upscale.unwrap_or(config.upscale);
    match mode {
        Mode::Auto | Mode::Image => Scales {
            downscale: cli.downscale.or(cli.scale).unwrap_or(config.downscale),
            upscale: cli.upscale.or(cli.scale).unwrap_or(config.upscale),
            transcode: ScaleFactor::IDENTITY,
        },
        Mode::Sequence => Scales {
            downscale: flag_down,
            upscale: ScaleFactor::IDENTITY,
            transcode: cli.scale.unwrap_or(flag_up),
        },
        Mode::Stream => Scales {
            downscale: flag_down,
            upscale: flag_up,
            transcode: ScaleFactor::IDENTITY,
        },
    }
}

/// FPS de sortie : config (déjà surchargée par `--fps`), puis source, puis 30.
#[must_use]
pub fn resolve_frame_rate(configured: Option<f64>, probed: Option<f64>) -> f64 {
    configured
        .or(probed)
        .filter(|f| f.is_finite() && *f > 0.0)
        .unwrap_or(DEFAULT_FPS)
}

/// Exécute la variante choisie de bout en bout.
///
/// # Errors
/// Échec d'ouverture de l'entrée, de préparation de la sortie, ou du traitement
/// (annulation comprise).
pub fn run(cli: &Cli, mut config: DitherConfig, cancel: Arc<AtomicBool>) -> Result<RunStats> {
    let mode = cli.mode.resolve(&cli.input);
    log::info!("Mode : {mode:?} — {}", cli.input.display());

    match (mode, cli.scale) {
        (Mode::Stream, Some(k)) => {
            log::warn!("Facteur d'échelle {k} ignoré en mode stream (voir --downscale/--upscale)");
        }
        (Mode::Stream, None) | (_, Some(_)) => {}
        (_, None) => log::warn!("Aucun facteur d'échelle fourni, utilisation de 1x"),
    }

    let scales = resolve_scales(mode, cli, &config);
    config.downscale = scales.downscale;
    config.upscale = scales.upscale;
    let processor = FrameProcessor::from_config(&config, cancel);

    match mode {
        Mode::Auto | Mode::Image => {
            let mut source = ImageSource::open(&cli.input)
                .with_context(|| format!("Ouverture de {}", cli.input.display()))?;
            let mut sink = ImageFileSink::new(&cli.output, config.jpeg_quality)?;
            Ok(processor.run(&mut source, &mut sink)?)
        }
        Mode::Sequence => {
            let mut source = open_video(cli, &config)?;
            let settings = TranscodeSettings {
                ffmpeg: config.ffmpeg.clone(),
                frame_rate: resolve_frame_rate(config.frame_rate, source.info().frame_rate),
                upscale: scales.transcode,
                crf: config.crf,
            };
            let mut sink = FrameSequenceSink::new(
                &cli.output,
                config.frame_format,
                config.jpeg_quality,
                settings,
            )?;
            Ok(processor.run(&mut source, &mut sink)?)
        }
        Mode::Stream => {
            let mut source = open_video(cli, &config)?;
            let fps = resolve_frame_rate(config.frame_rate, source.info().frame_rate);
            let mut sink = VideoStreamSink::new(&config.ffmpeg, &cli.output, fps, config.crf);
            Ok(processor.run(&mut source, &mut sink)?)
        }
    }
}

fn open_video(cli: &Cli, config: &DitherConfig) -> Result<VideoSource> {
    VideoSource::open(&config.ffmpeg, &config.ffprobe, &cli.input)
        .with_context(|| format!("Ouverture de la vidéo {}", cli.input.display()))
}
