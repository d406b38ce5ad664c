use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};

use md_core::error::CoreError;
use md_core::frame::PixelBuffer;
use md_core::traits::FrameSink;

/// Arguments ffmpeg : RGBA brut sur stdin → `output` en x264 RGB.
///
/// `-pix_fmt rgb24` et `-color_range pc` évitent tout sous-échantillonnage
/// chroma : le noir et blanc reste strictement binaire avec `crf = 0`.
#[must_use]
pub fn stream_args(width: u32, height: u32, frame_rate: f64, crf: u8, output: &str) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-vcodec".to_string(),
        "rawvideo".to_string(),
        "-s".to_string(),
        format!("{width}x{height}"),
        "-pix_fmt".to_string(),
        "rgba".to_string(),
        "-r".to_string(),
        format!("{frame_rate}"),
        "-i".to_string(),
        "-".to_string(),
        "-c:v".to_string(),
        "libx264rgb".to_string(),
        "-crf".to_string(),
        crf.to_string(),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "-color_range".to_string(),
        "pc".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        output.to_string(),
    ]
}

/// Lit `reader` jusqu'à EOF sur un thread dédié.
///
/// Le pipe stderr de l'encodeur est vidé en continu : s'il se remplissait,
/// ffmpeg bloquerait et `write_all` sur stdin avec lui.
fn drain<R: Read + Send + 'static>(mut reader: R) -> std::io::Result<JoinHandle<String>> {
    thread::Builder::new()
        .name("md-encoder-stderr".into())
        .spawn(move || {
            let mut buf = Vec::new();
            let _ = reader.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
}

/// Encode les frames au fil de l'eau dans un conteneur vidéo via ffmpeg.
///
/// L'encodeur est lancé à la première frame, dont il prend les dimensions.
/// Toutes les frames suivantes doivent avoir la même taille.
pub struct VideoStreamSink {
    ffmpeg: String,
    output: PathBuf,
    frame_rate: f64,
    crf: u8,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<String>>,
    dims: Option<(u32, u32)>,
    count: u64,
}

impl VideoStreamSink {
    /// Prépare l'encodage vers `output`. Aucun processus n'est lancé ici.
    #[must_use]
    pub fn new(ffmpeg: &str, output: &Path, frame_rate: f64, crf: u8) -> Self {
        Self {
            ffmpeg: ffmpeg.to_string(),
            output: output.to_path_buf(),
            frame_rate,
            crf,
            child: None,
            stdin: None,
            stderr: None,
            dims: None,
            count: 0,
        }
    }

    /// Frames envoyées à l'encodeur.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.count
    }

    fn spawn(&mut self, width: u32, height: u32) -> Result<(), CoreError> {
        let output = self
            .output
            .to_str()
            .ok_or_else(|| CoreError::Sink("chemin de sortie non-UTF8".to_string()))?;
        let mut child = Command::new(&self.ffmpeg)
            .args(stream_args(width, height, self.frame_rate, self.crf, output))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CoreError::Sink(format!(
                    "impossible de lancer l'encodeur {} ({e}). Est-il dans PATH ?",
                    self.ffmpeg
                ))
            })?;
        log::debug!(
            "Encodeur spawné : {width}x{height} @ {}fps → {}",
            self.frame_rate,
            self.output.display()
        );
        self.stdin = child.stdin.take();
        if let Some(err) = child.stderr.take() {
            match drain(err) {
                Ok(handle) => self.stderr = Some(handle),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CoreError::Sink(format!("thread stderr de l'encodeur: {e}")));
                }
            }
        }
        self.child = Some(child);
        self.dims = Some((width, height));
        Ok(())
    }

    fn kill(&mut self) {
        self.stdin = None;
        if let Some(mut c) = self.child.take() {
            let _ = c.kill();
            let _ = c.wait();
        }
        let _ = self.collect_stderr();
    }

    fn collect_stderr(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default()
    }
}

impl FrameSink for VideoStreamSink {
    fn submit(&mut self, frame: PixelBuffer) -> Result<(), CoreError> {
        frame.check_shape()?;
        match self.dims {
            None => self.spawn(frame.width, frame.height)?,
            Some((w, h)) if (w, h) != (frame.width, frame.height) => {
                return Err(CoreError::Sink(format!(
                    "frame {}x{} dans un flux {w}x{h}",
                    frame.width, frame.height
                )));
            }
            Some(_) => {}
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| CoreError::Sink("encodeur déjà fermé".to_string()))?;
        stdin.write_all(&frame.data).map_err(|e| {
            CoreError::Sink(format!(
                "écriture vers l'encodeur après {} frame(s): {e}",
                self.count
            ))
        })?;
        self.count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), CoreError> {
        // Fermer stdin signale la fin du flux à ffmpeg.
        self.stdin = None;
        let Some(mut child) = self.child.take() else {
            return Err(CoreError::Sink(format!(
                "aucune frame encodée dans {}",
                self.output.display()
            )));
        };
        let status = child
            .wait()
            .map_err(|e| CoreError::Sink(format!("attente de l'encodeur: {e}")))?;
        let stderr = self.collect_stderr();
        if !status.success() {
            return Err(CoreError::Sink(format!(
                "encodeur ffmpeg en erreur ({status}): {}",
                stderr.trim()
            )));
        }
        log::info!(
            "Vidéo encodée : {} frame(s) — {}",
            self.count,
            self.output.display()
        );
        Ok(())
    }

    fn abort(&mut self) -> Result<(), CoreError> {
        self.kill();
        if self.count > 0 && self.output.exists() {
            std::fs::remove_file(&self.output).map_err(|e| {
                CoreError::Sink(format!("suppression de {}: {e}", self.output.display()))
            })?;
        }
        log::info!("Encodage abandonné après {} frame(s)", self.count);
        Ok(())
    }
}

impl Drop for VideoStreamSink {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_args_describe_raw_rgba_input() {
        let args = stream_args(640, 360, 29.97, 0, "out.mp4");
        let at = |flag: &str| {
            let i = args.iter().position(|a| a == flag).unwrap();
            args[i + 1].clone()
        };
        assert_eq!(at("-s"), "640x360");
        assert_eq!(at("-pix_fmt"), "rgba");
        assert_eq!(at("-r"), "29.97");
        assert_eq!(at("-c:v"), "libx264rgb");
        assert_eq!(at("-crf"), "0");
        assert!(args.windows(2).any(|w| w[0] == "-pix_fmt" && w[1] == "rgb24"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn stderr_drain_reads_past_pipe_capacity() {
        let noise = vec![b'e'; 1 << 20];
        let out = drain(std::io::Cursor::new(noise)).unwrap().join().unwrap();
        assert_eq!(out.len(), 1 << 20);
        assert!(out.bytes().all(|b| b == b'e'));
    }

    #[test]
    fn close_without_frames_is_an_error() {
        let mut sink = VideoStreamSink::new("ffmpeg", Path::new("never.mp4"), 24.0, 0);
        assert!(matches!(sink.close(), Err(CoreError::Sink(_))));
        assert!(sink.abort().is_ok());
    }

    #[test]
    fn missing_encoder_fails_on_first_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = VideoStreamSink::new(
            "monodither-no-such-ffmpeg",
            &dir.path().join("o.mp4"),
            24.0,
            0,
        );
        let err = sink.submit(PixelBuffer::new(4, 4));
        assert!(matches!(err, Err(CoreError::Sink(_))));
        assert_eq!(sink.frame_count(), 0);
    }

    #[test]
    fn malformed_frame_is_rejected_before_spawn() {
        let mut sink = VideoStreamSink::new("ffmpeg", Path::new("x.mp4"), 24.0, 0);
        let bad = PixelBuffer {
            data: vec![0; 7],
            width: 2,
            height: 1,
        };
        assert!(matches!(
            sink.submit(bad),
            Err(CoreError::InvalidBufferShape { .. })
        ));
    }
}
