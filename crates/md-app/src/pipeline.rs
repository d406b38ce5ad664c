use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use flume::{Receiver, Sender};
use md_core::config::{DitherConfig, DownscaleFilter};
use md_core::error::CoreError;
use md_core::frame::PixelBuffer;
use md_core::scale::ScaleFactor;
use md_core::traits::{FrameSink, FrameSource};
use md_dither::Ditherer;
use md_source::Scaler;

/// Intervalle (en frames) entre deux lignes de progression.
const PROGRESS_EVERY: u64 = 100;

/// Bilan d'un passage complet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunStats {
    /// Frames écrites dans le sink.
    pub frames: u64,
    /// Durée totale, fermeture du sink comprise.
    pub elapsed: Duration,
}

impl RunStats {
    /// Débit moyen en frames par seconde.
    #[must_use]
    pub fn frames_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

/// Transformation complète d'une frame : réduction, tramage, agrandissement.
///
/// Tire les frames d'une [`FrameSource`] et les livre, dans l'ordre, à un
/// [`FrameSink`]. Avec `workers > 1`, plusieurs frames sont traitées en
/// parallèle et un tampon de réordonnancement restitue l'ordre d'entrée.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::AtomicBool;
/// use md_core::config::DitherConfig;
/// use md_core::frame::PixelBuffer;
/// use md_source::Scaler;
/// use md_app::pipeline::FrameProcessor;
///
/// let processor = FrameProcessor::from_config(&DitherConfig::default(), Arc::new(AtomicBool::new(false)));
/// let mut scaler = Scaler::default();
/// let out = processor.process_frame(&mut scaler, PixelBuffer::new(16, 16)).unwrap();
/// assert_eq!(out.pixel(0, 0), (255, 255, 255, 255));
/// assert_eq!(out.pixel(1, 0), (0, 0, 0, 255));
/// ```
#[derive(Clone, Debug)]
pub struct FrameProcessor {
    ditherer: Ditherer,
    pre: ScaleFactor,
    post: ScaleFactor,
    filter: DownscaleFilter,
    workers: usize,
    queue_depth: usize,
    cancel: Arc<AtomicBool>,
}

impl FrameProcessor {
    /// Construit un processeur depuis la config (échelles, filtre, parallélisme).
    #[must_use]
    pub fn from_config(config: &DitherConfig, cancel: Arc<AtomicBool>) -> Self {
        Self {
            ditherer: Ditherer::new(),
            pre: config.downscale,
            post: config.upscale,
            filter: config.filter,
            workers: config.workers.max(1),
            queue_depth: config.queue_depth.max(config.workers).max(1),
            cancel,
        }
    }

    /// Facteur de réduction avant tramage.
    #[must_use]
    pub fn downscale(&self) -> ScaleFactor {
        self.pre
    }

    /// Facteur d'agrandissement après tramage.
    #[must_use]
    pub fn upscale(&self) -> ScaleFactor {
        self.post
    }

    /// Traite une seule frame.
    ///
    /// # Errors
    /// Propage les erreurs de resampling et de forme de buffer.
    pub fn process_frame(
        &self,
        scaler: &mut Scaler,
        frame: PixelBuffer,
    ) -> Result<PixelBuffer, CoreError> {
        let small = scaler.downscale(frame, self.pre)?;
        let dithered = self.ditherer.process_owned(small)?;
        scaler.upscale(dithered, self.post)
    }

    /// Traite toute la source puis ferme le sink.
    ///
    /// En cas d'erreur ou d'annulation, le sink est abandonné (`abort`) au lieu
    /// d'être fermé ; un échec de ce nettoyage est journalisé et l'erreur
    /// d'origine est retournée.
    ///
    /// # Errors
    /// [`CoreError::Cancelled`] si le drapeau d'annulation a été levé, sinon la
    /// première erreur de la source, du traitement ou du sink.
    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
    ) -> Result<RunStats, CoreError> {
        let start = Instant::now();
        let estimated = source.info().frame_count;
        log::info!(
            "Traitement : ×1/{} → trame → ×{} ({} worker(s))",
            self.downscale(),
            self.upscale(),
            self.workers
        );

        let outcome = if self.workers <= 1 {
            self.run_sequential(source, sink, estimated)
        } else {
            self.run_parallel(source, sink, estimated)
        };

        match outcome.and_then(|frames| sink.close().map(|()| frames)) {
            Ok(frames) => {
                let stats = RunStats {
                    frames,
                    elapsed: start.elapsed(),
                };
                log::info!(
                    "{frames} frame(s) en {:.2}s ({:.1} fps)",
                    stats.elapsed.as_secs_f64(),
                    stats.frames_per_second()
                );
                Ok(stats)
            }
            Err(e) => {
                log::warn!("Interruption du traitement : {e}");
                if let Err(cleanup) = sink.abort() {
                    log::error!("Nettoyage de la sortie impossible : {cleanup}");
                }
                Err(e)
            }
        }
    }

    fn check_cancel(&self, frames: u64) -> Result<(), CoreError> {
        if self.cancel.load(Ordering::Relaxed) {
            Err(CoreError::Cancelled { frames })
        } else {
            Ok(())
        }
    }

    fn run_sequential(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        estimated: Option<u64>,
    ) -> Result<u64, CoreError> {
        let mut scaler = Scaler::new(self.filter);
        let mut frames = 0u64;
        loop {
            self.check_cancel(frames)?;
            if !source.has_next() {
                break;
            }
            let frame = source.next_frame()?;
            let out = self.process_frame(&mut scaler, frame)?;
            sink.submit(out)?;
            frames += 1;
            report_progress(frames, estimated);
        }
        Ok(frames)
    }

    /// Lecteur → workers → réordonnancement sur le thread appelant.
    ///
    /// Un jeton de `credits` est pris avant chaque lecture et rendu après
    /// l'écriture dans le sink : au plus `queue_depth` frames sont en vol.
    fn run_parallel(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        estimated: Option<u64>,
    ) -> Result<u64, CoreError> {
        let (job_tx, job_rx) = flume::bounded::<(u64, PixelBuffer)>(self.queue_depth);
        let (done_tx, done_rx) =
            flume::bounded::<(u64, Result<PixelBuffer, CoreError>)>(self.queue_depth);
        let (credit_tx, credit_rx) = flume::bounded::<()>(self.queue_depth);
        for _ in 0..self.queue_depth {
            credit_tx
                .send(())
                .map_err(|e| CoreError::Sink(format!("file de travail: {e}")))?;
        }

        thread::scope(|scope| {
            let reader_done = done_tx.clone();
            thread::Builder::new()
                .name("md-reader".to_string())
                .spawn_scoped(scope, move || {
                    self.read_frames(source, &job_tx, &reader_done, &credit_rx);
                })
                .map_err(|e| CoreError::Sink(format!("thread lecteur: {e}")))?;

            for i in 0..self.workers {
                let jobs = job_rx.clone();
                let done = done_tx.clone();
                thread::Builder::new()
                    .name(format!("md-worker-{i}"))
                    .spawn_scoped(scope, move || self.work(&jobs, &done))
                    .map_err(|e| CoreError::Sink(format!("thread worker: {e}")))?;
            }
            drop(job_rx);
            drop(done_tx);

            // Les extrémités restantes sont libérées au retour : lecteur et
            // workers voient leurs canaux fermés et s'arrêtent.
            self.reorder(done_rx, credit_tx, sink, estimated)
        })
    }

    fn read_frames(
        &self,
        source: &mut dyn FrameSource,
        jobs: &Sender<(u64, PixelBuffer)>,
        done: &Sender<(u64, Result<PixelBuffer, CoreError>)>,
        credits: &Receiver<()>,
    ) {
        let mut index = 0u64;
        loop {
            if credits.recv().is_err() || self.cancel.load(Ordering::Relaxed) {
                break;
            }
            if !source.has_next() {
                break;
            }
            match source.next_frame() {
                Ok(frame) => {
                    if jobs.send((index, frame)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = done.send((index, Err(e)));
                    break;
                }
            }
            index += 1;
        }
        log::debug!("Lecteur terminé après {index} frame(s)");
    }

    fn work(
        &self,
        jobs: &Receiver<(u64, PixelBuffer)>,
        done: &Sender<(u64, Result<PixelBuffer, CoreError>)>,
    ) {
        let mut scaler = Scaler::new(self.filter);
        for (index, frame) in jobs.iter() {
            let out = self.process_frame(&mut scaler, frame);
            if done.send((index, out)).is_err() {
                break;
            }
        }
    }

    fn reorder(
        &self,
        done: Receiver<(u64, Result<PixelBuffer, CoreError>)>,
        credits: Sender<()>,
        sink: &mut dyn FrameSink,
        estimated: Option<u64>,
    ) -> Result<u64, CoreError> {
        let mut pending: BTreeMap<u64, PixelBuffer> = BTreeMap::new();
        let mut next = 0u64;

        for (index, result) in done.iter() {
            self.check_cancel(next)?;
            pending.insert(index, result?);

            while let Some(frame) = pending.remove(&next) {
                sink.submit(frame)?;
                next += 1;
                report_progress(next, estimated);
                let _ = credits.send(());
            }
        }

        self.check_cancel(next)?;
        if !pending.is_empty() {
            return Err(CoreError::Sink(format!(
                "{} frame(s) orphelines après la frame {next}",
                pending.len()
            )));
        }
        Ok(next)
    }
}

fn report_progress(done: u64, estimated: Option<u64>) {
    if !done.is_multiple_of(PROGRESS_EVERY) {
        return;
    }
    match estimated {
        Some(total) if total > 0 => {
            let pct = (done as f64 / total as f64 * 100.0).min(100.0);
            log::info!("{done}/{total} frames ({pct:.0}%)");
        }
        _ => log::info!("{done} frames"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use md_core::traits::SourceInfo;
    use std::sync::Mutex;

    /// Source en mémoire : frame `i` remplie du gris `i`.
    struct Counting {
        remaining: Vec<PixelBuffer>,
        fail_at: Option<usize>,
        read: usize,
        cancel_after: Option<(usize, Arc<AtomicBool>)>,
    }

    impl Counting {
        fn new(count: usize, width: u32, height: u32) -> Self {
            let mut remaining: Vec<PixelBuffer> = (0..count)
                .map(|i| {
                    let v = (i * 255 / count.max(1)) as u8;
                    PixelBuffer::filled(width, height, (v, v, v))
                })
                .collect();
            remaining.reverse();
            Self {
                remaining,
                fail_at: None,
                read: 0,
                cancel_after: None,
            }
        }
    }

    impl FrameSource for Counting {
        fn has_next(&mut self) -> bool {
            !self.remaining.is_empty()
        }

        fn next_frame(&mut self) -> Result<PixelBuffer, CoreError> {
            if self.fail_at == Some(self.read) {
                return Err(CoreError::Decode("frame corrompue".to_string()));
            }
            self.read += 1;
            if let Some((n, flag)) = &self.cancel_after
                && self.read >= *n
            {
                flag.store(true, Ordering::Relaxed);
            }
            self.remaining
                .pop()
                .ok_or_else(|| CoreError::Decode("épuisée".to_string()))
        }

        fn info(&self) -> SourceInfo {
            SourceInfo {
                frame_count: Some(self.remaining.len() as u64),
                ..SourceInfo::default()
            }
        }
    }

    #[derive(Default)]
    struct Collect {
        frames: Arc<Mutex<Vec<PixelBuffer>>>,
        closed: bool,
        aborted: bool,
    }

    impl FrameSink for Collect {
        fn submit(&mut self, frame: PixelBuffer) -> Result<(), CoreError> {
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }

        fn close(&mut self) -> Result<(), CoreError> {
            self.closed = true;
            Ok(())
        }

        fn abort(&mut self) -> Result<(), CoreError> {
            self.aborted = true;
            self.frames.lock().unwrap().clear();
            Ok(())
        }
    }

    fn processor(workers: usize, pre: f64, post: f64) -> (FrameProcessor, Arc<AtomicBool>) {
        let config = DitherConfig {
            downscale: ScaleFactor::new(pre).unwrap(),
            upscale: ScaleFactor::new(post).unwrap(),
            workers,
            queue_depth: workers * 2,
            ..DitherConfig::default()
        };
        let cancel = Arc::new(AtomicBool::new(false));
        (FrameProcessor::from_config(&config, Arc::clone(&cancel)), cancel)
    }

    fn expected(count: usize, width: u32, height: u32) -> Vec<PixelBuffer> {
        let ditherer = Ditherer::new();
        let mut source = Counting::new(count, width, height);
        (0..count)
            .map(|_| ditherer.process_owned(source.next_frame().unwrap()).unwrap())
            .collect()
    }

    #[test]
    fn sequential_and_parallel_agree_and_keep_order() {
        let reference = expected(37, 20, 12);
        for workers in [1, 4] {
            let (p, _) = processor(workers, 1.0, 1.0);
            let mut source = Counting::new(37, 20, 12);
            let mut sink = Collect::default();
            let stats = p.run(&mut source, &mut sink).unwrap();
            assert_eq!(stats.frames, 37);
            assert!(sink.closed && !sink.aborted);
            assert_eq!(*sink.frames.lock().unwrap(), reference, "workers={workers}");
        }
    }

    #[test]
    fn scales_are_applied_around_dither() {
        let (p, _) = processor(2, 3.0, 3.0);
        assert_eq!(p.downscale().get(), 3.0);
        assert_eq!(p.upscale().get(), 3.0);
        let mut source = Counting::new(3, 101, 50);
        let mut sink = Collect::default();
        p.run(&mut source, &mut sink).unwrap();
        for frame in sink.frames.lock().unwrap().iter() {
            assert_eq!((frame.width, frame.height), (99, 48));
            assert!(frame.data.iter().all(|&b| b == 0 || b == 255));
        }
    }

    #[test]
    fn source_error_aborts_sink() {
        for workers in [1, 3] {
            let (p, _) = processor(workers, 1.0, 1.0);
            let mut source = Counting::new(10, 8, 8);
            source.fail_at = Some(5);
            let mut sink = Collect::default();
            let err = p.run(&mut source, &mut sink);
            assert!(matches!(err, Err(CoreError::Decode(_))), "workers={workers}");
            assert!(sink.aborted && !sink.closed);
        }
    }

    #[test]
    fn cancellation_stops_and_aborts() {
        for workers in [1, 4] {
            let (p, cancel) = processor(workers, 1.0, 1.0);
            let mut source = Counting::new(500, 8, 8);
            source.cancel_after = Some((3, Arc::clone(&cancel)));
            let mut sink = Collect::default();
            let err = p.run(&mut source, &mut sink);
            assert!(
                matches!(err, Err(CoreError::Cancelled { .. })),
                "workers={workers}: {err:?}"
            );
            assert!(sink.aborted && !sink.closed);
            assert!(source.read < 500);
        }
    }

    #[test]
    fn collapsed_downscale_is_an_error() {
        let (p, _) = processor(1, 8.0, 1.0);
        let mut source = Counting::new(1, 4, 4);
        let mut sink = Collect::default();
        assert!(matches!(
            p.run(&mut source, &mut sink),
            Err(CoreError::InvalidDimensions { .. })
        ));
        assert!(sink.aborted);
    }

    #[test]
    fn empty_source_closes_sink() {
        let (p, _) = processor(4, 1.0, 1.0);
        let mut source = Counting::new(0, 4, 4);
        let mut sink = Collect::default();
        let stats = p.run(&mut source, &mut sink).unwrap();
        assert_eq!(stats.frames, 0);
        assert!(sink.closed);
    }
}
