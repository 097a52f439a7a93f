use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use log::debug;

use crate::compressor::Compressor;
use crate::error::{CompressError, OrchestratorError};
use crate::model::Artifact;
use crate::orchestrator::{Completion, Orchestrator, Pending};
use crate::port::PresentationPort;

pub struct Finished {
    pub job: Pending,
    pub outcome: Result<Artifact, CompressError>,
}

/// Runs compression jobs on the rayon pool so the interactive side keeps
/// going. Completions come back in whatever order they finish; the
/// orchestrator decides which ones still matter.
pub struct BackgroundCompressor<C> {
    compressor: Arc<C>,
    tx: Sender<Finished>,
    rx: Receiver<Finished>,
    in_flight: usize,
}

impl<C> BackgroundCompressor<C>
where
    C: Compressor + Send + Sync + 'static,
{
    pub fn new(compressor: C) -> Self {
        let (tx, rx) = channel();
        Self {
            compressor: Arc::new(compressor),
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn submit(&mut self, job: Pending) {
        debug!("submitting #{} to the background pool", job.seq);
        let compressor = Arc::clone(&self.compressor);
        let tx = self.tx.clone();
        self.in_flight += 1;
        rayon::spawn(move || {
            let outcome = compressor.compress(&job.source, &job.options);
            // receiver lives as long as self; a send error means we were dropped
            let _ = tx.send(Finished { job, outcome });
        });
    }

    /// Non-blocking.
    pub fn try_next(&mut self) -> Option<Finished> {
        let finished = self.rx.try_recv().ok()?;
        self.in_flight -= 1;
        Some(finished)
    }

    /// Blocks until a job finishes. `None` when nothing is in flight.
    pub fn next(&mut self) -> Option<Finished> {
        if self.in_flight == 0 {
            return None;
        }
        let finished = self.rx.recv().ok()?;
        self.in_flight -= 1;
        Some(finished)
    }

    /// Applies every completion that is ready right now.
    pub fn drain(
        &mut self,
        orchestrator: &mut Orchestrator,
        port: &mut impl PresentationPort,
    ) -> Vec<Result<Completion, OrchestratorError>> {
        let mut applied = Vec::new();
        while let Some(done) = self.try_next() {
            applied.push(orchestrator.complete(done.job, done.outcome, port));
        }
        applied
    }

    /// Applies completions until nothing is left in flight.
    pub fn wait_all(
        &mut self,
        orchestrator: &mut Orchestrator,
        port: &mut impl PresentationPort,
    ) -> Vec<Result<Completion, OrchestratorError>> {
        let mut applied = Vec::new();
        while let Some(done) = self.next() {
            applied.push(orchestrator.complete(done.job, done.outcome, port));
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompressorOptions, SourceImage};
    use crate::orchestrator::Command;
    use crate::port::RecordingPort;
    use std::thread;
    use std::time::Duration;

    /// Higher quality takes longer and yields a bigger artifact.
    struct Slow;

    impl Compressor for Slow {
        fn compress(
            &self,
            _source: &SourceImage,
            options: &CompressorOptions,
        ) -> Result<Artifact, CompressError> {
            let percent = options.encoder_quality();
            thread::sleep(Duration::from_millis(u64::from(percent) * 3));
            Ok(Artifact {
                bytes: vec![0u8; usize::from(percent) * 1000],
            })
        }
    }

    #[test]
    fn latest_dispatch_wins_regardless_of_finish_order() {
        let mut orchestrator = Orchestrator::default();
        let mut port = RecordingPort::default();
        let mut background = BackgroundCompressor::new(Slow);

        let source = SourceImage::new("big.jpg", "image/jpeg", vec![0u8; 200_000]);
        let first = orchestrator
            .handle(Command::SelectFile(source), &mut port)
            .unwrap()
            .unwrap();
        background.submit(first);
        let second = orchestrator
            .handle(Command::SetQuality(10), &mut port)
            .unwrap()
            .unwrap();
        background.submit(second);
        assert_eq!(background.in_flight(), 2);

        let outcomes = background.wait_all(&mut orchestrator, &mut port);

        assert_eq!(outcomes.len(), 2);
        assert_eq!(background.in_flight(), 0);
        assert_eq!(orchestrator.result().unwrap().size(), 10_000);
        assert!(background.next().is_none());
    }

    #[test]
    fn drain_without_work_is_empty() {
        let mut orchestrator = Orchestrator::default();
        let mut port = RecordingPort::default();
        let mut background = BackgroundCompressor::new(Slow);
        assert!(background.drain(&mut orchestrator, &mut port).is_empty());
    }
}
