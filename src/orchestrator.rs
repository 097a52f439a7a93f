use log::{debug, error, info};

use crate::compressor::Compressor;
use crate::config::Settings;
use crate::error::{CompressError, OrchestratorError};
use crate::model::{
    Area, Artifact, CompressionResult, CompressorOptions, LabelKind, PreviewKind, SourceImage,
    UiState,
};
use crate::params::{self, Plan};
use crate::port::{Notice, PresentationPort};
use crate::size::format_file_size;

/// One user action.
#[derive(Debug, Clone)]
pub enum Command {
    SelectFile(SourceImage),
    SetQuality(u8),
    Download,
}

/// A compression that has been dispatched but not yet applied.
#[derive(Debug, Clone)]
pub struct Pending {
    pub seq: u64,
    pub source: SourceImage,
    pub options: CompressorOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// A newer dispatch already landed, or the source was replaced.
    Stale,
}

/// Owns the page state: the current source, the current result and the
/// quality setting. Rendering goes through a [`PresentationPort`].
#[derive(Debug)]
pub struct Orchestrator {
    settings: Settings,
    quality: u8,
    source: Option<SourceImage>,
    result: Option<CompressionResult>,
    next_seq: u64,
    applied_seq: u64,
    // first sequence number issued for the current source
    source_seq: u64,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Orchestrator {
    pub fn new(settings: Settings) -> Self {
        Self {
            quality: settings.initial_quality.min(100),
            settings,
            source: None,
            result: None,
            next_seq: 1,
            applied_seq: 0,
            source_seq: 0,
        }
    }

    /// Pushes the initial quality label.
    pub fn init(&self, port: &mut impl PresentationPort) {
        port.set_label(LabelKind::Quality, &format!("{}%", self.quality));
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    pub fn result(&self) -> Option<&CompressionResult> {
        self.result.as_ref()
    }

    pub fn ui_state(&self) -> UiState {
        UiState::derive(self.source.as_ref(), self.result.as_ref())
    }

    /// Runs a command, returning the compression job it started, if any.
    pub fn handle(
        &mut self,
        command: Command,
        port: &mut impl PresentationPort,
    ) -> Result<Option<Pending>, OrchestratorError> {
        match command {
            Command::SelectFile(file) => self.select_file(file, port),
            Command::SetQuality(percent) => Ok(self.set_quality(percent, port)),
            Command::Download => {
                self.download(port);
                Ok(None)
            }
        }
    }

    /// Runs a command and any compression it starts to completion.
    pub fn dispatch(
        &mut self,
        command: Command,
        port: &mut impl PresentationPort,
        compressor: &impl Compressor,
    ) -> Result<(), OrchestratorError> {
        if let Some(job) = self.handle(command, port)? {
            let outcome = compressor.compress(&job.source, &job.options);
            self.complete(job, outcome, port)?;
        }
        Ok(())
    }

    pub fn select_file(
        &mut self,
        file: SourceImage,
        port: &mut impl PresentationPort,
    ) -> Result<Option<Pending>, OrchestratorError> {
        if !file.is_image() {
            port.notify(Notice::InvalidInputType);
            return Err(OrchestratorError::InvalidInputType {
                media_type: file.media_type,
            });
        }

        info!("selected {} ({}, {} bytes)", file.name, file.media_type, file.size());

        port.set_visible(Area::Controls, true);
        port.set_visible(Area::Preview, true);
        port.set_visible(Area::Download, true);
        port.render_preview(PreviewKind::Original, &file.bytes, &file.media_type);
        port.set_label(LabelKind::OriginalSize, &format_file_size(file.size()));

        // the old result belongs to the old file
        self.result = None;
        port.clear_preview(PreviewKind::Compressed);
        port.set_label(LabelKind::CompressedSize, "");

        self.source_seq = self.next_seq;
        self.source = Some(file.clone());
        Ok(self.compress(file, port))
    }

    pub fn set_quality(&mut self, percent: u8, port: &mut impl PresentationPort) -> Option<Pending> {
        self.quality = percent.min(100);
        port.set_label(LabelKind::Quality, &format!("{}%", self.quality));

        let source = self.source.clone()?;
        self.compress(source, port)
    }

    /// Either settles the result right away (small files) or returns the
    /// job to hand to a compressor.
    pub fn compress(
        &mut self,
        file: SourceImage,
        port: &mut impl PresentationPort,
    ) -> Option<Pending> {
        let seq = self.next_seq;
        self.next_seq += 1;

        match params::plan(&file, self.quality, &self.settings) {
            Plan::Skip => {
                debug!("{} is {} bytes, passing through", file.name, file.size());
                self.applied_seq = seq;
                port.notify(Notice::NoCompressionNeeded);
                self.adopt(CompressionResult::PassThrough(file), port);
                None
            }
            Plan::Compress(options) => {
                debug!("dispatching #{seq} for {} with {:?}", file.name, options);
                Some(Pending {
                    seq,
                    source: file,
                    options,
                })
            }
        }
    }

    /// Applies a finished job. Stale jobs are dropped without touching
    /// anything, failures leave the previous result in place.
    pub fn complete(
        &mut self,
        job: Pending,
        outcome: Result<Artifact, CompressError>,
        port: &mut impl PresentationPort,
    ) -> Result<Completion, OrchestratorError> {
        if job.seq <= self.applied_seq || job.seq < self.source_seq {
            debug!(
                "dropping #{} (applied #{}, source from #{})",
                job.seq, self.applied_seq, self.source_seq
            );
            return Ok(Completion::Stale);
        }
        self.applied_seq = job.seq;

        let artifact = match outcome {
            Ok(artifact) => artifact,
            Err(e) => {
                error!("compression of {} failed: {:?}", job.source.name, e);
                port.notify(Notice::CompressionFailed);
                return Err(OrchestratorError::CompressionFailure(e));
            }
        };

        let result = if artifact.size() >= job.source.size() {
            info!(
                "{} grew to {} bytes (from {}), keeping original",
                job.source.name,
                artifact.size(),
                job.source.size()
            );
            port.notify(Notice::LargerThanOriginal);
            CompressionResult::PassThrough(job.source)
        } else {
            info!(
                "{}: {} -> {} bytes",
                job.source.name,
                job.source.size(),
                artifact.size()
            );
            CompressionResult::Compressed(artifact)
        };

        self.adopt(result, port);
        Ok(Completion::Applied)
    }

    pub fn download(&self, port: &mut impl PresentationPort) {
        let (Some(source), Some(result)) = (&self.source, &self.result) else {
            return;
        };
        port.save(&download_name(&source.name), result.bytes());
    }

    fn adopt(&mut self, result: CompressionResult, port: &mut impl PresentationPort) {
        let media_type = self
            .source
            .as_ref()
            .map(|s| s.media_type.as_str())
            .unwrap_or_default();
        port.render_preview(PreviewKind::Compressed, result.bytes(), media_type);
        port.set_label(LabelKind::CompressedSize, &format_file_size(result.size()));
        self.result = Some(result);
    }
}

pub fn download_name(original: &str) -> String {
    format!("compressed_{original}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::RecordingPort;
    use std::cell::RefCell;

    /// Compressor that replays scripted outcomes and records what it was asked.
    #[derive(Default)]
    struct Scripted {
        outcomes: RefCell<Vec<Result<Artifact, CompressError>>>,
        calls: RefCell<Vec<CompressorOptions>>,
    }

    impl Scripted {
        fn returning(outcome: Result<Artifact, CompressError>) -> Self {
            let s = Self::default();
            s.outcomes.borrow_mut().push(outcome);
            s
        }
    }

    impl Compressor for Scripted {
        fn compress(
            &self,
            _source: &SourceImage,
            options: &CompressorOptions,
        ) -> Result<Artifact, CompressError> {
            self.calls.borrow_mut().push(options.clone());
            self.outcomes.borrow_mut().remove(0)
        }
    }

    fn image(size: usize) -> SourceImage {
        SourceImage::new("cat.jpg", "image/jpeg", vec![7u8; size])
    }

    fn artifact(size: usize) -> Result<Artifact, CompressError> {
        Ok(Artifact {
            bytes: vec![1u8; size],
        })
    }

    #[test]
    fn small_file_passes_through_without_compressor() {
        let mut orchestrator = Orchestrator::default();
        let mut port = RecordingPort::default();
        let compressor = Scripted::default();
        let source = image(51_199);

        orchestrator
            .dispatch(Command::SelectFile(source.clone()), &mut port, &compressor)
            .unwrap();

        assert!(compressor.calls.borrow().is_empty());
        assert_eq!(
            orchestrator.result(),
            Some(&CompressionResult::PassThrough(source.clone()))
        );
        assert_eq!(port.notices, vec![Notice::NoCompressionNeeded]);
        assert_eq!(port.last_preview(PreviewKind::Compressed), Some(&source.bytes[..]));
        assert_eq!(port.last_label(LabelKind::CompressedSize), Some("50 KB"));
    }

    #[test]
    fn large_file_adopts_smaller_artifact() {
        let mut orchestrator = Orchestrator::default();
        let mut port = RecordingPort::default();
        let compressor = Scripted::returning(artifact(500_000));

        orchestrator
            .dispatch(Command::SelectFile(image(2_000_000)), &mut port, &compressor)
            .unwrap();

        let calls = compressor.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].max_size_mb, 1.0);
        assert_eq!(calls[0].quality, 0.6);
        assert_eq!(calls[0].max_width_or_height, 2048);
        assert_eq!(calls[0].file_type, "image/jpeg");

        assert_eq!(orchestrator.result().unwrap().size(), 500_000);
        assert!(port.notices.is_empty());
        assert_eq!(port.last_label(LabelKind::OriginalSize), Some("1.91 MB"));
        assert_eq!(port.last_label(LabelKind::CompressedSize), Some("488.28 KB"));
        assert!(port.is_visible(Area::Controls));
        assert!(port.is_visible(Area::Preview));
        assert!(port.is_visible(Area::Download));
    }

    #[test]
    fn mid_sized_file_gets_half_megabyte_ceiling() {
        let mut orchestrator = Orchestrator::default();
        let mut port = RecordingPort::default();
        let compressor = Scripted::returning(artifact(100));

        orchestrator
            .dispatch(Command::SelectFile(image(51_200)), &mut port, &compressor)
            .unwrap();

        assert_eq!(compressor.calls.borrow()[0].max_size_mb, 0.5);
    }

    #[test]
    fn larger_artifact_is_discarded() {
        let mut orchestrator = Orchestrator::default();
        let mut port = RecordingPort::default();
        let source = image(100_000);
        let compressor = Scripted::returning(artifact(100_000));

        orchestrator
            .dispatch(Command::SelectFile(source.clone()), &mut port, &compressor)
            .unwrap();

        assert_eq!(
            orchestrator.result(),
            Some(&CompressionResult::PassThrough(source))
        );
        assert_eq!(port.notices, vec![Notice::LargerThanOriginal]);
    }

    #[test]
    fn failure_keeps_previous_result() {
        let mut orchestrator = Orchestrator::default();
        let mut port = RecordingPort::default();
        let compressor = Scripted::default();
        compressor.outcomes.borrow_mut().push(artifact(40_000));
        compressor
            .outcomes
            .borrow_mut()
            .push(Err(CompressError::UnsupportedType("image/jpeg".into())));

        orchestrator
            .dispatch(Command::SelectFile(image(100_000)), &mut port, &compressor)
            .unwrap();
        let before = orchestrator.result().cloned();
        let previews_before = port.previews.len();

        let err = orchestrator
            .dispatch(Command::SetQuality(30), &mut port, &compressor)
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::CompressionFailure(_)));
        assert_eq!(orchestrator.result().cloned(), before);
        assert_eq!(port.previews.len(), previews_before);
        assert_eq!(port.notices, vec![Notice::CompressionFailed]);
        assert_eq!(port.last_label(LabelKind::Quality), Some("30%"));
    }

    #[test]
    fn non_image_is_rejected_without_state_change() {
        let mut orchestrator = Orchestrator::default();
        let mut port = RecordingPort::default();
        let compressor = Scripted::default();

        let err = orchestrator
            .dispatch(
                Command::SelectFile(SourceImage::new("notes.txt", "text/plain", vec![0; 10])),
                &mut port,
                &compressor,
            )
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::InvalidInputType { .. }));
        assert_eq!(port.notices, vec![Notice::InvalidInputType]);
        assert!(port.visible.is_empty());
        assert!(orchestrator.source().is_none());
        assert_eq!(orchestrator.ui_state(), UiState::default());
    }

    #[test]
    fn quality_change_without_source_only_updates_label() {
        let mut orchestrator = Orchestrator::default();
        let mut port = RecordingPort::default();
        orchestrator.init(&mut port);
        assert_eq!(port.last_label(LabelKind::Quality), Some("60%"));

        let job = orchestrator.handle(Command::SetQuality(150), &mut port).unwrap();

        assert!(job.is_none());
        assert_eq!(orchestrator.quality(), 100);
        assert_eq!(port.last_label(LabelKind::Quality), Some("100%"));
    }

    #[test]
    fn stale_completion_is_dropped() {
        let mut orchestrator = Orchestrator::default();
        let mut port = RecordingPort::default();

        let first = orchestrator
            .handle(Command::SelectFile(image(200_000)), &mut port)
            .unwrap()
            .unwrap();
        let second = orchestrator
            .handle(Command::SetQuality(20), &mut port)
            .unwrap()
            .unwrap();
        assert!(second.seq > first.seq);
        assert_eq!(second.options.quality, 0.2);

        let applied = orchestrator
            .complete(second, artifact(10_000), &mut port)
            .unwrap();
        let stale = orchestrator
            .complete(first, artifact(90_000), &mut port)
            .unwrap();

        assert_eq!(applied, Completion::Applied);
        assert_eq!(stale, Completion::Stale);
        assert_eq!(orchestrator.result().unwrap().size(), 10_000);
    }

    #[test]
    fn completion_for_replaced_source_is_dropped() {
        let mut orchestrator = Orchestrator::default();
        let mut port = RecordingPort::default();

        let old = orchestrator
            .handle(Command::SelectFile(image(200_000)), &mut port)
            .unwrap()
            .unwrap();
        let replacement = SourceImage::new("dog.png", "image/png", vec![3u8; 300_000]);
        let _new = orchestrator
            .handle(Command::SelectFile(replacement), &mut port)
            .unwrap()
            .unwrap();

        let outcome = orchestrator.complete(old, artifact(1_000), &mut port).unwrap();

        assert_eq!(outcome, Completion::Stale);
        assert!(orchestrator.result().is_none());
    }

    #[test]
    fn small_replacement_beats_slow_large_job() {
        let mut orchestrator = Orchestrator::default();
        let mut port = RecordingPort::default();

        let slow = orchestrator
            .handle(Command::SelectFile(image(200_000)), &mut port)
            .unwrap()
            .unwrap();
        let small = image(1_000);
        assert!(orchestrator
            .handle(Command::SelectFile(small.clone()), &mut port)
            .unwrap()
            .is_none());

        orchestrator.complete(slow, artifact(1), &mut port).unwrap();

        assert_eq!(
            orchestrator.result(),
            Some(&CompressionResult::PassThrough(small))
        );
    }

    #[test]
    fn download_is_named_after_original() {
        let mut orchestrator = Orchestrator::default();
        let mut port = RecordingPort::default();
        orchestrator.download(&mut port);
        assert!(port.saved.is_empty());

        let compressor = Scripted::returning(artifact(60_000));
        orchestrator
            .dispatch(Command::SelectFile(image(80_000)), &mut port, &compressor)
            .unwrap();
        orchestrator
            .dispatch(Command::Download, &mut port, &compressor)
            .unwrap();

        assert_eq!(port.saved.len(), 1);
        assert_eq!(port.saved[0].0, "compressed_cat.jpg");
        assert_eq!(port.saved[0].1, vec![1u8; 60_000]);
    }

    #[test]
    fn new_file_drops_previous_result_even_if_it_fails() {
        let mut orchestrator = Orchestrator::default();
        let mut port = RecordingPort::default();
        let compressor = Scripted::default();
        compressor.outcomes.borrow_mut().push(artifact(900_000));
        compressor
            .outcomes
            .borrow_mut()
            .push(Err(CompressError::UnsupportedType("image/jpeg".into())));

        orchestrator
            .dispatch(Command::SelectFile(image(3_000_000)), &mut port, &compressor)
            .unwrap();
        assert_eq!(orchestrator.result().unwrap().size(), 900_000);

        let small = SourceImage::new("small.jpg", "image/jpeg", vec![9u8; 60_000]);
        let err = orchestrator
            .dispatch(Command::SelectFile(small), &mut port, &compressor)
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::CompressionFailure(_)));

        assert!(orchestrator.result().is_none());
        let ui = orchestrator.ui_state();
        assert_eq!(ui.original_size.as_deref(), Some("58.59 KB"));
        assert_eq!(ui.compressed_size, None);
        assert_eq!(port.last_preview(PreviewKind::Compressed), None);
        assert_eq!(port.last_label(LabelKind::CompressedSize), Some(""));

        orchestrator.download(&mut port);
        assert!(port.saved.is_empty());
    }

    #[test]
    fn non_image_after_load_keeps_everything() {
        let mut orchestrator = Orchestrator::default();
        let mut port = RecordingPort::default();
        let compressor = Scripted::returning(artifact(70_000));
        let source = image(100_000);

        orchestrator
            .dispatch(Command::SelectFile(source.clone()), &mut port, &compressor)
            .unwrap();
        let ui_before = orchestrator.ui_state();
        let result_before = orchestrator.result().cloned();
        let visible_before = port.visible.clone();
        let previews_before = port.previews.len();
        let labels_before = port.labels.len();

        let err = orchestrator
            .dispatch(
                Command::SelectFile(SourceImage::new("notes.txt", "text/plain", vec![0; 10])),
                &mut port,
                &compressor,
            )
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::InvalidInputType { .. }));
        assert_eq!(port.notices, vec![Notice::InvalidInputType]);
        assert_eq!(port.visible, visible_before);
        assert!(port.is_visible(Area::Preview));
        assert_eq!(port.previews.len(), previews_before);
        assert_eq!(port.labels.len(), labels_before);
        assert_eq!(orchestrator.source(), Some(&source));
        assert_eq!(orchestrator.result().cloned(), result_before);
        assert_eq!(orchestrator.ui_state(), ui_before);
    }
}
