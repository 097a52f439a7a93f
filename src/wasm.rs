//! Browser bindings. The page keeps its own DOM wiring and asks this
//! module for decisions, bytes and labels.
//!
//! `selectFile` and `setQuality` compress inline and block the calling
//! thread, so only use them when the module is loaded in a Worker. From the
//! page's main thread use the job API instead: `startSelect`/`startQuality`
//! return a `CompressionJob`, a Worker runs `runCompression` on its bytes and
//! options, and the page reports back with `finish` or `fail`.

use std::collections::HashMap;

use wasm_bindgen::prelude::*;

use crate::compressor::{Compressor, ImageCompressor};
use crate::config::Settings;
use crate::error::{CompressError, OrchestratorError};
use crate::model::{Area, Artifact, CompressorOptions, LabelKind, PreviewKind, SourceImage};
use crate::orchestrator::{download_name, Command, Completion, Orchestrator, Pending};
use crate::params;
use crate::port::{Notice, PresentationPort};

fn to_js(e: OrchestratorError) -> JsError {
    web_sys::console::error_1(&format!("{:?}", e).into());
    JsError::new(&e.to_string())
}

fn options_to_json(options: &CompressorOptions) -> Result<String, serde_json::Error> {
    serde_json::to_string(options)
}

fn compress_with(bytes: Vec<u8>, options: &CompressorOptions) -> Result<Artifact, CompressError> {
    let source = SourceImage::new("job", options.file_type.clone(), bytes);
    ImageCompressor::default().compress(&source, options)
}

#[wasm_bindgen(js_name = formatFileSize)]
pub fn format_file_size(bytes: f64) -> String {
    crate::size::format_file_size(bytes.max(0.0) as u64)
}

/// Option object the page would hand to its compression library, as JSON.
#[wasm_bindgen(js_name = deriveOptions)]
pub fn derive_options(size: f64, media_type: &str, quality: u8) -> Result<String, JsError> {
    let options = params::derive_options(size as u64, media_type, quality, &Settings::default());
    options_to_json(&options).map_err(|e| JsError::new(&format!("{}", e)))
}

/// Worker side of the job API: compresses `bytes` with a job's options.
#[wasm_bindgen(js_name = runCompression)]
pub fn run_compression(bytes: Vec<u8>, options_json: &str) -> Result<Vec<u8>, JsError> {
    let options: CompressorOptions = serde_json::from_str(options_json)
        .map_err(|e| JsError::new(&format!("bad options: {}", e)))?;
    compress_with(bytes, &options)
        .map(|artifact| artifact.bytes)
        .map_err(|e| JsError::new(&e.to_string()))
}

/// One-shot: runs the full decision procedure for a single file and
/// returns whatever ends up as the result.
#[wasm_bindgen(js_name = compressImage)]
pub fn compress_image(input: &[u8], media_type: &str, quality: u8) -> Result<Vec<u8>, JsError> {
    let mut page = WasmCompressor::new();
    page.set_quality(quality)?;
    page.select_file("image", media_type, input.to_vec())?;
    page.compressed_bytes()
        .ok_or_else(|| JsError::new("no compression result"))
}

/// Keeps only the latest label and visibility per kind, so a long session
/// does not pile up copies. Previews are not kept at all: the page already
/// has the original and reads the result through `compressedBytes`.
#[derive(Debug, Default)]
struct PagePort {
    labels: HashMap<LabelKind, String>,
    visible: HashMap<Area, bool>,
    notices: Vec<Notice>,
    saved: Option<(String, Vec<u8>)>,
}

impl PresentationPort for PagePort {
    fn render_preview(&mut self, _kind: PreviewKind, _bytes: &[u8], _media_type: &str) {}

    fn clear_preview(&mut self, _kind: PreviewKind) {}

    fn set_label(&mut self, kind: LabelKind, text: &str) {
        self.labels.insert(kind, text.to_string());
    }

    fn set_visible(&mut self, area: Area, visible: bool) {
        self.visible.insert(area, visible);
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    fn save(&mut self, file_name: &str, bytes: &[u8]) {
        self.saved = Some((file_name.to_string(), bytes.to_vec()));
    }
}

/// A compression waiting to be run off the main thread.
#[wasm_bindgen]
pub struct CompressionJob {
    seq: u64,
    bytes: Vec<u8>,
    options: CompressorOptions,
}

#[wasm_bindgen]
impl CompressionJob {
    #[wasm_bindgen(getter)]
    pub fn seq(&self) -> f64 {
        self.seq as f64
    }

    #[wasm_bindgen(getter)]
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    #[wasm_bindgen(js_name = optionsJson)]
    pub fn options_json(&self) -> Result<String, JsError> {
        options_to_json(&self.options).map_err(|e| JsError::new(&format!("{}", e)))
    }
}

/// Orchestrator state for one page.
#[wasm_bindgen]
pub struct WasmCompressor {
    orchestrator: Orchestrator,
    port: PagePort,
    compressor: ImageCompressor,
    jobs: HashMap<u64, Pending>,
}

impl WasmCompressor {
    fn run(&mut self, command: Command) -> Result<(), OrchestratorError> {
        self.orchestrator
            .dispatch(command, &mut self.port, &self.compressor)
    }

    fn start(&mut self, command: Command) -> Result<Option<CompressionJob>, OrchestratorError> {
        let Some(pending) = self.orchestrator.handle(command, &mut self.port)? else {
            return Ok(None);
        };
        let job = CompressionJob {
            seq: pending.seq,
            bytes: pending.source.bytes.to_vec(),
            options: pending.options.clone(),
        };
        self.jobs.insert(pending.seq, pending);
        Ok(Some(job))
    }

    fn settle(
        &mut self,
        seq: u64,
        outcome: Result<Artifact, CompressError>,
    ) -> Result<Completion, OrchestratorError> {
        let Some(job) = self.jobs.remove(&seq) else {
            return Ok(Completion::Stale);
        };
        // anything older can no longer land
        self.jobs.retain(|s, _| *s > seq);
        self.orchestrator.complete(job, outcome, &mut self.port)
    }
}

#[wasm_bindgen]
impl WasmCompressor {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmCompressor {
        let orchestrator = Orchestrator::default();
        let mut port = PagePort::default();
        orchestrator.init(&mut port);
        WasmCompressor {
            orchestrator,
            port,
            compressor: ImageCompressor::default(),
            jobs: HashMap::new(),
        }
    }

    /// Blocks while compressing; see the module docs.
    #[wasm_bindgen(js_name = selectFile)]
    pub fn select_file(&mut self, name: &str, media_type: &str, bytes: Vec<u8>) -> Result<(), JsError> {
        let file = SourceImage::new(name, media_type, bytes);
        self.run(Command::SelectFile(file)).map_err(to_js)
    }

    /// Blocks while compressing; see the module docs.
    #[wasm_bindgen(js_name = setQuality)]
    pub fn set_quality(&mut self, percent: u8) -> Result<(), JsError> {
        self.run(Command::SetQuality(percent)).map_err(to_js)
    }

    #[wasm_bindgen(js_name = startSelect)]
    pub fn start_select(
        &mut self,
        name: &str,
        media_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Option<CompressionJob>, JsError> {
        let file = SourceImage::new(name, media_type, bytes);
        self.start(Command::SelectFile(file)).map_err(to_js)
    }

    #[wasm_bindgen(js_name = startQuality)]
    pub fn start_quality(&mut self, percent: u8) -> Result<Option<CompressionJob>, JsError> {
        self.start(Command::SetQuality(percent)).map_err(to_js)
    }

    /// Hands back a job's output. `false` when the job was outdated.
    pub fn finish(&mut self, seq: f64, bytes: Vec<u8>) -> Result<bool, JsError> {
        let completion = self
            .settle(seq as u64, Ok(Artifact { bytes }))
            .map_err(to_js)?;
        Ok(completion == Completion::Applied)
    }

    /// Reports a failed job. The failure notice shows up in `takeNotices`.
    pub fn fail(&mut self, seq: f64, message: String) {
        if let Err(e) = self.settle(seq as u64, Err(CompressError::External(message))) {
            log::debug!("{}", e);
        }
    }

    /// Bytes to save; pair with `downloadName`.
    pub fn download(&mut self) -> Option<Vec<u8>> {
        self.orchestrator.download(&mut self.port);
        self.port.saved.take().map(|(_, bytes)| bytes)
    }

    #[wasm_bindgen(js_name = downloadName)]
    pub fn download_name(&self) -> Option<String> {
        self.orchestrator.source().map(|s| download_name(&s.name))
    }

    #[wasm_bindgen(js_name = compressedBytes)]
    pub fn compressed_bytes(&self) -> Option<Vec<u8>> {
        self.orchestrator.result().map(|r| r.bytes().to_vec())
    }

    #[wasm_bindgen(js_name = originalSizeLabel)]
    pub fn original_size_label(&self) -> Option<String> {
        self.orchestrator.ui_state().original_size
    }

    #[wasm_bindgen(js_name = compressedSizeLabel)]
    pub fn compressed_size_label(&self) -> Option<String> {
        self.orchestrator.ui_state().compressed_size
    }

    #[wasm_bindgen(js_name = qualityLabel)]
    pub fn quality_label(&self) -> Option<String> {
        self.port.labels.get(&LabelKind::Quality).cloned()
    }

    /// Pending user messages, oldest first. Clears the queue.
    #[wasm_bindgen(js_name = takeNotices)]
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.port.notices)
            .into_iter()
            .map(|n| n.to_string())
            .collect()
    }

    #[wasm_bindgen(getter, js_name = controlsVisible)]
    pub fn controls_visible(&self) -> bool {
        self.port
            .visible
            .get(&Area::Controls)
            .copied()
            .unwrap_or(false)
    }
}

impl Default for WasmCompressor {
    fn default() -> Self {
        Self::new()
    }
}
