use std::fmt;

use crate::model::{Area, LabelKind, PreviewKind};

/// User-facing messages the orchestrator can raise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    InvalidInputType,
    NoCompressionNeeded,
    LargerThanOriginal,
    CompressionFailed,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Notice::InvalidInputType => "Please choose an image file.",
            Notice::NoCompressionNeeded => "The image is already small, no compression needed.",
            Notice::LargerThanOriginal => {
                "The compressed file came out larger, keeping the original."
            }
            Notice::CompressionFailed => "Image compression failed, please try again.",
        };
        f.write_str(text)
    }
}

/// Everything the orchestrator needs from whatever surface renders it.
pub trait PresentationPort {
    fn render_preview(&mut self, kind: PreviewKind, bytes: &[u8], media_type: &str);
    fn clear_preview(&mut self, kind: PreviewKind);
    fn set_label(&mut self, kind: LabelKind, text: &str);
    fn set_visible(&mut self, area: Area, visible: bool);
    fn notify(&mut self, notice: Notice);
    /// Hand bytes to the user under `file_name`.
    fn save(&mut self, file_name: &str, bytes: &[u8]);
}

/// Port that remembers every call, for tests and scripted runs. It grows
/// with every call, so long-lived surfaces keep only the latest state.
#[derive(Debug, Default, Clone)]
pub struct RecordingPort {
    /// `None` marks a cleared preview.
    pub previews: Vec<(PreviewKind, Option<Vec<u8>>)>,
    pub labels: Vec<(LabelKind, String)>,
    pub visible: Vec<(Area, bool)>,
    pub notices: Vec<Notice>,
    pub saved: Vec<(String, Vec<u8>)>,
}

impl RecordingPort {
    pub fn last_preview(&self, kind: PreviewKind) -> Option<&[u8]> {
        self.previews
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .and_then(|(_, b)| b.as_deref())
    }

    pub fn last_label(&self, kind: LabelKind) -> Option<&str> {
        self.labels
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, t)| t.as_str())
    }

    pub fn is_visible(&self, area: Area) -> bool {
        self.visible
            .iter()
            .rev()
            .find(|(a, _)| *a == area)
            .map_or(false, |(_, v)| *v)
    }
}

impl PresentationPort for RecordingPort {
    fn render_preview(&mut self, kind: PreviewKind, bytes: &[u8], _media_type: &str) {
        self.previews.push((kind, Some(bytes.to_vec())));
    }

    fn clear_preview(&mut self, kind: PreviewKind) {
        self.previews.push((kind, None));
    }

    fn set_label(&mut self, kind: LabelKind, text: &str) {
        self.labels.push((kind, text.to_string()));
    }

    fn set_visible(&mut self, area: Area, visible: bool) {
        self.visible.push((area, visible));
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    fn save(&mut self, file_name: &str, bytes: &[u8]) {
        self.saved.push((file_name.to_string(), bytes.to_vec()));
    }
}
