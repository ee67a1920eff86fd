use std::sync::Arc;

use serde_json::{Map, Value};

use crate::video::backend::{VideoBackend, VideoFrame};

/// File name(s) a video was loaded from.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum VideoFilename {
    Single(String),
    /// Ordered image files, one per frame.
    Multi(Vec<String>),
}

impl VideoFilename {
    /// First (or only) file name.
    pub fn primary(&self) -> Option<&str> {
        match self {
            Self::Single(s) => Some(s),
            Self::Multi(v) => v.first().map(String::as_str),
        }
    }
}

impl From<&str> for VideoFilename {
    fn from(s: &str) -> Self {
        Self::Single(s.to_string())
    }
}

/// A video referenced by labeled frames.
///
/// `backend_metadata` is the free-form backend description stored in the archive (dataset path,
/// image format, shape, fps, channel order, ...). `backend` is the opened frame source, if any.
#[derive(Clone)]
pub struct Video {
    pub filename: VideoFilename,
    pub backend_metadata: Map<String, Value>,
    /// Video this one was derived from (e.g. the original file behind embedded frames).
    pub source_video: Option<Box<Video>>,
    backend: Option<Arc<dyn VideoBackend>>,
}

impl std::fmt::Debug for Video {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Video")
            .field("filename", &self.filename)
            .field("backend_metadata", &self.backend_metadata)
            .field("source_video", &self.source_video)
            .field("backend", &self.backend.as_ref().map(|b| b.kind()))
            .finish()
    }
}

impl Video {
    pub fn new(filename: impl Into<VideoFilename>) -> Self {
        Self {
            filename: filename.into(),
            backend_metadata: Map::new(),
            source_video: None,
            backend: None,
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn VideoBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn set_backend(&mut self, backend: Option<Arc<dyn VideoBackend>>) {
        if let Some(old) = self.backend.take() {
            old.close();
        }
        self.backend = backend;
    }

    pub fn backend(&self) -> Option<&Arc<dyn VideoBackend>> {
        self.backend.as_ref()
    }

    /// Dataset path when the frames are embedded in the archive itself.
    pub fn embedded_dataset(&self) -> Option<&str> {
        let is_self = self
            .backend_metadata
            .get("filename")
            .and_then(Value::as_str)
            .is_some_and(|f| f == ".");
        if !is_self {
            return None;
        }
        self.backend_metadata.get("dataset").and_then(Value::as_str)
    }

    /// End of the `source_video` chain.
    pub fn original(&self) -> &Video {
        let mut cur = self;
        while let Some(next) = cur.source_video.as_deref() {
            cur = next;
        }
        cur
    }

    pub fn get_frame(&self, idx: usize) -> Option<VideoFrame> {
        self.backend.as_ref()?.get_frame(idx)
    }

    /// Decode several frames; independent frames are decoded in parallel.
    pub fn get_frames(&self, indices: &[usize]) -> Vec<Option<VideoFrame>> {
        use rayon::prelude::*;
        let Some(backend) = self.backend.as_ref() else {
            return vec![None; indices.len()];
        };
        if backend.kind() == crate::video::pipeline::BACKEND_KIND {
            // The decode pipeline serializes its own work; sequential access keeps it on its
            // keyframe-anchored fast path.
            return indices.iter().map(|&i| backend.get_frame(i)).collect();
        }
        indices.par_iter().map(|&i| backend.get_frame(i)).collect()
    }

    pub fn frame_times(&self) -> Option<Vec<f64>> {
        self.backend.as_ref()?.frame_times()
    }

    pub fn num_frames(&self) -> Option<usize> {
        self.backend.as_ref().map(|b| b.num_frames())
    }

    pub fn close(&self) {
        if let Some(b) = &self.backend {
            b.close();
        }
    }
}
