use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;

use crate::foundation::error::{ArchiveError, ArchiveResult};
use crate::video::backend::{VideoBackend, VideoFrame};
use crate::video::decoder::decode_still;

pub const BACKEND_KIND: &str = "image_sequence";

/// One image file per frame.
#[derive(Debug)]
pub struct ImageSequence {
    files: Vec<PathBuf>,
    closed: AtomicBool,
}

impl ImageSequence {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            closed: AtomicBool::new(false),
        }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn load(&self, idx: usize) -> ArchiveResult<Option<VideoFrame>> {
        let Some(path) = self.files.get(idx) else {
            return Ok(None);
        };
        let bytes = std::fs::read(path)
            .with_context(|| format!("read frame image '{}'", path.display()))
            .map_err(ArchiveError::Other)?;
        decode_still(&bytes, image::ImageFormat::from_path(path).ok()).map(Some)
    }
}

impl VideoBackend for ImageSequence {
    fn get_frame(&self, idx: usize) -> Option<VideoFrame> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        match self.load(idx) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(frame = idx, error = %e, "image sequence frame unavailable");
                None
            }
        }
    }

    fn frame_times(&self) -> Option<Vec<f64>> {
        None
    }

    fn num_frames(&self) -> usize {
        self.files.len()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn kind(&self) -> &'static str {
        BACKEND_KIND
    }
}

#[cfg(test)]
#[path = "../../tests/unit/video/sequence.rs"]
mod tests;
