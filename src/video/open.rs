use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::container::ContainerRead;
use crate::foundation::core::{ChannelOrder, FormatVersion};
use crate::foundation::error::{ArchiveError, ArchiveResult};
use crate::model::video::{Video, VideoFilename};
use crate::video::backend::VideoBackend;
use crate::video::embedded::EmbeddedImages;
use crate::video::pipeline::{MediaVideo, PipelineOpts};
use crate::video::sequence::ImageSequence;

const MEDIA_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// `frame_numbers` dataset stored next to an embedded frame dataset.
pub(crate) fn frame_numbers_path(dataset: &str) -> String {
    match dataset.rsplit_once('/') {
        Some((parent, _)) => format!("{parent}/frame_numbers"),
        None => "frame_numbers".to_string(),
    }
}

fn locate(file: &str, search_dir: Option<&Path>) -> ArchiveResult<PathBuf> {
    let path = PathBuf::from(file);
    if path.exists() {
        return Ok(path);
    }
    if let (Some(dir), Some(name)) = (search_dir, path.file_name()) {
        let candidate = dir.join(name);
        if candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(ArchiveError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("video file '{file}' not found"),
    )))
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Choose and open the frame backend for `video`.
///
/// Frames embedded in `container` (backend `filename` of `"."`) get [`EmbeddedImages`]; a list of
/// files is an [`ImageSequence`]; a single file is dispatched on its extension.
pub fn open_backend<C: ContainerRead + ?Sized>(
    video: &Video,
    container: Option<&C>,
    version: FormatVersion,
    search_dir: Option<&Path>,
    pipeline: &PipelineOpts,
) -> ArchiveResult<Arc<dyn VideoBackend>> {
    if let Some(dataset) = video.embedded_dataset() {
        let container = container
            .ok_or_else(|| ArchiveError::format("embedded video opened without its container"))?;
        let ds = container.dataset(dataset).ok_or_else(|| {
            ArchiveError::format(format!("embedded frame dataset '{dataset}' is missing"))
        })?;
        let frame_numbers = container
            .dataset(&frame_numbers_path(dataset))
            .map(|d| d.to_i64_vec())
            .transpose()?;
        let order = match video.backend_metadata.get("channel_order").and_then(Value::as_str) {
            Some(o) => ChannelOrder::parse(o)?,
            None => version.default_channel_order(),
        };
        return Ok(Arc::new(EmbeddedImages::from_dataset(
            ds,
            frame_numbers,
            order,
        )?));
    }

    match &video.filename {
        VideoFilename::Multi(files) => {
            let paths = files
                .iter()
                .map(|f| locate(f, search_dir))
                .collect::<ArchiveResult<Vec<_>>>()?;
            Ok(Arc::new(ImageSequence::new(paths)))
        }
        VideoFilename::Single(file) => {
            let path = locate(file, search_dir)?;
            let ext = extension(&path);
            if MEDIA_EXTENSIONS.contains(&ext.as_str()) {
                Ok(Arc::new(MediaVideo::open(&path, *pipeline)?))
            } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                Ok(Arc::new(ImageSequence::new(vec![path])))
            } else {
                Err(ArchiveError::format(format!(
                    "no video backend for '{}'",
                    path.display()
                )))
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/video/open.rs"]
mod tests;
