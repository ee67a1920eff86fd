use std::collections::BTreeSet;

use rayon::prelude::*;
use serde_json::{Map, Value, json};

use crate::container::{AttrValue, ContainerWrite, Data, Dataset};
use crate::foundation::core::{ChannelOrder, VideoIdx};
use crate::foundation::error::{ArchiveError, ArchiveResult};
use crate::model::labels::Labels;
use crate::model::video::Video;
use crate::video::embedded::EmbeddedImages;
use crate::video::open::frame_numbers_path;

/// Image codec used for embedded frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedFormat {
    #[default]
    Png,
    Jpeg,
}

impl EmbedFormat {
    fn image_format(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

/// Options for [`embed_frames`].
#[derive(Debug, Clone, Default)]
pub struct EmbedOpts {
    pub format: EmbedFormat,
    /// Also embed suggested frames that have no labels.
    pub include_suggestions: bool,
}

fn frames_to_embed(labels: &Labels, video: VideoIdx, opts: &EmbedOpts) -> Vec<usize> {
    let mut out: BTreeSet<u64> = labels
        .frames_for_video(video)
        .map(|f| f.frame_idx)
        .collect();
    if opts.include_suggestions {
        out.extend(
            labels
                .suggestions
                .iter()
                .filter(|s| s.video == video)
                .map(|s| s.frame_idx),
        );
    }
    out.into_iter().map(|f| f as usize).collect()
}

/// Encoded frames of one video, ready to be written.
struct PreparedVideo {
    video: usize,
    indices: Vec<usize>,
    blobs: Vec<Vec<u8>>,
    /// `(height, width, channels)` of the first frame.
    frame_shape: (u32, u32, u8),
}

fn prepare_video(
    labels: &Labels,
    vi: usize,
    opts: &EmbedOpts,
) -> ArchiveResult<Option<PreparedVideo>> {
    let indices = frames_to_embed(labels, VideoIdx(vi), opts);
    let video = &labels.videos[vi];
    if indices.is_empty() || video.backend().is_none() {
        tracing::debug!(video = vi, "nothing to embed");
        return Ok(None);
    }

    let frames = video.get_frames(&indices);
    let frames = indices
        .iter()
        .zip(frames)
        .map(|(&i, f)| {
            f.ok_or_else(|| ArchiveError::decode(format!("video {vi} frame {i} is unavailable")))
        })
        .collect::<ArchiveResult<Vec<_>>>()?;
    let frame_shape = frames
        .first()
        .map_or((0, 0, 0), |f| (f.height, f.width, f.channels));

    let format = opts.format.image_format();
    let blobs = frames
        .par_iter()
        .map(|f| f.encode(format).map_err(ArchiveError::Other))
        .collect::<ArchiveResult<Vec<_>>>()?;
    Ok(Some(PreparedVideo {
        video: vi,
        indices,
        blobs,
        frame_shape,
    }))
}

/// Copy the frames referenced by `labels` into `container` and point each video at them.
///
/// Frames of video `N` are stored as one encoded image per element in `video{N}/video`, with the
/// original frame numbers in `video{N}/frame_numbers`. The previous video description is kept as
/// the new video's `source_video`. Videos without a backend or without labeled frames are left
/// unchanged.
///
/// Every video is fetched and encoded before anything is written, so a missing frame leaves both
/// `labels` and `container` untouched.
#[tracing::instrument(skip_all)]
pub fn embed_frames<C: ContainerWrite + ?Sized>(
    labels: &mut Labels,
    container: &mut C,
    opts: &EmbedOpts,
) -> ArchiveResult<()> {
    let mut prepared = Vec::new();
    for vi in 0..labels.videos.len() {
        if let Some(p) = prepare_video(labels, vi, opts)? {
            prepared.push(p);
        }
    }

    for p in prepared {
        let vi = p.video;
        let frame_numbers: Vec<i64> = p.indices.iter().map(|&i| i as i64).collect();
        let dataset = format!("video{vi}/video");
        container.write_dataset(
            &dataset,
            Dataset::vector(Data::Blob(p.blobs))
                .with_attr("format", AttrValue::Str(opts.format.name().into()))
                .with_attr(
                    "channel_order",
                    AttrValue::Str(ChannelOrder::Rgb.as_str().into()),
                ),
        )?;
        container.write_dataset(
            &frame_numbers_path(&dataset),
            Dataset::vector(Data::I64(frame_numbers.clone())),
        )?;

        let stored = container
            .dataset(&dataset)
            .ok_or_else(|| ArchiveError::structural(format!("'{dataset}' missing after write")))?;
        let backend =
            EmbeddedImages::from_dataset(stored, Some(frame_numbers), ChannelOrder::Rgb)?;

        let (height, width, channels) = p.frame_shape;
        let mut backend_metadata = Map::new();
        backend_metadata.insert("filename".into(), Value::from("."));
        backend_metadata.insert("dataset".into(), Value::from(dataset.clone()));
        backend_metadata.insert("format".into(), Value::from(opts.format.name()));
        backend_metadata.insert(
            "shape".into(),
            json!([p.indices.len(), height, width, channels]),
        );
        backend_metadata.insert("channel_order".into(), Value::from(ChannelOrder::Rgb.as_str()));

        let previous = labels.videos[vi].clone();
        let mut embedded = Video::new(previous.filename.clone());
        embedded.backend_metadata = backend_metadata;
        embedded.source_video = Some(Box::new(previous));
        embedded.set_backend(Some(std::sync::Arc::new(backend)));
        labels.videos[vi] = embedded;

        tracing::debug!(video = vi, frames = p.indices.len(), %dataset, "embedded frames");
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/codec/embed.rs"]
mod tests;
