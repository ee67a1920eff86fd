use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::container::{Data, Dataset};
use crate::foundation::core::ChannelOrder;
use crate::foundation::error::{ArchiveError, ArchiveResult};
use crate::video::backend::{VideoBackend, VideoFrame};
use crate::video::decoder::decode_still;

pub const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
pub const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

/// Backend name reported by [`EmbeddedImages`].
pub const BACKEND_KIND: &str = "embedded";

/// Start offsets of images stored back to back in `buf`.
///
/// Every occurrence of `magic` begins a frame; scanning stops after `max_frames` starts.
pub fn scan_magic(buf: &[u8], magic: &[u8], max_frames: Option<usize>) -> Vec<usize> {
    let mut out = Vec::new();
    if magic.is_empty() || buf.len() < magic.len() {
        return out;
    }
    let limit = max_frames.unwrap_or(usize::MAX);
    let mut i = 0;
    while i + magic.len() <= buf.len() && out.len() < limit {
        if &buf[i..i + magic.len()] == magic {
            out.push(i);
            i += magic.len();
        } else {
            i += 1;
        }
    }
    out
}

fn format_from_name(name: &str) -> ArchiveResult<Option<image::ImageFormat>> {
    Ok(match name.to_ascii_lowercase().trim_start_matches('.') {
        "png" => Some(image::ImageFormat::Png),
        "jpg" | "jpeg" => Some(image::ImageFormat::Jpeg),
        "raw" | "" => None,
        other => {
            return Err(ArchiveError::format(format!(
                "unknown embedded image format '{other}'"
            )));
        }
    })
}

fn magic_for(format: Option<image::ImageFormat>, buf: &[u8]) -> Option<&'static [u8]> {
    match format {
        Some(image::ImageFormat::Png) => Some(PNG_MAGIC),
        Some(image::ImageFormat::Jpeg) => Some(JPEG_MAGIC),
        _ if buf.starts_with(PNG_MAGIC) => Some(PNG_MAGIC),
        _ if buf.starts_with(JPEG_MAGIC) => Some(JPEG_MAGIC),
        _ => None,
    }
}

/// Reinterpret blue-first raster bytes as RGB. Gray frames are returned as is.
fn to_rgb_order(frame: VideoFrame, order: ChannelOrder) -> VideoFrame {
    if order == ChannelOrder::Rgb || frame.channels != 3 {
        return frame;
    }
    let mut data = frame.data.as_ref().clone();
    for px in data.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
    VideoFrame::new(frame.width, frame.height, 3, data)
}

enum Storage {
    /// One compressed image per element.
    Blobs(Arc<Dataset>),
    /// Compressed images back to back in one buffer.
    Contiguous {
        data: Arc<Dataset>,
        offsets: Vec<usize>,
    },
    /// Uncompressed `(n, height, width, channels)` raster.
    Raw {
        data: Arc<Dataset>,
        height: u32,
        width: u32,
        channels: u8,
    },
}

impl Storage {
    fn len(&self) -> usize {
        match self {
            Self::Blobs(ds) => match &ds.data {
                Data::Blob(b) => b.len(),
                _ => 0,
            },
            Self::Contiguous { offsets, .. } => offsets.len(),
            Self::Raw { data, .. } => data.shape.first().copied().unwrap_or(0),
        }
    }
}

/// Frames embedded in the archive as image blobs or raw rasters.
pub struct EmbeddedImages {
    storage: RwLock<Option<Storage>>,
    /// Frame number to storage position, when only some frames are stored.
    frame_map: Option<HashMap<u64, usize>>,
    format: Option<image::ImageFormat>,
    order: ChannelOrder,
    stored: usize,
}

impl EmbeddedImages {
    /// Wrap an embedded-frame dataset.
    ///
    /// The dataset's `format` and `channel_order` attributes win over `default_order`. Channel
    /// order only affects uncompressed rasters; PNG/JPEG blobs carry their own color layout.
    /// `frame_numbers[k]` is the video frame stored at position `k`.
    pub fn from_dataset(
        ds: Arc<Dataset>,
        frame_numbers: Option<Vec<i64>>,
        default_order: ChannelOrder,
    ) -> ArchiveResult<Self> {
        let mut format = match ds.attr("format").and_then(|a| a.as_str()) {
            Some(f) => format_from_name(f)?,
            None => None,
        };
        let order = match ds.attr("channel_order").and_then(|a| a.as_str()) {
            Some(o) => ChannelOrder::parse(o)?,
            None => default_order,
        };
        let expected = frame_numbers.as_ref().map(Vec::len);

        let storage = match &ds.data {
            Data::Blob(_) => Storage::Blobs(Arc::clone(&ds)),
            Data::U8(buf) if ds.shape.len() == 4 => {
                let dim = |i: usize| ds.shape[i];
                let channels = dim(3);
                if channels != 1 && channels != 3 {
                    return Err(ArchiveError::format(format!(
                        "raw frames with {channels} channels are not supported"
                    )));
                }
                if buf.len() < dim(0) * dim(1) * dim(2) * channels {
                    return Err(ArchiveError::format("raw frame buffer shorter than its shape"));
                }
                Storage::Raw {
                    height: u32::try_from(dim(1))
                        .map_err(|_| ArchiveError::format("raw frame height too large"))?,
                    width: u32::try_from(dim(2))
                        .map_err(|_| ArchiveError::format("raw frame width too large"))?,
                    channels: channels as u8,
                    data: Arc::clone(&ds),
                }
            }
            Data::U8(buf) => {
                let magic = magic_for(format, buf).ok_or_else(|| {
                    ArchiveError::format("cannot find image boundaries in embedded buffer")
                })?;
                if format.is_none() {
                    format = Some(if magic == PNG_MAGIC {
                        image::ImageFormat::Png
                    } else {
                        image::ImageFormat::Jpeg
                    });
                }
                let offsets = scan_magic(buf, magic, expected);
                tracing::debug!(frames = offsets.len(), "scanned contiguous embedded frames");
                Storage::Contiguous {
                    data: Arc::clone(&ds),
                    offsets,
                }
            }
            _ => {
                return Err(ArchiveError::format(format!(
                    "embedded frames cannot be stored as {:?}",
                    ds.dtype()
                )));
            }
        };

        let stored = storage.len();
        let frame_map = frame_numbers.map(|nums| {
            nums.into_iter()
                .enumerate()
                .filter_map(|(k, n)| Some((u64::try_from(n).ok()?, k)))
                .collect()
        });
        Ok(Self {
            storage: RwLock::new(Some(storage)),
            frame_map,
            format,
            order,
            stored,
        })
    }

    pub fn channel_order(&self) -> ChannelOrder {
        self.order
    }

    /// Storage position of video frame `idx`.
    fn position(&self, idx: usize) -> Option<usize> {
        match &self.frame_map {
            Some(m) => m.get(&(idx as u64)).copied(),
            None => Some(idx),
        }
        .filter(|&p| p < self.stored)
    }

    fn read(&self, pos: usize) -> ArchiveResult<Option<VideoFrame>> {
        let guard = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        let Some(storage) = guard.as_ref() else {
            return Ok(None);
        };
        let frame = match storage {
            Storage::Blobs(ds) => {
                let Data::Blob(blobs) = &ds.data else {
                    return Ok(None);
                };
                decode_still(&blobs[pos], self.format)?
            }
            Storage::Contiguous { data, offsets } => {
                let Data::U8(buf) = &data.data else {
                    return Ok(None);
                };
                let end = offsets.get(pos + 1).copied().unwrap_or(buf.len());
                decode_still(&buf[offsets[pos]..end], self.format)?
            }
            Storage::Raw {
                data,
                height,
                width,
                channels,
            } => {
                let Data::U8(buf) = &data.data else {
                    return Ok(None);
                };
                let len = *height as usize * *width as usize * *channels as usize;
                let bytes = buf[pos * len..(pos + 1) * len].to_vec();
                to_rgb_order(VideoFrame::new(*width, *height, *channels, bytes), self.order)
            }
        };
        Ok(Some(frame))
    }
}

impl VideoBackend for EmbeddedImages {
    fn get_frame(&self, idx: usize) -> Option<VideoFrame> {
        let pos = self.position(idx)?;
        match self.read(pos) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(frame = idx, error = %e, "embedded frame decode failed");
                None
            }
        }
    }

    fn frame_times(&self) -> Option<Vec<f64>> {
        None
    }

    /// Number of stored frames.
    fn num_frames(&self) -> usize {
        self.stored
    }

    fn close(&self) {
        self.storage
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn kind(&self) -> &'static str {
        BACKEND_KIND
    }
}

#[cfg(test)]
#[path = "../../tests/unit/video/embedded.rs"]
mod tests;
