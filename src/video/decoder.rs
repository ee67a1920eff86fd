use std::path::Path;

use anyhow::Context;

use crate::foundation::error::{ArchiveError, ArchiveResult};
use crate::video::backend::VideoFrame;

/// Encoded sample handed to a decoder, in decode order.
#[derive(Debug, Clone)]
pub struct EncodedSample {
    pub data: Vec<u8>,
    pub pts: i64,
    pub keyframe: bool,
}

/// Decoder output tagged with its presentation timestamp.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub pts: i64,
    pub frame: VideoFrame,
}

/// Converts encoded samples to frames.
///
/// A decoder may buffer samples internally (reordering codecs); whatever it still holds is
/// returned by `flush`. `reset` starts a new keyframe-anchored run and drops buffered state.
pub trait VideoDecoder: Send {
    fn reset(&mut self) -> ArchiveResult<()>;

    fn decode(&mut self, sample: EncodedSample) -> ArchiveResult<Vec<DecodedImage>>;

    fn flush(&mut self) -> ArchiveResult<Vec<DecodedImage>>;

    /// Release codec resources after the owning backend is closed. May be called more than once.
    fn close(&mut self) {}
}

/// Decode one self-contained PNG/JPEG/... image.
pub(crate) fn decode_still(
    bytes: &[u8],
    format: Option<image::ImageFormat>,
) -> ArchiveResult<VideoFrame> {
    let img = match format {
        Some(f) => image::load_from_memory_with_format(bytes, f),
        None => image::load_from_memory(bytes),
    }
    .context("decode image from memory")
    .map_err(|e| ArchiveError::decode(format!("{e:#}")))?;
    Ok(VideoFrame::from_dynamic(img))
}

/// Intra-only decoder for tracks whose samples are standalone images (motion JPEG, PNG).
#[derive(Debug, Clone)]
pub struct ImageSampleDecoder {
    format: Option<image::ImageFormat>,
}

impl ImageSampleDecoder {
    /// `None` guesses the format from each sample's header.
    pub fn new(format: Option<image::ImageFormat>) -> Self {
        Self { format }
    }

    /// Decoder for an MP4 sample entry code, when the codec is image-based.
    pub fn for_codec(codec: &[u8; 4]) -> Option<Self> {
        let format = match codec {
            b"jpeg" | b"mjpa" | b"mjpb" | b"mjpg" | b"MJPG" | b"AVDJ" => image::ImageFormat::Jpeg,
            b"png " | b"mpng" => image::ImageFormat::Png,
            _ => return None,
        };
        Some(Self::new(Some(format)))
    }
}

impl VideoDecoder for ImageSampleDecoder {
    fn reset(&mut self) -> ArchiveResult<()> {
        Ok(())
    }

    fn decode(&mut self, sample: EncodedSample) -> ArchiveResult<Vec<DecodedImage>> {
        let frame = decode_still(&sample.data, self.format)?;
        Ok(vec![DecodedImage {
            pts: sample.pts,
            frame,
        }])
    }

    fn flush(&mut self) -> ArchiveResult<Vec<DecodedImage>> {
        Ok(Vec::new())
    }
}

/// Decoder chosen for a media file's track codec.
pub enum MediaDecoder {
    Image(ImageSampleDecoder),
    #[cfg(feature = "media-ffmpeg")]
    Ffmpeg(crate::video::ffmpeg::FfmpegDecoder),
}

impl MediaDecoder {
    /// Image-coded tracks decode in-process; anything else needs libavcodec.
    pub fn for_track(codec: &[u8; 4], path: &Path) -> ArchiveResult<Self> {
        if let Some(d) = ImageSampleDecoder::for_codec(codec) {
            return Ok(Self::Image(d));
        }
        Self::inter_frame(codec, path)
    }

    #[cfg(feature = "media-ffmpeg")]
    fn inter_frame(_codec: &[u8; 4], path: &Path) -> ArchiveResult<Self> {
        Ok(Self::Ffmpeg(crate::video::ffmpeg::FfmpegDecoder::open(path)?))
    }

    #[cfg(not(feature = "media-ffmpeg"))]
    fn inter_frame(codec: &[u8; 4], path: &Path) -> ArchiveResult<Self> {
        Err(ArchiveError::decode(format!(
            "codec '{}' in '{}' requires the 'media-ffmpeg' feature",
            String::from_utf8_lossy(codec),
            path.display()
        )))
    }

    fn inner(&mut self) -> &mut dyn VideoDecoder {
        match self {
            Self::Image(d) => d,
            #[cfg(feature = "media-ffmpeg")]
            Self::Ffmpeg(d) => d,
        }
    }
}

impl VideoDecoder for MediaDecoder {
    fn reset(&mut self) -> ArchiveResult<()> {
        self.inner().reset()
    }

    fn decode(&mut self, sample: EncodedSample) -> ArchiveResult<Vec<DecodedImage>> {
        self.inner().decode(sample)
    }

    fn flush(&mut self) -> ArchiveResult<Vec<DecodedImage>> {
        self.inner().flush()
    }

    fn close(&mut self) {
        self.inner().close();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/video/decoder.rs"]
mod tests;
