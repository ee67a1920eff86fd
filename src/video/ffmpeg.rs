//! Inter-frame codecs (H.264, HEVC, ...) decoded through libavcodec.
//!
//! Samples still come from the crate's own demuxer; libavformat is only used once at open time to
//! read the track's codec parameters.

use std::path::Path;

use ffmpeg_next as ffmpeg;

use crate::foundation::error::{ArchiveError, ArchiveResult};
use crate::video::backend::VideoFrame;
use crate::video::decoder::{DecodedImage, EncodedSample, VideoDecoder};

fn av_err(what: &str, e: ffmpeg::Error) -> ArchiveError {
    ArchiveError::decode(format!("{what}: {e}"))
}

/// libavcodec decoder fed with demuxed samples; output is converted to packed RGB.
pub struct FfmpegDecoder {
    decoder: Option<ffmpeg::decoder::Video>,
}

impl FfmpegDecoder {
    /// Build a decoder from the codec parameters of the best video stream in `path`.
    #[tracing::instrument(level = "debug")]
    pub fn open(path: &Path) -> ArchiveResult<Self> {
        ffmpeg::init().map_err(|e| av_err("initialize ffmpeg", e))?;
        let input = ffmpeg::format::input(&path)
            .map_err(|e| av_err(&format!("open '{}'", path.display()), e))?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| {
                ArchiveError::decode(format!("no video stream in '{}'", path.display()))
            })?;
        let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| av_err("codec context", e))?
            .decoder()
            .video()
            .map_err(|e| av_err("open video decoder", e))?;
        tracing::debug!(
            codec = ?decoder.id(),
            width = decoder.width(),
            height = decoder.height(),
            "opened ffmpeg decoder"
        );
        Ok(Self {
            decoder: Some(decoder),
        })
    }

    fn decoder(&mut self) -> ArchiveResult<&mut ffmpeg::decoder::Video> {
        self.decoder
            .as_mut()
            .ok_or_else(|| ArchiveError::decode("ffmpeg decoder is closed"))
    }

    /// Pull every frame the codec has ready.
    fn drain(&mut self) -> ArchiveResult<Vec<DecodedImage>> {
        let decoder = self.decoder()?;
        let mut out = Vec::new();
        let mut frame = ffmpeg::frame::Video::empty();
        while decoder.receive_frame(&mut frame).is_ok() {
            let Some(pts) = frame.timestamp().or_else(|| frame.pts()) else {
                tracing::warn!("dropping decoded frame without a timestamp");
                continue;
            };
            out.push(DecodedImage {
                pts,
                frame: to_rgb(&frame)?,
            });
        }
        Ok(out)
    }
}

/// Convert to packed RGB24, dropping row padding.
fn to_rgb(frame: &ffmpeg::frame::Video) -> ArchiveResult<VideoFrame> {
    let mut rgb = ffmpeg::frame::Video::empty();
    frame
        .converter(ffmpeg::format::Pixel::RGB24)
        .map_err(|e| av_err("create pixel converter", e))?
        .run(frame, &mut rgb)
        .map_err(|e| av_err("convert frame to rgb", e))?;

    let (width, height) = (rgb.width(), rgb.height());
    let row = width as usize * 3;
    let stride = rgb.stride(0);
    let plane = rgb.data(0);
    let mut data = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        let start = y * stride;
        data.extend_from_slice(&plane[start..start + row]);
    }
    Ok(VideoFrame::new(width, height, 3, data))
}

impl VideoDecoder for FfmpegDecoder {
    fn reset(&mut self) -> ArchiveResult<()> {
        self.decoder()?.flush();
        Ok(())
    }

    fn decode(&mut self, sample: EncodedSample) -> ArchiveResult<Vec<DecodedImage>> {
        let mut packet = ffmpeg::Packet::copy(&sample.data);
        packet.set_pts(Some(sample.pts));
        if sample.keyframe {
            packet.set_flags(ffmpeg::packet::Flags::KEY);
        }
        self.decoder()?
            .send_packet(&packet)
            .map_err(|e| av_err(&format!("decode sample at pts {}", sample.pts), e))?;
        self.drain()
    }

    fn flush(&mut self) -> ArchiveResult<Vec<DecodedImage>> {
        self.decoder()?
            .send_eof()
            .map_err(|e| av_err("flush decoder", e))?;
        let out = self.drain()?;
        // Leave the codec ready for the next run after end of stream.
        self.decoder()?.flush();
        Ok(out)
    }

    fn close(&mut self) {
        self.decoder = None;
    }
}
