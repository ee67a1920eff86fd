use std::sync::Arc;

/// A decoded video frame.
///
/// Pixels are 8-bit, row-major, tightly packed and interleaved: RGB for color frames, a single
/// channel for grayscale.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Interleaved channel count (1 or 3).
    pub channels: u8,
    /// Pixel bytes.
    pub data: Arc<Vec<u8>>,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            data: Arc::new(data),
        }
    }

    /// Convert a decoded `image` buffer, keeping grayscale frames single-channel.
    pub fn from_dynamic(img: image::DynamicImage) -> Self {
        use image::DynamicImage as D;
        match img {
            D::ImageLuma8(g) => {
                let (w, h) = g.dimensions();
                Self::new(w, h, 1, g.into_raw())
            }
            other => {
                let rgb = other.to_rgb8();
                let (w, h) = rgb.dimensions();
                Self::new(w, h, 3, rgb.into_raw())
            }
        }
    }

    /// Byte length implied by the frame dimensions.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    /// Encode the frame to PNG/JPEG bytes.
    pub fn encode(&self, format: image::ImageFormat) -> anyhow::Result<Vec<u8>> {
        use anyhow::Context;
        let color = match self.channels {
            1 => image::ExtendedColorType::L8,
            3 => image::ExtendedColorType::Rgb8,
            n => anyhow::bail!("cannot encode frame with {n} channels"),
        };
        let mut out = Vec::new();
        image::write_buffer_with_format(
            &mut std::io::Cursor::new(&mut out),
            &self.data,
            self.width,
            self.height,
            color,
            format,
        )
        .context("encode frame")?;
        Ok(out)
    }
}

/// Random-access frame retrieval over one video source.
///
/// Implementations fail softly: `get_frame` returns `None` for out-of-range indices or frames that
/// cannot be decoded, never partial data. `close` releases decoders, cached frames and open
/// handles; it is idempotent and safe to call while another caller is inside `get_frame`.
pub trait VideoBackend: Send + Sync {
    /// Frame at presentation index `idx`.
    fn get_frame(&self, idx: usize) -> Option<VideoFrame>;

    /// Presentation timestamps in seconds, when the source can report them.
    fn frame_times(&self) -> Option<Vec<f64>>;

    /// Number of addressable frames.
    fn num_frames(&self) -> usize;

    /// Release all backend-held resources.
    fn close(&self);

    /// Short backend name used in logs and video metadata.
    fn kind(&self) -> &'static str;
}
