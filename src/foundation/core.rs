use crate::foundation::error::{ArchiveError, ArchiveResult};

/// Position of a skeleton in [`crate::Labels::skeletons`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct SkeletonIdx(pub usize);

/// Position of a track in [`crate::Labels::tracks`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct TrackIdx(pub usize);

/// Position of a video in [`crate::Labels::videos`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct VideoIdx(pub usize);

/// Stable address of an instance inside a [`crate::Labels`] graph.
///
/// Instances never point at each other directly; cross-instance links (from-predicted,
/// instance groups) are stored as positions and resolved against the owning graph.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct InstanceRef {
    /// Index into `Labels::labeled_frames`.
    pub frame: usize,
    /// Index into that frame's instance list.
    pub instance: usize,
}

impl InstanceRef {
    pub fn new(frame: usize, instance: usize) -> Self {
        Self { frame, instance }
    }
}

/// Archive schema version stored in `metadata/format_id`.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct FormatVersion(pub f64);

impl FormatVersion {
    /// Version emitted by the writer.
    pub const CURRENT: FormatVersion = FormatVersion(1.4);

    /// Archives older than 1.1 stored coordinates with the pixel-center convention shifted by
    /// half a pixel.
    pub fn has_legacy_pixel_offset(self) -> bool {
        self.0 < 1.1
    }

    /// Channel order assumed for embedded images that carry no explicit attribute.
    pub fn default_channel_order(self) -> ChannelOrder {
        if self.0 < 1.4 {
            ChannelOrder::Bgr
        } else {
            ChannelOrder::Rgb
        }
    }
}

impl Default for FormatVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Element order of color channels in stored frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

impl ChannelOrder {
    pub fn parse(s: &str) -> ArchiveResult<Self> {
        match s.to_ascii_uppercase().as_str() {
            "RGB" => Ok(Self::Rgb),
            "BGR" => Ok(Self::Bgr),
            other => Err(ArchiveError::format(format!(
                "unknown channel order '{other}'"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rgb => "RGB",
            Self::Bgr => "BGR",
        }
    }
}
