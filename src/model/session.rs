use std::collections::BTreeMap;

use crate::foundation::core::{InstanceRef, VideoIdx};

/// Calibrated camera of a multi-view recording session.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub name: Option<String>,
    /// Rodrigues rotation vector.
    pub rotation: [f64; 3],
    pub translation: [f64; 3],
    /// 3x3 intrinsic matrix, row-major.
    pub matrix: Option<[[f64; 3]; 3]>,
    pub distortions: Option<Vec<f64>>,
    /// `(width, height)` of the camera image.
    pub size: Option<(u32, u32)>,
}

impl Camera {
    pub fn new(rotation: [f64; 3], translation: [f64; 3]) -> Self {
        Self {
            name: None,
            rotation,
            translation,
            matrix: None,
            distortions: None,
            size: None,
        }
    }
}

/// Instances of the same individual seen by several cameras in one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstanceGroup {
    /// Camera position in the session -> grouped instance.
    pub instances: BTreeMap<usize, InstanceRef>,
    pub score: Option<f64>,
    /// Triangulated points, one `[x, y, z]` per node.
    pub points: Option<Vec<[f64; 3]>>,
}

/// All views of one frame index across the session's cameras.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameGroup {
    pub frame_idx: u64,
    /// Camera position in the session -> labeled frame index in `Labels::labeled_frames`.
    pub labeled_frames: BTreeMap<usize, usize>,
    pub instance_groups: Vec<InstanceGroup>,
}

/// Multi-camera calibration plus per-frame cross-camera grouping.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordingSession {
    pub cameras: Vec<Camera>,
    /// Camera position -> video it recorded.
    pub camera_videos: BTreeMap<usize, VideoIdx>,
    pub frame_groups: Vec<FrameGroup>,
    /// Free-form calibration metadata.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl RecordingSession {
    pub fn camera_for_video(&self, video: VideoIdx) -> Option<usize> {
        self.camera_videos
            .iter()
            .find_map(|(&cam, &v)| (v == video).then_some(cam))
    }
}
