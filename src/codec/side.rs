//! JSON side records: tracks, videos, suggestions and recording sessions.
//!
//! Each record is one JSON document stored as one element of a string dataset.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::foundation::core::VideoIdx;
use crate::codec::read::FrameLayout;
use crate::foundation::error::{ArchiveError, ArchiveResult};
use crate::model::labels::{SuggestionFrame, Track};
use crate::model::session::{Camera, FrameGroup, InstanceGroup, RecordingSession};
use crate::model::video::{Video, VideoFilename};

pub(crate) const TRACKS_JSON: &str = "tracks_json";
pub(crate) const VIDEOS_JSON: &str = "videos_json";
pub(crate) const SUGGESTIONS_JSON: &str = "suggestions_json";
pub(crate) const SESSIONS_JSON: &str = "sessions_json";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TrackRepr {
    Pair(Value, String),
    Obj {
        name: String,
        #[serde(default)]
        spawned_on: i64,
    },
}

pub(crate) fn parse_track(s: &str) -> ArchiveResult<Track> {
    Ok(match serde_json::from_str::<TrackRepr>(s)? {
        TrackRepr::Pair(spawned_on, name) => Track {
            name,
            spawned_on: spawned_on
                .as_i64()
                .or_else(|| spawned_on.as_f64().map(|f| f as i64))
                .unwrap_or(0),
        },
        TrackRepr::Obj { name, spawned_on } => Track { name, spawned_on },
    })
}

pub(crate) fn encode_track(t: &Track) -> ArchiveResult<String> {
    Ok(serde_json::to_string(&(t.spawned_on, &t.name))?)
}

#[derive(Debug, Serialize, Deserialize)]
struct VideoRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filename: Option<VideoFilename>,
    #[serde(default)]
    backend: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_video: Option<Box<VideoRepr>>,
}

impl VideoRepr {
    fn into_video(self) -> ArchiveResult<Video> {
        let filename = match self.filename {
            Some(f) => f,
            None => match self.backend.get("filename") {
                Some(v) => serde_json::from_value(v.clone())?,
                None => {
                    return Err(ArchiveError::format("video record has no filename"));
                }
            },
        };
        let mut video = Video::new(filename);
        video.backend_metadata = self.backend;
        video.source_video = match self.source_video {
            Some(src) => Some(Box::new(src.into_video()?)),
            None => None,
        };
        Ok(video)
    }

    fn from_video(v: &Video) -> Self {
        Self {
            filename: Some(v.filename.clone()),
            backend: v.backend_metadata.clone(),
            source_video: v
                .source_video
                .as_deref()
                .map(|s| Box::new(Self::from_video(s))),
        }
    }
}

pub(crate) fn parse_video(s: &str) -> ArchiveResult<Video> {
    serde_json::from_str::<VideoRepr>(s)?.into_video()
}

pub(crate) fn encode_video(v: &Video) -> ArchiveResult<String> {
    Ok(serde_json::to_string(&VideoRepr::from_video(v))?)
}

#[derive(Debug, Serialize, Deserialize)]
struct SuggestionRepr {
    video: Value,
    frame_idx: u64,
    #[serde(default)]
    group: i64,
}

/// Suggestion record; the video index is resolved by the caller.
pub(crate) fn parse_suggestion(s: &str) -> ArchiveResult<(i64, u64, i64)> {
    let r: SuggestionRepr = serde_json::from_str(s)?;
    let video = r
        .video
        .as_i64()
        .or_else(|| r.video.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| ArchiveError::format(format!("bad suggestion video '{}'", r.video)))?;
    Ok((video, r.frame_idx, r.group))
}

pub(crate) fn encode_suggestion(s: &SuggestionFrame) -> ArchiveResult<String> {
    Ok(serde_json::to_string(&SuggestionRepr {
        video: Value::from(s.video.0.to_string()),
        frame_idx: s.frame_idx,
        group: s.group,
    })?)
}

#[derive(Debug, Serialize, Deserialize)]
struct CameraRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    rotation: Vec<f64>,
    translation: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    matrix: Option<Vec<Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    distortions: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<Vec<u32>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct InstanceGroupRepr {
    #[serde(default)]
    camcorder_to_lf_and_inst_idx_map: BTreeMap<String, (usize, usize)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    points: Option<Vec<[f64; 3]>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FrameGroupRepr {
    frame_idx: u64,
    #[serde(default)]
    labeled_frame_by_camera_map: BTreeMap<String, usize>,
    #[serde(default)]
    instance_groups: Vec<InstanceGroupRepr>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionRepr {
    calibration: Map<String, Value>,
    #[serde(default)]
    camcorder_to_video_idx_map: BTreeMap<String, usize>,
    #[serde(default)]
    frame_group_dicts: Vec<FrameGroupRepr>,
}

fn vec3(v: &[f64], what: &str) -> ArchiveResult<[f64; 3]> {
    <[f64; 3]>::try_from(v)
        .map_err(|_| ArchiveError::format(format!("camera {what} must have 3 values")))
}

fn camera_from_repr(r: CameraRepr) -> ArchiveResult<Camera> {
    let matrix = match r.matrix {
        Some(rows) => {
            if rows.len() != 3 {
                return Err(ArchiveError::format("camera matrix must be 3x3"));
            }
            Some([
                vec3(&rows[0], "matrix row")?,
                vec3(&rows[1], "matrix row")?,
                vec3(&rows[2], "matrix row")?,
            ])
        }
        None => None,
    };
    let size = match r.size.as_deref() {
        Some([w, h]) => Some((*w, *h)),
        Some(_) => return Err(ArchiveError::format("camera size must be [width, height]")),
        None => None,
    };
    Ok(Camera {
        name: r.name,
        rotation: vec3(&r.rotation, "rotation")?,
        translation: vec3(&r.translation, "translation")?,
        matrix,
        distortions: r.distortions,
        size,
    })
}

/// Parse one session. Camera keys are ordered numerically when they parse as integers.
///
/// Labeled-frame references are stored frame rows and are moved to their decoded positions
/// through `layout`. Videos and instances are range-checked; dangling references are dropped
/// with a warning.
pub(crate) fn parse_session(
    s: &str,
    num_videos: usize,
    layout: &FrameLayout,
) -> ArchiveResult<RecordingSession> {
    let repr: SessionRepr = serde_json::from_str(s)?;

    let mut metadata = Map::new();
    let mut keyed = Vec::new();
    for (key, value) in repr.calibration {
        if key == "metadata" {
            if let Value::Object(m) = value {
                metadata = m;
            }
            continue;
        }
        keyed.push((key, value));
    }
    keyed.sort_by(|(a, _), (b, _)| match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    });

    let mut session = RecordingSession {
        metadata,
        ..RecordingSession::default()
    };
    let mut position_by_key = BTreeMap::new();
    for (key, value) in keyed {
        let cam: CameraRepr = serde_json::from_value(value)?;
        position_by_key.insert(key, session.cameras.len());
        session.cameras.push(camera_from_repr(cam)?);
    }

    for (key, video) in repr.camcorder_to_video_idx_map {
        match position_by_key.get(&key) {
            Some(&cam) if video < num_videos => {
                session.camera_videos.insert(cam, VideoIdx(video));
            }
            _ => tracing::warn!(camera = %key, video, "dropping unresolvable camera video"),
        }
    }

    for fg in repr.frame_group_dicts {
        let mut group = FrameGroup {
            frame_idx: fg.frame_idx,
            ..FrameGroup::default()
        };
        for (key, lf) in fg.labeled_frame_by_camera_map {
            match (position_by_key.get(&key), layout.frame(lf)) {
                (Some(&cam), Some(frame)) => {
                    group.labeled_frames.insert(cam, frame);
                }
                _ => tracing::warn!(camera = %key, lf, "dropping unresolvable frame-group view"),
            }
        }
        for ig in fg.instance_groups {
            let mut out = InstanceGroup {
                score: ig.score,
                points: ig.points,
                ..InstanceGroup::default()
            };
            for (key, (lf, inst)) in ig.camcorder_to_lf_and_inst_idx_map {
                match (position_by_key.get(&key), layout.instance(lf, inst)) {
                    (Some(&cam), Some(member)) => {
                        out.instances.insert(cam, member);
                    }
                    _ => tracing::warn!(
                        camera = %key,
                        lf,
                        inst,
                        "dropping unresolvable instance-group member"
                    ),
                }
            }
            group.instance_groups.push(out);
        }
        session.frame_groups.push(group);
    }

    Ok(session)
}

pub(crate) fn encode_session(s: &RecordingSession) -> ArchiveResult<String> {
    let mut calibration = Map::new();
    calibration.insert("metadata".into(), Value::Object(s.metadata.clone()));
    for (i, cam) in s.cameras.iter().enumerate() {
        let repr = CameraRepr {
            name: cam.name.clone(),
            rotation: cam.rotation.to_vec(),
            translation: cam.translation.to_vec(),
            matrix: cam.matrix.map(|m| m.iter().map(|r| r.to_vec()).collect()),
            distortions: cam.distortions.clone(),
            size: cam.size.map(|(w, h)| vec![w, h]),
        };
        calibration.insert(i.to_string(), serde_json::to_value(repr)?);
    }

    let repr = SessionRepr {
        calibration,
        camcorder_to_video_idx_map: s
            .camera_videos
            .iter()
            .map(|(cam, v)| (cam.to_string(), v.0))
            .collect(),
        frame_group_dicts: s
            .frame_groups
            .iter()
            .map(|fg| FrameGroupRepr {
                frame_idx: fg.frame_idx,
                labeled_frame_by_camera_map: fg
                    .labeled_frames
                    .iter()
                    .map(|(cam, lf)| (cam.to_string(), *lf))
                    .collect(),
                instance_groups: fg
                    .instance_groups
                    .iter()
                    .map(|ig| InstanceGroupRepr {
                        camcorder_to_lf_and_inst_idx_map: ig
                            .instances
                            .iter()
                            .map(|(cam, r)| (cam.to_string(), (r.frame, r.instance)))
                            .collect(),
                        score: ig.score,
                        points: ig.points.clone(),
                    })
                    .collect(),
            })
            .collect(),
    };
    Ok(serde_json::to_string(&repr)?)
}

#[cfg(test)]
#[path = "../../tests/unit/codec/side.rs"]
mod tests;
