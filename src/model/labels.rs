use serde_json::{Map, Value};

use crate::foundation::core::{InstanceRef, SkeletonIdx, TrackIdx, VideoIdx};
use crate::foundation::error::{ArchiveError, ArchiveResult};
use crate::model::instance::AnyInstance;
use crate::model::session::RecordingSession;
use crate::model::skeleton::Skeleton;
use crate::model::video::Video;

/// Identity lineage used to re-identify an individual across frames.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub name: String,
    /// Frame the track was spawned on, as stored by older writers.
    pub spawned_on: i64,
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spawned_on: 0,
        }
    }
}

/// Instances annotated on one frame of one video.
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledFrame {
    pub video: VideoIdx,
    pub frame_idx: u64,
    pub instances: Vec<AnyInstance>,
}

impl LabeledFrame {
    pub fn new(video: VideoIdx, frame_idx: u64) -> Self {
        Self {
            video,
            frame_idx,
            instances: Vec::new(),
        }
    }

    pub fn user_instances(&self) -> impl Iterator<Item = &crate::Instance> {
        self.instances.iter().filter_map(AnyInstance::as_user)
    }

    pub fn predicted_instances(&self) -> impl Iterator<Item = &crate::PredictedInstance> {
        self.instances.iter().filter_map(AnyInstance::as_predicted)
    }
}

/// Frame proposed for labeling.
#[derive(Clone, Debug, PartialEq)]
pub struct SuggestionFrame {
    pub video: VideoIdx,
    pub frame_idx: u64,
    pub group: i64,
}

/// Root aggregate of an archive.
///
/// Owns every video, skeleton and track; frames and instances refer to them by index, so two
/// references to the same entity always resolve to the same object.
#[derive(Clone, Debug, Default)]
pub struct Labels {
    pub labeled_frames: Vec<LabeledFrame>,
    pub videos: Vec<Video>,
    pub skeletons: Vec<Skeleton>,
    pub tracks: Vec<Track>,
    pub suggestions: Vec<SuggestionFrame>,
    pub sessions: Vec<RecordingSession>,
    pub provenance: Map<String, Value>,
}

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.labeled_frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labeled_frames.is_empty()
    }

    pub fn instance(&self, r: InstanceRef) -> Option<&AnyInstance> {
        self.labeled_frames.get(r.frame)?.instances.get(r.instance)
    }

    pub fn skeleton(&self, idx: SkeletonIdx) -> Option<&Skeleton> {
        self.skeletons.get(idx.0)
    }

    pub fn track(&self, idx: TrackIdx) -> Option<&Track> {
        self.tracks.get(idx.0)
    }

    pub fn video(&self, idx: VideoIdx) -> Option<&Video> {
        self.videos.get(idx.0)
    }

    pub fn add_skeleton(&mut self, skeleton: Skeleton) -> SkeletonIdx {
        self.skeletons.push(skeleton);
        SkeletonIdx(self.skeletons.len() - 1)
    }

    pub fn add_video(&mut self, video: Video) -> VideoIdx {
        self.videos.push(video);
        VideoIdx(self.videos.len() - 1)
    }

    /// Track with this name, added when not already present.
    pub fn intern_track(&mut self, name: &str) -> TrackIdx {
        if let Some(i) = self.tracks.iter().position(|t| t.name == name) {
            return TrackIdx(i);
        }
        self.tracks.push(Track::new(name));
        TrackIdx(self.tracks.len() - 1)
    }

    pub fn num_instances(&self) -> usize {
        self.labeled_frames.iter().map(|f| f.instances.len()).sum()
    }

    /// Labeled frames of one video, in storage order.
    pub fn frames_for_video(&self, video: VideoIdx) -> impl Iterator<Item = &LabeledFrame> {
        self.labeled_frames.iter().filter(move |f| f.video == video)
    }

    /// Verify every cross-reference in the graph.
    ///
    /// Checks that frames reference existing videos, instances reference existing skeletons and
    /// tracks, point counts match their skeleton, and every from-predicted link targets a
    /// predicted instance of this graph.
    pub fn check_integrity(&self) -> ArchiveResult<()> {
        for (fi, frame) in self.labeled_frames.iter().enumerate() {
            if frame.video.0 >= self.videos.len() {
                return Err(ArchiveError::format(format!(
                    "frame {fi} references missing video {}",
                    frame.video.0
                )));
            }
            for (ii, inst) in frame.instances.iter().enumerate() {
                let skel = self.skeleton(inst.skeleton()).ok_or_else(|| {
                    ArchiveError::format(format!(
                        "instance {fi}/{ii} references missing skeleton {}",
                        inst.skeleton().0
                    ))
                })?;
                if inst.num_points() != skel.len() {
                    return Err(ArchiveError::format(format!(
                        "instance {fi}/{ii} has {} points for a {}-node skeleton",
                        inst.num_points(),
                        skel.len()
                    )));
                }
                if let Some(t) = inst.track()
                    && t.0 >= self.tracks.len()
                {
                    return Err(ArchiveError::format(format!(
                        "instance {fi}/{ii} references missing track {}",
                        t.0
                    )));
                }
                if let AnyInstance::User(u) = inst
                    && let Some(target) = u.from_predicted
                    && !self.instance(target).is_some_and(AnyInstance::is_predicted)
                {
                    return Err(ArchiveError::format(format!(
                        "instance {fi}/{ii} links to {target:?}, which is not a predicted instance"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/labels.rs"]
mod tests;
