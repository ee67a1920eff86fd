use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use serde_json::Value;

use crate::codec::side;
use crate::codec::skeleton_json::decode_skeletons;
use crate::codec::tables::{
    self, FrameRow, INSTANCE_TYPE_PREDICTED, InstanceRow, PointRow, TableView,
};
use crate::container::ContainerRead;
use crate::foundation::core::{FormatVersion, InstanceRef, SkeletonIdx, TrackIdx, VideoIdx};
use crate::foundation::error::{ArchiveError, ArchiveResult};
use crate::model::instance::{AnyInstance, Instance, Point, PredictedInstance, PredictedPoint};
use crate::model::labels::{LabeledFrame, Labels, SuggestionFrame, Track};
use crate::model::skeleton::Skeleton;
use crate::model::video::Video;
use crate::video::open::open_backend;
use crate::video::pipeline::PipelineOpts;

pub(crate) const METADATA: &str = "metadata";

/// Options for [`read_labels`].
#[derive(Debug, Clone)]
pub struct ReadOpts {
    /// Open a frame backend for every video after decoding the tables.
    pub open_videos: bool,
    /// Directory searched for external video files whose stored path does not exist.
    pub search_dir: Option<PathBuf>,
    /// Decode-cache settings for compressed-video backends.
    pub pipeline: PipelineOpts,
}

impl Default for ReadOpts {
    fn default() -> Self {
        Self {
            open_videos: true,
            search_dir: None,
            pipeline: PipelineOpts::default(),
        }
    }
}

/// Decode a [`Labels`] graph from an archive container.
///
/// Only a missing or unreadable `metadata` group is fatal. Rows that reference missing videos,
/// skeletons, tracks or instances are repaired locally and logged.
#[tracing::instrument(skip_all)]
pub fn read_labels<C: ContainerRead + ?Sized>(
    container: &C,
    opts: &ReadOpts,
) -> ArchiveResult<Labels> {
    let (version, meta) = read_metadata(container)?;
    tracing::debug!(format_id = version.0, "reading archive");

    let mut labels = Labels::new();
    labels.skeletons = decode_skeletons(&meta)?;
    if let Some(Value::Object(p)) = meta.get("provenance") {
        labels.provenance = p.clone();
    }
    labels.tracks = read_json_records(container, side::TRACKS_JSON, side::parse_track)?;
    labels.videos = read_json_records(container, side::VIDEOS_JSON, side::parse_video)?;

    let (frames, layout) = read_frames(container, &labels, version)?;
    labels.labeled_frames = frames;

    for (video, frame_idx, group) in
        read_json_records(container, side::SUGGESTIONS_JSON, side::parse_suggestion)?
    {
        match usize::try_from(video) {
            Ok(v) if v < labels.videos.len() => labels.suggestions.push(SuggestionFrame {
                video: VideoIdx(v),
                frame_idx,
                group,
            }),
            _ => tracing::warn!(video, frame_idx, "dropping suggestion for unknown video"),
        }
    }

    let num_videos = labels.videos.len();
    labels.sessions = read_json_records(container, side::SESSIONS_JSON, |s| {
        side::parse_session(s, num_videos, &layout)
    })?;

    if opts.open_videos {
        for (i, video) in labels.videos.iter_mut().enumerate() {
            match open_backend(
                video,
                Some(container),
                version,
                opts.search_dir.as_deref(),
                &opts.pipeline,
            ) {
                Ok(backend) => video.set_backend(Some(backend)),
                Err(e) => tracing::warn!(video = i, error = %e, "video backend unavailable"),
            }
        }
    }

    Ok(labels)
}

/// Stored format version and parsed metadata JSON.
pub(crate) fn read_metadata<C: ContainerRead + ?Sized>(
    container: &C,
) -> ArchiveResult<(FormatVersion, Value)> {
    if !container.contains(METADATA) {
        return Err(ArchiveError::structural("archive has no metadata group"));
    }
    let attrs = container.attrs(METADATA);
    let version = FormatVersion(
        attrs
            .get("format_id")
            .and_then(|a| a.as_f64())
            .unwrap_or(1.0),
    );
    let json = attrs
        .get("json")
        .and_then(|a| a.as_str())
        .ok_or_else(|| ArchiveError::structural("metadata has no json attribute"))?;
    Ok((version, serde_json::from_str(json)?))
}

fn read_json_records<C, T, F>(container: &C, path: &str, mut parse: F) -> ArchiveResult<Vec<T>>
where
    C: ContainerRead + ?Sized,
    F: FnMut(&str) -> ArchiveResult<T>,
{
    let Some(ds) = container.dataset(path) else {
        return Ok(Vec::new());
    };
    ds.strings()?.iter().map(|s| parse(s)).collect()
}

/// Maps a frame row's stored video id to a position in `Labels::videos`.
#[derive(Debug)]
pub(crate) struct VideoIdMap {
    identity: bool,
    by_prefix: HashMap<i64, usize>,
    num_videos: usize,
}

impl VideoIdMap {
    pub(crate) fn new(rows: &[FrameRow], videos: &[Video]) -> Self {
        let referenced: BTreeSet<i64> = rows.iter().map(|r| r.video).collect();
        let n = videos.len();
        let identity = referenced.len() == n
            && referenced
                .iter()
                .enumerate()
                .all(|(i, &id)| id == i as i64);

        let mut by_prefix = HashMap::new();
        if !identity {
            for (i, v) in videos.iter().enumerate() {
                if let Some(id) = v.embedded_dataset().and_then(dataset_video_id) {
                    by_prefix.insert(id, i);
                }
            }
        }
        Self {
            identity,
            by_prefix,
            num_videos: n,
        }
    }

    pub(crate) fn resolve(&self, id: i64) -> Option<VideoIdx> {
        if !self.identity
            && let Some(&i) = self.by_prefix.get(&id)
        {
            return Some(VideoIdx(i));
        }
        usize::try_from(id)
            .ok()
            .filter(|&i| i < self.num_videos)
            .map(VideoIdx)
    }
}

/// `N` from an embedded dataset path `videoN/...`.
fn dataset_video_id(path: &str) -> Option<i64> {
    let first = path.trim_start_matches('/').split('/').next()?;
    first.strip_prefix("video")?.parse().ok()
}

fn table_rows<C, T>(
    container: &C,
    name: &'static str,
    read: fn(&TableView<'_>) -> ArchiveResult<Vec<T>>,
) -> ArchiveResult<Option<Vec<T>>>
where
    C: ContainerRead + ?Sized,
{
    let Some(ds) = container.dataset(name) else {
        return Ok(None);
    };
    let view = TableView::new(name, &ds)?;
    Ok(Some(read(&view)?))
}

fn read_frames<C: ContainerRead + ?Sized>(
    container: &C,
    labels: &Labels,
    version: FormatVersion,
) -> ArchiveResult<(Vec<LabeledFrame>, FrameLayout)> {
    let Some(frames) = table_rows(container, tables::FRAMES, tables::read_frame_rows)? else {
        tracing::debug!("archive has no frames table");
        return Ok(Default::default());
    };
    if frames.is_empty() {
        return Ok(Default::default());
    }
    let instances = table_rows(container, tables::INSTANCES, tables::read_instance_rows)?
        .ok_or_else(|| ArchiveError::structural("archive has frames but no instances table"))?;
    let points =
        table_rows(container, tables::POINTS, tables::read_point_rows)?.unwrap_or_default();
    let pred_points =
        table_rows(container, tables::PRED_POINTS, tables::read_point_rows)?.unwrap_or_default();

    let video_map = VideoIdMap::new(&frames, &labels.videos);
    decode_frames(
        &RawTables {
            frames: &frames,
            instances: &instances,
            points: &points,
            pred_points: &pred_points,
        },
        &video_map,
        &labels.skeletons,
        &labels.tracks,
        version,
    )
}

/// Row data of the four relational tables.
pub(crate) struct RawTables<'a> {
    pub(crate) frames: &'a [FrameRow],
    pub(crate) instances: &'a [InstanceRow],
    pub(crate) points: &'a [PointRow],
    pub(crate) pred_points: &'a [PointRow],
}

/// Where each stored frame row ended up after decoding.
///
/// Rows whose video cannot be resolved are skipped, so later rows move down; anything that
/// refers to labeled frames by stored row goes through this map.
#[derive(Debug, Clone, Default)]
pub(crate) struct FrameLayout {
    /// Decoded position per stored row, `None` for skipped rows.
    pub(crate) rows: Vec<Option<usize>>,
    /// Instance count per decoded frame.
    pub(crate) sizes: Vec<usize>,
}

impl FrameLayout {
    /// Layout where every stored row was kept in place.
    #[cfg(test)]
    pub(crate) fn identity(sizes: &[usize]) -> Self {
        Self {
            rows: (0..sizes.len()).map(Some).collect(),
            sizes: sizes.to_vec(),
        }
    }

    pub(crate) fn frame(&self, row: usize) -> Option<usize> {
        self.rows.get(row).copied().flatten()
    }

    pub(crate) fn instance(&self, row: usize, instance: usize) -> Option<InstanceRef> {
        let frame = self.frame(row)?;
        self.sizes
            .get(frame)
            .is_some_and(|&n| instance < n)
            .then(|| InstanceRef::new(frame, instance))
    }
}

fn range(start: i64, end: i64, len: usize) -> std::ops::Range<usize> {
    let clamp = |v: i64| usize::try_from(v.max(0)).unwrap_or(0).min(len);
    let s = clamp(start);
    s..clamp(end).max(s)
}

/// Rebuild labeled frames from table rows.
///
/// Single forward pass over frames and their instance ranges; from-predicted links are recorded
/// as `(instance, target_id)` and attached in a second pass, since a predicted instance may be
/// stored after the user instance that references it. Also returns the stored-row layout.
pub(crate) fn decode_frames(
    raw: &RawTables<'_>,
    videos: &VideoIdMap,
    skeletons: &[Skeleton],
    tracks: &[Track],
    version: FormatVersion,
) -> ArchiveResult<(Vec<LabeledFrame>, FrameLayout)> {
    let legacy_offset = version.has_legacy_pixel_offset();
    let mut out: Vec<LabeledFrame> = Vec::with_capacity(raw.frames.len());
    let mut positions = Vec::with_capacity(raw.frames.len());
    let mut by_id = HashMap::<i64, InstanceRef>::new();
    let mut pending = Vec::<(InstanceRef, i64)>::new();

    for frame in raw.frames {
        let Some(video) = videos.resolve(frame.video) else {
            tracing::warn!(
                frame_id = frame.frame_id,
                video = frame.video,
                "skipping frame with unresolvable video"
            );
            positions.push(None);
            continue;
        };
        let frame_pos = out.len();
        positions.push(Some(frame_pos));
        let mut lf = LabeledFrame::new(video, u64::try_from(frame.frame_idx).unwrap_or(0));

        let rows = range(frame.instance_start, frame.instance_end, raw.instances.len());
        for row in &raw.instances[rows] {
            let skeleton = resolve_skeleton(row, skeletons)?;
            let n_nodes = skeletons[skeleton.0].len();
            let track = usize::try_from(row.track)
                .ok()
                .filter(|&t| t < tracks.len())
                .map(TrackIdx);
            if track.is_none() && row.track >= 0 {
                tracing::warn!(
                    instance_id = row.instance_id,
                    track = row.track,
                    "dropping unknown track reference"
                );
            }

            let mut inst = if row.instance_type == INSTANCE_TYPE_PREDICTED {
                let rows = &raw.pred_points
                    [range(row.point_start, row.point_end, raw.pred_points.len())];
                let mut pts: Vec<PredictedPoint> = rows
                    .iter()
                    .map(|p| PredictedPoint {
                        x: p.x,
                        y: p.y,
                        visible: p.visible,
                        complete: p.complete,
                        score: p.score,
                    })
                    .collect();
                conform_len(&mut pts, n_nodes, PredictedPoint::missing, row.instance_id);
                AnyInstance::Predicted(PredictedInstance {
                    skeleton,
                    points: pts,
                    track,
                    score: row.score,
                    tracking_score: row.tracking_score,
                })
            } else {
                let rows = &raw.points[range(row.point_start, row.point_end, raw.points.len())];
                let mut pts: Vec<Point> = rows
                    .iter()
                    .map(|p| Point {
                        x: p.x,
                        y: p.y,
                        visible: p.visible,
                        complete: p.complete,
                    })
                    .collect();
                conform_len(&mut pts, n_nodes, Point::missing, row.instance_id);
                AnyInstance::User(Instance {
                    skeleton,
                    points: pts,
                    track,
                    from_predicted: None,
                    tracking_score: row.tracking_score,
                })
            };
            if legacy_offset {
                inst.offset(-0.5, -0.5);
            }

            let here = InstanceRef::new(frame_pos, lf.instances.len());
            by_id.insert(row.instance_id, here);
            if !inst.is_predicted() && row.from_predicted >= 0 {
                pending.push((here, row.from_predicted));
            }
            lf.instances.push(inst);
        }
        out.push(lf);
    }

    for (user, target_id) in pending {
        let target = by_id.get(&target_id).copied().filter(|t| {
            out.get(t.frame)
                .and_then(|f| f.instances.get(t.instance))
                .is_some_and(AnyInstance::is_predicted)
        });
        let Some(target) = target else {
            tracing::warn!(target_id, "from_predicted does not resolve to a predicted instance");
            continue;
        };
        if let AnyInstance::User(u) = &mut out[user.frame].instances[user.instance] {
            u.from_predicted = Some(target);
        }
    }

    let sizes = out.iter().map(|f| f.instances.len()).collect();
    Ok((
        out,
        FrameLayout {
            rows: positions,
            sizes,
        },
    ))
}

fn resolve_skeleton(row: &InstanceRow, skeletons: &[Skeleton]) -> ArchiveResult<SkeletonIdx> {
    if skeletons.is_empty() {
        return Err(ArchiveError::format(format!(
            "instance {} references a skeleton but the archive defines none",
            row.instance_id
        )));
    }
    match usize::try_from(row.skeleton) {
        Ok(s) if s < skeletons.len() => Ok(SkeletonIdx(s)),
        _ => {
            tracing::warn!(
                instance_id = row.instance_id,
                skeleton = row.skeleton,
                "unknown skeleton; using the first skeleton"
            );
            Ok(SkeletonIdx(0))
        }
    }
}

fn conform_len<T>(pts: &mut Vec<T>, n: usize, missing: fn() -> T, instance_id: i64) {
    if pts.len() == n {
        return;
    }
    tracing::warn!(
        instance_id,
        stored = pts.len(),
        nodes = n,
        "point count differs from skeleton node count"
    );
    pts.truncate(n);
    while pts.len() < n {
        pts.push(missing());
    }
}

#[cfg(test)]
#[path = "../../tests/unit/codec/read.rs"]
mod tests;
