use std::collections::HashMap;

use serde_json::{Map, Value, json};

use crate::codec::read::METADATA;
use crate::codec::side;
use crate::codec::skeleton_json::encode_skeletons;
use crate::codec::tables::{
    self, FrameColumns, FrameRow, INSTANCE_TYPE_PREDICTED, INSTANCE_TYPE_USER, InstanceColumns,
    InstanceRow, PointColumns, PointRow,
};
use crate::container::{AttrValue, ContainerWrite, Data, Dataset};
use crate::foundation::core::{FormatVersion, InstanceRef};
use crate::foundation::error::{ArchiveError, ArchiveResult};
use crate::model::instance::AnyInstance;
use crate::model::labels::Labels;

/// Options for [`write_labels`].
#[derive(Debug, Clone, Default)]
pub struct WriteOpts {
    /// Entries merged over `Labels::provenance` before writing.
    pub provenance: Map<String, Value>,
}

/// The four relational tables, fully built in memory.
#[derive(Debug, Default)]
pub(crate) struct EncodedTables {
    pub(crate) frames: FrameColumns,
    pub(crate) instances: InstanceColumns,
    pub(crate) points: PointColumns,
    pub(crate) pred_points: PointColumns,
}

/// Flatten labeled frames into table rows.
///
/// Ids are assigned in append order. User instances record the target of their from-predicted
/// link; once every predicted instance has an id the recorded rows are rewritten to the target id,
/// or `-1` when the target is not part of `labels`.
pub(crate) fn encode_tables(labels: &Labels) -> ArchiveResult<EncodedTables> {
    let mut out = EncodedTables::default();
    let mut predicted_ids = HashMap::<InstanceRef, i64>::new();
    let mut links = Vec::<(usize, InstanceRef)>::new();

    for (fi, frame) in labels.labeled_frames.iter().enumerate() {
        if frame.video.0 >= labels.videos.len() {
            return Err(ArchiveError::format(format!(
                "frame {fi} references missing video {}",
                frame.video.0
            )));
        }
        let frame_id = fi as i64;
        let instance_start = out.instances.instance_id.len() as i64;

        for (ii, inst) in frame.instances.iter().enumerate() {
            if inst.skeleton().0 >= labels.skeletons.len() {
                return Err(ArchiveError::format(format!(
                    "instance {fi}/{ii} references missing skeleton {}",
                    inst.skeleton().0
                )));
            }
            let instance_id = out.instances.instance_id.len() as i64;
            let track = inst.track().map_or(-1, |t| t.0 as i64);

            let row = match inst {
                AnyInstance::User(u) => {
                    let point_start = out.points.len() as i64;
                    for p in &u.points {
                        out.points.push(PointRow {
                            x: p.x,
                            y: p.y,
                            visible: p.visible,
                            complete: p.complete,
                            score: 0.0,
                        });
                    }
                    InstanceRow {
                        instance_id,
                        instance_type: INSTANCE_TYPE_USER,
                        frame_id,
                        skeleton: u.skeleton.0 as i64,
                        track,
                        from_predicted: -1,
                        score: 0.0,
                        point_start,
                        point_end: out.points.len() as i64,
                        tracking_score: u.tracking_score,
                    }
                }
                AnyInstance::Predicted(p) => {
                    let point_start = out.pred_points.len() as i64;
                    for pt in &p.points {
                        out.pred_points.push(PointRow {
                            x: pt.x,
                            y: pt.y,
                            visible: pt.visible,
                            complete: pt.complete,
                            score: pt.score,
                        });
                    }
                    predicted_ids.insert(InstanceRef::new(fi, ii), instance_id);
                    InstanceRow {
                        instance_id,
                        instance_type: INSTANCE_TYPE_PREDICTED,
                        frame_id,
                        skeleton: p.skeleton.0 as i64,
                        track,
                        from_predicted: -1,
                        score: p.score,
                        point_start,
                        point_end: out.pred_points.len() as i64,
                        tracking_score: p.tracking_score,
                    }
                }
            };
            let row_pos = out.instances.push(row);
            if let AnyInstance::User(u) = inst
                && let Some(target) = u.from_predicted
            {
                links.push((row_pos, target));
            }
        }

        out.frames.push(FrameRow {
            frame_id,
            video: frame.video.0 as i64,
            frame_idx: frame.frame_idx as i64,
            instance_start,
            instance_end: out.instances.instance_id.len() as i64,
        });
    }

    for (row, target) in links {
        let id = predicted_ids.get(&target).copied().unwrap_or_else(|| {
            tracing::warn!(?target, "from_predicted target not written; storing -1");
            -1
        });
        out.instances.from_predicted[row] = id;
    }

    Ok(out)
}

fn metadata_json(labels: &Labels, opts: &WriteOpts) -> Value {
    let (nodes, skeletons) = encode_skeletons(&labels.skeletons);
    let mut provenance = labels.provenance.clone();
    provenance.extend(opts.provenance.clone());
    json!({
        "version": env!("CARGO_PKG_VERSION"),
        "nodes": nodes,
        "skeletons": skeletons,
        "provenance": provenance,
    })
}

fn string_dataset<T>(
    items: &[T],
    encode: impl Fn(&T) -> ArchiveResult<String>,
) -> ArchiveResult<Dataset> {
    let strings = items.iter().map(encode).collect::<ArchiveResult<Vec<_>>>()?;
    Ok(Dataset::vector(Data::Str(strings)))
}

/// Encode `labels` into `container` at the current format version.
///
/// Every table and side record is built before anything is written, so an encoding error leaves
/// the container untouched.
#[tracing::instrument(skip_all, fields(frames = labels.len()))]
pub fn write_labels<C: ContainerWrite + ?Sized>(
    labels: &Labels,
    container: &mut C,
    opts: &WriteOpts,
) -> ArchiveResult<()> {
    let tables = encode_tables(labels)?;
    let meta = serde_json::to_string(&metadata_json(labels, opts))?;

    let datasets = [
        (
            side::TRACKS_JSON,
            string_dataset(&labels.tracks, side::encode_track)?,
        ),
        (
            side::VIDEOS_JSON,
            string_dataset(&labels.videos, side::encode_video)?,
        ),
        (
            side::SUGGESTIONS_JSON,
            string_dataset(&labels.suggestions, side::encode_suggestion)?,
        ),
        (
            side::SESSIONS_JSON,
            string_dataset(&labels.sessions, side::encode_session)?,
        ),
        (
            tables::FRAMES,
            Dataset::vector(Data::Compound(tables.frames.into_table())),
        ),
        (
            tables::INSTANCES,
            Dataset::vector(Data::Compound(tables.instances.into_table())),
        ),
        (
            tables::POINTS,
            Dataset::vector(Data::Compound(tables.points.into_table(false))),
        ),
        (
            tables::PRED_POINTS,
            Dataset::vector(Data::Compound(tables.pred_points.into_table(true))),
        ),
    ];

    container.create_group(METADATA)?;
    container.set_attr(
        METADATA,
        "format_id",
        AttrValue::Float(FormatVersion::CURRENT.0),
    )?;
    container.set_attr(METADATA, "json", AttrValue::Str(meta))?;
    for (path, ds) in datasets {
        container.write_dataset(path, ds)?;
    }
    tracing::debug!(
        instances = labels.num_instances(),
        videos = labels.videos.len(),
        "archive written"
    );
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/codec/write.rs"]
mod tests;
