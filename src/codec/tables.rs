//! Columnar views over the four relational tables.
//!
//! A logical row is the same position read out of several named columns. Columns come either
//! from a compound dataset or from a 2-D numeric dataset whose `field_names` attribute names the
//! columns.

use crate::container::{Column, Data, Dataset, Table};
use crate::foundation::error::{ArchiveError, ArchiveResult};

pub(crate) const FRAMES: &str = "frames";
pub(crate) const INSTANCES: &str = "instances";
pub(crate) const POINTS: &str = "points";
pub(crate) const PRED_POINTS: &str = "pred_points";

pub(crate) const INSTANCE_TYPE_USER: i64 = 0;
pub(crate) const INSTANCE_TYPE_PREDICTED: i64 = 1;

enum Source<'a> {
    Compound(&'a Table),
    Matrix {
        values: MatrixValues<'a>,
        cols: usize,
        fields: Vec<String>,
    },
}

#[derive(Clone, Copy)]
enum MatrixValues<'a> {
    F64(&'a [f64]),
    I64(&'a [i64]),
}

/// Read-only columnar access to one table dataset.
pub(crate) struct TableView<'a> {
    name: &'static str,
    source: Source<'a>,
    rows: usize,
}

/// Resolved column position; `None` means the column is absent.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Col(Option<usize>);

impl<'a> TableView<'a> {
    pub(crate) fn new(name: &'static str, ds: &'a Dataset) -> ArchiveResult<Self> {
        match &ds.data {
            Data::Compound(t) => Ok(Self {
                name,
                rows: t.rows(),
                source: Source::Compound(t),
            }),
            Data::F64(_) | Data::I64(_) => {
                let fields: Vec<String> = ds
                    .attr("field_names")
                    .and_then(|a| a.as_str_list())
                    .ok_or_else(|| {
                        ArchiveError::format(format!(
                            "table '{name}' is not compound and has no field_names attribute"
                        ))
                    })?
                    .to_vec();
                let cols = match ds.shape.as_slice() {
                    [_, c] => *c,
                    [0] => fields.len(),
                    other => {
                        return Err(ArchiveError::format(format!(
                            "table '{name}' has shape {other:?}, expected 2-D"
                        )));
                    }
                };
                if cols != fields.len() {
                    return Err(ArchiveError::format(format!(
                        "table '{name}' has {cols} columns but {} field names",
                        fields.len()
                    )));
                }
                let values = match &ds.data {
                    Data::F64(v) => MatrixValues::F64(v),
                    Data::I64(v) => MatrixValues::I64(v),
                    _ => unreachable!("matched numeric data above"),
                };
                let len = match values {
                    MatrixValues::F64(v) => v.len(),
                    MatrixValues::I64(v) => v.len(),
                };
                let rows = if cols == 0 { 0 } else { len / cols };
                Ok(Self {
                    name,
                    source: Source::Matrix {
                        values,
                        cols,
                        fields,
                    },
                    rows,
                })
            }
            _ => Err(ArchiveError::format(format!(
                "table '{name}' has unsupported element type {:?}",
                ds.dtype()
            ))),
        }
    }

    pub(crate) fn rows(&self) -> usize {
        self.rows
    }

    pub(crate) fn optional(&self, field: &str) -> Col {
        let fields = match &self.source {
            Source::Compound(t) => &t.fields,
            Source::Matrix { fields, .. } => fields,
        };
        Col(fields.iter().position(|f| f == field))
    }

    pub(crate) fn required(&self, field: &str) -> ArchiveResult<Col> {
        let col = self.optional(field);
        if col.0.is_none() {
            return Err(ArchiveError::format(format!(
                "table '{}' is missing column '{field}'",
                self.name
            )));
        }
        Ok(col)
    }

    pub(crate) fn f64(&self, col: Col, row: usize, default: f64) -> f64 {
        let Some(c) = col.0 else {
            return default;
        };
        match &self.source {
            Source::Compound(t) => match t.columns.get(c) {
                None => default,
                Some(Column::F64(v)) => v.get(row).copied().unwrap_or(default),
                Some(Column::I64(v)) => v.get(row).map_or(default, |&x| x as f64),
                Some(Column::Bool(v)) => v.get(row).map_or(default, |&b| f64::from(u8::from(b))),
            },
            Source::Matrix { values, cols, .. } => {
                let i = row * cols + c;
                match values {
                    MatrixValues::F64(v) => v.get(i).copied().unwrap_or(default),
                    MatrixValues::I64(v) => v.get(i).map_or(default, |&x| x as f64),
                }
            }
        }
    }

    pub(crate) fn i64(&self, col: Col, row: usize, default: i64) -> i64 {
        let Some(c) = col.0 else {
            return default;
        };
        match &self.source {
            Source::Compound(t) => match t.columns.get(c) {
                None => default,
                Some(Column::I64(v)) => v.get(row).copied().unwrap_or(default),
                Some(Column::F64(v)) => v.get(row).map_or(default, |&x| x as i64),
                Some(Column::Bool(v)) => v.get(row).map_or(default, |&b| i64::from(b)),
            },
            Source::Matrix { values, cols, .. } => {
                let i = row * cols + c;
                match values {
                    MatrixValues::I64(v) => v.get(i).copied().unwrap_or(default),
                    MatrixValues::F64(v) => v.get(i).map_or(default, |&x| x as i64),
                }
            }
        }
    }

    pub(crate) fn bool(&self, col: Col, row: usize, default: bool) -> bool {
        if col.0.is_none() {
            return default;
        }
        self.f64(col, row, if default { 1.0 } else { 0.0 }) != 0.0
    }
}

/// `frames[i]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct FrameRow {
    pub(crate) frame_id: i64,
    pub(crate) video: i64,
    pub(crate) frame_idx: i64,
    pub(crate) instance_start: i64,
    pub(crate) instance_end: i64,
}

/// `instances[i]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct InstanceRow {
    pub(crate) instance_id: i64,
    pub(crate) instance_type: i64,
    pub(crate) frame_id: i64,
    pub(crate) skeleton: i64,
    pub(crate) track: i64,
    pub(crate) from_predicted: i64,
    pub(crate) score: f64,
    pub(crate) point_start: i64,
    pub(crate) point_end: i64,
    pub(crate) tracking_score: f64,
}

/// `points[i]` / `pred_points[i]`; `score` is absent for user points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PointRow {
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) visible: bool,
    pub(crate) complete: bool,
    pub(crate) score: f64,
}

pub(crate) fn read_frame_rows(view: &TableView<'_>) -> ArchiveResult<Vec<FrameRow>> {
    let frame_id = view.required("frame_id")?;
    let video = view.required("video")?;
    let frame_idx = view.required("frame_idx")?;
    let start = view.required("instance_id_start")?;
    let end = view.required("instance_id_end")?;
    Ok((0..view.rows())
        .map(|r| FrameRow {
            frame_id: view.i64(frame_id, r, -1),
            video: view.i64(video, r, -1),
            frame_idx: view.i64(frame_idx, r, -1),
            instance_start: view.i64(start, r, 0),
            instance_end: view.i64(end, r, 0),
        })
        .collect())
}

pub(crate) fn read_instance_rows(view: &TableView<'_>) -> ArchiveResult<Vec<InstanceRow>> {
    let instance_id = view.required("instance_id")?;
    let instance_type = view.required("instance_type")?;
    let frame_id = view.required("frame_id")?;
    let skeleton = view.required("skeleton")?;
    let track = view.required("track")?;
    let from_predicted = view.required("from_predicted")?;
    let score = view.optional("score");
    let point_start = view.required("point_id_start")?;
    let point_end = view.required("point_id_end")?;
    let tracking_score = view.optional("tracking_score");
    Ok((0..view.rows())
        .map(|r| InstanceRow {
            instance_id: view.i64(instance_id, r, -1),
            instance_type: view.i64(instance_type, r, INSTANCE_TYPE_USER),
            frame_id: view.i64(frame_id, r, -1),
            skeleton: view.i64(skeleton, r, 0),
            track: view.i64(track, r, -1),
            from_predicted: view.i64(from_predicted, r, -1),
            score: view.f64(score, r, 0.0),
            point_start: view.i64(point_start, r, 0),
            point_end: view.i64(point_end, r, 0),
            tracking_score: view.f64(tracking_score, r, 0.0),
        })
        .collect())
}

pub(crate) fn read_point_rows(view: &TableView<'_>) -> ArchiveResult<Vec<PointRow>> {
    let x = view.required("x")?;
    let y = view.required("y")?;
    let visible = view.optional("visible");
    let complete = view.optional("complete");
    let score = view.optional("score");
    Ok((0..view.rows())
        .map(|r| PointRow {
            x: view.f64(x, r, f64::NAN),
            y: view.f64(y, r, f64::NAN),
            visible: view.bool(visible, r, true),
            complete: view.bool(complete, r, false),
            score: view.f64(score, r, 0.0),
        })
        .collect())
}

/// Column-wise builders used by the writer; rows are appended then turned into compound tables.
#[derive(Debug, Default)]
pub(crate) struct FrameColumns {
    pub(crate) frame_id: Vec<i64>,
    pub(crate) video: Vec<i64>,
    pub(crate) frame_idx: Vec<i64>,
    pub(crate) instance_start: Vec<i64>,
    pub(crate) instance_end: Vec<i64>,
}

impl FrameColumns {
    pub(crate) fn push(&mut self, row: FrameRow) {
        self.frame_id.push(row.frame_id);
        self.video.push(row.video);
        self.frame_idx.push(row.frame_idx);
        self.instance_start.push(row.instance_start);
        self.instance_end.push(row.instance_end);
    }

    pub(crate) fn into_table(self) -> Table {
        Table::new()
            .with_column("frame_id", Column::I64(self.frame_id))
            .with_column("video", Column::I64(self.video))
            .with_column("frame_idx", Column::I64(self.frame_idx))
            .with_column("instance_id_start", Column::I64(self.instance_start))
            .with_column("instance_id_end", Column::I64(self.instance_end))
    }
}

#[derive(Debug, Default)]
pub(crate) struct InstanceColumns {
    pub(crate) instance_id: Vec<i64>,
    pub(crate) instance_type: Vec<i64>,
    pub(crate) frame_id: Vec<i64>,
    pub(crate) skeleton: Vec<i64>,
    pub(crate) track: Vec<i64>,
    pub(crate) from_predicted: Vec<i64>,
    pub(crate) score: Vec<f64>,
    pub(crate) point_start: Vec<i64>,
    pub(crate) point_end: Vec<i64>,
    pub(crate) tracking_score: Vec<f64>,
}

impl InstanceColumns {
    /// Append a row and return its position.
    pub(crate) fn push(&mut self, row: InstanceRow) -> usize {
        self.instance_id.push(row.instance_id);
        self.instance_type.push(row.instance_type);
        self.frame_id.push(row.frame_id);
        self.skeleton.push(row.skeleton);
        self.track.push(row.track);
        self.from_predicted.push(row.from_predicted);
        self.score.push(row.score);
        self.point_start.push(row.point_start);
        self.point_end.push(row.point_end);
        self.tracking_score.push(row.tracking_score);
        self.instance_id.len() - 1
    }

    pub(crate) fn into_table(self) -> Table {
        Table::new()
            .with_column("instance_id", Column::I64(self.instance_id))
            .with_column("instance_type", Column::I64(self.instance_type))
            .with_column("frame_id", Column::I64(self.frame_id))
            .with_column("skeleton", Column::I64(self.skeleton))
            .with_column("track", Column::I64(self.track))
            .with_column("from_predicted", Column::I64(self.from_predicted))
            .with_column("score", Column::F64(self.score))
            .with_column("point_id_start", Column::I64(self.point_start))
            .with_column("point_id_end", Column::I64(self.point_end))
            .with_column("tracking_score", Column::F64(self.tracking_score))
    }
}

#[derive(Debug, Default)]
pub(crate) struct PointColumns {
    pub(crate) x: Vec<f64>,
    pub(crate) y: Vec<f64>,
    pub(crate) visible: Vec<bool>,
    pub(crate) complete: Vec<bool>,
    pub(crate) score: Vec<f64>,
}

impl PointColumns {
    pub(crate) fn len(&self) -> usize {
        self.x.len()
    }

    pub(crate) fn push(&mut self, row: PointRow) {
        self.x.push(row.x);
        self.y.push(row.y);
        self.visible.push(row.visible);
        self.complete.push(row.complete);
        self.score.push(row.score);
    }

    pub(crate) fn into_table(self, with_score: bool) -> Table {
        let t = Table::new()
            .with_column("x", Column::F64(self.x))
            .with_column("y", Column::F64(self.y))
            .with_column("visible", Column::Bool(self.visible))
            .with_column("complete", Column::Bool(self.complete));
        if with_score {
            t.with_column("score", Column::F64(self.score))
        } else {
            t
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/codec/tables.rs"]
mod tests;
