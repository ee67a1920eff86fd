//! Narrow accessor interface over the hierarchical archive container.
//!
//! The codec only needs group/dataset/attribute access. Any store that can answer these calls
//! (a local file library, a remote byte-range reader, or [`MemContainer`]) can back an archive.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::foundation::error::{ArchiveError, ArchiveResult};

pub mod memory;

pub use memory::MemContainer;

/// Attribute value attached to a group or dataset.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Str(String),
    IntList(Vec<i64>),
    StrList(Vec<String>),
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str_list(&self) -> Option<&[String]> {
        match self {
            Self::StrList(v) => Some(v),
            _ => None,
        }
    }
}

pub type Attrs = BTreeMap<String, AttrValue>;

/// Element type of a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dtype {
    U8,
    I64,
    F64,
    Str,
    /// Variable-length byte strings, one per element.
    Blob,
    /// Compound element with named fields.
    Compound,
}

/// One column of a compound dataset.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum Column {
    I64(Vec<i64>),
    #[serde(with = "nan_as_null")]
    F64(Vec<f64>),
    Bool(Vec<bool>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Self::I64(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compound dataset: named columns of equal length.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Table {
    pub fields: Vec<String>,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: &str, column: Column) -> Self {
        self.fields.push(name.to_string());
        self.columns.push(column);
        self
    }

    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        let i = self.fields.iter().position(|f| f == name)?;
        self.columns.get(i)
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Data {
    U8(Vec<u8>),
    I64(Vec<i64>),
    #[serde(with = "nan_as_null")]
    F64(Vec<f64>),
    Str(Vec<String>),
    Blob(Vec<Vec<u8>>),
    Compound(Table),
}

/// A dataset: typed values, their logical shape and attributes.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Dataset {
    pub shape: Vec<usize>,
    pub data: Data,
    #[serde(default)]
    pub attrs: Attrs,
}

impl Dataset {
    /// One-dimensional dataset whose shape is the element count.
    pub fn vector(data: Data) -> Self {
        let n = match &data {
            Data::U8(v) => v.len(),
            Data::I64(v) => v.len(),
            Data::F64(v) => v.len(),
            Data::Str(v) => v.len(),
            Data::Blob(v) => v.len(),
            Data::Compound(t) => t.rows(),
        };
        Self {
            shape: vec![n],
            data,
            attrs: Attrs::new(),
        }
    }

    pub fn with_shape(data: Data, shape: Vec<usize>) -> Self {
        Self {
            shape,
            data,
            attrs: Attrs::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: AttrValue) -> Self {
        self.attrs.insert(name.to_string(), value);
        self
    }

    pub fn dtype(&self) -> Dtype {
        match self.data {
            Data::U8(_) => Dtype::U8,
            Data::I64(_) => Dtype::I64,
            Data::F64(_) => Dtype::F64,
            Data::Str(_) => Dtype::Str,
            Data::Blob(_) => Dtype::Blob,
            Data::Compound(_) => Dtype::Compound,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn strings(&self) -> ArchiveResult<&[String]> {
        match &self.data {
            Data::Str(v) => Ok(v),
            _ => Err(ArchiveError::format(format!(
                "expected string dataset, got {:?}",
                self.dtype()
            ))),
        }
    }

    /// Integer view of a numeric dataset.
    pub fn to_i64_vec(&self) -> ArchiveResult<Vec<i64>> {
        match &self.data {
            Data::I64(v) => Ok(v.clone()),
            Data::U8(v) => Ok(v.iter().map(|&b| i64::from(b)).collect()),
            Data::F64(v) => Ok(v.iter().map(|&f| f as i64).collect()),
            _ => Err(ArchiveError::format(format!(
                "expected numeric dataset, got {:?}",
                self.dtype()
            ))),
        }
    }
}

/// Entity found at a container path.
#[derive(Clone, Debug)]
pub enum Entity {
    Group { keys: Vec<String> },
    Dataset(Arc<Dataset>),
}

/// Read half of the container accessor.
pub trait ContainerRead: Send + Sync {
    /// Entity at `path`, or `None` when nothing is stored there.
    fn get(&self, path: &str) -> Option<Entity>;

    /// Attributes of the group or dataset at `path` (empty when absent).
    fn attrs(&self, path: &str) -> Attrs;

    /// Convenience: dataset at `path` when `path` names a dataset.
    fn dataset(&self, path: &str) -> Option<Arc<Dataset>> {
        match self.get(path)? {
            Entity::Dataset(d) => Some(d),
            Entity::Group { .. } => None,
        }
    }

    /// Child names of the group at `path`.
    fn keys(&self, path: &str) -> Vec<String> {
        match self.get(path) {
            Some(Entity::Group { keys }) => keys,
            _ => Vec::new(),
        }
    }

    fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }
}

/// Write half of the container accessor.
pub trait ContainerWrite: ContainerRead {
    /// Create the group at `path` and any missing parents.
    fn create_group(&mut self, path: &str) -> ArchiveResult<()>;

    /// Store `dataset` at `path`, replacing anything already there.
    fn write_dataset(&mut self, path: &str, dataset: Dataset) -> ArchiveResult<()>;

    /// Set one attribute on an existing group or dataset.
    fn set_attr(&mut self, path: &str, name: &str, value: AttrValue) -> ArchiveResult<()>;

    /// Remove whatever is stored at `path` (and below). Missing paths are not an error.
    fn remove(&mut self, path: &str) -> ArchiveResult<()>;
}

/// JSON has no NaN; missing coordinates are written as `null` and read back as NaN.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(v: &[f64], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(v.iter().map(|f| if f.is_nan() { None } else { Some(*f) }))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
        let raw = Vec::<Option<f64>>::deserialize(d)?;
        Ok(raw.into_iter().map(|f| f.unwrap_or(f64::NAN)).collect())
    }
}

/// Normalize a container path: `/`-separated, no empty or `.` segments, no leading slash.
pub(crate) fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
#[path = "../../tests/unit/container/mod.rs"]
mod tests;
