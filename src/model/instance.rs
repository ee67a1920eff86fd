use crate::foundation::core::{InstanceRef, SkeletonIdx, TrackIdx};

/// One landmark of a user-labeled instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub visible: bool,
    pub complete: bool,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            visible: true,
            complete: false,
        }
    }

    /// Placeholder for a node with no coordinate.
    pub fn missing() -> Self {
        Self {
            x: f64::NAN,
            y: f64::NAN,
            visible: false,
            complete: false,
        }
    }
}

/// One landmark of a predicted instance, with its confidence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PredictedPoint {
    pub x: f64,
    pub y: f64,
    pub visible: bool,
    pub complete: bool,
    pub score: f64,
}

impl PredictedPoint {
    pub fn new(x: f64, y: f64, score: f64) -> Self {
        Self {
            x,
            y,
            visible: true,
            complete: false,
            score,
        }
    }

    pub fn missing() -> Self {
        Self {
            x: f64::NAN,
            y: f64::NAN,
            visible: false,
            complete: false,
            score: 0.0,
        }
    }
}

/// User-labeled instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub skeleton: SkeletonIdx,
    pub points: Vec<Point>,
    pub track: Option<TrackIdx>,
    /// Predicted instance this one was corrected from.
    pub from_predicted: Option<InstanceRef>,
    pub tracking_score: f64,
}

impl Instance {
    pub fn new(skeleton: SkeletonIdx, points: Vec<Point>) -> Self {
        Self {
            skeleton,
            points,
            track: None,
            from_predicted: None,
            tracking_score: 0.0,
        }
    }
}

/// Machine-predicted instance.
#[derive(Clone, Debug, PartialEq)]
pub struct PredictedInstance {
    pub skeleton: SkeletonIdx,
    pub points: Vec<PredictedPoint>,
    pub track: Option<TrackIdx>,
    pub score: f64,
    pub tracking_score: f64,
}

impl PredictedInstance {
    pub fn new(skeleton: SkeletonIdx, points: Vec<PredictedPoint>, score: f64) -> Self {
        Self {
            skeleton,
            points,
            track: None,
            score,
            tracking_score: 0.0,
        }
    }
}

/// Either kind of instance, in the order they appear in a labeled frame.
#[derive(Clone, Debug, PartialEq)]
pub enum AnyInstance {
    User(Instance),
    Predicted(PredictedInstance),
}

impl AnyInstance {
    pub fn skeleton(&self) -> SkeletonIdx {
        match self {
            Self::User(i) => i.skeleton,
            Self::Predicted(i) => i.skeleton,
        }
    }

    pub fn track(&self) -> Option<TrackIdx> {
        match self {
            Self::User(i) => i.track,
            Self::Predicted(i) => i.track,
        }
    }

    pub fn tracking_score(&self) -> f64 {
        match self {
            Self::User(i) => i.tracking_score,
            Self::Predicted(i) => i.tracking_score,
        }
    }

    pub fn num_points(&self) -> usize {
        match self {
            Self::User(i) => i.points.len(),
            Self::Predicted(i) => i.points.len(),
        }
    }

    /// `(x, y)` for every node, in node order.
    pub fn coords(&self) -> Vec<(f64, f64)> {
        match self {
            Self::User(i) => i.points.iter().map(|p| (p.x, p.y)).collect(),
            Self::Predicted(i) => i.points.iter().map(|p| (p.x, p.y)).collect(),
        }
    }

    pub fn is_predicted(&self) -> bool {
        matches!(self, Self::Predicted(_))
    }

    pub fn as_user(&self) -> Option<&Instance> {
        match self {
            Self::User(i) => Some(i),
            Self::Predicted(_) => None,
        }
    }

    pub fn as_predicted(&self) -> Option<&PredictedInstance> {
        match self {
            Self::Predicted(i) => Some(i),
            Self::User(_) => None,
        }
    }

    /// Shift every coordinate by `(dx, dy)`.
    pub(crate) fn offset(&mut self, dx: f64, dy: f64) {
        match self {
            Self::User(i) => i.points.iter_mut().for_each(|p| {
                p.x += dx;
                p.y += dy;
            }),
            Self::Predicted(i) => i.points.iter_mut().for_each(|p| {
                p.x += dx;
                p.y += dy;
            }),
        }
    }
}
