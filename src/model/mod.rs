//! In-memory annotation graph.

pub mod instance;
pub mod labels;
pub mod session;
pub mod skeleton;
pub mod video;
