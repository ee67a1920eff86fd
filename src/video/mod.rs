//! Frame access: the backend contract and its implementations.

pub mod backend;
pub(crate) mod cache;
pub mod decoder;
pub mod demux;
pub mod embedded;
#[cfg(feature = "media-ffmpeg")]
pub mod ffmpeg;
pub mod open;
pub mod pipeline;
pub mod sequence;
