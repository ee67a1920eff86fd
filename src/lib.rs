//! `slp_io` reads, writes and serves pose-annotation archives.
//!
//! An archive is a hierarchical container holding:
//!
//! - a `metadata` group with the format version and a JSON document describing skeletons and
//!   provenance,
//! - JSON side records for tracks, videos, suggestions and recording sessions,
//! - four relational tables (`frames`, `instances`, `points`, `pred_points`) that together
//!   describe every labeled frame,
//! - optionally, encoded video frames embedded next to the labels.
//!
//! # Pipeline overview
//!
//! 1. **Read**: [`read_labels`] decodes a container into an in-memory [`Labels`] graph, repairing
//!    dangling references instead of failing.
//! 2. **Serve frames**: every [`Video`] gets a [`VideoBackend`] chosen by [`open_backend`], either
//!    embedded images, an image sequence, or the keyframe-aware decode cache in [`MediaVideo`].
//! 3. **Write**: [`write_labels`] flattens the graph back into tables, always at
//!    [`FormatVersion::CURRENT`]. [`embed_frames`] copies labeled frames into the archive first.
//!
//! [`MemContainer`] is the bundled container; its JSON snapshot is what [`load_file`],
//! [`save_file`] and the `slp` binary work with.
#![forbid(unsafe_code)]

mod foundation;

pub mod codec;
pub mod container;
pub mod model;
pub mod video;

pub use codec::embed::{EmbedFormat, EmbedOpts, embed_frames};
pub use codec::read::{ReadOpts, read_labels};
pub use codec::write::{WriteOpts, write_labels};
pub use codec::{load_file, save_file};
pub use container::{
    AttrValue, Attrs, Column, ContainerRead, ContainerWrite, Data, Dataset, Dtype, Entity,
    MemContainer, Table,
};
pub use foundation::core::{
    ChannelOrder, FormatVersion, InstanceRef, SkeletonIdx, TrackIdx, VideoIdx,
};
pub use foundation::error::{ArchiveError, ArchiveResult};
pub use model::instance::{AnyInstance, Instance, Point, PredictedInstance, PredictedPoint};
pub use model::labels::{LabeledFrame, Labels, SuggestionFrame, Track};
pub use model::session::{Camera, FrameGroup, InstanceGroup, RecordingSession};
pub use model::skeleton::{Edge, Skeleton, Symmetry};
pub use model::video::{Video, VideoFilename};
pub use video::backend::{VideoBackend, VideoFrame};
pub use video::cache::FrameCacheStats;
pub use video::decoder::{
    DecodedImage, EncodedSample, ImageSampleDecoder, MediaDecoder, VideoDecoder,
};
pub use video::demux::{
    FileSource, MemorySource, SampleInfo, SampleSource, SampleTable, parse_mp4,
};
pub use video::embedded::EmbeddedImages;
pub use video::open::open_backend;
pub use video::pipeline::{MediaVideo, PipelineOpts, PipelineStats};
pub use video::sequence::ImageSequence;
