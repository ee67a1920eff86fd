use std::sync::Arc;

use super::*;
use crate::container::{ContainerRead, MemContainer};
use crate::model::labels::{LabeledFrame, SuggestionFrame};
use crate::video::backend::{VideoBackend, VideoFrame};

/// 2x2 frames whose pixels all equal the frame index.
struct Synthetic(usize);

impl VideoBackend for Synthetic {
    fn get_frame(&self, idx: usize) -> Option<VideoFrame> {
        (idx < self.0).then(|| VideoFrame::new(2, 2, 3, vec![idx as u8; 12]))
    }

    fn frame_times(&self) -> Option<Vec<f64>> {
        None
    }

    fn num_frames(&self) -> usize {
        self.0
    }

    fn close(&self) {}

    fn kind(&self) -> &'static str {
        "synthetic"
    }
}

fn labels_with_frames(frames: &[u64]) -> Labels {
    let mut labels = Labels::new();
    labels.add_video(Video::new("raw.mp4").with_backend(Arc::new(Synthetic(50))));
    for &f in frames {
        labels
            .labeled_frames
            .push(LabeledFrame::new(VideoIdx(0), f));
    }
    labels
}

#[test]
fn embeds_labeled_frames_and_repoints_video() {
    let mut labels = labels_with_frames(&[30, 4, 30]);
    let mut c = MemContainer::new();
    embed_frames(&mut labels, &mut c, &EmbedOpts::default()).unwrap();

    let numbers = c.dataset("video0/frame_numbers").unwrap();
    assert_eq!(numbers.to_i64_vec().unwrap(), vec![4, 30]);
    let Data::Blob(blobs) = &c.dataset("video0/video").unwrap().data else {
        panic!("expected blob dataset");
    };
    assert_eq!(blobs.len(), 2);

    let video = &labels.videos[0];
    assert_eq!(video.embedded_dataset(), Some("video0/video"));
    assert_eq!(video.backend_metadata["shape"], json!([2, 2, 2, 3]));
    assert_eq!(
        video.source_video.as_ref().unwrap().filename.primary(),
        Some("raw.mp4")
    );
    let f = video.get_frame(30).unwrap();
    assert_eq!(f.data.as_slice(), &[30; 12]);
    assert!(video.get_frame(5).is_none());
}

#[test]
fn suggestions_are_embedded_on_request() {
    let mut labels = labels_with_frames(&[1]);
    labels.suggestions.push(SuggestionFrame {
        video: VideoIdx(0),
        frame_idx: 9,
        group: 0,
    });
    let mut c = MemContainer::new();
    let opts = EmbedOpts {
        format: EmbedFormat::Jpeg,
        include_suggestions: true,
    };
    embed_frames(&mut labels, &mut c, &opts).unwrap();
    let numbers = c.dataset("video0/frame_numbers").unwrap();
    assert_eq!(numbers.to_i64_vec().unwrap(), vec![1, 9]);
    assert_eq!(labels.videos[0].backend_metadata["format"], "jpg");
    assert!(labels.videos[0].get_frame(9).is_some());
}

#[test]
fn unavailable_frame_aborts_embedding() {
    let mut labels = labels_with_frames(&[99]);
    let mut c = MemContainer::new();
    let err = embed_frames(&mut labels, &mut c, &EmbedOpts::default()).unwrap_err();
    assert!(matches!(err, ArchiveError::Decode(_)));
    assert!(!c.contains("video0/video"));
    assert_eq!(labels.videos[0].embedded_dataset(), None);
}

#[test]
fn failure_on_a_later_video_writes_nothing() {
    let mut labels = labels_with_frames(&[3]);
    let second = labels.add_video(Video::new("short.mp4").with_backend(Arc::new(Synthetic(2))));
    labels.labeled_frames.push(LabeledFrame::new(second, 7));

    let mut c = MemContainer::new();
    let err = embed_frames(&mut labels, &mut c, &EmbedOpts::default()).unwrap_err();
    assert!(matches!(err, ArchiveError::Decode(_)));
    assert!(!c.contains("video0/video"));
    assert!(!c.contains("video0/frame_numbers"));
    assert_eq!(labels.videos[0].embedded_dataset(), None);
    assert_eq!(labels.videos[0].filename.primary(), Some("raw.mp4"));
    assert!(labels.videos[0].source_video.is_none());
}

#[test]
fn videos_without_backend_are_skipped() {
    let mut labels = Labels::new();
    labels.add_video(Video::new("offline.mp4"));
    labels
        .labeled_frames
        .push(LabeledFrame::new(VideoIdx(0), 0));
    let mut c = MemContainer::new();
    embed_frames(&mut labels, &mut c, &EmbedOpts::default()).unwrap();
    assert!(!c.contains("video0"));
}
