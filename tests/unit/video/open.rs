use super::*;
use crate::container::{AttrValue, ContainerWrite, Data, Dataset, MemContainer};
use crate::video::backend::VideoFrame;

fn embedded_video(dataset: &str) -> Video {
    let mut v = Video::new("labels.slp");
    v.backend_metadata.insert("filename".into(), ".".into());
    v.backend_metadata.insert("dataset".into(), dataset.into());
    v
}

fn png(v: u8) -> Vec<u8> {
    VideoFrame::new(1, 1, 3, vec![v, 0, 255])
        .encode(image::ImageFormat::Png)
        .unwrap()
}

#[test]
fn sibling_frame_numbers_path() {
    assert_eq!(frame_numbers_path("video0/video"), "video0/frame_numbers");
    assert_eq!(frame_numbers_path("video"), "frame_numbers");
}

#[test]
fn embedded_video_uses_container_dataset_and_frame_numbers() {
    let mut c = MemContainer::new();
    c.write_dataset(
        "video2/video",
        Dataset::vector(Data::Blob(vec![png(1), png(2)]))
            .with_attr("format", AttrValue::Str("png".into())),
    )
    .unwrap();
    c.write_dataset("video2/frame_numbers", Dataset::vector(Data::I64(vec![5, 9])))
        .unwrap();

    let b = open_backend(
        &embedded_video("video2/video"),
        Some(&c),
        FormatVersion::CURRENT,
        None,
        &PipelineOpts::default(),
    )
    .unwrap();
    assert_eq!(b.kind(), crate::video::embedded::BACKEND_KIND);
    assert_eq!(b.get_frame(9).unwrap().data[0], 2);
    assert!(b.get_frame(1).is_none());
}

#[test]
fn legacy_raw_frames_default_to_blue_first() {
    let mut c = MemContainer::new();
    c.write_dataset(
        "video0/video",
        Dataset::with_shape(Data::U8(vec![255, 0, 7]), vec![1, 1, 1, 3]),
    )
    .unwrap();
    let b = open_backend(
        &embedded_video("video0/video"),
        Some(&c),
        FormatVersion(1.2),
        None,
        &PipelineOpts::default(),
    )
    .unwrap();
    assert_eq!(b.get_frame(0).unwrap().data.as_slice(), &[7, 0, 255]);
}

#[test]
fn legacy_png_frames_keep_their_colors() {
    let mut c = MemContainer::new();
    c.write_dataset("video0/video", Dataset::vector(Data::Blob(vec![png(7)])))
        .unwrap();
    let b = open_backend(
        &embedded_video("video0/video"),
        Some(&c),
        FormatVersion(1.2),
        None,
        &PipelineOpts::default(),
    )
    .unwrap();
    assert_eq!(b.get_frame(0).unwrap().data.as_slice(), &[7, 0, 255]);
}

#[test]
fn embedded_without_container_or_dataset_fails() {
    let v = embedded_video("video0/video");
    let opts = PipelineOpts::default();
    assert!(open_backend::<MemContainer>(&v, None, FormatVersion::CURRENT, None, &opts).is_err());
    assert!(
        open_backend(
            &v,
            Some(&MemContainer::new()),
            FormatVersion::CURRENT,
            None,
            &PipelineOpts::default()
        )
        .is_err()
    );
}

#[test]
fn missing_external_file_is_not_found() {
    let v = Video::new("/definitely/not/here.mp4");
    let opts = PipelineOpts::default();
    let err = open_backend::<MemContainer>(&v, None, FormatVersion::CURRENT, None, &opts)
        .err()
        .unwrap();
    assert!(matches!(err, ArchiveError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
}

#[test]
fn search_dir_resolves_moved_files() {
    let dir = std::env::temp_dir().join(format!("slp_io_open_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("frame.png"), png(3)).unwrap();

    let v = Video::new("/old/location/frame.png");
    let b = open_backend::<MemContainer>(
        &v,
        None,
        FormatVersion::CURRENT,
        Some(&dir),
        &PipelineOpts::default(),
    )
    .unwrap();
    assert_eq!(b.kind(), crate::video::sequence::BACKEND_KIND);
    assert_eq!(b.get_frame(0).unwrap().data[0], 3);
    std::fs::remove_dir_all(&dir).ok();
}
