use super::*;
use crate::container::AttrValue;

fn png(w: u32, h: u32, rgb: [u8; 3]) -> Vec<u8> {
    let data: Vec<u8> = (0..w * h).flat_map(|_| rgb).collect();
    VideoFrame::new(w, h, 3, data)
        .encode(image::ImageFormat::Png)
        .unwrap()
}

fn contiguous(images: &[Vec<u8>]) -> (Vec<u8>, Vec<usize>) {
    let mut buf = Vec::new();
    let mut starts = Vec::new();
    for img in images {
        starts.push(buf.len());
        buf.extend_from_slice(img);
    }
    (buf, starts)
}

#[test]
fn scan_finds_each_back_to_back_png() {
    let images = [png(2, 2, [255, 0, 0]), png(3, 1, [0, 255, 0]), png(1, 1, [0, 0, 255])];
    let (buf, starts) = contiguous(&images);
    let offsets = scan_magic(&buf, PNG_MAGIC, None);
    assert_eq!(offsets, starts);
    for &o in &offsets {
        assert_eq!(&buf[o..o + PNG_MAGIC.len()], PNG_MAGIC);
    }
    assert_eq!(scan_magic(&buf, PNG_MAGIC, Some(2)).len(), 2);
}

#[test]
fn scan_of_short_buffer_is_empty() {
    assert!(scan_magic(&[0x89, b'P'], PNG_MAGIC, None).is_empty());
}

#[test]
fn contiguous_buffer_decodes_each_frame() {
    let images = [png(2, 2, [255, 0, 0]), png(3, 1, [0, 255, 0])];
    let (buf, _) = contiguous(&images);
    let ds = Dataset::vector(Data::U8(buf)).with_attr("format", AttrValue::Str("png".into()));
    let b = EmbeddedImages::from_dataset(Arc::new(ds), None, ChannelOrder::Rgb).unwrap();

    assert_eq!(b.num_frames(), 2);
    let f1 = b.get_frame(1).unwrap();
    assert_eq!((f1.width, f1.height, f1.channels), (3, 1, 3));
    assert_eq!(&f1.data[..3], &[0, 255, 0]);
    assert!(b.get_frame(2).is_none());
}

#[test]
fn contiguous_format_is_detected_from_magic() {
    let (buf, _) = contiguous(&[png(1, 1, [1, 2, 3])]);
    let ds = Arc::new(Dataset::vector(Data::U8(buf)));
    let b = EmbeddedImages::from_dataset(ds, None, ChannelOrder::Rgb).unwrap();
    assert_eq!(b.get_frame(0).unwrap().data.as_slice(), &[1, 2, 3]);
}

#[test]
fn frame_numbers_remap_sparse_frames() {
    let blobs = vec![png(1, 1, [10, 0, 0]), png(1, 1, [20, 0, 0])];
    let ds = Dataset::vector(Data::Blob(blobs));
    let b =
        EmbeddedImages::from_dataset(Arc::new(ds), Some(vec![40, 7]), ChannelOrder::Rgb).unwrap();

    assert_eq!(b.get_frame(40).unwrap().data[0], 10);
    assert_eq!(b.get_frame(7).unwrap().data[0], 20);
    assert!(b.get_frame(0).is_none());
    assert!(b.get_frame(1).is_none());
}

#[test]
fn dataset_channel_order_overrides_default() {
    let ds = Dataset::with_shape(Data::U8(vec![1, 2, 3]), vec![1, 1, 1, 3])
        .with_attr("channel_order", AttrValue::Str("BGR".into()));
    let b = EmbeddedImages::from_dataset(Arc::new(ds), None, ChannelOrder::Rgb).unwrap();
    assert_eq!(b.channel_order(), ChannelOrder::Bgr);
    assert_eq!(b.get_frame(0).unwrap().data.as_slice(), &[3, 2, 1]);
}

#[test]
fn compressed_blobs_ignore_channel_order() {
    let blobs = Dataset::vector(Data::Blob(vec![png(1, 1, [1, 2, 3])]))
        .with_attr("channel_order", AttrValue::Str("BGR".into()));
    let b = EmbeddedImages::from_dataset(Arc::new(blobs), None, ChannelOrder::Bgr).unwrap();
    assert_eq!(b.get_frame(0).unwrap().data.as_slice(), &[1, 2, 3]);

    let (buf, _) = contiguous(&[png(1, 1, [4, 5, 6])]);
    let packed = Dataset::vector(Data::U8(buf));
    let b = EmbeddedImages::from_dataset(Arc::new(packed), None, ChannelOrder::Bgr).unwrap();
    assert_eq!(b.get_frame(0).unwrap().data.as_slice(), &[4, 5, 6]);
}

#[test]
fn gray_raster_is_untouched_by_channel_order() {
    let ds = Dataset::with_shape(Data::U8(vec![10, 20]), vec![1, 1, 2, 1]);
    let b = EmbeddedImages::from_dataset(Arc::new(ds), None, ChannelOrder::Bgr).unwrap();
    assert_eq!(b.get_frame(0).unwrap().data.as_slice(), &[10, 20]);
}

#[test]
fn raw_raster_is_reinterpreted_with_channel_order() {
    // Two 1x2 frames, stored blue-first.
    let ds = Dataset::with_shape(
        Data::U8(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]),
        vec![2, 1, 2, 3],
    );
    let b = EmbeddedImages::from_dataset(Arc::new(ds), None, ChannelOrder::Bgr).unwrap();
    let f = b.get_frame(1).unwrap();
    assert_eq!((f.width, f.height, f.channels), (2, 1, 3));
    assert_eq!(f.data.as_slice(), &[9, 8, 7, 12, 11, 10]);
}

#[test]
fn corrupt_blob_fails_softly() {
    let ds = Dataset::vector(Data::Blob(vec![vec![0xFF, 0xD8, 0xFF, 0], png(1, 1, [5, 5, 5])]));
    let b = EmbeddedImages::from_dataset(Arc::new(ds), None, ChannelOrder::Rgb).unwrap();
    assert!(b.get_frame(0).is_none());
    assert!(b.get_frame(1).is_some());
}

#[test]
fn close_releases_storage() {
    let ds = Dataset::vector(Data::Blob(vec![png(1, 1, [5, 5, 5])]));
    let b = EmbeddedImages::from_dataset(Arc::new(ds), None, ChannelOrder::Rgb).unwrap();
    b.close();
    b.close();
    assert!(b.get_frame(0).is_none());
    assert_eq!(b.kind(), BACKEND_KIND);
}

#[test]
fn unsupported_storage_is_rejected() {
    let ds = Dataset::vector(Data::F64(vec![0.0]));
    assert!(EmbeddedImages::from_dataset(Arc::new(ds), None, ChannelOrder::Rgb).is_err());
}
