use super::*;

fn png_2x1() -> Vec<u8> {
    VideoFrame::new(2, 1, 3, vec![255, 0, 0, 0, 0, 255])
        .encode(image::ImageFormat::Png)
        .unwrap()
}

#[test]
fn image_decoder_returns_one_frame_per_sample() {
    let mut d = ImageSampleDecoder::for_codec(b"png ").unwrap();
    d.reset().unwrap();
    let out = d
        .decode(EncodedSample {
            data: png_2x1(),
            pts: 40,
            keyframe: true,
        })
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].pts, 40);
    assert_eq!((out[0].frame.width, out[0].frame.height), (2, 1));
    assert_eq!(out[0].frame.data.as_slice(), &[255, 0, 0, 0, 0, 255]);
    assert!(d.flush().unwrap().is_empty());
}

#[test]
fn format_is_guessed_when_unknown() {
    let mut d = ImageSampleDecoder::new(None);
    let out = d
        .decode(EncodedSample {
            data: png_2x1(),
            pts: 0,
            keyframe: true,
        })
        .unwrap();
    assert_eq!(out[0].frame.data.as_slice(), &[255, 0, 0, 0, 0, 255]);
}

#[test]
fn corrupt_sample_is_a_decode_error() {
    let mut d = ImageSampleDecoder::for_codec(b"jpeg").unwrap();
    let err = d
        .decode(EncodedSample {
            data: vec![0xFF, 0xD8, 0xFF, 0x00],
            pts: 0,
            keyframe: true,
        })
        .unwrap_err();
    assert!(matches!(err, ArchiveError::Decode(_)));
}

#[test]
fn only_image_codecs_have_an_image_decoder() {
    assert!(ImageSampleDecoder::for_codec(b"mjpa").is_some());
    assert!(ImageSampleDecoder::for_codec(b"avc1").is_none());
}

#[test]
fn image_tracks_get_the_in_process_decoder() {
    let mut d = MediaDecoder::for_track(b"png ", Path::new("clip.mov")).unwrap();
    assert!(matches!(d, MediaDecoder::Image(_)));
    let out = d
        .decode(EncodedSample {
            data: png_2x1(),
            pts: 3,
            keyframe: true,
        })
        .unwrap();
    assert_eq!(out[0].pts, 3);
}

#[cfg(not(feature = "media-ffmpeg"))]
#[test]
fn inter_frame_codecs_name_the_missing_feature() {
    let err = MediaDecoder::for_track(b"avc1", Path::new("clip.mp4"))
        .err()
        .unwrap();
    assert!(matches!(err, ArchiveError::Decode(_)));
    assert!(err.to_string().contains("media-ffmpeg"), "{err}");
}

#[cfg(feature = "media-ffmpeg")]
#[test]
fn inter_frame_decoder_needs_a_readable_file() {
    let err = MediaDecoder::for_track(b"avc1", Path::new("no/such/clip.mp4"))
        .err()
        .unwrap();
    assert!(matches!(err, ArchiveError::Decode(_)));
}
