use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use super::*;
use crate::video::demux::{MemorySource, SampleInfo};

/// `n` two-byte samples; sample `i` is `[i, i]` at offset `2 * i`.
fn stream(n: usize, key_every: usize) -> (MemorySource, SampleTable) {
    let bytes: Vec<u8> = (0..n).flat_map(|i| [i as u8, i as u8]).collect();
    let samples = (0..n)
        .map(|i| SampleInfo {
            offset: 2 * i as u64,
            size: 2,
            dts: i as i64,
            pts: i as i64,
            keyframe: i % key_every == 0,
        })
        .collect();
    (
        MemorySource(Arc::new(bytes)),
        SampleTable::new(*b"test", 10, 1, 1, samples),
    )
}

#[derive(Clone, Default)]
struct Counters {
    decodes: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

/// One-pixel frames carrying the sample's first byte; optionally fails or blocks.
struct FakeDecoder {
    counters: Counters,
    fail_pts: Option<i64>,
    gate: Option<Arc<(Mutex<bool>, Condvar)>>,
}

impl FakeDecoder {
    fn new(counters: &Counters) -> Self {
        Self {
            counters: counters.clone(),
            fail_pts: None,
            gate: None,
        }
    }
}

impl VideoDecoder for FakeDecoder {
    fn reset(&mut self) -> ArchiveResult<()> {
        Ok(())
    }

    fn decode(&mut self, sample: EncodedSample) -> ArchiveResult<Vec<DecodedImage>> {
        self.counters.decodes.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let (open, cv) = &**gate;
            let mut g = open.lock().unwrap();
            while !*g {
                g = cv.wait(g).unwrap();
            }
        }
        if self.fail_pts == Some(sample.pts) {
            return Err(ArchiveError::decode("corrupt sample"));
        }
        Ok(vec![DecodedImage {
            pts: sample.pts,
            frame: VideoFrame::new(1, 1, 1, vec![sample.data[0]]),
        }])
    }

    fn flush(&mut self) -> ArchiveResult<Vec<DecodedImage>> {
        Ok(Vec::new())
    }

    fn close(&mut self) {
        self.counters.closed.store(true, Ordering::SeqCst);
    }
}

fn opts(cache_capacity: usize, lookahead: usize) -> PipelineOpts {
    PipelineOpts {
        cache_capacity,
        lookahead,
        batch_size: 2,
    }
}

fn wait_for(mut cond: impl FnMut() -> bool) {
    for _ in 0..2000 {
        if cond() {
            return;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    panic!("condition not reached");
}

#[test]
fn eviction_drops_least_recent_and_refetch_decodes_once() {
    let counters = Counters::default();
    let (src, table) = stream(10, 1);
    let v = MediaVideo::new(src, table, FakeDecoder::new(&counters), opts(3, 0));

    for i in 0..3 {
        assert_eq!(v.get_frame(i).unwrap().data[0], i as u8);
    }
    assert_eq!(v.stats().windows, 3);
    v.get_frame(3).unwrap();

    let stats = v.stats();
    assert_eq!(stats.cache.evictions, 1);
    assert!(!v.is_cached(0));
    assert!(v.is_cached(1) && v.is_cached(2) && v.is_cached(3));

    v.get_frame(0).unwrap();
    assert_eq!(v.stats().windows, 5);
}

#[test]
fn window_starts_at_keyframe_and_caches_lookahead() {
    let counters = Counters::default();
    let (src, table) = stream(12, 4);
    let v = MediaVideo::new(src, table, FakeDecoder::new(&counters), opts(8, 2));

    assert_eq!(v.get_frame(5).unwrap().data[0], 5);
    assert_eq!(counters.decodes.load(Ordering::SeqCst), 4);
    for i in 4..8 {
        assert!(v.is_cached(i), "frame {i} should be cached");
    }
    assert!(!v.is_cached(3));

    assert_eq!(v.get_frame(7).unwrap().data[0], 7);
    assert_eq!(v.stats().windows, 1);
}

#[test]
fn frames_outside_the_keep_window_are_discarded() {
    let counters = Counters::default();
    let (src, table) = stream(20, 20);
    let v = MediaVideo::new(src, table, FakeDecoder::new(&counters), opts(4, 0));

    v.get_frame(10).unwrap();
    assert_eq!(counters.decodes.load(Ordering::SeqCst), 11);
    assert!(v.is_cached(8) && v.is_cached(9) && v.is_cached(10));
    assert!(!v.is_cached(7));
    assert!(!v.is_cached(0));
    assert_eq!(v.stats().cache.evictions, 0);
}

#[test]
fn later_request_supersedes_a_waiting_one() {
    let counters = Counters::default();
    let gate = Arc::new((Mutex::new(false), Condvar::new()));
    let (src, table) = stream(10, 1);
    let mut dec = FakeDecoder::new(&counters);
    dec.gate = Some(Arc::clone(&gate));
    let v = Arc::new(MediaVideo::new(src, table, dec, opts(2, 0)));

    let first = {
        let v = Arc::clone(&v);
        std::thread::spawn(move || v.get_frame(0))
    };
    wait_for(|| counters.decodes.load(Ordering::SeqCst) >= 1);

    let five = {
        let v = Arc::clone(&v);
        std::thread::spawn(move || v.get_frame(5))
    };
    wait_for(|| v.pending() == Some(5));
    let nine = {
        let v = Arc::clone(&v);
        std::thread::spawn(move || v.get_frame(9))
    };
    wait_for(|| v.pending() == Some(9));

    {
        let (open, cv) = &*gate;
        *open.lock().unwrap() = true;
        cv.notify_all();
    }

    assert_eq!(first.join().unwrap().unwrap().data[0], 0);
    assert!(five.join().unwrap().is_none());
    assert_eq!(nine.join().unwrap().unwrap().data[0], 9);
}

#[test]
fn decode_failure_only_affects_that_frame() {
    let counters = Counters::default();
    let (src, table) = stream(4, 1);
    let mut dec = FakeDecoder::new(&counters);
    dec.fail_pts = Some(2);
    let v = MediaVideo::new(src, table, dec, opts(4, 0));

    assert!(v.get_frame(2).is_none());
    assert_eq!(v.get_frame(3).unwrap().data[0], 3);
    assert!(v.get_frame(4).is_none());
}

#[test]
fn bad_sample_in_lookahead_keeps_the_rest_of_the_window() {
    let counters = Counters::default();
    let (src, table) = stream(10, 1);
    let mut dec = FakeDecoder::new(&counters);
    dec.fail_pts = Some(5);
    let v = MediaVideo::new(src, table, dec, opts(32, 16));

    assert_eq!(v.get_frame(0).unwrap().data[0], 0);
    assert_eq!(counters.decodes.load(Ordering::SeqCst), 10);
    assert_eq!(v.get_frame(1).unwrap().data[0], 1);
    assert_eq!(v.get_frame(9).unwrap().data[0], 9);
    assert!(!v.is_cached(5));
    assert_eq!(v.stats().windows, 1);
}

#[test]
fn close_during_decode_discards_the_window() {
    let counters = Counters::default();
    let gate = Arc::new((Mutex::new(false), Condvar::new()));
    let (src, table) = stream(10, 10);
    let mut dec = FakeDecoder::new(&counters);
    dec.gate = Some(Arc::clone(&gate));
    let v = Arc::new(MediaVideo::new(src, table, dec, opts(8, 5)));

    let inflight = {
        let v = Arc::clone(&v);
        std::thread::spawn(move || v.get_frame(2))
    };
    wait_for(|| counters.decodes.load(Ordering::SeqCst) >= 1);

    v.close();
    // The window still holds the decoder, so it is closed on completion.
    assert!(!counters.closed.load(Ordering::SeqCst));
    {
        let (open, cv) = &*gate;
        *open.lock().unwrap() = true;
        cv.notify_all();
    }

    assert!(inflight.join().unwrap().is_none());
    assert!(counters.closed.load(Ordering::SeqCst));
    for i in 0..10 {
        assert!(!v.is_cached(i));
    }
    assert!(counters.decodes.load(Ordering::SeqCst) < 8);
    assert!(v.get_frame(2).is_none());
}

#[test]
fn close_releases_cache_and_decoder() {
    let counters = Counters::default();
    let (src, table) = stream(4, 1);
    let v = MediaVideo::new(src, table, FakeDecoder::new(&counters), opts(4, 0));
    v.get_frame(1).unwrap();

    v.close();
    v.close();
    assert!(!v.is_cached(1));
    assert!(counters.closed.load(Ordering::SeqCst));
    assert!(v.get_frame(1).is_none());
}

#[test]
fn reports_frame_times_and_kind() {
    let counters = Counters::default();
    let (src, table) = stream(3, 1);
    let v = MediaVideo::new(src, table, FakeDecoder::new(&counters), PipelineOpts::default());
    assert_eq!(v.frame_times(), Some(vec![0.0, 0.1, 0.2]));
    assert_eq!(v.num_frames(), 3);
    assert_eq!(v.kind(), BACKEND_KIND);
}

#[test]
fn nearest_pts_match_on_exact_miss() {
    let counters = Counters::default();
    let (src, table) = stream(3, 1);
    let v = MediaVideo::new(src, table, FakeDecoder::new(&counters), PipelineOpts::default());
    assert_eq!(v.index_for_pts(1), Some(1));
    assert_eq!(v.index_for_pts(-4), Some(0));
    assert_eq!(v.index_for_pts(40), Some(2));
}
