//! Keyframe-anchored decode pipeline with a bounded frame cache.
//!
//! A backend decodes at most one window at a time. Requests that arrive while a window is in
//! flight park on a condition variable; only the most recent of them (the pending slot) is
//! allowed to start the next decode, older waiters get `None` unless the finished window happened
//! to cache their frame.

use std::path::Path;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::foundation::error::{ArchiveError, ArchiveResult};
use crate::video::backend::{VideoBackend, VideoFrame};
use crate::video::cache::{FrameCache, FrameCacheStats};
use crate::video::decoder::{DecodedImage, EncodedSample, MediaDecoder, VideoDecoder};
use crate::video::demux::{FileSource, SampleSource, SampleTable, merge_ranges, parse_mp4};

/// Backend name reported by [`MediaVideo`].
pub const BACKEND_KIND: &str = "media";

/// Decode-cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOpts {
    /// Maximum decoded frames retained; also the width of the window kept from each decode.
    pub cache_capacity: usize,
    /// Frames decoded past the requested one.
    pub lookahead: usize,
    /// Samples fed to the decoder between yields.
    pub batch_size: usize,
}

impl Default for PipelineOpts {
    fn default() -> Self {
        Self {
            cache_capacity: 32,
            lookahead: 16,
            batch_size: 8,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    /// Decode windows run.
    pub windows: u64,
    /// Samples fed to the decoder.
    pub samples_decoded: u64,
    pub cache: FrameCacheStats,
}

struct State {
    decoding: bool,
    pending: Option<usize>,
    closed: bool,
    cache: FrameCache,
    windows: u64,
    samples_decoded: u64,
}

/// Random frame access over an encoded video stream.
pub struct MediaVideo<S, D> {
    source: S,
    table: SampleTable,
    /// `(pts, presentation index)`, ascending by pts.
    pts_index: Vec<(i64, usize)>,
    opts: PipelineOpts,
    state: Mutex<State>,
    done: Condvar,
    decoder: Mutex<D>,
}

impl MediaVideo<FileSource, MediaDecoder> {
    /// Open an MP4/QuickTime file, picking the decoder from its video track's codec.
    pub fn open(path: &Path, opts: PipelineOpts) -> ArchiveResult<Self> {
        let source = FileSource::open(path)?;
        let table = parse_mp4(&source)?;
        let decoder = MediaDecoder::for_track(&table.codec, path)?;
        Ok(Self::new(source, table, decoder, opts))
    }
}

impl<S: SampleSource, D: VideoDecoder> MediaVideo<S, D> {
    pub fn new(source: S, table: SampleTable, decoder: D, opts: PipelineOpts) -> Self {
        let pts_index = (0..table.len())
            .filter_map(|p| Some((table.pts(p)?, p)))
            .collect();
        Self {
            source,
            table,
            pts_index,
            opts: PipelineOpts {
                batch_size: opts.batch_size.max(1),
                ..opts
            },
            state: Mutex::new(State {
                decoding: false,
                pending: None,
                closed: false,
                cache: FrameCache::new(opts.cache_capacity),
                windows: 0,
                samples_decoded: 0,
            }),
            done: Condvar::new(),
            decoder: Mutex::new(decoder),
        }
    }

    pub fn sample_table(&self) -> &SampleTable {
        &self.table
    }

    pub fn stats(&self) -> PipelineStats {
        let st = self.lock_state();
        PipelineStats {
            windows: st.windows,
            samples_decoded: st.samples_decoded,
            cache: st.cache.stats(),
        }
    }

    pub fn is_cached(&self, idx: usize) -> bool {
        self.lock_state().cache.contains(idx)
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> Option<usize> {
        self.lock_state().pending
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    /// Presentation index for a decoded timestamp; nearest match when not exact.
    fn index_for_pts(&self, pts: i64) -> Option<usize> {
        let i = match self.pts_index.binary_search_by_key(&pts, |&(t, _)| t) {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) if i >= self.pts_index.len() => self.pts_index.len().checked_sub(1)?,
            Err(i) => {
                let (before, after) = (self.pts_index[i - 1].0, self.pts_index[i].0);
                if pts - before <= after - pts { i - 1 } else { i }
            }
        };
        self.pts_index.get(i).map(|&(_, p)| p)
    }

    /// Presentation indices kept from a window decoded for `target`.
    fn keep_range(&self, target: usize) -> std::ops::Range<usize> {
        let cap = self.opts.cache_capacity;
        let lo = target.saturating_sub(cap / 2);
        lo..lo.saturating_add(cap)
    }

    /// Decode the keyframe-anchored window around `target`.
    #[tracing::instrument(skip(self), level = "debug")]
    fn decode_window(&self, target: usize) -> ArchiveResult<Vec<(usize, VideoFrame)>> {
        let last = self.table.len() - 1;
        let key = self.table.keyframe_at_or_before(target).unwrap_or(0);
        let end = target.saturating_add(self.opts.lookahead).min(last);

        let (mut d_lo, mut d_hi) = (usize::MAX, 0);
        for p in key..=end {
            if let Some(d) = self.table.decode_index(p) {
                d_lo = d_lo.min(d);
                d_hi = d_hi.max(d);
            }
        }
        if d_lo > d_hi {
            return Ok(Vec::new());
        }
        let infos = &self.table.samples()[d_lo..=d_hi];

        let mut samples = Vec::with_capacity(infos.len());
        for range in merge_ranges(infos) {
            let len = usize::try_from(range.len)
                .map_err(|_| ArchiveError::format("sample range too large"))?;
            let bytes = self.source.read_at(range.offset, len)?;
            let mut at = 0usize;
            for info in &infos[range.first..range.first + range.count] {
                let size = info.size as usize;
                samples.push(EncodedSample {
                    data: bytes[at..at + size].to_vec(),
                    pts: info.pts,
                    keyframe: info.keyframe,
                });
                at += size;
            }
        }

        let keep = self.keep_range(target);
        let mut out = Vec::new();
        let mut collect = |images: Vec<DecodedImage>| {
            for img in images {
                match self.index_for_pts(img.pts) {
                    Some(p) if keep.contains(&p) => out.push((p, img.frame)),
                    _ => {}
                }
            }
        };

        let mut decoder = self.decoder.lock().unwrap_or_else(PoisonError::into_inner);
        decoder.reset()?;
        let fed = samples.len() as u64;
        let mut batches = samples.into_iter().peekable();
        while batches.peek().is_some() {
            if self.is_closed() {
                tracing::debug!("backend closed mid-window");
                return Ok(Vec::new());
            }
            for sample in batches.by_ref().take(self.opts.batch_size) {
                let pts = sample.pts;
                match decoder.decode(sample) {
                    Ok(images) => collect(images),
                    // A bad sample only costs its own frame.
                    Err(ArchiveError::Decode(msg)) => {
                        tracing::warn!(pts, error = %msg, "skipping undecodable sample");
                    }
                    Err(e) => return Err(e),
                }
            }
            std::thread::yield_now();
        }
        collect(decoder.flush()?);
        drop(decoder);

        let mut st = self.lock_state();
        st.windows = st.windows.saturating_add(1);
        st.samples_decoded = st.samples_decoded.saturating_add(fed);
        drop(st);
        tracing::debug!(key, end, kept = out.len(), "decoded window");
        Ok(out)
    }
}

impl<S: SampleSource, D: VideoDecoder> VideoBackend for MediaVideo<S, D> {
    fn get_frame(&self, idx: usize) -> Option<VideoFrame> {
        if idx >= self.table.len() {
            return None;
        }
        let mut st = self.lock_state();
        if st.closed {
            return None;
        }
        if let Some(f) = st.cache.get(idx) {
            return Some(f);
        }
        if st.decoding {
            st.pending = Some(idx);
            while st.decoding && !st.closed {
                st = self.done.wait(st).unwrap_or_else(PoisonError::into_inner);
            }
            if st.closed {
                return None;
            }
            if let Some(f) = st.cache.get(idx) {
                return Some(f);
            }
            if st.pending != Some(idx) {
                tracing::trace!(frame = idx, "request superseded");
                return None;
            }
        }
        if st.pending == Some(idx) {
            st.pending = None;
        }
        st.decoding = true;
        drop(st);

        let result = self.decode_window(idx);

        let mut st = self.lock_state();
        st.decoding = false;
        let mut target = None;
        match result {
            Ok(frames) if !st.closed => {
                for (p, frame) in frames {
                    if p == idx {
                        target = Some(frame.clone());
                    }
                    st.cache.insert(p, frame);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(frame = idx, error = %e, "frame decode failed"),
        }
        let closed = st.closed;
        drop(st);
        self.done.notify_all();
        if closed {
            self.decoder
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .close();
            return None;
        }
        target
    }

    fn frame_times(&self) -> Option<Vec<f64>> {
        Some(self.table.frame_times())
    }

    fn num_frames(&self) -> usize {
        self.table.len()
    }

    fn close(&self) {
        let mut st = self.lock_state();
        if st.closed {
            return;
        }
        st.closed = true;
        st.cache.clear();
        st.pending = None;
        drop(st);
        self.done.notify_all();
        // A window in flight holds the decoder; it closes it on completion.
        if let Ok(mut d) = self.decoder.try_lock() {
            d.close();
        }
    }

    fn kind(&self) -> &'static str {
        BACKEND_KIND
    }
}

#[cfg(test)]
#[path = "../../tests/unit/video/pipeline.rs"]
mod tests;
