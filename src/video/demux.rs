//! Sample index for one video track and the byte sources it is read from.
//!
//! [`parse_mp4`] reads only the `moov` box; sample payloads stay in the source and are fetched
//! per decode window as byte ranges.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;

use crate::foundation::error::{ArchiveError, ArchiveResult};

/// One encoded sample, addressed in decode order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleInfo {
    /// Byte offset of the payload in the source.
    pub offset: u64,
    pub size: u32,
    /// Decode timestamp in track timescale units.
    pub dts: i64,
    /// Presentation timestamp in track timescale units.
    pub pts: i64,
    pub keyframe: bool,
}

/// Samples of one track with presentation-order lookups.
#[derive(Debug, Clone)]
pub struct SampleTable {
    /// Sample entry code, e.g. `jpeg`, `png `, `avc1`.
    pub codec: [u8; 4],
    pub timescale: u32,
    pub width: u32,
    pub height: u32,
    samples: Vec<SampleInfo>,
    /// Presentation index to decode index.
    decode_of: Vec<usize>,
    /// Decode index to presentation index.
    presentation_of: Vec<usize>,
    /// Presentation indices of keyframes, ascending.
    keyframes: Vec<usize>,
}

impl SampleTable {
    /// Build from samples in decode order.
    pub fn new(
        codec: [u8; 4],
        timescale: u32,
        width: u32,
        height: u32,
        samples: Vec<SampleInfo>,
    ) -> Self {
        let mut decode_of: Vec<usize> = (0..samples.len()).collect();
        decode_of.sort_by_key(|&d| (samples[d].pts, d));
        let mut presentation_of = vec![0; samples.len()];
        for (p, &d) in decode_of.iter().enumerate() {
            presentation_of[d] = p;
        }
        let keyframes = decode_of
            .iter()
            .enumerate()
            .filter(|&(_, &d)| samples[d].keyframe)
            .map(|(p, _)| p)
            .collect();
        Self {
            codec,
            timescale: timescale.max(1),
            width,
            height,
            samples,
            decode_of,
            presentation_of,
            keyframes,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in decode order.
    pub fn samples(&self) -> &[SampleInfo] {
        &self.samples
    }

    pub fn decode_index(&self, presentation: usize) -> Option<usize> {
        self.decode_of.get(presentation).copied()
    }

    pub fn presentation_index(&self, decode: usize) -> Option<usize> {
        self.presentation_of.get(decode).copied()
    }

    /// Nearest keyframe at or before presentation index `idx`.
    pub fn keyframe_at_or_before(&self, idx: usize) -> Option<usize> {
        match self.keyframes.binary_search(&idx) {
            Ok(i) => Some(self.keyframes[i]),
            Err(0) => None,
            Err(i) => Some(self.keyframes[i - 1]),
        }
    }

    /// Presentation timestamp of frame `idx`.
    pub fn pts(&self, idx: usize) -> Option<i64> {
        Some(self.samples[self.decode_index(idx)?].pts)
    }

    /// Presentation times in seconds, in presentation order.
    pub fn frame_times(&self) -> Vec<f64> {
        let scale = f64::from(self.timescale);
        self.decode_of
            .iter()
            .map(|&d| self.samples[d].pts as f64 / scale)
            .collect()
    }
}

/// Positional byte reads over an encoded video.
pub trait SampleSource: Send + Sync {
    fn read_at(&self, offset: u64, len: usize) -> ArchiveResult<Vec<u8>>;

    fn size(&self) -> u64;
}

/// Local file read through a shared handle.
#[derive(Debug)]
pub struct FileSource {
    file: Mutex<File>,
    size: u64,
}

impl FileSource {
    pub fn open(path: &Path) -> ArchiveResult<Self> {
        let file =
            File::open(path).with_context(|| format!("open video '{}'", path.display()))?;
        let size = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            size,
        })
    }
}

impl SampleSource for FileSource {
    fn read_at(&self, offset: u64, len: usize) -> ArchiveResult<Vec<u8>> {
        let mut f = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        f.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0; len];
        f.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// Encoded video held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource(pub Arc<Vec<u8>>);

impl SampleSource for MemorySource {
    fn read_at(&self, offset: u64, len: usize) -> ArchiveResult<Vec<u8>> {
        let start = usize::try_from(offset).map_err(|_| out_of_range(offset, len))?;
        let end = start.checked_add(len).ok_or_else(|| out_of_range(offset, len))?;
        self.0
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| out_of_range(offset, len))
    }

    fn size(&self) -> u64 {
        self.0.len() as u64
    }
}

fn out_of_range(offset: u64, len: usize) -> ArchiveError {
    ArchiveError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("read of {len} bytes at {offset} is past the end of the source"),
    ))
}

/// Byte range covering consecutive samples stored back to back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ByteRange {
    pub(crate) offset: u64,
    pub(crate) len: u64,
    /// Samples `first..first + count` of the slice the ranges were built from.
    pub(crate) first: usize,
    pub(crate) count: usize,
}

/// Merge samples whose payloads are contiguous into single reads.
pub(crate) fn merge_ranges(samples: &[SampleInfo]) -> Vec<ByteRange> {
    let mut out: Vec<ByteRange> = Vec::new();
    for (i, s) in samples.iter().enumerate() {
        if let Some(last) = out.last_mut()
            && last.offset + last.len == s.offset
        {
            last.len += u64::from(s.size);
            last.count += 1;
            continue;
        }
        out.push(ByteRange {
            offset: s.offset,
            len: u64::from(s.size),
            first: i,
            count: 1,
        });
    }
    out
}

/// Big-endian reader over a box body.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> ArchiveResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&e| e <= self.data.len())
            .ok_or_else(|| ArchiveError::format("truncated mp4 box"))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn skip(&mut self, n: usize) -> ArchiveResult<()> {
        self.take(n).map(|_| ())
    }

    fn u16(&mut self) -> ArchiveResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> ArchiveResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> ArchiveResult<u64> {
        let b = self.take(8)?;
        let mut a = [0; 8];
        a.copy_from_slice(b);
        Ok(u64::from_be_bytes(a))
    }

    fn fourcc(&mut self) -> ArchiveResult<[u8; 4]> {
        let b = self.take(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    /// Version byte of a full box; flags are skipped.
    fn full_box(&mut self) -> ArchiveResult<u8> {
        let v = self.take(4)?[0];
        Ok(v)
    }

    fn count(&mut self) -> ArchiveResult<usize> {
        let n = self.u32()? as usize;
        // Every table entry takes at least four bytes.
        if n.saturating_mul(4) > self.data.len() - self.pos {
            return Err(ArchiveError::format("mp4 table count exceeds box size"));
        }
        Ok(n)
    }
}

/// Child boxes of a container box body.
fn children(data: &[u8]) -> ArchiveResult<Vec<([u8; 4], &[u8])>> {
    let mut out = Vec::new();
    let mut r = Reader::new(data);
    while r.pos + 8 <= data.len() {
        let start = r.pos;
        let size32 = r.u32()?;
        let kind = r.fourcc()?;
        let size = match size32 {
            0 => (data.len() - start) as u64,
            1 => r.u64()?,
            n => u64::from(n),
        };
        let header = r.pos - start;
        let size = usize::try_from(size)
            .ok()
            .filter(|&s| s >= header && start + s <= data.len())
            .ok_or_else(|| ArchiveError::format("mp4 box size out of range"))?;
        out.push((kind, &data[r.pos..start + size]));
        r.pos = start + size;
    }
    Ok(out)
}

fn child<'a>(data: &'a [u8], kind: &[u8; 4]) -> ArchiveResult<Option<&'a [u8]>> {
    Ok(children(data)?
        .into_iter()
        .find(|(k, _)| k == kind)
        .map(|(_, b)| b))
}

fn require<'a>(data: &'a [u8], kind: &[u8; 4]) -> ArchiveResult<&'a [u8]> {
    child(data, kind)?.ok_or_else(|| {
        ArchiveError::format(format!(
            "mp4 box '{}' missing",
            String::from_utf8_lossy(kind)
        ))
    })
}

/// Locate the `moov` box among top-level boxes without reading sample data.
fn read_moov<S: SampleSource + ?Sized>(src: &S) -> ArchiveResult<Vec<u8>> {
    let total = src.size();
    let mut pos = 0u64;
    while pos + 8 <= total {
        let head = src.read_at(pos, 8)?;
        let mut r = Reader::new(&head);
        let size32 = r.u32()?;
        let kind = r.fourcc()?;
        let (size, header) = match size32 {
            0 => (total - pos, 8),
            1 => {
                let ext = src.read_at(pos + 8, 8)?;
                (Reader::new(&ext).u64()?, 16)
            }
            n => (u64::from(n), 8),
        };
        if size < header || pos + size > total {
            return Err(ArchiveError::format("mp4 top-level box size out of range"));
        }
        if &kind == b"moov" {
            let body_len = usize::try_from(size - header)
                .map_err(|_| ArchiveError::format("mp4 moov box too large"))?;
            return src.read_at(pos + header, body_len);
        }
        pos += size;
    }
    Err(ArchiveError::format("mp4 has no moov box"))
}

/// Sample table of the first video track of an MP4/QuickTime file.
#[tracing::instrument(skip_all)]
pub fn parse_mp4<S: SampleSource + ?Sized>(src: &S) -> ArchiveResult<SampleTable> {
    let moov = read_moov(src)?;
    for (kind, trak) in children(&moov)? {
        if &kind != b"trak" {
            continue;
        }
        let mdia = require(trak, b"mdia")?;
        let hdlr = require(mdia, b"hdlr")?;
        let mut r = Reader::new(hdlr);
        r.full_box()?;
        r.skip(4)?;
        if &r.fourcc()? != b"vide" {
            continue;
        }
        let table = parse_track(mdia, src.size())?;
        tracing::debug!(
            codec = %String::from_utf8_lossy(&table.codec),
            samples = table.len(),
            keyframes = table.keyframes.len(),
            "parsed mp4 video track"
        );
        return Ok(table);
    }
    Err(ArchiveError::format("mp4 has no video track"))
}

fn parse_track(mdia: &[u8], source_size: u64) -> ArchiveResult<SampleTable> {
    let mut r = Reader::new(require(mdia, b"mdhd")?);
    let timescale = if r.full_box()? == 1 {
        r.skip(16)?;
        r.u32()?
    } else {
        r.skip(8)?;
        r.u32()?
    };

    let stbl = require(require(mdia, b"minf")?, b"stbl")?;
    parse_stbl(stbl, timescale, source_size)
}

/// `source_size` bounds sample counts that are not backed by a per-entry table.
fn parse_stbl(stbl: &[u8], timescale: u32, source_size: u64) -> ArchiveResult<SampleTable> {
    let mut r = Reader::new(require(stbl, b"stsd")?);
    r.full_box()?;
    if r.count()? == 0 {
        return Err(ArchiveError::format("mp4 stsd has no sample entry"));
    }
    r.skip(4)?;
    let codec = r.fourcc()?;
    // reserved(6) data_ref(2) pre_defined/reserved(16)
    r.skip(24)?;
    let width = u32::from(r.u16()?);
    let height = u32::from(r.u16()?);

    let sizes = {
        let mut r = Reader::new(require(stbl, b"stsz")?);
        r.full_box()?;
        let fixed = r.u32()?;
        let n = r.u32()? as usize;
        if fixed != 0 {
            if n as u64 > source_size / u64::from(fixed) {
                return Err(ArchiveError::format(format!(
                    "mp4 stsz declares {n} samples of {fixed} bytes in a {source_size} byte file"
                )));
            }
            vec![fixed; n]
        } else {
            let n = n.min((r.data.len() - r.pos) / 4);
            (0..n).map(|_| r.u32()).collect::<ArchiveResult<Vec<_>>>()?
        }
    };
    let n = sizes.len();

    let mut dts = Vec::with_capacity(n);
    {
        let mut r = Reader::new(require(stbl, b"stts")?);
        r.full_box()?;
        let mut t = 0i64;
        for _ in 0..r.count()? {
            let count = r.u32()?;
            let delta = i64::from(r.u32()?);
            for _ in 0..count {
                if dts.len() == n {
                    break;
                }
                dts.push(t);
                t += delta;
            }
        }
    }
    while dts.len() < n {
        dts.push(dts.last().copied().unwrap_or(0));
    }

    let mut cts = vec![0i64; n];
    if let Some(ctts) = child(stbl, b"ctts")? {
        let mut r = Reader::new(ctts);
        let version = r.full_box()?;
        let mut i = 0;
        for _ in 0..r.count()? {
            let count = r.u32()? as usize;
            let raw = r.u32()?;
            let off = if version == 1 {
                i64::from(raw as i32)
            } else {
                i64::from(raw)
            };
            let take = count.min(n - i);
            cts[i..i + take].fill(off);
            i += take;
        }
    }

    let mut keyframe = vec![true; n];
    if let Some(stss) = child(stbl, b"stss")? {
        keyframe = vec![false; n];
        let mut r = Reader::new(stss);
        r.full_box()?;
        for _ in 0..r.count()? {
            let s = r.u32()? as usize;
            if (1..=n).contains(&s) {
                keyframe[s - 1] = true;
            }
        }
    }

    let chunk_offsets: Vec<u64> = if let Some(stco) = child(stbl, b"stco")? {
        let mut r = Reader::new(stco);
        r.full_box()?;
        (0..r.count()?)
            .map(|_| r.u32().map(u64::from))
            .collect::<ArchiveResult<_>>()?
    } else {
        let mut r = Reader::new(require(stbl, b"co64")?);
        r.full_box()?;
        (0..r.count()?)
            .map(|_| r.u64())
            .collect::<ArchiveResult<_>>()?
    };

    let mut stsc = Vec::new();
    {
        let mut r = Reader::new(require(stbl, b"stsc")?);
        r.full_box()?;
        for _ in 0..r.count()? {
            let first_chunk = r.u32()? as usize;
            let per_chunk = r.u32()? as usize;
            r.skip(4)?;
            stsc.push((first_chunk, per_chunk));
        }
    }

    let mut offsets = Vec::with_capacity(n);
    for (ci, &chunk_offset) in chunk_offsets.iter().enumerate() {
        let chunk = ci + 1;
        let per_chunk = stsc
            .iter()
            .rev()
            .find(|&&(first, _)| first <= chunk)
            .map_or(0, |&(_, p)| p);
        let mut off = chunk_offset;
        for _ in 0..per_chunk {
            if offsets.len() == n {
                break;
            }
            offsets.push(off);
            off += u64::from(sizes[offsets.len() - 1]);
        }
    }
    if offsets.len() < n {
        return Err(ArchiveError::format(format!(
            "mp4 chunk map covers {} of {n} samples",
            offsets.len()
        )));
    }

    let samples = (0..n)
        .map(|i| SampleInfo {
            offset: offsets[i],
            size: sizes[i],
            dts: dts[i],
            pts: dts[i] + cts[i],
            keyframe: keyframe[i],
        })
        .collect();
    Ok(SampleTable::new(codec, timescale, width, height, samples))
}

#[cfg(test)]
#[path = "../../tests/unit/video/demux.rs"]
mod tests;
