//! Minimal MP4 writer for fixtures: one video track, one sample per chunk.
#![allow(dead_code)]

pub struct Mp4Sample {
    pub data: Vec<u8>,
    pub duration: u32,
    pub keyframe: bool,
    /// Composition offset (pts - dts).
    pub cts: i32,
}

impl Mp4Sample {
    pub fn intra(data: Vec<u8>) -> Self {
        Self {
            data,
            duration: 1,
            keyframe: true,
            cts: 0,
        }
    }
}

fn bx(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    out
}

fn full(kind: &[u8; 4], version: u8, body: &[u8]) -> Vec<u8> {
    let mut b = vec![version, 0, 0, 0];
    b.extend_from_slice(body);
    bx(kind, &b)
}

fn u32s(values: impl IntoIterator<Item = u32>) -> Vec<u8> {
    values.into_iter().flat_map(u32::to_be_bytes).collect()
}

pub fn build_mp4(
    codec: &[u8; 4],
    width: u16,
    height: u16,
    timescale: u32,
    samples: &[Mp4Sample],
) -> Vec<u8> {
    let ftyp = bx(b"ftyp", b"isom\0\0\0\0");
    let payload: Vec<u8> = samples.iter().flat_map(|s| s.data.clone()).collect();
    let mdat = bx(b"mdat", &payload);
    let first = (ftyp.len() + 8) as u32;

    let mut entry = vec![0u8; 6];
    entry.extend_from_slice(&1u16.to_be_bytes());
    entry.extend_from_slice(&[0u8; 16]);
    entry.extend_from_slice(&width.to_be_bytes());
    entry.extend_from_slice(&height.to_be_bytes());
    entry.extend_from_slice(&[0u8; 50]);
    let mut stsd = 1u32.to_be_bytes().to_vec();
    stsd.extend(bx(codec, &entry));

    let n = samples.len() as u32;
    let mut stts = n.to_be_bytes().to_vec();
    stts.extend(u32s(samples.iter().flat_map(|s| [1, s.duration])));

    let mut stsz = u32s([0, n]);
    stsz.extend(u32s(samples.iter().map(|s| s.data.len() as u32)));

    let mut offsets = Vec::new();
    let mut off = first;
    for s in samples {
        offsets.push(off);
        off += s.data.len() as u32;
    }
    let mut stco = n.to_be_bytes().to_vec();
    stco.extend(u32s(offsets));

    let mut stbl = full(b"stsd", 0, &stsd);
    stbl.extend(full(b"stts", 0, &stts));
    if samples.iter().any(|s| s.cts != 0) {
        let mut ctts = n.to_be_bytes().to_vec();
        ctts.extend(u32s(samples.iter().flat_map(|s| [1, s.cts as u32])));
        stbl.extend(full(b"ctts", 1, &ctts));
    }
    if samples.iter().any(|s| !s.keyframe) {
        let keys: Vec<u32> = samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.keyframe)
            .map(|(i, _)| i as u32 + 1)
            .collect();
        let mut stss = (keys.len() as u32).to_be_bytes().to_vec();
        stss.extend(u32s(keys));
        stbl.extend(full(b"stss", 0, &stss));
    }
    stbl.extend(full(b"stsz", 0, &stsz));
    stbl.extend(full(b"stsc", 0, &u32s([1, 1, 1, 1])));
    stbl.extend(full(b"stco", 0, &stco));

    let minf = bx(b"minf", &bx(b"stbl", &stbl));
    let duration: u32 = samples.iter().map(|s| s.duration).sum();
    let mut mdhd = u32s([0, 0, timescale, duration]);
    mdhd.extend_from_slice(&[0, 0, 0, 0]);
    let mut hdlr = u32s([0]);
    hdlr.extend_from_slice(b"vide");
    hdlr.extend_from_slice(&[0u8; 13]);

    let mut mdia = full(b"mdhd", 0, &mdhd);
    mdia.extend(full(b"hdlr", 0, &hdlr));
    mdia.extend(minf);
    let moov = bx(b"moov", &bx(b"trak", &bx(b"mdia", &mdia)));

    let mut out = ftyp;
    out.extend(mdat);
    out.extend(moov);
    out
}
