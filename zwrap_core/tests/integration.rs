//! End-to-end behaviour of the reader and writer over real codecs and files.
//!
//! Covers:
//!  - round trips for every format, from empty input to several megabytes
//!  - multi-member files produced by concatenation
//!  - BGZF virtual offsets: tell/seek, offset composition, writer-side tell
//!  - rejection of positioning calls on formats without an index
//!  - flush visibility to a second reader while the writer stays open
use std::fs::File;
use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};
use std::path::Path;

use proptest::prelude::*;
use tempfile::TempDir;
use zwrap_codecs::{create, open, CompressionLevel, Format, BGZF_MAX_BLOCK_LEN};
use zwrap_core::{CodecState, Reader, StreamError, VirtualOffset, Writer};

/// Generate `len` deterministic bytes using a simple LCG.
fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

/// Generate `len` highly compressible bytes (repeating pattern).
fn compressible_bytes(len: usize) -> Vec<u8> {
    let pattern = b"the quick brown fox jumps over the lazy dog. ";
    (0..len).map(|i| pattern[i % pattern.len()]).collect()
}

/// 0x00..=0xFF repeating.
fn byte_ramp(len: usize) -> Vec<u8> {
    (0..len).map(|i| i as u8).collect()
}

// ── helpers ───────────────────────────────────────────────────────────────

fn encode(format: Format, data: &[u8]) -> Vec<u8> {
    let mut writer = Writer::new(Vec::new(), format.encoder(CompressionLevel::Fast).unwrap());
    writer.write_all(data).unwrap();
    writer.finish().unwrap()
}

fn decode(format: Format, file: &[u8]) -> io::Result<Vec<u8>> {
    let mut reader = Reader::new(file, format.decoder().unwrap());
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out)
}

fn write_file(path: &Path, format: Format, data: &[u8], capacity: usize) {
    let file = File::create(path).unwrap();
    let mut writer = Writer::with_capacity(capacity, file, format.encoder(CompressionLevel::Default).unwrap());
    writer.write_all(data).unwrap();
    writer.close().unwrap();
}

/// Every member holding data, as (compressed start, index of its first
/// decompressed byte), found by a sequential scan.
fn member_starts(path: &Path) -> Vec<(u64, usize)> {
    let mut reader = open(path, Format::Bgzf).unwrap();
    let mut starts = Vec::new();
    let mut delivered = 0;
    loop {
        let n = reader.fill_buf().unwrap().len();
        if n == 0 {
            return starts;
        }
        if starts.last().map(|&(block, _)| block) != Some(reader.block_position()) {
            starts.push((reader.block_position(), delivered));
        }
        reader.consume(n);
        delivered += n;
    }
}

// ── round trips ───────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_round_trip_every_format(
        data in proptest::collection::vec(any::<u8>(), 0..8192),
        capacity in 16usize..2048,
    ) {
        for format in Format::ALL {
            let mut writer = Writer::with_capacity(capacity, Vec::new(), format.encoder(CompressionLevel::Fast).unwrap());
            for chunk in data.chunks(capacity / 3 + 1) {
                writer.write_all(chunk).unwrap();
            }
            let file = writer.finish().unwrap();

            let mut reader = Reader::with_capacity(capacity, file.as_slice(), format.decoder().unwrap());
            let mut out = Vec::new();
            reader.read_to_end(&mut out).unwrap();
            prop_assert_eq!(&out, &data, "{} at capacity {}", format, capacity);
        }
    }

    #[test]
    fn prop_seek_to_tell_is_stable(reads in proptest::collection::vec(1usize..20_000, 1..12)) {
        let data = pseudo_random_bytes(3 * BGZF_MAX_BLOCK_LEN + 999, 7);
        let file = encode(Format::Bgzf, &data);
        let mut reader = Reader::new(io::Cursor::new(file), Format::Bgzf.decoder().unwrap());

        let mut at = 0;
        for len in reads {
            let len = len.min(data.len() - at);
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf).unwrap();
            at += len;

            let tell = reader.virtual_position().unwrap();
            let next = reader.read_byte().unwrap();
            reader.seek_virtual(tell).unwrap();
            prop_assert_eq!(reader.read_byte().unwrap(), next);
            prop_assert_eq!(next, data.get(at).copied());
            reader.seek_virtual(tell).unwrap();
        }
    }
}

#[test]
fn test_round_trip_empty() {
    for format in Format::ALL {
        let file = encode(format, b"");
        assert!(!file.is_empty(), "{format}: an empty stream is still a valid file");
        assert_eq!(decode(format, &file).unwrap(), b"");
    }
}

#[test]
fn test_round_trip_single_byte() {
    for format in Format::ALL {
        let file = encode(format, b"x");
        assert_eq!(decode(format, &file).unwrap(), b"x", "{format}");
    }
}

#[test]
fn test_round_trip_multi_megabyte() {
    let mut data = compressible_bytes(3 << 20);
    data.extend(pseudo_random_bytes(1 << 20, 42));
    for format in Format::ALL {
        let file = encode(format, &data);
        assert!(file.len() < data.len(), "{format} should compress the repetitive half");
        assert_eq!(decode(format, &file).unwrap(), data, "{format}");
    }
}

#[test]
fn test_bgzf_is_readable_as_plain_gzip() {
    let data = compressible_bytes(200_000);
    let file = encode(Format::Bgzf, &data);
    assert_eq!(decode(Format::Gzip, &file).unwrap(), data);
}

// ── concatenation ─────────────────────────────────────────────────────────

#[test]
fn test_concatenated_members_decode_as_one_stream() {
    for format in [Format::Gzip, Format::Zstd] {
        let mut file = encode(format, b"first half, ");
        file.extend(encode(format, b"second half"));

        let mut reader = Reader::new(file.as_slice(), format.decoder().unwrap());
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "first half, second half", "{format}");
        assert_eq!(reader.members_seen(), 1, "{format}: one transition per join");
    }
}

#[test]
fn test_concatenated_bgzf_files_stay_seekable() {
    let first = encode(Format::Bgzf, b"alpha");
    let second = encode(Format::Bgzf, b"beta");
    let join = first.len() as u64;
    let mut file = first;
    file.extend(second);

    let mut reader = Reader::new(io::Cursor::new(file), Format::Bgzf.decoder().unwrap());
    let mut out = String::new();
    reader.read_to_string(&mut out).unwrap();
    assert_eq!(out, "alphabeta");

    reader.seek_virtual(VirtualOffset::new(join, 1).unwrap()).unwrap();
    out.clear();
    reader.read_to_string(&mut out).unwrap();
    assert_eq!(out, "eta");
}

// ── virtual offsets ───────────────────────────────────────────────────────

#[test]
fn test_offset_composition() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("blocks.bgz");
    let data = pseudo_random_bytes(10_000, 3);
    write_file(&path, Format::Bgzf, &data, 1024);

    let starts = member_starts(&path);
    assert_eq!(starts.len(), 10);

    let mut reader = open(&path, Format::Bgzf).unwrap();
    for (i, &(block, first)) in starts.iter().enumerate() {
        let member_len = starts.get(i + 1).map_or(data.len(), |&(_, next)| next) - first;
        for (k, n) in [(0usize, 16usize), (1, 1), (500, 100), (1000, 24)] {
            if k + n > member_len {
                continue;
            }
            reader.seek_virtual(VirtualOffset::new(block, k as u16).unwrap()).unwrap();
            let mut buf = vec![0u8; n];
            reader.read_exact(&mut buf).unwrap();
            assert_eq!(buf, &data[first + k..first + k + n], "block {block} +{k}");
        }
    }
}

#[test]
fn test_seek_trait_uses_virtual_offsets() {
    let data = byte_ramp(150_000);
    let mut reader = Reader::new(io::Cursor::new(encode(Format::Bgzf, &data)), Format::Bgzf.decoder().unwrap());

    let mut skip = vec![0u8; 100_000];
    reader.read_exact(&mut skip).unwrap();
    let raw = reader.stream_position().unwrap();
    assert_eq!(VirtualOffset::from(raw), reader.virtual_position().unwrap());

    reader.rewind().unwrap();
    assert_eq!(reader.read_byte().unwrap(), Some(0));
    reader.seek(SeekFrom::Start(raw)).unwrap();
    assert_eq!(reader.read_byte().unwrap(), Some((100_000 % 256) as u8));

    let err = reader.seek(SeekFrom::Current(1)).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    let err = reader.seek(SeekFrom::End(0)).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::Unsupported);
}

#[test]
fn test_virtual_offset_survives_serialization() {
    let data = compressible_bytes(80_000);
    let mut reader = Reader::new(io::Cursor::new(encode(Format::Bgzf, &data)), Format::Bgzf.decoder().unwrap());
    let mut skip = vec![0u8; 70_001];
    reader.read_exact(&mut skip).unwrap();

    // As an external index would store it.
    let stored = reader.virtual_position().unwrap().to_le_bytes();
    reader.rewind().unwrap();
    reader.seek_virtual(VirtualOffset::from_le_bytes(stored)).unwrap();
    let mut rest = Vec::new();
    reader.read_to_end(&mut rest).unwrap();
    assert_eq!(rest, &data[70_001..]);
}

/// Hands over everything before `split` on the first read, the rest later.
struct SplitRead {
    data: Vec<u8>,
    pos: usize,
    split: usize,
}

impl Read for SplitRead {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let end = if self.pos < self.split { self.split } else { self.data.len() };
        let n = (end - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[test]
fn test_tell_after_full_member_with_unread_trailer() {
    // A single 64 KiB member whose last 4 trailer bytes arrive in a later read.
    let data = compressible_bytes(1 << 16);
    let mut writer = Writer::with_capacity(1 << 17, Vec::new(), Format::Gzip.encoder(CompressionLevel::Default).unwrap());
    writer.write_all(&data).unwrap();
    let file = writer.finish().unwrap();
    let file_len = file.len() as u64;

    let source = SplitRead { split: file.len() - 4, data: file, pos: 0 };
    let mut reader = Reader::new(source, Format::Bgzf.decoder().unwrap());
    let mut out = vec![0u8; data.len()];
    reader.read_exact(&mut out).unwrap();
    assert_eq!(out, data);

    assert_eq!(reader.virtual_position().unwrap(), VirtualOffset::new(file_len, 0).unwrap());
    assert_eq!(reader.read_byte().unwrap(), None);
    assert_eq!(reader.codec_state(), CodecState::AtMemberEnd);
}

#[test]
fn test_unsupported_seek_never_moves_the_stream() {
    for format in [Format::Gzip, Format::Zstd] {
        let data = compressible_bytes(5000);
        let mut reader = Reader::new(io::Cursor::new(encode(format, &data)), format.decoder().unwrap());

        let mut head = vec![0u8; 100];
        reader.read_exact(&mut head).unwrap();

        for pos in [SeekFrom::Start(0), SeekFrom::Start(1 << 16), SeekFrom::Current(0), SeekFrom::End(0)] {
            let err = reader.seek(pos).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::Unsupported, "{format} {pos:?}");
        }
        assert!(matches!(
            reader.seek_virtual(VirtualOffset::new(0, 5).unwrap()),
            Err(StreamError::SeekUnsupported { .. })
        ));
        assert!(matches!(reader.virtual_position(), Err(StreamError::SeekUnsupported { .. })));

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, &data[100..], "{format}: reading resumes where it was");
    }
}

#[test]
fn test_writer_tell_rejected_without_index() {
    let writer = Writer::new(Vec::new(), Format::Gzip.encoder(CompressionLevel::Default).unwrap());
    assert!(matches!(writer.virtual_position(), Err(StreamError::SeekUnsupported { codec: "gzip" })));
}

// ── decode errors ─────────────────────────────────────────────────────────

#[test]
fn test_corrupt_member_reported_once_then_end_of_data() {
    // Valid gzip header followed by a deflate block of reserved type 3.
    let file = [0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff];
    let mut reader = Reader::new(&file[..], Format::Gzip.decoder().unwrap());

    let mut buf = [0u8; 32];
    let err = reader.read(&mut buf).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    assert_eq!(reader.codec_state(), CodecState::Error);
    assert!(reader.last_error().is_some());

    assert_eq!(reader.read(&mut buf).unwrap(), 0);
    assert_eq!(reader.read_byte().unwrap(), None);
}

#[test]
fn test_truncated_file_yields_prefix() {
    let data = pseudo_random_bytes(50_000, 9);
    for format in Format::ALL {
        let file = encode(format, &data);
        let out = decode(format, &file[..file.len() / 2]).unwrap();
        assert!(out.len() < data.len(), "{format}");
        assert_eq!(out, &data[..out.len()], "{format}");
    }
}

#[test]
fn test_seek_recovers_from_decode_error() {
    let good = encode(Format::Bgzf, b"recoverable");
    let mut file = b"garbage!".to_vec();
    let start = file.len() as u64;
    file.extend(good);

    let mut reader = Reader::new(io::Cursor::new(file), Format::Bgzf.decoder().unwrap());
    assert!(reader.read_byte().is_err());
    assert_eq!(reader.codec_state(), CodecState::Error);

    reader.seek_virtual(VirtualOffset::new(start, 0).unwrap()).unwrap();
    assert_eq!(reader.codec_state(), CodecState::Ready);
    assert!(reader.last_error().is_none());
    let mut out = String::new();
    reader.read_to_string(&mut out).unwrap();
    assert_eq!(out, "recoverable");
}

// ── scenarios ─────────────────────────────────────────────────────────────

#[test]
fn test_scenario_hello_world() {
    let dir = TempDir::new().unwrap();
    for format in Format::ALL {
        let path = dir.path().join(format!("hello.{}", format.extension()));
        let mut writer = create(&path, format, CompressionLevel::Default).unwrap();
        writer.write_all(b"hello world").unwrap();
        writer.close().unwrap();

        let mut reader = open(&path, format).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello world", "{format}");
    }
}

#[test]
fn test_scenario_bgzf_seek_into_second_block() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ramp.bgz");
    let data = byte_ramp(70_000);

    let mut writer = create(&path, Format::Bgzf, CompressionLevel::Default).unwrap();
    writer.write_all(&data[..65_540]).unwrap();
    let mark = writer.virtual_position().unwrap();
    writer.write_all(&data[65_540..]).unwrap();
    writer.close().unwrap();
    assert!(writer.members_written() >= 2);
    // The first block was cut at the payload limit.
    assert!(mark.block_position() > 0);
    assert_eq!(mark.offset() as usize, 65_540 - BGZF_MAX_BLOCK_LEN);

    let mut reader = open(&path, Format::Bgzf).unwrap();
    reader.seek_virtual(mark).unwrap();
    assert_eq!(reader.read_byte().unwrap(), Some(data[65_540]));
    assert_eq!(data[65_540], (65_540 % 256) as u8);
}

#[test]
fn test_scenario_flush_visible_to_second_reader() {
    let dir = TempDir::new().unwrap();
    for format in Format::ALL {
        let path = dir.path().join(format!("live.{}", format.extension()));
        let mut writer = create(&path, format, CompressionLevel::Default).unwrap();
        let data = compressible_bytes(100_000);
        writer.write_all(&data).unwrap();
        writer.flush().unwrap();

        let mut reader = open(&path, format).unwrap();
        let mut seen = Vec::new();
        reader.read_to_end(&mut seen).unwrap();
        assert_eq!(seen, data, "{format}: flushed bytes readable before close");

        writer.write_all(b"tail").unwrap();
        writer.close().unwrap();
        let mut all = Vec::new();
        open(&path, format).unwrap().read_to_end(&mut all).unwrap();
        assert_eq!(&all[data.len()..], b"tail", "{format}");
    }
}

#[test]
fn test_drop_closes_writer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dropped.gz");
    {
        let mut writer = create(&path, Format::Gzip, CompressionLevel::Fast).unwrap();
        writer.write_all(b"closed by drop").unwrap();
    }
    let mut out = String::new();
    open(&path, Format::Gzip).unwrap().read_to_string(&mut out).unwrap();
    assert_eq!(out, "closed by drop");
}
