//! PNG text-chunk embedding for image provenance.
//!
//! Generated images carry their prompt and model id as text chunks inserted
//! just before `IEND`. Image data is only decoded to tell blank images apart;
//! it is never re-encoded.

use std::io::Read;

use flate2::read::ZlibDecoder;
use tracing::debug;

use crate::constants::png::{
    ADAM7_PASSES, CHUNK_IDAT, CHUNK_IEND, CHUNK_IHDR, CHUNK_ITXT, CHUNK_TEXT, MAX_KEYWORD_LEN,
    SIGNATURE,
};
use crate::errors::FortuneError;
use crate::types::{MetaKeyword, MetaText};

/// A raw chunk borrowed from a PNG byte stream.
#[derive(Debug)]
struct Chunk<'a> {
    kind: [u8; 4],
    data: &'a [u8],
    /// Offset of the chunk's length field within the stream.
    offset: usize,
}

/// Return a copy of `png` with one text chunk per `(keyword, text)` entry.
///
/// Text representable in Latin-1 is stored as `tEXt`, anything else as an
/// uncompressed UTF-8 `iTXt` chunk.
pub fn embed_text(png: &[u8], entries: &[(&str, &str)]) -> Result<Vec<u8>, FortuneError> {
    let chunks = parse_chunks(png)?;
    let iend = chunks
        .iter()
        .find(|chunk| chunk.kind == CHUNK_IEND)
        .map(|chunk| chunk.offset)
        .ok_or_else(|| FortuneError::InvalidImage("missing IEND chunk".to_string()))?;

    let mut out = Vec::with_capacity(png.len() + entries.len() * 64);
    out.extend_from_slice(&png[..iend]);
    for (keyword, text) in entries {
        let (kind, data) = encode_text_chunk(keyword, text)?;
        write_chunk(&mut out, kind, &data);
    }
    out.extend_from_slice(&png[iend..]);
    Ok(out)
}

/// Read `tEXt` and uncompressed `iTXt` entries, in stream order.
pub fn read_text(png: &[u8]) -> Result<Vec<(MetaKeyword, MetaText)>, FortuneError> {
    let mut entries = Vec::new();
    for chunk in parse_chunks(png)? {
        match chunk.kind {
            CHUNK_TEXT => entries.push(decode_text(chunk.data)?),
            CHUNK_ITXT => match decode_itxt(chunk.data)? {
                Some(entry) => entries.push(entry),
                None => debug!("skipping compressed iTXt chunk"),
            },
            _ => {}
        }
    }
    Ok(entries)
}

/// Count the non-empty bins of a per-channel, 256-bin sample histogram.
///
/// A uniform image scores one bin per channel. 16-bit samples are binned by
/// their high byte and palette images by index.
pub fn histogram_bins(png: &[u8]) -> Result<usize, FortuneError> {
    let chunks = parse_chunks(png)?;
    let header = parse_header(chunks[0].data)?;
    let mut compressed = Vec::new();
    for chunk in chunks.iter().filter(|chunk| chunk.kind == CHUNK_IDAT) {
        compressed.extend_from_slice(chunk.data);
    }
    let mut raw = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut raw)
        .map_err(|err| FortuneError::InvalidImage(format!("bad image data: {err}")))?;

    let passes: Vec<(usize, usize)> = if header.interlaced {
        ADAM7_PASSES
            .iter()
            .map(|&(x0, y0, dx, dy)| {
                (
                    pass_extent(header.width, x0, dx),
                    pass_extent(header.height, y0, dy),
                )
            })
            .collect()
    } else {
        vec![(header.width, header.height)]
    };

    let bits_per_pixel = header.bit_depth * header.channels;
    let filter_step = (bits_per_pixel / 8).max(1);
    let mut seen = [[false; 256]; 4];
    let mut pos = 0;
    for (width, height) in passes {
        if width == 0 || height == 0 {
            continue;
        }
        let stride = (width * bits_per_pixel).div_ceil(8);
        if raw.len().saturating_sub(pos) / (stride + 1) < height {
            return Err(FortuneError::InvalidImage(
                "truncated image data".to_string(),
            ));
        }
        let mut prev = vec![0u8; stride];
        let mut line = vec![0u8; stride];
        for _ in 0..height {
            let row = &raw[pos..pos + 1 + stride];
            unfilter(row[0], &row[1..], &prev, &mut line, filter_step)?;
            mark_samples(&line, width, &header, &mut seen);
            std::mem::swap(&mut prev, &mut line);
            pos += 1 + stride;
        }
    }
    Ok(seen.iter().flatten().filter(|&&hit| hit).count())
}

/// Image layout fields from `IHDR`.
#[derive(Debug)]
struct Header {
    width: usize,
    height: usize,
    bit_depth: usize,
    channels: usize,
    interlaced: bool,
}

fn parse_header(data: &[u8]) -> Result<Header, FortuneError> {
    let data: [u8; 13] = data
        .try_into()
        .map_err(|_| FortuneError::InvalidImage("bad IHDR length".to_string()))?;
    let width = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let height = u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as usize;
    let (bit_depth, color_type) = (data[8], data[9]);
    let channels = match color_type {
        0 | 3 => 1,
        4 => 2,
        2 => 3,
        6 => 4,
        other => {
            return Err(FortuneError::InvalidImage(format!(
                "unknown color type {other}"
            )));
        }
    };
    let depth_ok = match color_type {
        0 => matches!(bit_depth, 1 | 2 | 4 | 8 | 16),
        3 => matches!(bit_depth, 1 | 2 | 4 | 8),
        _ => matches!(bit_depth, 8 | 16),
    };
    if !depth_ok {
        return Err(FortuneError::InvalidImage(format!(
            "bit depth {bit_depth} not allowed for color type {color_type}"
        )));
    }
    let interlaced = match data[12] {
        0 => false,
        1 => true,
        other => {
            return Err(FortuneError::InvalidImage(format!(
                "unknown interlace method {other}"
            )));
        }
    };
    Ok(Header {
        width,
        height,
        bit_depth: usize::from(bit_depth),
        channels,
        interlaced,
    })
}

fn pass_extent(size: usize, start: usize, step: usize) -> usize {
    if size > start {
        (size - start).div_ceil(step)
    } else {
        0
    }
}

/// Reverse one scanline filter into `out`; `step` is the bytes per pixel.
fn unfilter(
    filter: u8,
    src: &[u8],
    prev: &[u8],
    out: &mut [u8],
    step: usize,
) -> Result<(), FortuneError> {
    if filter > 4 {
        return Err(FortuneError::InvalidImage(format!(
            "unknown scanline filter {filter}"
        )));
    }
    for idx in 0..src.len() {
        let left = if idx >= step { out[idx - step] } else { 0 };
        let up = prev[idx];
        let up_left = if idx >= step { prev[idx - step] } else { 0 };
        let predicted = match filter {
            0 => 0,
            1 => left,
            2 => up,
            3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
            _ => paeth(left, up, up_left),
        };
        out[idx] = src[idx].wrapping_add(predicted);
    }
    Ok(())
}

fn paeth(left: u8, up: u8, up_left: u8) -> u8 {
    let estimate = i16::from(left) + i16::from(up) - i16::from(up_left);
    let to_left = (estimate - i16::from(left)).abs();
    let to_up = (estimate - i16::from(up)).abs();
    let to_up_left = (estimate - i16::from(up_left)).abs();
    if to_left <= to_up && to_left <= to_up_left {
        left
    } else if to_up <= to_up_left {
        up
    } else {
        up_left
    }
}

fn mark_samples(line: &[u8], width: usize, header: &Header, seen: &mut [[bool; 256]; 4]) {
    let depth = header.bit_depth;
    for idx in 0..width * header.channels {
        let value = match depth {
            8 => line[idx],
            16 => line[idx * 2],
            _ => {
                let bit = idx * depth;
                let shift = 8 - depth - bit % 8;
                (line[bit / 8] >> shift) & ((1u8 << depth) - 1)
            }
        };
        seen[idx % header.channels][usize::from(value)] = true;
    }
}

fn parse_chunks(png: &[u8]) -> Result<Vec<Chunk<'_>>, FortuneError> {
    if !png.starts_with(&SIGNATURE) {
        return Err(FortuneError::InvalidImage("bad signature".to_string()));
    }
    let mut chunks = Vec::new();
    let mut pos = SIGNATURE.len();
    while pos < png.len() {
        let header = png
            .get(pos..pos + 8)
            .ok_or_else(|| FortuneError::InvalidImage(format!("truncated chunk at {pos}")))?;
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let kind = [header[4], header[5], header[6], header[7]];
        let data_start = pos + 8;
        let data_end = data_start
            .checked_add(len)
            .filter(|end| end + 4 <= png.len())
            .ok_or_else(|| FortuneError::InvalidImage(format!("truncated chunk at {pos}")))?;
        let data = &png[data_start..data_end];
        let stored = u32::from_be_bytes([
            png[data_end],
            png[data_end + 1],
            png[data_end + 2],
            png[data_end + 3],
        ]);
        if stored != chunk_crc(kind, data) {
            return Err(FortuneError::InvalidImage(format!(
                "CRC mismatch in {} chunk at {pos}",
                String::from_utf8_lossy(&kind)
            )));
        }
        if chunks.is_empty() && kind != CHUNK_IHDR {
            return Err(FortuneError::InvalidImage(
                "first chunk is not IHDR".to_string(),
            ));
        }
        chunks.push(Chunk {
            kind,
            data,
            offset: pos,
        });
        pos = data_end + 4;
        if kind == CHUNK_IEND {
            break;
        }
    }
    if chunks.is_empty() {
        return Err(FortuneError::InvalidImage("no chunks".to_string()));
    }
    Ok(chunks)
}

fn chunk_crc(kind: [u8; 4], data: &[u8]) -> u32 {
    let mut crc = crc32fast::Hasher::new();
    crc.update(&kind);
    crc.update(data);
    crc.finalize()
}

fn write_chunk(out: &mut Vec<u8>, kind: [u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(&kind);
    out.extend_from_slice(data);
    out.extend_from_slice(&chunk_crc(kind, data).to_be_bytes());
}

fn encode_text_chunk(keyword: &str, text: &str) -> Result<([u8; 4], Vec<u8>), FortuneError> {
    let keyword_bytes = encode_keyword(keyword)?;
    if text.contains('\0') {
        return Err(FortuneError::Configuration(format!(
            "text for PNG keyword '{keyword}' contains a NUL byte"
        )));
    }
    let mut data = keyword_bytes;
    data.push(0);
    match encode_latin1(text) {
        Some(latin1) => {
            data.extend_from_slice(&latin1);
            Ok((CHUNK_TEXT, data))
        }
        None => {
            // Compression flag, compression method, empty language tag and
            // empty translated keyword.
            data.extend_from_slice(&[0, 0, 0, 0]);
            data.extend_from_slice(text.as_bytes());
            Ok((CHUNK_ITXT, data))
        }
    }
}

fn encode_keyword(keyword: &str) -> Result<Vec<u8>, FortuneError> {
    let bytes = encode_latin1(keyword).unwrap_or_default();
    let printable = bytes
        .iter()
        .all(|&byte| matches!(byte, 0x20..=0x7e | 0xa1..=0xff));
    if bytes.is_empty() || bytes.len() > MAX_KEYWORD_LEN || !printable {
        return Err(FortuneError::Configuration(format!(
            "invalid PNG text keyword '{keyword}'"
        )));
    }
    Ok(bytes)
}

fn encode_latin1(text: &str) -> Option<Vec<u8>> {
    text.chars()
        .map(|ch| u8::try_from(u32::from(ch)).ok())
        .collect()
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&byte| char::from(byte)).collect()
}

fn split_keyword(data: &[u8]) -> Result<(MetaKeyword, &[u8]), FortuneError> {
    let nul = data
        .iter()
        .position(|&byte| byte == 0)
        .ok_or_else(|| FortuneError::InvalidImage("text chunk without separator".to_string()))?;
    Ok((decode_latin1(&data[..nul]), &data[nul + 1..]))
}

fn decode_text(data: &[u8]) -> Result<(MetaKeyword, MetaText), FortuneError> {
    let (keyword, text) = split_keyword(data)?;
    Ok((keyword, decode_latin1(text)))
}

fn decode_itxt(data: &[u8]) -> Result<Option<(MetaKeyword, MetaText)>, FortuneError> {
    let (keyword, rest) = split_keyword(data)?;
    let [compressed, _method, rest @ ..] = rest else {
        return Err(FortuneError::InvalidImage("truncated iTXt chunk".to_string()));
    };
    if *compressed != 0 {
        return Ok(None);
    }
    // Skip the language tag and translated keyword.
    let mut rest = rest;
    for _ in 0..2 {
        let nul = rest
            .iter()
            .position(|&byte| byte == 0)
            .ok_or_else(|| FortuneError::InvalidImage("truncated iTXt chunk".to_string()))?;
        rest = &rest[nul + 1..];
    }
    let text = std::str::from_utf8(rest)
        .map_err(|err| FortuneError::InvalidImage(format!("iTXt text is not UTF-8: {err}")))?;
    Ok(Some((keyword, text.to_string())))
}
