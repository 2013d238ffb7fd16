//! Raw DEFLATE helpers on top of [`flate2::Decompress`].
//!
//! ZIP and GZIP payloads are bare DEFLATE bitstreams, so the inflater is
//! always created without a zlib header.

use anyhow::{Context, Result, bail};
use flate2::{Crc, Decompress, FlushDecompress, Status};
use std::io::Read;

const CHUNK_SIZE: usize = 32 * 1024;

/// How a one-shot inflate finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InflateStatus {
    /// The inflater stopped before the end-of-stream marker: the output
    /// buffer was too small, or the input ran out.
    Completed,
    /// The final block was decoded.
    StreamEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inflated {
    pub status: InflateStatus,
    pub written: usize,
}

/// Inflate `input` into `output` in a single call.
///
/// When the data exactly fills `output` the inflater may stop before reading
/// the end-of-block code, so one more step into a scratch byte decides
/// whether the stream really ends there.
pub fn inflate_raw(input: &[u8], output: &mut [u8]) -> Result<Inflated> {
    let mut inflater = Decompress::new(false);
    let mut status = inflater
        .decompress(input, output, FlushDecompress::Finish)
        .context("corrupt deflate stream")?;

    let written = inflater.total_out() as usize;
    if status != Status::StreamEnd && written == output.len() {
        let consumed = (inflater.total_in() as usize).min(input.len());
        let mut scratch = [0u8; 1];
        status = inflater
            .decompress(&input[consumed..], &mut scratch, FlushDecompress::Finish)
            .context("corrupt deflate stream")?;
        if inflater.total_out() as usize != written {
            status = Status::BufError;
        }
    }

    let status = match status {
        Status::StreamEnd => InflateStatus::StreamEnd,
        Status::Ok | Status::BufError => InflateStatus::Completed,
    };
    Ok(Inflated { status, written })
}

/// Extent of a raw deflate stream read from the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamExtent {
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
}

/// Inflate a stream to its end-of-stream marker, discarding the output.
///
/// Used when a local header defers its sizes: the consumed input count is the
/// compressed size. The reader is left somewhere past the stream end; callers
/// seek back using `compressed_size`.
pub fn measure_raw<R: Read + ?Sized>(reader: &mut R) -> Result<StreamExtent> {
    let mut inflater = Decompress::new(false);
    let mut input = vec![0u8; CHUNK_SIZE];
    let mut output = vec![0u8; CHUNK_SIZE];
    let mut crc = Crc::new();
    let (mut start, mut end) = (0usize, 0usize);
    let mut eof = false;

    loop {
        if start == end && !eof {
            end = reader.read(&mut input)?;
            start = 0;
            eof = end == 0;
        }

        let before_in = inflater.total_in();
        let before_out = inflater.total_out();
        let flush = if eof {
            FlushDecompress::Finish
        } else {
            FlushDecompress::None
        };
        let status = inflater
            .decompress(&input[start..end], &mut output, flush)
            .context("corrupt deflate stream")?;

        let consumed = (inflater.total_in() - before_in) as usize;
        let produced = (inflater.total_out() - before_out) as usize;
        crc.update(&output[..produced]);
        start += consumed;

        if status == Status::StreamEnd {
            return Ok(StreamExtent {
                compressed_size: inflater.total_in(),
                uncompressed_size: inflater.total_out(),
                crc32: crc.sum(),
            });
        }
        if eof && consumed == 0 && produced == 0 {
            bail!("deflate stream ends before its final block");
        }
    }
}

pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}
