use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

use anyhow::Context;
use crc32fast::Hasher;
use tracing::{debug, info};

use crate::codec::BlockCodec;
use crate::format::{Trailer, TRAILER_SIZE};

const COPY_BUF: usize = 64 * 1024;

/// Read adapter that yields everything except the final `TRAILER_SIZE`
/// bytes of its source.
///
/// The trailer position is only known at end of input, so the adapter keeps
/// the most recent `TRAILER_SIZE` bytes held back at all times and releases
/// the rest to the caller.
struct PayloadReader<R: Read> {
    inner: R,
    window: Vec<u8>,
    eof: bool,
    payload_bytes: u64,
}

impl<R: Read> PayloadReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            window: Vec::with_capacity(COPY_BUF + TRAILER_SIZE),
            eof: false,
            payload_bytes: 0,
        }
    }

    fn top_up(&mut self) -> std::io::Result<()> {
        let mut chunk = [0u8; 8 * 1024];
        while !self.eof && self.window.len() <= TRAILER_SIZE {
            match self.inner.read(&mut chunk) {
                Ok(0) => self.eof = true,
                Ok(n) => self.window.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Drain the source and return the held-back trailer bytes.
    ///
    /// Payload bytes the decoder never asked for are counted as well, so the
    /// caller can tell whether the codec stream ended early.
    fn finish(mut self) -> anyhow::Result<(Trailer, u64)> {
        let mut leftover = 0u64;
        loop {
            self.top_up().context("decode: reading input")?;
            let spare = self.window.len().saturating_sub(TRAILER_SIZE);
            if spare == 0 {
                break;
            }
            self.window.drain(..spare);
            leftover += spare as u64;
        }
        if self.window.len() < TRAILER_SIZE {
            anyhow::bail!(
                "decode: truncated stream, {} bytes left where an {}-byte trailer was expected",
                self.window.len(),
                TRAILER_SIZE
            );
        }
        let mut raw = [0u8; TRAILER_SIZE];
        raw.copy_from_slice(&self.window);
        Ok((Trailer::from_bytes(&raw)?, leftover))
    }
}

impl<R: Read> Read for PayloadReader<R> {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        self.top_up()?;
        let available = self.window.len().saturating_sub(TRAILER_SIZE);
        let n = available.min(out.len());
        out[..n].copy_from_slice(&self.window[..n]);
        self.window.drain(..n);
        self.payload_bytes += n as u64;
        Ok(n)
    }
}

/// Outcome of a verified [`decompress_stream`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeReport {
    /// Decoded bytes written, full width.
    pub raw_bytes: u64,
    /// Compressed payload bytes consumed, trailer excluded.
    pub payload_bytes: u64,
    pub trailer: Trailer,
    /// CRC-32 of the decoded output.
    pub crc32: u32,
}

/// Decode a stream produced by [`compress_stream`](crate::compress_stream)
/// and verify it against its trailer.
///
/// Fails on a stream shorter than the trailer, on a codec error, and when
/// either the CRC-32 or the length (modulo 2^32) of the decoded bytes does
/// not match the trailer. Decoded bytes are written to `output` as they are
/// produced, so a failed verification may leave output behind.
pub fn decompress_stream<R, W>(
    input: R,
    mut output: W,
    codec: &dyn BlockCodec,
) -> anyhow::Result<DecodeReport>
where
    R: Read,
    W: Write,
{
    let mut payload = PayloadReader::new(input);
    let mut hasher = Hasher::new();
    let mut raw_bytes = 0u64;

    {
        let mut decoder = codec
            .decoder(Box::new(&mut payload))
            .with_context(|| format!("decode: opening {} decoder", codec.name()))?;
        let mut buf = vec![0u8; COPY_BUF];
        loop {
            let n = match decoder.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("decode: {} payload is corrupt", codec.name()))
                }
            };
            hasher.update(&buf[..n]);
            output
                .write_all(&buf[..n])
                .context("decode: writing output")?;
            raw_bytes += n as u64;
        }
    }
    output.flush().context("decode: flushing output")?;

    let consumed = payload.payload_bytes;
    let (trailer, leftover) = payload.finish()?;
    if leftover > 0 {
        debug!(leftover, "payload bytes after the end of the codec stream");
    }

    let crc32 = hasher.finalize();
    if crc32 != trailer.crc32 {
        anyhow::bail!(
            "decode: checksum mismatch: trailer says {:08x}, decoded data is {:08x}",
            trailer.crc32,
            crc32
        );
    }
    if raw_bytes as u32 != trailer.raw_len {
        anyhow::bail!(
            "decode: length mismatch: trailer says {} bytes, decoded {} bytes",
            trailer.raw_len,
            raw_bytes
        );
    }

    info!(raw_bytes, payload_bytes = consumed + leftover, "stream verified");
    Ok(DecodeReport {
        raw_bytes,
        payload_bytes: consumed + leftover,
        trailer,
        crc32,
    })
}

/// Read the trailer of a seekable compressed stream without decoding it.
///
/// Returns the trailer and the payload length in bytes.
pub fn read_trailer<R: Read + Seek>(mut input: R) -> anyhow::Result<(Trailer, u64)> {
    let total = input.seek(SeekFrom::End(0)).context("inspect: seeking to end")?;
    if total < TRAILER_SIZE as u64 {
        anyhow::bail!(
            "inspect: truncated stream, {} bytes is shorter than the {}-byte trailer",
            total,
            TRAILER_SIZE
        );
    }
    input
        .seek(SeekFrom::End(-(TRAILER_SIZE as i64)))
        .context("inspect: seeking to trailer")?;
    let mut raw = [0u8; TRAILER_SIZE];
    input
        .read_exact(&mut raw)
        .context("inspect: reading trailer")?;
    Ok((Trailer::from_bytes(&raw)?, total - TRAILER_SIZE as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn payload_reader_holds_back_the_trailer() {
        let mut data = b"payload bytes".to_vec();
        data.extend_from_slice(&Trailer::new(7, 13).to_bytes());

        let mut reader = PayloadReader::new(Cursor::new(data));
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload).unwrap();
        assert_eq!(payload, b"payload bytes");

        let (trailer, leftover) = reader.finish().unwrap();
        assert_eq!(trailer, Trailer::new(7, 13));
        assert_eq!(leftover, 0);
    }

    #[test]
    fn payload_reader_rejects_short_input() {
        let mut reader = PayloadReader::new(Cursor::new(vec![1u8, 2, 3]));
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload).unwrap();
        assert!(payload.is_empty());
        let err = reader.finish().unwrap_err();
        assert!(err.to_string().contains("truncated stream"));
    }

    #[test]
    fn read_trailer_splits_payload_length() {
        let mut data = vec![0xAAu8; 21];
        data.extend_from_slice(&Trailer::new(0xDEAD_BEEF, 99).to_bytes());
        let (trailer, payload_len) = read_trailer(Cursor::new(data)).unwrap();
        assert_eq!(trailer, Trailer::new(0xDEAD_BEEF, 99));
        assert_eq!(payload_len, 21);

        assert!(read_trailer(Cursor::new(vec![0u8; 7])).is_err());
    }
}
