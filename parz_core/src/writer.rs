use std::io::{BufWriter, Write};

use anyhow::Context;
use crossbeam::channel::{select, Receiver};
use tracing::{debug, warn};

use crate::block::CompressedBlock;
use crate::cancel::{CancelToken, Cancelled};
use crate::checksum::{Checksum, ChecksumHandle};
use crate::format::{Trailer, TRAILER_SIZE};

/// Sequential writer for the compressed stream.
///
/// # Write contract
/// Call [`write_block`](Self::write_block) once per block, in ascending
/// index order starting at 1. Each unit is appended verbatim: no framing or
/// padding goes between blocks because every unit is already
/// self-terminating. Call [`finish`](Self::finish) once, after the last
/// block, to append the trailer and flush.
///
/// # Stream layout written
/// ```text
/// [UNIT 1] [UNIT 2] ... [UNIT N]        ← codec units, sync-flushed except the last
/// [TRAILER: 8 bytes, crc32:u32 LE then raw_len:u32 LE]
/// ```
pub struct BlockWriter<W: Write> {
    out: BufWriter<W>,
    next_index: u64,
    seen_last: bool,
    /// Payload bytes written so far (trailer excluded).
    payload_bytes: u64,
}

impl<W: Write> BlockWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: BufWriter::new(out),
            next_index: 1,
            seen_last: false,
            payload_bytes: 0,
        }
    }

    /// Number of blocks written so far.
    pub fn blocks_written(&self) -> u64 {
        self.next_index - 1
    }

    pub fn payload_bytes(&self) -> u64 {
        self.payload_bytes
    }

    /// Append one compressed unit.
    pub fn write_block(&mut self, block: &CompressedBlock) -> anyhow::Result<()> {
        if self.seen_last {
            anyhow::bail!(
                "write stage: block {} arrived after the final block",
                block.index
            );
        }
        if block.index != self.next_index {
            anyhow::bail!(
                "write stage: expected block {} but received block {}",
                self.next_index,
                block.index
            );
        }

        self.out
            .write_all(&block.data)
            .with_context(|| format!("write stage: writing block {}", block.index))?;
        self.payload_bytes += block.data.len() as u64;
        self.next_index += 1;
        self.seen_last = block.is_last;
        Ok(())
    }

    /// Append the trailer, flush everything and hand back the sink.
    ///
    /// Fails without writing a trailer if the final block was never seen.
    pub fn finish(mut self, trailer: Trailer) -> anyhow::Result<W> {
        if !self.seen_last {
            anyhow::bail!(
                "write stage: input ended after {} blocks without a final block",
                self.blocks_written()
            );
        }

        self.out
            .write_all(&trailer.to_bytes())
            .context("write stage: writing trailer")?;
        self.out.flush().context("write stage: flushing output")?;
        self.out
            .into_inner()
            .map_err(|e| e.into_error())
            .context("write stage: flushing output")
    }
}

/// Totals observed by the writer stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub blocks: u64,
    pub payload_bytes: u64,
    pub checksum: Checksum,
}

/// Writer stage loop.
///
/// Drains `rx` in order, then finalizes the checksum (which waits for the
/// reader to let go of its handle) and writes the trailer exactly once.
pub fn run_writer<W: Write>(
    mut writer: BlockWriter<W>,
    rx: &Receiver<CompressedBlock>,
    checksum: ChecksumHandle,
    cancel: &CancelToken,
) -> anyhow::Result<WriteSummary> {
    loop {
        let block = select! {
            recv(rx) -> msg => match msg {
                Ok(block) => block,
                Err(_) => break,
            },
            recv(cancel.signal()) -> _ => return Err(Cancelled.into()),
        };
        writer.write_block(&block)?;
        debug!(index = block.index, bytes = block.compressed_len(), "wrote block");
    }
    cancel.check()?;

    let checksum = checksum
        .finalize(cancel)
        .context("write stage: finalizing checksum")?;
    if !Trailer::fits(checksum.total_len) {
        warn!(
            total = checksum.total_len,
            "input is 4 GiB or larger; trailer length field wraps around"
        );
    }

    let summary = WriteSummary {
        blocks: writer.blocks_written(),
        payload_bytes: writer.payload_bytes(),
        checksum,
    };
    writer.finish(checksum.trailer())?;
    debug!(
        crc32 = %format!("{:08x}", checksum.crc32),
        bytes = TRAILER_SIZE,
        "wrote trailer"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(index: u64, is_last: bool, data: &[u8]) -> CompressedBlock {
        CompressedBlock {
            index,
            is_last,
            raw_len: data.len(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn appends_units_then_trailer() {
        let mut out = Vec::new();
        let mut w = BlockWriter::new(&mut out);
        w.write_block(&unit(1, false, b"ab")).unwrap();
        w.write_block(&unit(2, true, b"c")).unwrap();
        assert_eq!(w.payload_bytes(), 3);
        w.finish(Trailer::new(0x0102_0304, 3)).unwrap();
        assert_eq!(out, b"abc\x04\x03\x02\x01\x03\x00\x00\x00");
    }

    #[test]
    fn rejects_out_of_order_blocks() {
        let mut out = Vec::new();
        let mut w = BlockWriter::new(&mut out);
        let err = w.write_block(&unit(2, false, b"x")).unwrap_err();
        assert!(err.to_string().contains("expected block 1 but received block 2"));
    }

    #[test]
    fn refuses_trailer_without_final_block() {
        let mut out = Vec::new();
        let mut w = BlockWriter::new(&mut out);
        w.write_block(&unit(1, false, b"x")).unwrap();
        assert!(w.finish(Trailer::new(0, 1)).is_err());
    }
}
