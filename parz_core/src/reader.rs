use std::io::{BufRead, BufReader, ErrorKind, Read};

use anyhow::Context;
use bytes::Bytes;
use crossbeam::channel::{select, Sender};
use tracing::debug;

use crate::block::RawBlock;
use crate::cancel::{CancelToken, Cancelled};
use crate::checksum::ChecksumHandle;

/// Splits an input byte stream into fixed-size [`RawBlock`]s.
///
/// # Segmentation
/// Every block except the last holds exactly `block_size` bytes; the last
/// holds whatever remains, never padded. After filling a block the reader
/// probes for one more byte without consuming it (a `fill_buf` on the
/// underlying `BufReader`). If the probe comes back empty the block is
/// marked `is_last` and the iterator ends after yielding it.
///
/// # Edge cases
/// - Empty input yields exactly one zero-length block with `is_last` set,
///   so every stream has a final codec unit and a decodable payload.
/// - Input whose length is an exact multiple of `block_size` ends with a
///   full last block; no trailing zero-length block is produced.
///
/// Any read error other than end-of-stream is returned once and ends the
/// iteration.
pub struct BlockReader<R: Read> {
    source: BufReader<R>,
    block_size: usize,
    next_index: u64,
    done: bool,
}

impl<R: Read> BlockReader<R> {
    pub fn new(source: R, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            source: BufReader::with_capacity(block_size, source),
            block_size,
            next_index: 1,
            done: false,
        }
    }

    /// Index the next yielded block will carry.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    fn read_block(&mut self) -> anyhow::Result<RawBlock> {
        let index = self.next_index;
        let data = self
            .fill()
            .with_context(|| format!("read stage: filling block {index}"))?;
        let is_last = self
            .at_eof()
            .with_context(|| format!("read stage: probing for input after block {index}"))?;

        self.next_index += 1;
        Ok(RawBlock {
            index,
            is_last,
            data: Bytes::from(data),
        })
    }

    fn fill(&mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; self.block_size];
        let mut filled = 0;
        while filled < buf.len() {
            match self.source.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }

    fn at_eof(&mut self) -> std::io::Result<bool> {
        loop {
            match self.source.fill_buf() {
                Ok(peek) => return Ok(peek.is_empty()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl<R: Read> Iterator for BlockReader<R> {
    type Item = anyhow::Result<RawBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let block = self.read_block();
        match &block {
            Ok(b) if !b.is_last => {}
            _ => self.done = true,
        }
        Some(block)
    }
}

/// Reader stage loop.
///
/// Each block's bytes go to the checksum accumulator first and are then
/// handed to the compress queue. The caller drops `tx` once this returns,
/// which is how the compress stage learns the stream has ended.
pub fn run_reader<R: Read>(
    blocks: BlockReader<R>,
    checksum: &ChecksumHandle,
    tx: &Sender<RawBlock>,
    cancel: &CancelToken,
) -> anyhow::Result<u64> {
    let mut count = 0u64;
    for block in blocks {
        cancel.check()?;
        let block = block?;
        let index = block.index;

        checksum
            .ingest(block.data.clone(), cancel)
            .with_context(|| format!("read stage: checksum ingest of block {index}"))?;
        debug!(index, len = block.raw_len(), last = block.is_last, "read block");

        select! {
            send(tx, block) -> res => {
                if res.is_err() {
                    anyhow::bail!("read stage: compress queue closed before block {index}");
                }
            }
            recv(cancel.signal()) -> _ => return Err(Cancelled.into()),
        }
        count += 1;
    }
    Ok(count)
}
