use std::thread;

use anyhow::Context;
use bytes::Bytes;
use crc32fast::Hasher;
use crossbeam::channel::{bounded, select, Receiver, Sender};
use tracing::debug;

use crate::cancel::{CancelToken, Cancelled};
use crate::format::Trailer;

/// Finalized whole-stream checksum state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksum {
    /// CRC-32/IEEE of every ingested byte, in ingestion order.
    pub crc32: u32,
    /// Total ingested bytes, full width.
    pub total_len: u64,
}

impl Checksum {
    pub fn trailer(&self) -> Trailer {
        Trailer::new(self.crc32, self.total_len)
    }
}

enum Message {
    Ingest(Bytes),
    Finalize(Sender<Checksum>),
}

/// Single owner of the running CRC-32 digest and byte count.
///
/// The accumulator lives on its own thread; every other task reaches it only
/// through a [`ChecksumHandle`]. A finalize request is answered once every
/// handle has been dropped, so the reply is causally ordered after the last
/// ingestion no matter which thread asked for it.
pub struct ChecksumAccumulator {
    hasher: Hasher,
    total_len: u64,
    blocks: u64,
}

impl ChecksumAccumulator {
    /// Start the accumulator thread and return the first handle to it.
    pub fn spawn(capacity: usize) -> anyhow::Result<ChecksumHandle> {
        let (tx, rx) = bounded(capacity);
        thread::Builder::new()
            .name("parz-checksum".into())
            .spawn(move || Self::new().run(rx))
            .context("checksum: spawning accumulator thread")?;
        Ok(ChecksumHandle { tx })
    }

    fn new() -> Self {
        Self {
            hasher: Hasher::new(),
            total_len: 0,
            blocks: 0,
        }
    }

    fn run(mut self, rx: Receiver<Message>) {
        let mut replies = Vec::new();
        // Ends once every handle is gone; that is the end of ingestion.
        for msg in rx.iter() {
            match msg {
                Message::Ingest(data) => {
                    self.hasher.update(&data);
                    self.total_len += data.len() as u64;
                    self.blocks += 1;
                    debug!(blocks = self.blocks, total = self.total_len, "checksum updated");
                }
                Message::Finalize(reply) => replies.push(reply),
            }
        }

        let sum = Checksum {
            crc32: self.hasher.finalize(),
            total_len: self.total_len,
        };
        debug!(crc32 = %format!("{:08x}", sum.crc32), total = sum.total_len, "checksum finalized");
        for reply in replies {
            let _ = reply.send(sum);
        }
    }
}

/// Message endpoint of a running [`ChecksumAccumulator`].
#[derive(Clone)]
pub struct ChecksumHandle {
    tx: Sender<Message>,
}

impl ChecksumHandle {
    /// Feed one raw block to the accumulator.
    pub fn ingest(&self, data: Bytes, cancel: &CancelToken) -> anyhow::Result<()> {
        select! {
            send(self.tx, Message::Ingest(data)) -> res => {
                res.map_err(|_| anyhow::anyhow!("checksum accumulator stopped"))
            }
            recv(cancel.signal()) -> _ => Err(Cancelled.into()),
        }
    }

    /// Consume this handle and wait for the final digest.
    ///
    /// Blocks until every other handle (in particular the reader's) has been
    /// dropped.
    pub fn finalize(self, cancel: &CancelToken) -> anyhow::Result<Checksum> {
        let (reply_tx, reply_rx) = bounded(1);
        let Self { tx } = self;
        tx.send(Message::Finalize(reply_tx))
            .map_err(|_| anyhow::anyhow!("checksum accumulator stopped"))?;
        drop(tx);

        select! {
            recv(reply_rx) -> res => {
                res.map_err(|_| anyhow::anyhow!("checksum accumulator dropped finalize request"))
            }
            recv(cancel.signal()) -> _ => Err(Cancelled.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_waits_for_outstanding_handles() {
        let cancel = CancelToken::new();
        let handle = ChecksumAccumulator::spawn(1).unwrap();
        let feeder = handle.clone();

        let t = thread::spawn(move || {
            let cancel = CancelToken::new();
            feeder.ingest(Bytes::from_static(b"1234"), &cancel).unwrap();
            thread::sleep(std::time::Duration::from_millis(20));
            feeder.ingest(Bytes::from_static(b"56789"), &cancel).unwrap();
        });

        let sum = handle.finalize(&cancel).unwrap();
        t.join().unwrap();
        assert_eq!(sum.total_len, 9);
        assert_eq!(sum.crc32, 0xCBF4_3926);
    }

    #[test]
    fn empty_stream_checksum_is_zero() {
        let cancel = CancelToken::new();
        let handle = ChecksumAccumulator::spawn(1).unwrap();
        let sum = handle.finalize(&cancel).unwrap();
        assert_eq!(sum, Checksum { crc32: 0, total_len: 0 });
        assert_eq!(sum.trailer().to_bytes(), [0u8; 8]);
    }
}
