use std::collections::BTreeMap;

use crossbeam::channel::{select, Receiver, Sender};
use tracing::debug;

use crate::block::CompressedBlock;
use crate::cancel::{CancelToken, Cancelled};

/// Holding area that restores ascending index order.
///
/// Items are parked by index and released only as contiguous runs starting
/// at `next_expected`. The map never holds more than the number of blocks in
/// flight between the compress workers and the merge stage.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> ReorderBuffer<T> {
    pub fn new(first_index: u64) -> Self {
        Self {
            next: first_index,
            pending: BTreeMap::new(),
        }
    }

    /// Park `item`. Stale or duplicate indices are rejected.
    pub fn insert(&mut self, index: u64, item: T) -> anyhow::Result<()> {
        if index < self.next || self.pending.contains_key(&index) {
            anyhow::bail!(
                "duplicate block {} (next expected {})",
                index,
                self.next
            );
        }
        self.pending.insert(index, item);
        Ok(())
    }

    /// Release the next item if it has arrived.
    pub fn pop_ready(&mut self) -> Option<T> {
        let item = self.pending.remove(&self.next)?;
        self.next += 1;
        Some(item)
    }

    pub fn next_expected(&self) -> u64 {
        self.next
    }

    /// Number of parked items waiting for a gap to fill.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Merge stage: fan-in of out-of-order compress workers.
///
/// Forwards blocks to the writer strictly in ascending index order.
pub fn run_merge(
    rx: &Receiver<CompressedBlock>,
    tx: &Sender<CompressedBlock>,
    cancel: &CancelToken,
) -> anyhow::Result<u64> {
    let mut buffer = ReorderBuffer::new(1);
    let mut forwarded = 0u64;
    loop {
        let block = select! {
            recv(rx) -> msg => match msg {
                Ok(block) => block,
                Err(_) => break,
            },
            recv(cancel.signal()) -> _ => return Err(Cancelled.into()),
        };

        buffer
            .insert(block.index, block)
            .map_err(|e| e.context("merge stage: reordering"))?;
        if buffer.pending() > 1 {
            debug!(
                waiting_for = buffer.next_expected(),
                parked = buffer.pending(),
                "holding out-of-order blocks"
            );
        }

        while let Some(ready) = buffer.pop_ready() {
            let index = ready.index;
            select! {
                send(tx, ready) -> res => {
                    if res.is_err() {
                        anyhow::bail!("merge stage: writer queue closed before block {index}");
                    }
                }
                recv(cancel.signal()) -> _ => return Err(Cancelled.into()),
            }
            forwarded += 1;
        }
    }

    if !buffer.is_empty() {
        anyhow::bail!(
            "merge stage: {} blocks stranded waiting for block {}",
            buffer.pending(),
            buffer.next_expected()
        );
    }
    Ok(forwarded)
}
