use anyhow::Context;
use crossbeam::channel::{select, Receiver, Sender};
use tracing::debug;

use crate::block::{CompressedBlock, RawBlock};
use crate::cancel::{CancelToken, Cancelled};
use crate::codec::BlockCodec;

/// Compress a single block, keeping its index and last-block flag.
///
/// The flush discipline is delegated to the codec through `is_last`; any
/// codec failure is fatal because the decoder needs every unit.
pub fn compress_block(codec: &dyn BlockCodec, block: RawBlock) -> anyhow::Result<CompressedBlock> {
    let data = codec
        .compress_block(&block.data, block.is_last)
        .with_context(|| {
            format!(
                "compress stage: {} codec failed on block {}",
                codec.name(),
                block.index
            )
        })?;

    Ok(CompressedBlock {
        index: block.index,
        is_last: block.is_last,
        raw_len: block.raw_len(),
        data,
    })
}

/// Compress stage worker loop.
///
/// With a single worker the output order equals the input order. When
/// several workers share `rx` they finish out of order and the output must
/// go through [`run_merge`](crate::reorder::run_merge).
pub fn run_compress_worker(
    worker: usize,
    codec: &dyn BlockCodec,
    rx: &Receiver<RawBlock>,
    tx: &Sender<CompressedBlock>,
    cancel: &CancelToken,
) -> anyhow::Result<u64> {
    let mut count = 0u64;
    loop {
        let block = select! {
            recv(rx) -> msg => match msg {
                Ok(block) => block,
                Err(_) => break,
            },
            recv(cancel.signal()) -> _ => return Err(Cancelled.into()),
        };

        let compressed = compress_block(codec, block)?;
        let index = compressed.index;
        debug!(
            worker,
            index,
            raw = compressed.raw_len,
            compressed = compressed.compressed_len(),
            last = compressed.is_last,
            "compressed block"
        );

        select! {
            send(tx, compressed) -> res => {
                if res.is_err() {
                    anyhow::bail!("compress stage: output queue closed before block {index}");
                }
            }
            recv(cancel.signal()) -> _ => return Err(Cancelled.into()),
        }
        count += 1;
    }
    debug!(worker, blocks = count, "compress worker finished");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::io::Read;

    /// Reverses each block and tags the last one.
    struct Reverse;

    impl BlockCodec for Reverse {
        fn id(&self) -> u16 {
            0xFFFF
        }

        fn name(&self) -> &'static str {
            "reverse"
        }

        fn compress_block(&self, raw: &[u8], is_last: bool) -> anyhow::Result<Vec<u8>> {
            if raw == b"bad" {
                anyhow::bail!("unsupported input");
            }
            let mut out: Vec<u8> = raw.iter().rev().copied().collect();
            if is_last {
                out.push(b'$');
            }
            Ok(out)
        }

        fn decoder<'a>(&self, payload: Box<dyn Read + 'a>) -> anyhow::Result<Box<dyn Read + 'a>> {
            Ok(payload)
        }
    }

    fn raw(index: u64, is_last: bool, data: &'static [u8]) -> RawBlock {
        RawBlock {
            index,
            is_last,
            data: Bytes::from_static(data),
        }
    }

    #[test]
    fn single_worker_keeps_order_and_flags() {
        let cancel = CancelToken::new();
        let (in_tx, in_rx) = crossbeam::channel::unbounded();
        let (out_tx, out_rx) = crossbeam::channel::unbounded();
        in_tx.send(raw(1, false, b"abc")).unwrap();
        in_tx.send(raw(2, true, b"de")).unwrap();
        drop(in_tx);

        let n = run_compress_worker(0, &Reverse, &in_rx, &out_tx, &cancel).unwrap();
        drop(out_tx);
        assert_eq!(n, 2);

        let out: Vec<CompressedBlock> = out_rx.iter().collect();
        assert_eq!(out[0].index, 1);
        assert_eq!(out[0].data, b"cba");
        assert!(!out[0].is_last);
        assert_eq!(out[1].data, b"ed$");
        assert_eq!(out[1].raw_len, 2);
        assert!(out[1].is_last);
    }

    #[test]
    fn codec_failure_names_the_block() {
        let err = compress_block(&Reverse, raw(7, false, b"bad")).unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "compress stage: reverse codec failed on block 7: unsupported input"
        );
    }

    #[test]
    fn cancelled_worker_stops() {
        let cancel = CancelToken::new();
        let (_in_tx, in_rx) = crossbeam::channel::unbounded::<RawBlock>();
        let (out_tx, _out_rx) = crossbeam::channel::unbounded();
        cancel.cancel();
        let err = run_compress_worker(0, &Reverse, &in_rx, &out_tx, &cancel).unwrap_err();
        assert!(crate::cancel::is_cancelled(&err));
    }
}
