use std::io::{Read, Write};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::bounded;
use tracing::{debug, info};

use crate::block::{CompressedBlock, RawBlock};
use crate::cancel::{is_cancelled, CancelToken, Cancelled};
use crate::checksum::{Checksum, ChecksumAccumulator};
use crate::codec::BlockCodec;
use crate::compress::run_compress_worker;
use crate::config::PipelineConfig;
use crate::format::{Trailer, TRAILER_SIZE};
use crate::reader::{run_reader, BlockReader};
use crate::reorder::run_merge;
use crate::writer::{run_writer, BlockWriter};

/// Outcome of a successful [`compress_stream`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub blocks: u64,
    /// Total raw bytes read, full width.
    pub raw_bytes: u64,
    /// Compressed payload bytes, trailer excluded.
    pub payload_bytes: u64,
    pub checksum: Checksum,
    pub workers: usize,
    pub elapsed: Duration,
}

impl PipelineReport {
    pub fn trailer(&self) -> Trailer {
        self.checksum.trailer()
    }

    /// Bytes written to the sink, trailer included.
    pub fn output_bytes(&self) -> u64 {
        self.payload_bytes + TRAILER_SIZE as u64
    }

    /// Compression ratio (raw / output).
    pub fn ratio(&self) -> f64 {
        self.raw_bytes as f64 / self.output_bytes() as f64
    }
}

/// First real failure seen by any stage.
///
/// Recording a failure cancels the token so the remaining stages unwind;
/// their secondary `Cancelled` errors are not recorded.
struct Failure<'a> {
    first: Mutex<Option<anyhow::Error>>,
    cancel: &'a CancelToken,
}

impl<'a> Failure<'a> {
    fn new(cancel: &'a CancelToken) -> Self {
        Self {
            first: Mutex::new(None),
            cancel,
        }
    }

    fn record(&self, err: anyhow::Error) {
        if !is_cancelled(&err) {
            let mut first = match self.first.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if first.is_none() {
                *first = Some(err);
            }
        }
        self.cancel.cancel();
    }

    fn take(self) -> Option<anyhow::Error> {
        match self.first.into_inner() {
            Ok(first) => first,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Compress `input` into `output` as a stream of block units plus trailer.
///
/// See [`compress_stream_with_cancel`] for the stage layout.
pub fn compress_stream<R, W>(
    input: R,
    output: W,
    codec: &dyn BlockCodec,
    config: &PipelineConfig,
) -> anyhow::Result<PipelineReport>
where
    R: Read + Send,
    W: Write,
{
    compress_stream_with_cancel(input, output, codec, config, &CancelToken::new())
}

/// Compress `input` into `output`, observing `cancel` at every suspension
/// point.
///
/// # Stages
/// ```text
/// reader ──► compress worker × N ──► [merge, if N > 1] ──► writer
///    └──► checksum accumulator ─────────────────────────────┘ (finalize)
/// ```
/// Every arrow is a bounded queue of `config.queue_capacity`. The writer
/// runs on the calling thread; the other stages run on scoped threads and
/// are joined before this function returns.
///
/// On failure the first stage error is returned and `cancel` is left
/// cancelled. The sink may hold a truncated stream in that case; no trailer
/// is written unless the final block made it through.
pub fn compress_stream_with_cancel<R, W>(
    input: R,
    output: W,
    codec: &dyn BlockCodec,
    config: &PipelineConfig,
    cancel: &CancelToken,
) -> anyhow::Result<PipelineReport>
where
    R: Read + Send,
    W: Write,
{
    config.validate()?;
    cancel.check()?;

    let started = Instant::now();
    let workers = config.workers;
    let capacity = config.queue_capacity;
    info!(
        codec = codec.name(),
        block_size = config.block_size,
        workers,
        queue_capacity = capacity,
        "pipeline started"
    );

    let failure = Failure::new(cancel);
    let checksum = ChecksumAccumulator::spawn(capacity)?;
    let reader_checksum = checksum.clone();

    let (raw_tx, raw_rx) = bounded::<RawBlock>(capacity);
    let (unit_tx, unit_rx) = bounded::<CompressedBlock>(capacity);

    // Each stage records its failure (which cancels the token) before its
    // channel endpoints drop, so peers unwind on cancellation rather than
    // reporting a closed queue as a second error.
    let written = thread::scope(|scope| {
        let failure = &failure;

        scope.spawn(move || {
            let blocks = BlockReader::new(input, config.block_size);
            match run_reader(blocks, &reader_checksum, &raw_tx, cancel) {
                Ok(n) => debug!(blocks = n, "reader finished"),
                Err(e) => failure.record(e),
            }
            drop(raw_tx);
            drop(reader_checksum);
        });

        for worker in 0..workers {
            let rx = raw_rx.clone();
            let tx = unit_tx.clone();
            scope.spawn(move || {
                if let Err(e) = run_compress_worker(worker, codec, &rx, &tx, cancel) {
                    failure.record(e);
                }
                drop(tx);
            });
        }
        drop(raw_rx);
        drop(unit_tx);

        let ordered_rx = if workers > 1 {
            let (ordered_tx, ordered_rx) = bounded::<CompressedBlock>(capacity);
            scope.spawn(move || {
                if let Err(e) = run_merge(&unit_rx, &ordered_tx, cancel) {
                    failure.record(e);
                }
                drop(ordered_tx);
            });
            ordered_rx
        } else {
            unit_rx
        };

        let result = match run_writer(BlockWriter::new(output), &ordered_rx, checksum, cancel) {
            Ok(summary) => Some(summary),
            Err(e) => {
                failure.record(e);
                None
            }
        };
        drop(ordered_rx);
        result
    });

    if let Some(err) = failure.take() {
        return Err(err);
    }
    let written = written.ok_or(Cancelled)?;

    let report = PipelineReport {
        blocks: written.blocks,
        raw_bytes: written.checksum.total_len,
        payload_bytes: written.payload_bytes,
        checksum: written.checksum,
        workers,
        elapsed: started.elapsed(),
    };
    info!(
        blocks = report.blocks,
        raw_bytes = report.raw_bytes,
        output_bytes = report.output_bytes(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "pipeline finished"
    );
    Ok(report)
}
