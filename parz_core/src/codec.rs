use std::io::Read;

/// Core compression abstraction.
///
/// Each `BlockCodec` implementation:
/// - Is identified by a stable numeric `id()` and a CLI-facing `name()`.
/// - Compresses every block with a fresh context. No state is carried from
///   one block to the next, which is what lets blocks be compressed on any
///   worker thread.
/// - Emits self-terminating units: the output for a non-final block must end
///   on a boundary where a streaming decoder can continue with the next
///   block's bytes, and the output for the final block must close the stream.
///   Concatenating the units of a stream, in index order, yields one payload
///   that `decoder` can read to the end.
pub trait BlockCodec: Send + Sync {
    /// Stable codec ID.
    fn id(&self) -> u16;

    /// Human-readable codec name for CLI display.
    fn name(&self) -> &'static str;

    /// Compress one block.
    ///
    /// `is_last` selects the flush discipline: a non-final block is
    /// sync-flushed so the decoder sees a clean boundary, the final block is
    /// finished so the codec writes its end-of-stream marker.
    fn compress_block(&self, raw: &[u8], is_last: bool) -> anyhow::Result<Vec<u8>>;

    /// Wrap the concatenated payload (trailer excluded) in a streaming decoder.
    fn decoder<'a>(&self, payload: Box<dyn Read + 'a>) -> anyhow::Result<Box<dyn Read + 'a>>;
}
