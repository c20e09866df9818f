use std::io::Read;

use parz_core::codec::BlockCodec;
use parz_core::format::CODEC_PASSTHROUGH;

/// No-op codec: stores blocks verbatim, with no compression.
///
/// Useful for:
/// - Checking the pipeline (ordering, trailer) independently of any codec.
/// - Data that is already compressed (e.g., JPEG, MP4) where further
///   compression would expand the stream.
pub struct PassThroughCodec;

impl BlockCodec for PassThroughCodec {
    fn id(&self) -> u16 {
        CODEC_PASSTHROUGH
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn compress_block(&self, raw: &[u8], _is_last: bool) -> anyhow::Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decoder<'a>(&self, payload: Box<dyn Read + 'a>) -> anyhow::Result<Box<dyn Read + 'a>> {
        Ok(payload)
    }
}
