use std::io::Read;

use parz_core::codec::BlockCodec;
use parz_core::format::CODEC_ZSTD;

/// Zstandard block codec.
///
/// Each block is compressed into its own complete frame at the configured
/// level (default: 3), whether or not it is the last block. A zstd stream
/// decoder reads concatenated frames back to back, so the frames of a
/// stream decode as one payload.
///
/// Best for: general text, JSON, logs, mixed structured data.
pub struct ZstdCodec {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl BlockCodec for ZstdCodec {
    fn id(&self) -> u16 {
        CODEC_ZSTD
    }

    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress_block(&self, raw: &[u8], _is_last: bool) -> anyhow::Result<Vec<u8>> {
        let compressed = zstd::bulk::compress(raw, self.level)?;
        Ok(compressed)
    }

    fn decoder<'a>(&self, payload: Box<dyn Read + 'a>) -> anyhow::Result<Box<dyn Read + 'a>> {
        let decoder = zstd::stream::read::Decoder::new(payload)?;
        Ok(Box::new(decoder))
    }
}
