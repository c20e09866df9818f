use std::io::Read;

use flate2::read::DeflateDecoder;
use flate2::{Compress, Compression, FlushCompress, Status};
use parz_core::codec::BlockCodec;
use parz_core::format::CODEC_DEFLATE;

/// Raw DEFLATE (RFC 1951) block codec.
///
/// Every block gets a fresh compressor. A non-final block is finished with a
/// sync flush: the output ends on a byte boundary after an empty stored
/// block (`00 00 FF FF`) and no block carries the BFINAL bit, so the next
/// unit continues the same bit stream. The final block is finished normally
/// and carries BFINAL. The concatenated units therefore decode as a single
/// raw-deflate stream. Back-references never cross a block boundary, which
/// costs a little ratio in exchange for parallelism.
pub struct DeflateCodec {
    /// Compression level (0 = store, 9 = smallest).
    pub level: u32,
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl DeflateCodec {
    pub const MAX_LEVEL: u32 = 9;

    pub fn new(level: u32) -> Self {
        Self { level }
    }
}

impl BlockCodec for DeflateCodec {
    fn id(&self) -> u16 {
        CODEC_DEFLATE
    }

    fn name(&self) -> &'static str {
        "deflate"
    }

    fn compress_block(&self, raw: &[u8], is_last: bool) -> anyhow::Result<Vec<u8>> {
        let mut z = Compress::new(Compression::new(self.level), false);
        let flush = if is_last {
            FlushCompress::Finish
        } else {
            FlushCompress::Sync
        };
        let mut out = Vec::with_capacity(raw.len() / 2 + 64);

        loop {
            if out.len() == out.capacity() {
                out.reserve(out.capacity().max(64));
            }
            let consumed = z.total_in() as usize;
            let status = z.compress_vec(&raw[consumed..], &mut out, flush)?;
            // A sync flush is complete once all input is in and zlib stopped
            // with output space to spare.
            let done = match status {
                Status::StreamEnd => true,
                Status::Ok | Status::BufError => {
                    !is_last && z.total_in() as usize == raw.len() && out.len() < out.capacity()
                }
            };
            if done {
                break;
            }
        }
        Ok(out)
    }

    fn decoder<'a>(&self, payload: Box<dyn Read + 'a>) -> anyhow::Result<Box<dyn Read + 'a>> {
        Ok(Box::new(DeflateDecoder::new(payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_flushed_block_ends_on_empty_stored_block() {
        let unit = DeflateCodec::default()
            .compress_block(b"hello hello hello", false)
            .unwrap();
        assert!(unit.ends_with(&[0x00, 0x00, 0xFF, 0xFF]));
    }

    #[test]
    fn empty_final_block_is_a_terminal_unit() {
        let unit = DeflateCodec::default().compress_block(&[], true).unwrap();
        assert!(!unit.is_empty());
        let mut out = Vec::new();
        DeflateDecoder::new(&unit[..]).read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }
}
