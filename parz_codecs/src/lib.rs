mod deflate_codec;
mod passthrough;
mod zstd_codec;

pub use deflate_codec::DeflateCodec;
pub use passthrough::PassThroughCodec;
pub use zstd_codec::ZstdCodec;

use parz_core::format::{CODEC_DEFLATE, CODEC_PASSTHROUGH, CODEC_ZSTD};
use parz_core::BlockCodec;
use std::sync::Arc;

/// Names accepted by [`codec_by_name`], default first.
pub const CODEC_NAMES: [&str; 3] = ["deflate", "zstd", "passthrough"];

/// Resolve a codec from its CLI name, optionally at a given level.
///
/// `level` is ignored by the passthrough codec.
pub fn codec_by_name(name: &str, level: Option<i32>) -> anyhow::Result<Arc<dyn BlockCodec>> {
    match name {
        "deflate" => {
            let codec = match level {
                None => DeflateCodec::default(),
                Some(l) if (0..=DeflateCodec::MAX_LEVEL as i32).contains(&l) => {
                    DeflateCodec::new(l as u32)
                }
                Some(l) => anyhow::bail!("deflate level {} out of range 0..=9", l),
            };
            Ok(Arc::new(codec))
        }
        "zstd" => {
            let range = zstd::compression_level_range();
            let codec = match level {
                None => ZstdCodec::default(),
                Some(l) if range.contains(&l) => ZstdCodec::new(l),
                Some(l) => anyhow::bail!(
                    "zstd level {} out of range {}..={}",
                    l,
                    range.start(),
                    range.end()
                ),
            };
            Ok(Arc::new(codec))
        }
        "passthrough" => Ok(Arc::new(PassThroughCodec)),
        _ => anyhow::bail!(
            "unknown codec '{}'; expected one of: {}",
            name,
            CODEC_NAMES.join(", ")
        ),
    }
}

/// Resolve a codec from its numeric ID at its default level.
pub fn codec_by_id(id: u16) -> anyhow::Result<Arc<dyn BlockCodec>> {
    match id {
        CODEC_PASSTHROUGH => Ok(Arc::new(PassThroughCodec)),
        CODEC_DEFLATE => Ok(Arc::new(DeflateCodec::default())),
        CODEC_ZSTD => Ok(Arc::new(ZstdCodec::default())),
        _ => anyhow::bail!("unknown codec id {}; supported: 0 (passthrough), 1 (deflate), 2 (zstd)", id),
    }
}
