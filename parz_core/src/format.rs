/// Default raw bytes per block: 128 KiB.
pub const DEFAULT_BLOCK_SIZE: usize = 128 * 1024;

/// Upper sanity bound for a configured block size (32 MiB).
pub const MAX_BLOCK_SIZE: usize = 32 * 1024 * 1024;

/// Default capacity of every stage-to-stage handoff queue.
///
/// A capacity of 1 keeps at most one block parked between two stages, so a
/// slow downstream stage throttles everything upstream of it.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1;

/// Size of the stream trailer in bytes.
///   crc32:u32 + raw_len:u32 = 4 + 4 = 8
pub const TRAILER_SIZE: usize = 8;

// ── Codec IDs ──────────────────────────────────────────────────────────────

pub const CODEC_PASSTHROUGH: u16 = 0;
pub const CODEC_DEFLATE: u16 = 1;
pub const CODEC_ZSTD: u16 = 2;

// ── Trailer ────────────────────────────────────────────────────────────────

/// Decoded representation of the 8-byte stream trailer.
///
/// The trailer follows the last compressed block unit. The length field is
/// the total raw byte count truncated to 32 bits: streams of 4 GiB or more
/// wrap around, exactly like the gzip ISIZE field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// CRC-32/IEEE of every raw input byte.
    pub crc32: u32,
    /// Total raw byte count modulo 2^32.
    pub raw_len: u32,
}

impl Trailer {
    /// Build a trailer from a full-width byte count, truncating it to 32 bits.
    pub fn new(crc32: u32, total_len: u64) -> Self {
        Self {
            crc32,
            raw_len: total_len as u32,
        }
    }

    /// Serialize to exactly `TRAILER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; TRAILER_SIZE] {
        let mut buf = [0u8; TRAILER_SIZE];
        buf[0..4].copy_from_slice(&self.crc32.to_le_bytes());
        buf[4..8].copy_from_slice(&self.raw_len.to_le_bytes());
        buf
    }

    /// Deserialize from `TRAILER_SIZE` bytes.
    pub fn from_bytes(buf: &[u8; TRAILER_SIZE]) -> anyhow::Result<Self> {
        Ok(Self {
            crc32: u32::from_le_bytes(buf[0..4].try_into()?),
            raw_len: u32::from_le_bytes(buf[4..8].try_into()?),
        })
    }

    /// Whether `total_len` bytes of input can be represented without wrap-around.
    pub fn fits(total_len: u64) -> bool {
        total_len <= u32::MAX as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailer_layout_is_little_endian() {
        let t = Trailer::new(0xCBF4_3926, 9);
        assert_eq!(t.to_bytes(), [0x26, 0x39, 0xF4, 0xCB, 9, 0, 0, 0]);
        assert_eq!(Trailer::from_bytes(&t.to_bytes()).unwrap(), t);
    }

    #[test]
    fn trailer_length_wraps_at_four_gib() {
        let t = Trailer::new(0, (1u64 << 32) + 5);
        assert_eq!(t.raw_len, 5);
        assert!(!Trailer::fits(1u64 << 32));
        assert!(Trailer::fits(u32::MAX as u64));
    }
}
