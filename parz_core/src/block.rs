use bytes::Bytes;

/// One block of raw input as produced by the reader stage.
///
/// `data` is a frozen `Bytes` handle: the checksum actor and the compress
/// stage both hold it after handoff and neither can mutate it.
#[derive(Debug, Clone)]
pub struct RawBlock {
    /// 1-based sequence number, assigned at read time.
    pub index: u64,
    /// True only for the final block of the stream.
    pub is_last: bool,
    pub data: Bytes,
}

impl RawBlock {
    #[inline]
    pub fn raw_len(&self) -> usize {
        self.data.len()
    }
}

/// A block after the compress stage.
#[derive(Debug, Clone)]
pub struct CompressedBlock {
    pub index: u64,
    pub is_last: bool,
    /// Length of the raw data this unit decodes to.
    pub raw_len: usize,
    /// Self-terminating codec unit, written verbatim by the writer stage.
    pub data: Vec<u8>,
}

impl CompressedBlock {
    #[inline]
    pub fn compressed_len(&self) -> usize {
        self.data.len()
    }
}
