pub mod block;
pub mod cancel;
pub mod checksum;
pub mod codec;
pub mod compress;
pub mod config;
pub mod decode;
pub mod format;
pub mod pipeline;
pub mod reader;
pub mod reorder;
pub mod writer;

pub use block::{CompressedBlock, RawBlock};
pub use cancel::{is_cancelled, CancelToken, Cancelled};
pub use checksum::{Checksum, ChecksumAccumulator, ChecksumHandle};
pub use codec::BlockCodec;
pub use config::PipelineConfig;
pub use decode::{decompress_stream, read_trailer, DecodeReport};
pub use format::{Trailer, DEFAULT_BLOCK_SIZE, TRAILER_SIZE};
pub use pipeline::{compress_stream, compress_stream_with_cancel, PipelineReport};
pub use reader::BlockReader;
pub use reorder::ReorderBuffer;
pub use writer::{BlockWriter, WriteSummary};
