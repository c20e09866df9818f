/// Codec-level tests: each codec's units must concatenate into a single
/// payload that its own decoder reads to the end.
use std::io::Read;

use parz_codecs::{codec_by_id, codec_by_name, DeflateCodec, PassThroughCodec, ZstdCodec};
use parz_core::BlockCodec;

fn sample(len: usize) -> Vec<u8> {
    let pattern = b"lorem ipsum dolor sit amet, consectetur adipiscing elit ";
    (0..len).map(|i| pattern[i % pattern.len()] ^ (i / 997) as u8).collect()
}

/// Compress `data` as `chunk`-sized blocks and concatenate the units.
fn encode_units(codec: &dyn BlockCodec, data: &[u8], chunk: usize) -> Vec<u8> {
    let chunks: Vec<&[u8]> = if data.is_empty() {
        vec![data]
    } else {
        data.chunks(chunk).collect()
    };
    let last = chunks.len() - 1;
    chunks
        .iter()
        .enumerate()
        .flat_map(|(i, c)| codec.compress_block(c, i == last).unwrap())
        .collect()
}

fn decode_all(codec: &dyn BlockCodec, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    codec
        .decoder(Box::new(payload))
        .unwrap()
        .read_to_end(&mut out)
        .unwrap();
    out
}

#[test]
fn test_units_concatenate_for_every_codec() {
    let data = sample(70_000);
    let codecs: Vec<Box<dyn BlockCodec>> = vec![
        Box::new(DeflateCodec::default()),
        Box::new(DeflateCodec::new(0)),
        Box::new(DeflateCodec::new(9)),
        Box::new(ZstdCodec::default()),
        Box::new(ZstdCodec::new(19)),
        Box::new(PassThroughCodec),
    ];
    for codec in &codecs {
        for chunk in [1000, 16 * 1024, 100_000] {
            let payload = encode_units(codec.as_ref(), &data, chunk);
            assert_eq!(
                decode_all(codec.as_ref(), &payload),
                data,
                "{} with {}-byte blocks",
                codec.name(),
                chunk
            );
        }
    }
}

#[test]
fn test_empty_stream_decodes_to_nothing() {
    for name in ["deflate", "zstd", "passthrough"] {
        let codec = codec_by_name(name, None).unwrap();
        let payload = encode_units(codec.as_ref(), &[], 1024);
        assert!(decode_all(codec.as_ref(), &payload).is_empty(), "{}", name);
    }
}

#[test]
fn test_deflate_compresses_repetitive_data() {
    let data = vec![b'a'; 64 * 1024];
    let unit = DeflateCodec::default().compress_block(&data, true).unwrap();
    assert!(unit.len() < data.len() / 50, "got {} bytes", unit.len());
}

#[test]
fn test_lookup_by_name_and_id() {
    for (name, id) in [("passthrough", 0u16), ("deflate", 1), ("zstd", 2)] {
        let by_name = codec_by_name(name, None).unwrap();
        assert_eq!(by_name.id(), id);
        assert_eq!(codec_by_id(id).unwrap().name(), name);
    }
    assert!(codec_by_name("lzma", None).is_err());
    assert!(codec_by_id(99).is_err());
}

#[test]
fn test_levels_are_range_checked() {
    assert!(codec_by_name("deflate", Some(9)).is_ok());
    assert!(codec_by_name("deflate", Some(10)).is_err());
    assert!(codec_by_name("deflate", Some(-1)).is_err());
    assert!(codec_by_name("zstd", Some(3)).is_ok());
    assert!(codec_by_name("zstd", Some(1000)).is_err());
    assert!(codec_by_name("passthrough", Some(5)).is_ok());
}
