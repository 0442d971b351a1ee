//! Decoding must not depend on how the input is split into chunks.

use std::io;

use futures_util::{stream, StreamExt};
use objpack_codec::{encode, plain_pack, plain_unpack, Decoder, Value, ValueReader};

fn mixed_object() -> Value {
    [
        ("nil", Value::Nil),
        ("true", true.into()),
        ("false", false.into()),
        ("int", (-42).into()),
        ("uint64", ((1i64 << 53) - 1).into()),
        ("int64", (-((1i64 << 53) - 1)).into()),
        ("float", std::f64::consts::PI.into()),
        ("string", "Hello, world!".into()),
        ("longString", "Hello, world!\n".repeat(100).into()),
        ("binary", vec![0xf1u8, 0xf2, 0xf3].into()),
        ("array", Value::Array(vec![1000.into(), 2000.into(), 3000.into()])),
        (
            "map",
            [("foo", Value::from(1)), ("bar", 2.into()), ("baz", 3.into())]
                .into_iter()
                .collect(),
        ),
        ("map0", Value::Map(Default::default())),
        ("array0", Value::Array(Vec::new())),
        ("str0", "".into()),
        ("bin0", Vec::<u8>::new().into()),
    ]
    .into_iter()
    .collect()
}

fn source(parts: Vec<Vec<u8>>) -> impl futures_core::Stream<Item = io::Result<Vec<u8>>> + Unpin {
    stream::iter(parts.into_iter().map(Ok))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

#[test]
fn byte_by_byte_async_decode() {
    let bytes = encode(&mixed_object(), plain_pack()).unwrap();
    let parts = bytes.iter().map(|b| vec![*b]).collect();
    let decoder = Decoder::new(plain_unpack());
    let decoded = runtime().block_on(decoder.decode_async(source(parts))).unwrap();
    assert_eq!(decoded, mixed_object());
}

#[test]
fn every_two_way_split_decodes_identically() {
    let bytes = encode(&mixed_object(), plain_pack()).unwrap();
    let decoder = Decoder::new(plain_unpack());
    let rt = runtime();
    for split in 0..=bytes.len() {
        let parts = vec![bytes[..split].to_vec(), bytes[split..].to_vec()];
        let decoded = rt
            .block_on(decoder.decode_async(source(parts)))
            .unwrap_or_else(|err| panic!("split at {split}: {err}"));
        assert_eq!(decoded, mixed_object(), "split at {split}");
    }
}

#[test]
fn noisy_sub_slices_are_fine() {
    let backing = [0x01u8, 0xc5, 0x02];
    let parts = vec![backing[1..2].to_vec(), vec![0x00], vec![0x00]];
    let decoded = runtime()
        .block_on(Decoder::new(plain_unpack()).decode_async(source(parts)))
        .unwrap();
    assert_eq!(decoded, Value::from(Vec::<u8>::new()));
}

#[test]
fn map_key_converter_handles_composite_keys() {
    use objpack_codec::{DecoderOptions, Plain};

    let options = DecoderOptions::default().with_map_key_converter(|key| match key {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_i64)
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Str(s) => Some(s.clone()),
        _ => None,
    });
    let mut parts = vec![vec![0x81, 0xc0]];
    parts.push(
        encode(&Value::Array(vec![1.into(), 2.into()]), plain_pack())
            .unwrap()
            .to_vec(),
    );
    parts.push(encode(&Value::from("baz"), plain_pack()).unwrap().to_vec());

    let decoded = runtime()
        .block_on(Decoder::new(Plain::new(options)).decode_async(source(parts)))
        .unwrap();
    let expected: Value = [("1,2", Value::from("baz"))].into_iter().collect();
    assert_eq!(decoded, expected);
}

#[test]
fn multi_stream_matches_sync_multi_for_any_chunk_size() {
    let values = vec![
        mixed_object(),
        Value::from(7),
        Value::Array(vec!["x".into()]),
        Value::Nil,
    ];
    let mut bytes = Vec::new();
    for value in &values {
        bytes.extend_from_slice(&encode(value, plain_pack()).unwrap());
    }

    let decoder = Decoder::new(plain_unpack());
    let sync: Vec<Value> = decoder
        .decode_multi(&bytes)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(sync, values);

    let rt = runtime();
    for size in [1, 2, 3, 7, 64, bytes.len()] {
        let parts = bytes.chunks(size).map(<[u8]>::to_vec).collect();
        let streamed: Vec<Value> = rt.block_on(async {
            decoder
                .decode_multi_stream(source(parts))
                .map(|r| r.unwrap())
                .collect()
                .await
        });
        assert_eq!(streamed, values, "chunk size {size}");

        let reader = ValueReader::new(bytes.as_slice(), plain_unpack());
        let read: Vec<Value> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(read, values);
    }
}

#[test]
fn array_stream_yields_elements_for_any_chunk_size() {
    let items: Vec<Value> = (0..40)
        .map(|i| Value::Array(vec![i.into(), format!("item-{i}").into()]))
        .collect();
    let bytes = encode(&Value::Array(items.clone()), plain_pack()).unwrap();
    let decoder = Decoder::new(plain_unpack());
    let rt = runtime();

    for size in [1, 5, 13, bytes.len()] {
        let parts = bytes.chunks(size).map(<[u8]>::to_vec).collect();
        let streamed: Vec<Value> = rt.block_on(async {
            decoder
                .decode_array_stream(source(parts))
                .map(|r| r.unwrap())
                .collect()
                .await
        });
        assert_eq!(streamed, items, "chunk size {size}");
    }
}
