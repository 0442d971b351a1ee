use std::io;

use futures_util::stream::{self, StreamExt};
use futures_util::FutureExt;
use objpack_codec::{
    decode, decode_array_stream, decode_async, encode, plain_pack, DecodeError, DecoderOptions,
    LengthKind, Plain, Value,
};

fn once(bytes: Vec<u8>) -> impl futures_core::Stream<Item = io::Result<Vec<u8>>> + Unpin {
    stream::iter(vec![Ok(bytes)])
}

/// Delivers `header` and then never yields again.
fn header_then_silence(
    header: &[u8],
) -> impl futures_core::Stream<Item = io::Result<Vec<u8>>> + Unpin {
    stream::iter(vec![Ok(header.to_vec())]).chain(stream::pending())
}

fn check(value: Value, options: DecoderOptions, kind: LengthKind) {
    let input = encode(&value, plain_pack()).unwrap().to_vec();

    let err = decode(&input, Plain::new(options.clone())).unwrap_err();
    assert!(err.to_string().starts_with("max length exceeded"), "{err}");
    assert!(matches!(err, DecodeError::MaxLengthExceeded { kind: k, .. } if k == kind));

    let err = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(decode_async(once(input), Plain::new(options)))
        .unwrap_err();
    assert!(err.to_string().starts_with("max length exceeded"), "{err}");
}

#[test]
fn max_str_length() {
    check(
        Value::from("foo"),
        DecoderOptions {
            max_str_length: 1,
            ..DecoderOptions::default()
        },
        LengthKind::Str,
    );
}

#[test]
fn max_bin_length() {
    check(
        Value::from(vec![1u8, 2, 3]),
        DecoderOptions {
            max_bin_length: 1,
            ..DecoderOptions::default()
        },
        LengthKind::Bin,
    );
}

#[test]
fn max_array_length() {
    check(
        Value::Array(vec![1.into(), 2.into(), 3.into()]),
        DecoderOptions {
            max_array_length: 1,
            ..DecoderOptions::default()
        },
        LengthKind::Array,
    );
}

#[test]
fn max_map_length() {
    let value = [("foo", Value::from(1)), ("bar", 1.into()), ("baz", 3.into())]
        .into_iter()
        .collect();
    check(
        value,
        DecoderOptions {
            max_map_length: 1,
            ..DecoderOptions::default()
        },
        LengthKind::Map,
    );
}

#[test]
fn limits_at_the_boundary_are_accepted() {
    let options = DecoderOptions {
        max_str_length: 3,
        ..DecoderOptions::default()
    };
    let input = encode(&Value::from("foo"), plain_pack()).unwrap();
    assert_eq!(decode(&input, Plain::new(options)).unwrap(), Value::from("foo"));
}

#[test]
fn async_guards_fire_before_the_payload_arrives() {
    let options = DecoderOptions {
        max_str_length: 4,
        max_bin_length: 4,
        max_array_length: 4,
        max_map_length: 4,
        ..DecoderOptions::default()
    };
    let cases: [(&[u8], LengthKind); 4] = [
        (&[0xdb, 0x00, 0x00, 0x00, 0x0a], LengthKind::Str),
        (&[0xc6, 0x00, 0x00, 0x00, 0x0a], LengthKind::Bin),
        (&[0xdd, 0x00, 0x00, 0x00, 0x0a], LengthKind::Array),
        (&[0xdf, 0x00, 0x00, 0x00, 0x0a], LengthKind::Map),
    ];

    for (header, kind) in cases {
        // a pending source would leave the future unresolved if the guard
        // waited for the payload
        let result = decode_async(header_then_silence(header), Plain::new(options.clone()))
            .now_or_never();
        match result {
            Some(Err(DecodeError::MaxLengthExceeded {
                kind: k,
                length: 10,
                max: 4,
                offset: 0,
            })) if k == kind => {}
            other => panic!("{kind}: unexpected {other:?}"),
        }
    }
}

#[test]
fn array_stream_header_split_over_chunks() {
    let options = DecoderOptions {
        max_array_length: 2,
        ..DecoderOptions::default()
    };
    let source = stream::iter(vec![
        Ok::<_, io::Error>(vec![0xdd]),
        Ok(vec![0x00, 0x00]),
        Ok(vec![0x00, 0x03]),
    ]);
    let mut elements = decode_array_stream(source, Plain::new(options));

    let first = elements.next().now_or_never().flatten();
    assert!(matches!(
        first,
        Some(Err(DecodeError::MaxLengthExceeded {
            kind: LengthKind::Array,
            length: 3,
            max: 2,
            offset: 0,
        }))
    ));
    assert!(elements.next().now_or_never().flatten().is_none());
}

#[test]
fn array_stream_guard_fires_before_the_elements_arrive() {
    let options = DecoderOptions {
        max_array_length: 2,
        ..DecoderOptions::default()
    };
    let mut elements = decode_array_stream(header_then_silence(&[0x93]), Plain::new(options));
    let first = elements.next().now_or_never().flatten();
    assert!(matches!(
        first,
        Some(Err(DecodeError::MaxLengthExceeded {
            length: 3,
            max: 2,
            ..
        }))
    ));
}
