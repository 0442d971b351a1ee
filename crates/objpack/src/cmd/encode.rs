use objpack::json::{from_json, PassThrough};
use objpack::{Encoder, EncoderOptions};
use tracing::debug;

use crate::cmd::{open_input, EncodeArgs};
use crate::exit::{encode_error, json_error, parse_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::write_bytes;

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let encoder = Encoder::new(PassThrough::new(encoder_options(&args)));
    let input = open_input(args.input.as_ref())?;
    let documents = serde_json::Deserializer::from_reader(input).into_iter::<serde_json::Value>();

    let mut out = Vec::new();
    let mut count = 0usize;
    for document in documents {
        let json = document.map_err(|err| parse_error("invalid JSON input", err))?;
        if count > 0 && !args.multi {
            return Err(CliError::new(
                USAGE,
                "input holds more than one JSON document; pass --multi to encode all of them",
            ));
        }
        let value = from_json(&json).map_err(|err| json_error("unsupported JSON input", err))?;
        let bytes = encoder
            .encode_shared_ref(&value)
            .map_err(|err| encode_error("encode failed", err))?;
        out.extend_from_slice(&bytes);
        count += 1;
    }

    if count == 0 {
        return Err(CliError::new(USAGE, "no JSON document in input"));
    }
    debug!(documents = count, bytes = out.len(), "encoded input");

    write_bytes(&out, args.hex, args.output.as_deref())?;
    Ok(SUCCESS)
}

fn encoder_options(args: &EncodeArgs) -> EncoderOptions {
    let defaults = EncoderOptions::default();
    EncoderOptions {
        sort_keys: args.sort_keys,
        force_float32: args.float32,
        force_integer_to_float: args.ints_as_floats,
        use_big_int64: args.big_int64,
        max_depth: args.max_depth.unwrap_or(defaults.max_depth),
        ..defaults
    }
}
