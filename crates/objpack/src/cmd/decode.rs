use objpack::codec::ValueReader;
use objpack::json::PassThrough;
use objpack::{decode_multi, Decoder, Value};
use tracing::info;

use crate::cmd::{open_input, read_source, DecodeArgs};
use crate::exit::{decode_error, CliResult, SUCCESS};
use crate::output::{print_decoded, print_reports, OutputFormat, ValueReport};

/// Prints values as they arrive; tables are rendered once at the end.
struct Printer {
    format: OutputFormat,
    count: usize,
    reports: Vec<ValueReport>,
}

impl Printer {
    fn push(&mut self, value: &Value) {
        match self.format {
            OutputFormat::Table => self.reports.push(ValueReport::new(self.count, value)),
            format => print_decoded(value, format),
        }
        self.count += 1;
    }

    fn finish(self) {
        if !self.reports.is_empty() {
            print_reports(&self.reports, self.format);
        }
    }
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let ctrl = PassThrough::new(args.limits.decoder_options());
    let mut printer = Printer {
        format,
        count: 0,
        reports: Vec::new(),
    };

    if !args.multi {
        let bytes = read_source(&args.source)?;
        let value = Decoder::new(ctrl)
            .decode(&bytes)
            .map_err(|err| decode_error("decode failed", err))?;
        printer.push(&value);
    } else if args.source.hex {
        let bytes = read_source(&args.source)?;
        for value in decode_multi(&bytes, ctrl) {
            printer.push(&value.map_err(|err| decode_error("decode failed", err))?);
        }
    } else {
        let input = open_input(args.source.input.as_ref())?;
        for value in ValueReader::new(input, ctrl) {
            printer.push(&value.map_err(|err| decode_error("decode failed", err))?);
        }
    }

    info!(values = printer.count, "decoded input");
    printer.finish();
    Ok(SUCCESS)
}
