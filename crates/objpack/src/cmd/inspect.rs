use objpack::decode_multi;
use objpack::json::PassThrough;
use tracing::warn;

use crate::cmd::{read_source, InspectArgs};
use crate::exit::{decode_error, CliResult, SUCCESS};
use crate::output::{print_reports, OutputFormat, ValueReport};

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = read_source(&args.source)?;
    let mut values = decode_multi(&bytes, PassThrough::new(args.limits.decoder_options()));

    let mut reports = Vec::new();
    let mut failure = None;
    loop {
        let offset = values.offset();
        match values.next() {
            None => break,
            Some(Ok(value)) => {
                let size = values.offset() - offset;
                reports.push(ValueReport::new(reports.len(), &value).with_span(offset, size));
            }
            Some(Err(err)) => {
                warn!(offset, error = %err, "stopped at undecodable value");
                failure = Some(err);
            }
        }
    }

    // report what decoded before the failure
    print_reports(&reports, format);
    match failure {
        Some(err) => Err(decode_error("inspect failed", err)),
        None => Ok(SUCCESS),
    }
}
