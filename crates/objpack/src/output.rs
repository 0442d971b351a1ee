use std::fs::File;
use std::io::{IsTerminal, Write};
use std::path::Path;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use objpack::json::{to_json, Tagged};
use objpack::Value;
use serde::Serialize;

use crate::exit::{io_error, CliResult};

const PREVIEW_LIMIT: usize = 60;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One decoded top-level value, as reported by `decode` and `inspect`.
#[derive(Serialize)]
pub struct ValueReport {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_type: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub len: Option<usize>,
    pub value: serde_json::Value,
}

impl ValueReport {
    pub fn new(index: usize, value: &Value) -> Self {
        let (kind, object_type, len) = describe(value);
        Self {
            index,
            offset: None,
            size: None,
            kind,
            object_type,
            len,
            value: to_json(value),
        }
    }

    pub fn with_span(mut self, offset: usize, size: usize) -> Self {
        self.offset = Some(offset);
        self.size = Some(size);
        self
    }
}

/// Type name, object-type tag and element count of a value.
fn describe(value: &Value) -> (&'static str, Option<serde_json::Value>, Option<usize>) {
    match value {
        Value::Str(s) => ("str", None, Some(s.len())),
        Value::Bin(b) => ("bin", None, Some(b.len())),
        Value::Array(items) => ("array", None, Some(items.len())),
        Value::Map(entries) => ("map", None, Some(entries.len())),
        Value::Object(object) => match object.downcast_ref::<Tagged>() {
            Some(tagged) => {
                let (kind, _, len) = describe(&tagged.data);
                (kind, Some(to_json(&tagged.object_type)), len)
            }
            None => ("object", None, None),
        },
        other => (other.kind(), None, None),
    }
}

pub fn print_decoded(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(value)),
        OutputFormat::Pretty => println!(
            "{}",
            serde_json::to_string_pretty(&to_json(value)).unwrap_or_else(|_| "null".to_string())
        ),
        OutputFormat::Table => print_reports(&[ValueReport::new(0, value)], format),
    }
}

pub fn print_reports(reports: &[ValueReport], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for report in reports {
                println!(
                    "{}",
                    serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Pretty => {
            for report in reports {
                let mut line = format!("#{} type={}", report.index, report.kind);
                if let (Some(offset), Some(size)) = (report.offset, report.size) {
                    line.push_str(&format!(" offset={offset} size={size}"));
                }
                if let Some(object_type) = &report.object_type {
                    line.push_str(&format!(" object_type={object_type}"));
                }
                if let Some(len) = report.len {
                    line.push_str(&format!(" len={len}"));
                }
                line.push_str(&format!(" value={}", preview(&report.value)));
                println!("{line}");
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "OFFSET", "SIZE", "TYPE", "OBJECT TYPE", "LEN", "VALUE"]);
            for report in reports {
                table.add_row(vec![
                    report.index.to_string(),
                    optional(report.offset),
                    optional(report.size),
                    report.kind.to_string(),
                    report
                        .object_type
                        .as_ref()
                        .map_or_else(|| "-".to_string(), |t| t.to_string()),
                    optional(report.len),
                    preview(&report.value),
                ]);
            }
            println!("{table}");
        }
    }
}

fn optional(value: Option<usize>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn preview(value: &serde_json::Value) -> String {
    let text = value.to_string();
    if text.chars().count() <= PREVIEW_LIMIT {
        return text;
    }
    let mut short: String = text.chars().take(PREVIEW_LIMIT).collect();
    short.push('…');
    short
}

/// Write encoded bytes (or their hex text) to `path`, or stdout when `None`.
pub fn write_bytes(data: &[u8], hex: bool, path: Option<&Path>) -> CliResult<()> {
    let mut out: Box<dyn Write> = match path {
        Some(path) => Box::new(File::create(path).map_err(|err| {
            io_error(&format!("failed creating {}", path.display()), err)
        })?),
        None => Box::new(std::io::stdout().lock()),
    };
    let result = if hex {
        writeln!(out, "{}", to_hex(data))
    } else {
        out.write_all(data)
    };
    result
        .and_then(|()| out.flush())
        .map_err(|err| io_error("failed writing output", err))
}

pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use objpack::Object;

    use super::*;

    #[test]
    fn describes_tagged_collections_by_their_payload() {
        let value = Value::Object(Object::new(Tagged {
            object_type: Value::from("point"),
            data: Value::Array(vec![Value::from(1), Value::from(2)]),
        }));
        let report = ValueReport::new(3, &value);
        assert_eq!(report.kind, "array");
        assert_eq!(report.len, Some(2));
        assert_eq!(report.object_type, Some(serde_json::json!("point")));
    }

    #[test]
    fn previews_are_truncated() {
        let long = serde_json::Value::String("x".repeat(200));
        assert_eq!(preview(&long).chars().count(), PREVIEW_LIMIT + 1);
        assert_eq!(to_hex(&[0x00, 0xab]), "00ab");
    }
}
