#![cfg(feature = "cli")]

use std::io::Write;
use std::process::{Command, Output, Stdio};

fn objpack(args: &[&str], stdin: &[u8]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_objpack"))
        .args(["--log-level", "error"])
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("objpack should start");

    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(stdin)
        .expect("stdin should accept input");

    child.wait_with_output().expect("objpack should finish")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn encode_hex_writes_object_type_slots() {
    let output = objpack(&["encode", "--hex"], b"[null]");
    assert!(output.status.success());
    assert_eq!(stdout(&output), "91c0c0\n");

    let output = objpack(&["encode", "--hex"], br#"{"a": 1}"#);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "81c0a16101\n");
}

#[test]
fn encode_then_decode_restores_json() {
    let document = r#"{"a":[1,"x",true,-2.5],"b":null}"#;
    let encoded = objpack(&["encode"], document.as_bytes());
    assert!(encoded.status.success());

    let decoded = objpack(&["--format", "json", "decode"], &encoded.stdout);
    assert!(decoded.status.success(), "stderr: {:?}", decoded.stderr);
    assert_eq!(stdout(&decoded).trim_end(), document);
}

#[test]
fn multi_encodes_and_decodes_every_document() {
    let encoded = objpack(&["encode", "--multi"], b"1 \"two\" [3]");
    assert!(encoded.status.success());

    let decoded = objpack(&["--format", "json", "decode", "--multi"], &encoded.stdout);
    assert!(decoded.status.success());
    assert_eq!(stdout(&decoded), "1\n\"two\"\n[3]\n");
}

#[test]
fn decode_hex_multi_accepts_whitespace() {
    let output = objpack(&["--format", "json", "decode", "--hex", "--multi"], b"c0\n01 \n");
    assert!(output.status.success());
    assert_eq!(stdout(&output), "null\n1\n");
}

#[test]
fn inspect_reports_offsets_and_sizes() {
    let output = objpack(&["--format", "json", "inspect", "--hex"], b"c0 92 c0 01 02");
    assert!(output.status.success());

    let lines: Vec<serde_json::Value> = stdout(&output)
        .lines()
        .map(|line| serde_json::from_str(line).expect("report should be JSON"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["type"], "nil");
    assert_eq!(lines[1]["type"], "array");
    assert_eq!(lines[1]["offset"], 1);
    assert_eq!(lines[1]["size"], 4);
    assert_eq!(lines[1]["len"], 2);
}

#[test]
fn invalid_input_exits_with_data_invalid() {
    let unassigned = objpack(&["decode", "--hex"], b"c1");
    assert_eq!(unassigned.status.code(), Some(60));

    let truncated = objpack(&["decode", "--hex"], b"91 c0");
    assert_eq!(truncated.status.code(), Some(60));

    let bad_json = objpack(&["encode"], b"{not json");
    assert_eq!(bad_json.status.code(), Some(60));
}

#[test]
fn limits_are_enforced_from_flags() {
    let output = objpack(&["decode", "--hex", "--max-str-length", "2"], b"a3 61 62 63");
    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}

#[test]
fn second_document_without_multi_is_a_usage_error() {
    let output = objpack(&["encode"], b"1 2");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn encode_output_file_decodes_back() {
    let path = std::env::temp_dir().join(format!("objpack-cli-{}.bin", std::process::id()));
    let path_arg = path.to_str().expect("temp path should be UTF-8");

    let encoded = objpack(&["encode", "-o", path_arg], br#"{"@bin": "AAE="}"#);
    assert!(encoded.status.success());
    assert!(encoded.stdout.is_empty());
    assert_eq!(std::fs::read(&path).expect("output file"), [0xc4, 0x02, 0x00, 0x01]);

    let decoded = objpack(&["--format", "json", "decode", path_arg], b"");
    assert!(decoded.status.success());
    assert_eq!(stdout(&decoded), "{\"@bin\":\"AAE=\"}\n");

    let _ = std::fs::remove_file(&path);
}
