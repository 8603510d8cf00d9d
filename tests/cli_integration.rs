//! End-to-end runs of the `au` binary.

use std::io::Write;
use std::process::{Command, Stdio};

fn au() -> Command {
    Command::new(env!("CARGO_BIN_EXE_au"))
}

fn run_with_stdin(args: &[&str], stdin: &[u8]) -> (i32, Vec<u8>, Vec<u8>) {
    let mut child = au()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("binary should spawn");
    child
        .stdin
        .as_mut()
        .expect("stdin piped")
        .write_all(stdin)
        .expect("write stdin");
    let out = child.wait_with_output().expect("wait");
    (
        out.status.code().unwrap_or(-1),
        out.stdout,
        out.stderr,
    )
}

const SAMPLE_JSON: &str = "{\"widget\":\"alpha\",\"count\":1}\n\
                           {\"widget\":\"beta\",\"count\":2}\n\
                           {\"widget\":\"alpha\",\"count\":3}\n";

#[test]
fn json2au_then_cat_round_trips() {
    let (code, encoded, _) = run_with_stdin(&["json2au"], SAMPLE_JSON.as_bytes());
    assert_eq!(code, 0);
    assert!(encoded.starts_with(b"HI\x01"));

    let (code, decoded, _) = run_with_stdin(&["cat"], &encoded);
    assert_eq!(code, 0);
    assert_eq!(String::from_utf8(decoded).unwrap(), SAMPLE_JSON);
}

#[test]
fn enc_is_an_alias_for_json2au() {
    let (code, a, _) = run_with_stdin(&["enc"], SAMPLE_JSON.as_bytes());
    let (code2, b, _) = run_with_stdin(&["json2au"], SAMPLE_JSON.as_bytes());
    assert_eq!(code, 0);
    assert_eq!(code2, 0);
    assert_eq!(a, b);
}

#[test]
fn grep_finds_matching_records() {
    let (_, encoded, _) = run_with_stdin(&["json2au"], SAMPLE_JSON.as_bytes());
    let (code, out, _) = run_with_stdin(&["grep", "-k", "widget", "alpha", "-"], &encoded);
    assert_eq!(code, 0);
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 2);
    assert!(text.lines().all(|l| l.contains("\"widget\":\"alpha\"")));
}

#[test]
fn grep_count_prints_totals() {
    let (_, encoded, _) = run_with_stdin(&["json2au"], SAMPLE_JSON.as_bytes());
    let (code, out, _) = run_with_stdin(&["grep", "-c", "-k", "widget", "alpha", "-"], &encoded);
    assert_eq!(code, 0);
    assert_eq!(String::from_utf8(out).unwrap().trim(), "2");
}

#[test]
fn stats_reports_record_counts() {
    let (_, encoded, _) = run_with_stdin(&["json2au"], SAMPLE_JSON.as_bytes());
    let (code, out, _) = run_with_stdin(&["stats"], &encoded);
    assert_eq!(code, 0);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("value: 3"), "stats output:\n{text}");
}

#[test]
fn tail_decodes_file_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.au");

    let mut json = String::new();
    for i in 0..500 {
        json.push_str(&format!("{{\"lineNumber\":{i}}}\n"));
    }
    let (_, encoded, _) = run_with_stdin(&["json2au"], json.as_bytes());
    std::fs::write(&path, &encoded).unwrap();

    let (code, out, _) = run_with_stdin(
        &["tail", "-b", "512", path.to_str().unwrap()],
        b"",
    );
    assert_eq!(code, 0);
    let text = String::from_utf8(out).unwrap();
    assert!(text.lines().count() >= 1);
    assert_eq!(text.lines().last().unwrap(), "{\"lineNumber\":499}");
}

#[test]
fn zindex_and_zgrep_work_through_gzip() {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let dir = tempfile::tempdir().unwrap();
    let gz_path = dir.path().join("log.au.gz");

    let mut json = String::new();
    for i in 0..5000 {
        json.push_str(&format!(
            "{{\"lineNumber\":{i},\"status\":\"{}\"}}\n",
            if i % 100 == 0 { "special-marker" } else { "ordinary-entry" }
        ));
    }
    let (_, encoded, _) = run_with_stdin(&["json2au"], json.as_bytes());
    let file = std::fs::File::create(&gz_path).unwrap();
    let mut gz = GzEncoder::new(file, Compression::default());
    gz.write_all(&encoded).unwrap();
    gz.finish().unwrap().sync_all().unwrap();

    let gz = gz_path.to_str().unwrap();
    let index = format!("{gz}.auzx");
    let (code, _, err) = run_with_stdin(&["zindex", "-x", &index, gz], b"");
    assert_eq!(code, 0, "zindex stderr: {}", String::from_utf8_lossy(&err));

    let (code, out, err) = run_with_stdin(
        &["zgrep", "-c", "-x", &index, "-k", "status", "special-marker", gz],
        b"",
    );
    assert_eq!(code, 0, "zgrep stderr: {}", String::from_utf8_lossy(&err));
    assert_eq!(String::from_utf8(out).unwrap().trim(), "50");

    let (code, out, err) = run_with_stdin(&["ztail", "-x", &index, "-b", "400", gz], b"");
    assert_eq!(code, 0, "ztail stderr: {}", String::from_utf8_lossy(&err));
    let text = String::from_utf8(out).unwrap();
    assert!(text.lines().last().unwrap().contains("\"lineNumber\":4999"));
}

#[test]
fn unknown_subcommand_exits_nonzero() {
    let (code, _, _) = run_with_stdin(&["frobnicate"], b"");
    assert_ne!(code, 0);
}

#[test]
fn help_is_available_everywhere() {
    for sub in [
        "cat", "tail", "ztail", "grep", "zgrep", "enc", "json2au", "stats", "zindex",
    ] {
        let out = au().args([sub, "--help"]).output().expect("run");
        assert!(out.status.success(), "{sub} --help failed");
        assert!(!out.stdout.is_empty());
    }
}
