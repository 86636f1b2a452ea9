//! End-to-end conversions over temporary files.

use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tabflow::{convert, ActionError, ConvertError, ConvertOptions, FormatError, FormatRegistry};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn read_lines(path: &Path) -> Vec<Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_csv_to_json_with_actions_and_picks() {
    let dir = TempDir::new().unwrap();
    let first = write(&dir, "a.csv", "category,key,Tags\nx,k1,a|b\nx,k1,c\n");
    let second = write(&dir, "b.csv", "category,key,Tags\ny,k1,\nx,k2,d\n");
    let output = dir.path().join("out.json");

    let mut options = ConvertOptions::new(&output);
    options.actions = strings(&[
        "split:tags=Tags:delimiter=|",
        "assign-id:id=key:context=category",
    ]);
    options.picks = strings(&["id", "key", "tags"]);

    let report = convert(&[first, second], &options, &FormatRegistry::builtin()).unwrap();
    assert_eq!(report.rows_read, 4);
    assert_eq!(report.rows_written, 4);
    assert_eq!(report.ids.len(), 2);

    assert_eq!(
        read_json(&output),
        json!([
            {"id": 1, "key": "k1", "tags": ["a", "b"]},
            {"id": 1, "key": "k1", "tags": ["c"]},
            {"id": 1, "key": "k1", "tags": []},
            {"id": 2, "key": "k2", "tags": ["d"]},
        ])
    );
}

#[test]
fn test_identity_conversion_to_csv() {
    let dir = TempDir::new().unwrap();
    let input = write(
        &dir,
        "in.jsonl",
        "{\"x\": 1, \"y\": {\"z\": \"a\"}}\n{\"x\": 2, \"y\": {\"z\": \"b\"}}\n",
    );
    let output = dir.path().join("out.csv");

    convert(&[input], &ConvertOptions::new(&output), &FormatRegistry::builtin()).unwrap();
    assert_eq!(fs::read_to_string(&output).unwrap(), "x,y.z\n1,a\n2,b\n");
}

#[test]
fn test_filtered_rows_diverted() {
    let dir = TempDir::new().unwrap();
    let input = write(
        &dir,
        "in.json",
        r#"[{"name": "a", "status": "active"}, {"name": "b", "status": "deleted"}]"#,
    );
    let output = dir.path().join("out.jsonl");
    let filtered = dir.path().join("dropped.jsonl");

    let mut options = ConvertOptions::new(&output);
    options.filtered_out = Some(filtered.clone());
    options.actions = strings(&["filter:status:not-equals=deleted"]);

    let report = convert(&[input], &options, &FormatRegistry::builtin()).unwrap();
    assert_eq!(report.rows_filtered, 1);
    assert_eq!(read_lines(&output), vec![json!({"name": "a", "status": "active"})]);
    assert_eq!(read_lines(&filtered), vec![json!({"name": "b", "status": "deleted"})]);
}

#[test]
fn test_filtered_rows_keep_bookkeeping_in_debug() {
    let dir = TempDir::new().unwrap();
    let input = write(
        &dir,
        "in.json",
        r#"[{"name": "a", "status": "active"}, {"name": "b", "status": "deleted"}]"#,
    );
    let output = dir.path().join("out.jsonl");
    let filtered = dir.path().join("dropped.jsonl");

    let mut options = ConvertOptions::new(&output);
    options.filtered_out = Some(filtered.clone());
    options.output_debug = true;
    options.actions = strings(&["filter:status:not-equals=deleted"]);

    convert(&[input.clone()], &options, &FormatRegistry::builtin()).unwrap();

    let kept = read_lines(&output);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0]["staging.row_index"], json!(0));

    let dropped = read_lines(&filtered);
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0]["name"], json!("b"));
    assert_eq!(dropped[0]["staging.row_index"], json!(1));
    assert_eq!(dropped[0]["staging.file"], json!(input.display().to_string()));
    assert_eq!(dropped[0]["staging.input.status"], json!("deleted"));
}

#[test]
fn test_config_push_section() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "in.csv", "name,genre
a,rock
b,
");
    let config = write(
        &dir,
        "config.json",
        &json!({
            "process": {
                "push": [
                    {"target": "tags", "source": "genre", "condition": "genre"},
                    {"target": "tags", "source": "name"}
                ]
            },
            "pick": [{"target": "name", "source": "name"}, {"target": "tags", "source": "tags"}]
        })
        .to_string(),
    );
    let output = dir.path().join("out.json");

    let mut options = ConvertOptions::new(&output);
    options.config = Some(config);

    convert(&[input], &options, &FormatRegistry::builtin()).unwrap();
    assert_eq!(
        read_json(&output),
        json!([
            {"name": "a", "tags": ["rock", "a"]},
            {"name": "b", "tags": ["b"]},
        ])
    );
}

#[test]
fn test_staged_rows_reprocessed() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "in.csv", "a,b
1,2
");
    let staged = dir.path().join("staged.jsonl");
    let registry = FormatRegistry::builtin();

    let mut first = ConvertOptions::new(&staged);
    first.output_debug = true;
    first.actions = strings(&["assign-constant:k=x"]);
    convert(&[input.clone()], &first, &registry).unwrap();

    let plain = dir.path().join("plain.json");
    convert(&[staged.clone()], &ConvertOptions::new(&plain), &registry).unwrap();
    assert_eq!(read_json(&plain), json!([{"a": "1", "b": "2"}]));

    let debug = dir.path().join("debug.json");
    let mut second = ConvertOptions::new(&debug);
    second.output_debug = true;
    convert(&[staged], &second, &registry).unwrap();
    let rows = read_json(&debug);
    assert_eq!(rows[0]["staging"]["file"], json!(input.display().to_string()));
    assert_eq!(rows[0]["staging"]["row_index"], json!(0));
    assert_eq!(rows[0]["staging"]["k"], json!("x"));
    assert_eq!(rows[0]["staging"]["input"], json!({"a": "1", "b": "2"}));
}

#[test]
fn test_ignored_rows_skipped() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "in.csv", "n\n0\n1\n2\n");
    let output = dir.path().join("out.json");

    let mut options = ConvertOptions::new(&output);
    options.ignore_rows.insert("in.csv:1".to_string());
    options
        .ignore_rows
        .insert(format!("{}:2", input.display()));

    let report = convert(&[input], &options, &FormatRegistry::builtin()).unwrap();
    assert_eq!(report.rows_ignored, 2);
    assert_eq!(read_json(&output), json!([{"n": "0"}]));
}

#[test]
fn test_config_file_then_cli_actions() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "in.csv", "first;last\nAda;Lovelace\n");
    let config = write(
        &dir,
        "config.json",
        &json!({
            "pick": [{"target": "name", "source": "full"}],
            "actions": [{"type": "assign-format", "target": "full", "template": "{first} {last}"}]
        })
        .to_string(),
    );
    let output = dir.path().join("out.json");

    let mut options = ConvertOptions::new(&output);
    options.config = Some(config);
    options.actions = strings(&["assign-length:len=full"]);
    options.picks = strings(&["len"]);

    convert(&[input], &options, &FormatRegistry::builtin()).unwrap();
    assert_eq!(read_json(&output), json!([{"name": "Ada Lovelace", "len": 12}]));
}

#[test]
fn test_debug_output_keeps_bookkeeping() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "in.csv", "a,b\n1,2\n");
    let output = dir.path().join("out.json");

    let mut options = ConvertOptions::new(&output);
    options.output_debug = true;
    options.picks = strings(&["a"]);

    convert(&[input.clone()], &options, &FormatRegistry::builtin()).unwrap();
    let rows = read_json(&output);
    let row = &rows[0];
    assert_eq!(row["a"], json!("1"));
    assert_eq!(row["staging"]["b"], json!("2"));
    assert_eq!(row["staging"]["row_index"], json!(0));
    assert_eq!(row["staging"]["file"], json!(input.display().to_string()));
    assert_eq!(row["staging"]["input"], json!({"a": "1", "b": "2"}));
}

#[test]
fn test_required_field_aborts_and_closes_output() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "in.csv", "a\n1\n");
    let output = dir.path().join("out.json");

    let mut options = ConvertOptions::new(&output);
    options.actions = strings(&["assign:t=missing:required"]);

    let err = convert(&[input], &options, &FormatRegistry::builtin()).unwrap_err();
    assert!(matches!(
        err,
        ConvertError::Action(ActionError::MissingField { ref field, .. }) if field == "missing"
    ));
    assert_eq!(read_json(&output), json!([]));
}

#[test]
fn test_missing_input_and_unknown_format() {
    let dir = TempDir::new().unwrap();
    let registry = FormatRegistry::builtin();

    let options = ConvertOptions::new(dir.path().join("out.json"));
    let err = convert(&[dir.path().join("absent.csv")], &options, &registry).unwrap_err();
    assert!(matches!(err, ConvertError::Format(FormatError::FileNotFound(_))));

    let input = write(&dir, "in.csv", "a\n1\n");
    let options = ConvertOptions::new(dir.path().join("out.parquet"));
    let err = convert(&[input], &options, &registry).unwrap_err();
    assert!(matches!(err, ConvertError::Format(FormatError::UnsupportedFormat(_))));
}

#[test]
fn test_unknown_action_rejected_before_output() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "in.csv", "a\n1\n");
    let output = dir.path().join("out.json");

    let mut options = ConvertOptions::new(&output);
    options.actions = strings(&["rename:b=a"]);

    let err = convert(&[input], &options, &FormatRegistry::builtin()).unwrap_err();
    assert!(matches!(err, ConvertError::Config(_)));
    assert!(!output.exists());
}

#[cfg(feature = "excel")]
#[test]
fn test_spreadsheet_round_trip() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "in.csv", "title,year\nSong,1999\n");
    let workbook = dir.path().join("mid.xlsx");
    let output = dir.path().join("out.json");
    let registry = FormatRegistry::builtin();

    convert(&[input], &ConvertOptions::new(&workbook), &registry).unwrap();
    convert(&[workbook], &ConvertOptions::new(&output), &registry).unwrap();

    assert_eq!(read_json(&output), json!([{"title": "Song", "year": "1999"}]));
}
