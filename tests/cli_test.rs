//! CLI integration tests for the schema-graph binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("schema-graph"))
}

// Helper to create a temp file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const PERSON: &str = r#"{
    "type": "object",
    "required": ["name"],
    "properties": {
        "name": { "type": "string" },
        "age": { "type": "integer", "minimum": 0 }
    }
}"#;

mod validate_command {
    use super::*;

    #[test]
    fn valid_instance() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", PERSON);
        let instance = write_temp_file(&dir, "ok.json", r#"{"name": "Ada", "age": 36}"#);

        cmd()
            .args(["validate", schema.to_str().unwrap(), instance.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("valid"));
    }

    #[test]
    fn invalid_instance_exits_1() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", PERSON);
        let instance = write_temp_file(&dir, "bad.json", r#"{"name": 7}"#);

        cmd()
            .args(["validate", schema.to_str().unwrap(), instance.to_str().unwrap()])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("invalid"))
            .stderr(predicate::str::contains("#/name: expected type: string, found: number"));
    }

    #[test]
    fn several_instances_report_each() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", PERSON);
        let ok = write_temp_file(&dir, "ok.json", r#"{"name": "Ada"}"#);
        let bad = write_temp_file(&dir, "bad.json", r#"{"age": -1}"#);

        cmd()
            .args([
                "validate",
                schema.to_str().unwrap(),
                ok.to_str().unwrap(),
                bad.to_str().unwrap(),
            ])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("ok.json: valid"))
            .stderr(predicate::str::contains("required key [name] not found"))
            .stderr(predicate::str::contains("#/age"));
    }

    #[test]
    fn json_output() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", PERSON);
        let instance = write_temp_file(&dir, "bad.json", r#"{}"#);

        let output = cmd()
            .args([
                "validate",
                schema.to_str().unwrap(),
                instance.to_str().unwrap(),
                "--json",
            ])
            .assert()
            .code(1)
            .get_output()
            .stdout
            .clone();

        let line: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(line["valid"], false);
        assert_eq!(line["errors"][0]["keyword"], "required");
        assert_eq!(line["errors"][0]["pointerToViolation"], "#");
    }

    #[test]
    fn draft_flag_sets_default_draft() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", r#"{"divisibleBy": 3}"#);
        let instance = write_temp_file(&dir, "n.json", "4");

        // draft 6 does not know divisibleBy
        cmd()
            .args(["validate", schema.to_str().unwrap(), instance.to_str().unwrap()])
            .assert()
            .success();

        cmd()
            .args([
                "validate",
                schema.to_str().unwrap(),
                instance.to_str().unwrap(),
                "--draft",
                "3",
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("is not a multiple of 3"));
    }

    #[test]
    fn formats_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", r#"{"format": "ipv4"}"#);
        let instance = write_temp_file(&dir, "ip.json", r#""not-an-ip""#);

        cmd()
            .args(["validate", schema.to_str().unwrap(), instance.to_str().unwrap()])
            .assert()
            .code(1);

        cmd()
            .args([
                "validate",
                schema.to_str().unwrap(),
                instance.to_str().unwrap(),
                "--no-formats",
            ])
            .assert()
            .success();
    }

    #[test]
    fn unresolvable_reference_exits_2() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r##"{"properties": {"a": {"$ref": "#/definitions/missing"}}}"##,
        );
        let instance = write_temp_file(&dir, "i.json", "{}");

        cmd()
            .args(["validate", schema.to_str().unwrap(), instance.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("schema loading failed"))
            .stderr(predicate::str::contains("/definitions/missing"));
    }

    #[test]
    fn missing_schema_file_exits_3() {
        let dir = TempDir::new().unwrap();
        let instance = write_temp_file(&dir, "i.json", "{}");

        cmd()
            .args(["validate", "/nonexistent/schema.json", instance.to_str().unwrap()])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("file not found"));
    }

    #[test]
    fn invalid_instance_json_exits_2() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", PERSON);
        let instance = write_temp_file(&dir, "i.json", "not json");

        cmd()
            .args(["validate", schema.to_str().unwrap(), instance.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid JSON"));
    }

    #[test]
    fn unknown_draft_is_rejected() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", "{}");
        let instance = write_temp_file(&dir, "i.json", "{}");

        cmd()
            .args([
                "validate",
                schema.to_str().unwrap(),
                instance.to_str().unwrap(),
                "--draft",
                "7",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("unsupported draft"));
    }

    #[test]
    fn schema_from_url() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/person.json")
            .with_header("content-type", "application/json")
            .with_body(PERSON)
            .create();

        let dir = TempDir::new().unwrap();
        let instance = write_temp_file(&dir, "i.json", r#"{"name": "Ada"}"#);

        cmd()
            .args([
                "validate",
                &format!("{}/person.json", server.url()),
                instance.to_str().unwrap(),
            ])
            .assert()
            .success();
    }
}

mod convert_command {
    use super::*;

    #[test]
    fn draft4_to_draft6() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r#"{
                "$schema": "http://json-schema.org/draft-04/schema#",
                "id": "http://example.com/n.json",
                "minimum": 0,
                "exclusiveMinimum": true
            }"#,
        );

        let output = cmd()
            .args(["convert", schema.to_str().unwrap(), "--draft", "6"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let converted: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(converted["$schema"], "http://json-schema.org/draft-06/schema#");
        assert_eq!(converted["$id"], "http://example.com/n.json");
        assert_eq!(converted["exclusiveMinimum"], 0);
        assert!(converted.get("minimum").is_none());
    }

    #[test]
    fn dropped_keywords_are_warned() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", r#"{"contains": {"type": "string"}}"#);

        cmd()
            .args(["convert", schema.to_str().unwrap(), "--draft", "4"])
            .assert()
            .success()
            .stderr(predicate::str::contains("contains"))
            .stderr(predicate::str::contains("dropped"));
    }

    #[test]
    fn pretty_output_to_file() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", PERSON);
        let output = dir.path().join("out.json");

        cmd()
            .args([
                "convert",
                schema.to_str().unwrap(),
                "--draft",
                "3",
                "--pretty",
                "--output",
                output.to_str().unwrap(),
            ])
            .assert()
            .success();

        let content = fs::read_to_string(&output).unwrap();
        assert!(content.contains("{\n"));
        let converted: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(converted["properties"]["name"]["required"], true);
    }
}

mod check_command {
    use super::*;

    #[test]
    fn clean_schema() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", PERSON);

        cmd()
            .args(["check", schema.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("no issues"));
    }

    #[test]
    fn warnings_are_printed() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", r#"{"minLength": "three"}"#);

        cmd()
            .args(["check", schema.to_str().unwrap()])
            .assert()
            .success()
            .stderr(predicate::str::contains("warning"))
            .stdout(predicate::str::contains("1 warning(s)"));
    }

    #[test]
    fn strict_turns_warnings_into_errors() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", r#"{"minLength": "three"}"#);

        cmd()
            .args(["check", schema.to_str().unwrap(), "--strict"])
            .assert()
            .code(2);
    }

    #[test]
    fn json_report() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", r#"{"x-vendor": 1}"#);

        let output = cmd()
            .args(["check", schema.to_str().unwrap(), "--json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(report["issues"]["issues"][0]["kind"], "unknownKeyword");
        assert_eq!(report["issues"]["issues"][0]["severity"], "info");
    }
}
