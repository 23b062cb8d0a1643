//! CLI integration tests for vkapi-schema binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("vkapi-schema"))
}

// Helper to create a temp schema file, creating parent directories
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

// A small corpus with one category, a shared object and an error catalog
fn write_corpus(dir: &TempDir) {
    write_temp_file(
        dir,
        "messages/methods.json",
        r#"{
            "methods": [{
                "name": "messages.send",
                "access_token_type": ["user", "group"],
                "parameters": [{ "name": "peer_id", "type": "integer" }],
                "responses": {
                    "response": { "$ref": "responses.json#/definitions/send_response" }
                },
                "errors": [{ "$ref": "../errors.json#/errors/API_ERROR_FLOOD" }]
            }]
        }"#,
    );
    write_temp_file(
        dir,
        "messages/responses.json",
        r#"{ "definitions": { "send_response": { "type": "integer" } } }"#,
    );
    write_temp_file(
        dir,
        "errors.json",
        r#"{ "errors": { "API_ERROR_FLOOD": { "name": "API_ERROR_FLOOD", "code": 9 } } }"#,
    );
    write_temp_file(dir, "package.json", r#"{ "name": "vk-api-schema" }"#);
}

mod parse_command {
    use super::*;

    #[test]
    fn basic_parse() {
        let dir = TempDir::new().unwrap();
        write_corpus(&dir);

        cmd()
            .args(["parse", dir.path().to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""full_name":"messages.send""#))
            .stdout(predicate::str::contains(r#""access_token_types":["user","group"]"#))
            .stdout(predicate::str::contains(r#""code":9"#));
    }

    #[test]
    fn parse_with_pretty() {
        let dir = TempDir::new().unwrap();
        write_corpus(&dir);

        cmd()
            .args(["parse", dir.path().to_str().unwrap(), "--pretty"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\n  \"categories\""));
    }

    #[test]
    fn parse_to_output_file() {
        let dir = TempDir::new().unwrap();
        write_corpus(&dir);
        let out = TempDir::new().unwrap();
        let output = out.path().join("api.json");

        cmd()
            .args([
                "parse",
                dir.path().to_str().unwrap(),
                "--output",
                output.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        let content = fs::read_to_string(&output).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(
            parsed["categories"]["messages"]["methods"]["messages.send"]["responses"][0]["type"],
            "integer"
        );
    }

    #[test]
    fn custom_catalog_file_names() {
        let dir = TempDir::new().unwrap();
        write_temp_file(
            &dir,
            "wall/catalog.json",
            r#"{ "methods": [{ "name": "wall.post" }] }"#,
        );

        cmd()
            .args([
                "parse",
                dir.path().to_str().unwrap(),
                "--methods-file",
                "catalog.json",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""wall.post""#));
    }

    #[test]
    fn broken_reference_fails() {
        let dir = TempDir::new().unwrap();
        write_temp_file(
            &dir,
            "users/methods.json",
            r##"{ "methods": [{ "name": "users.get", "responses": { "response": { "$ref": "#/definitions/missing" } } }] }"##,
        );

        cmd()
            .args(["parse", dir.path().to_str().unwrap()])
            .assert()
            .failure()
            .code(2)
            .stderr(predicate::str::contains("definitions/missing"));
    }

    #[test]
    fn missing_path_fails() {
        cmd()
            .args(["parse", "/nonexistent/vk-api-schema"])
            .assert()
            .failure()
            .code(3)
            .stderr(predicate::str::contains("not found"));
    }

    #[test]
    fn invalid_base_uri_fails() {
        let dir = TempDir::new().unwrap();
        write_corpus(&dir);

        cmd()
            .args([
                "parse",
                dir.path().to_str().unwrap(),
                "--base-uri",
                "not a uri",
            ])
            .assert()
            .failure()
            .code(2)
            .stderr(predicate::str::contains("invalid base URI"));
    }
}

mod resolve_command {
    use super::*;

    #[test]
    fn resolve_single_document() {
        let dir = TempDir::new().unwrap();
        write_corpus(&dir);

        cmd()
            .args([
                "resolve",
                dir.path().to_str().unwrap(),
                "--document",
                "messages/methods.json",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""response":{"type":"integer"}"#))
            .stdout(predicate::str::contains("$ref").not());
    }

    #[test]
    fn resolve_all_documents() {
        let dir = TempDir::new().unwrap();
        write_corpus(&dir);

        let output = cmd()
            .args(["resolve", dir.path().to_str().unwrap()])
            .output()
            .unwrap();
        assert!(output.status.success());

        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let documents = parsed.as_object().unwrap();
        assert_eq!(documents.len(), 3);
        assert!(documents.contains_key("errors.json"));
        assert!(!documents.contains_key("package.json"));
    }

    #[test]
    fn resolve_cycle_terminates() {
        let dir = TempDir::new().unwrap();
        write_temp_file(
            &dir,
            "objects.json",
            r##"{
                "definitions": {
                    "comment": {
                        "type": "object",
                        "properties": {
                            "thread": { "type": "array", "items": { "$ref": "#/definitions/comment" } }
                        }
                    }
                }
            }"##,
        );

        cmd()
            .args(["resolve", dir.path().to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("$ref").not());
    }

    #[test]
    fn unknown_document_fails() {
        let dir = TempDir::new().unwrap();
        write_corpus(&dir);

        cmd()
            .args([
                "resolve",
                dir.path().to_str().unwrap(),
                "--document",
                "wall/methods.json",
            ])
            .assert()
            .failure()
            .code(2)
            .stderr(predicate::str::contains("document not in corpus"));
    }
}

mod check_command {
    use super::*;

    #[test]
    fn check_valid_corpus() {
        let dir = TempDir::new().unwrap();
        write_corpus(&dir);

        cmd()
            .args(["check", dir.path().to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("3 files checked, all passed"));
    }

    #[test]
    fn check_reports_broken_reference() {
        let dir = TempDir::new().unwrap();
        write_temp_file(
            &dir,
            "objects.json",
            r#"{ "properties": { "owner": { "$ref": "users.json#/definitions/user" } } }"#,
        );

        cmd()
            .args(["check", dir.path().to_str().unwrap()])
            .assert()
            .failure()
            .code(1)
            .stdout(predicate::str::contains("E002"));
    }

    #[test]
    fn check_reports_invalid_json() {
        let dir = TempDir::new().unwrap();
        write_temp_file(&dir, "objects.json", "{ not json");

        cmd()
            .args(["check", dir.path().to_str().unwrap(), "--quiet"])
            .assert()
            .failure()
            .code(1)
            .stdout(predicate::str::contains("E001"));
    }

    #[test]
    fn check_json_output() {
        let dir = TempDir::new().unwrap();
        write_corpus(&dir);

        let output = cmd()
            .args(["check", dir.path().to_str().unwrap(), "--format", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(parsed["files_checked"], 3);
        assert_eq!(parsed["failed"], 0);
    }

    #[test]
    fn warnings_fail_only_in_strict_mode() {
        let dir = TempDir::new().unwrap();
        write_temp_file(
            &dir,
            "objects.json",
            r#"{ "definitions": { "sex": { "type": "integer", "enum": [1, 2], "enumNames": ["female"] } } }"#,
        );

        cmd()
            .args(["check", dir.path().to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("W001"));

        cmd()
            .args(["check", dir.path().to_str().unwrap(), "--strict"])
            .assert()
            .failure()
            .code(1);
    }
}
