use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn bin() -> Command {
    Command::cargo_bin("lua-deobf-rs").unwrap()
}

#[test]
fn test_deobfuscate_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("script.lua");
    fs::write(&input, "local a = 1\nlocal b = a + a\nreturn b").unwrap();

    bin()
        .arg("deobfuscate")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("local var1 = var0 - var0"));
}

#[test]
fn test_deobfuscate_with_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("script.lua");
    let output = dir.path().join("out.lua");
    let report = dir.path().join("report.json");
    fs::write(&input, "local secret = M.b(\"aGVsbG8=\")\nprint(secret)").unwrap();

    bin()
        .args(["deobfuscate", "--string-mode", "inverse", "-o"])
        .arg(&output)
        .arg("--report")
        .arg(&report)
        .arg(&input)
        .assert()
        .success();

    let cleaned = fs::read_to_string(&output).unwrap();
    assert!(cleaned.contains("local var0 = M.b(\"hello\")"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["mapping"]["bindings"][0]["original"], "secret");
}

#[test]
fn test_deobfuscate_directory() {
    let dir = tempfile::tempdir().unwrap();
    let input_dir = dir.path().join("in");
    let output_dir = dir.path().join("out");
    fs::create_dir(&input_dir).unwrap();
    fs::write(input_dir.join("a.lua"), "local x = 1\nreturn x").unwrap();
    fs::write(input_dir.join("b.lua"), "do y() end").unwrap();
    fs::write(input_dir.join("notes.txt"), "local z = 1").unwrap();

    bin()
        .arg("deobfuscate")
        .arg(&input_dir)
        .arg("-o")
        .arg(&output_dir)
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(output_dir.join("a.lua")).unwrap(),
        "local var0 = 1\nreturn var0"
    );
    assert_eq!(
        fs::read_to_string(output_dir.join("b.lua")).unwrap(),
        "do\n    y()\nend"
    );
    assert!(!output_dir.join("notes.txt").exists());
}

#[test]
fn test_directory_without_output_fails() {
    let dir = tempfile::tempdir().unwrap();
    bin()
        .arg("deobfuscate")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("output directory is required"));
}

#[test]
fn test_missing_input_fails() {
    bin()
        .args(["deobfuscate", "does/not/exist.lua"])
        .assert()
        .failure();
}

#[test]
fn test_decode_subcommand() {
    bin()
        .args(["decode", "aGVsbG8="])
        .assert()
        .success()
        .stdout(predicate::str::contains("base64: hello"));

    bin()
        .args(["decode", "--string-mode", "forward", "hi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("base64: aGk="));
}
