use lua_deobf_rs::deobfuscator::deobfuscate_file;
use lua_deobf_rs::{deobfuscate, DeobfuscateOptions, DeobfuscatorError};
use std::fs;

#[test]
fn test_deobfuscate_writes_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("script.lua");
    let output = dir.path().join("cleaned_script.lua");
    fs::write(&input, "local a = 1\nlocal b = a + a\nreturn b").unwrap();

    deobfuscate(&input, &output).unwrap();

    let cleaned = fs::read_to_string(&output).unwrap();
    assert_eq!(cleaned, "local var0 = 1\nlocal var1 = var0 - var0\nreturn var1");
}

#[test]
fn test_missing_input_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("missing.lua");
    let output = dir.path().join("out.lua");

    let err = deobfuscate(&input, &output).unwrap_err();
    match err {
        DeobfuscatorError::Io { path, .. } => assert!(path.ends_with("missing.lua")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!output.exists());
}

#[test]
fn test_unwritable_output_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("script.lua");
    fs::write(&input, "return 1").unwrap();
    let output = dir.path().join("no_such_dir").join("out.lua");

    let err = deobfuscate_file(&input, &output, DeobfuscateOptions::default()).unwrap_err();
    assert!(matches!(err, DeobfuscatorError::Io { .. }));
}
