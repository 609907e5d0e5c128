use lua_deobf_rs::passes::{flip_operators, normalize_identifiers, prettify};
use lua_deobf_rs::{DeobfuscateOptions, Deobfuscator, StringMode};

const FIXTURE: &str = include_str!("fixtures/obfuscated.lua");
const ONE_LINE_FIXTURE: &str = include_str!("fixtures/obfuscated_oneline.lua");

fn run(source: &str, options: DeobfuscateOptions) -> String {
    Deobfuscator::new(options).run(source).unwrap().code
}

#[test]
fn test_end_to_end_rename_and_flip() {
    let output = run(
        "local a = 1\nlocal b = a + a\nreturn b",
        DeobfuscateOptions::default(),
    );
    assert_eq!(output, "local var0 = 1\nlocal var1 = var0 - var0\nreturn var1");
    assert!(output.contains("var1 = var0 - var0"));
    assert!(output.contains("return var1"));
}

#[test]
fn test_fixture_inverse_mode() {
    let options = DeobfuscateOptions {
        string_mode: StringMode::Inverse,
        ..Default::default()
    };
    let result = Deobfuscator::new(options).run(FIXTURE).unwrap();
    let code = &result.code;

    assert!(code.contains("local var0 = M.b(\"hello\")"));
    assert!(code.contains("local var3 = var1 - var1"));
    assert!(code.contains("print(var0, var5(var3))"));
    assert!(code.contains("local function var5(v) return v\nend"));

    // Unread local, empty if/for, empty function and its call,
    // uncalled function, single-use table key
    for gone in ["var2", "var4", "var6", "if true", "for i", "G.dead"] {
        assert!(!code.contains(gone), "{} should be gone:\n{}", gone, code);
    }

    let originals: Vec<_> = result.mapping.iter().map(|b| b.original.as_str()).collect();
    assert_eq!(
        originals,
        vec!["kQ", "zz", "unusedThing", "p1", "noop", "helper", "neverCalled"]
    );
}

#[test]
fn test_one_line_fixture_keeps_live_statements() {
    let options = DeobfuscateOptions {
        string_mode: StringMode::Inverse,
        prettify: false,
        ..Default::default()
    };
    let result = Deobfuscator::new(options).run(ONE_LINE_FIXTURE).unwrap();
    let code = &result.code;

    assert!(code.contains("local var0 = M.b(M.f(\"hello\"))"), "{}", code);
    assert!(code.contains("local var1 = 10 local var3 = var1 - var1"), "{}", code);
    assert!(code.contains("local function var5(v) return v end"), "{}", code);
    assert!(code.contains("print(var0, var5(var3))"), "{}", code);
    for gone in ["var2", "99", "var4", "var6", "if true", "for i", "G.dead"] {
        assert!(!code.contains(gone), "{} should be gone:\n{}", gone, code);
    }

    let originals: Vec<_> = result.mapping.iter().map(|b| b.original.as_str()).collect();
    assert_eq!(
        originals,
        vec!["kQ", "zz", "unusedThing", "p1", "noop", "helper", "neverCalled"]
    );
}

#[test]
fn test_one_line_fixture_prettified() {
    let options = DeobfuscateOptions {
        string_mode: StringMode::Inverse,
        ..Default::default()
    };
    let code = run(ONE_LINE_FIXTURE, options);
    assert!(code.contains("M.b(M.f(\"hello\"))"));
    assert!(code.lines().any(|line| line.trim() == "print(var0, var5(var3))"), "{}", code);
    assert!(!code.contains("G.dead"));
}

#[test]
fn test_unused_declaration_on_shared_line() {
    let options = DeobfuscateOptions {
        prettify: false,
        ..Default::default()
    };
    assert_eq!(
        run("local a = 1 local b = 2 print(b)", options.clone()),
        "local var1 = 2 print(var1)"
    );
    assert_eq!(
        run("local a = 1 a = 2 print(\"live\")", options),
        "print(\"live\")"
    );
}

#[test]
fn test_fixture_forward_mode_encodes_argument() {
    let code = run(FIXTURE, DeobfuscateOptions::default());
    // base64 of the quoted argument text itself
    assert!(code.contains("M.b(ImFHVnNiRzg9Ig==)"));
}

#[test]
fn test_pipeline_is_stateless_across_runs() {
    let mut deobfuscator = Deobfuscator::new(DeobfuscateOptions::default());
    let first = deobfuscator.run(FIXTURE).unwrap();
    let second = deobfuscator.run(FIXTURE).unwrap();
    assert_eq!(first.code, second.code);
    assert_eq!(first.mapping.len(), second.mapping.len());
}

#[test]
fn test_disabled_passes_are_skipped() {
    let options = DeobfuscateOptions {
        normalize_identifiers: false,
        prettify: false,
        ..Default::default()
    };
    let result = Deobfuscator::new(options).run("local a = 1\nreturn a").unwrap();
    assert_eq!(result.code, "local a = 1\nreturn a");
    assert!(result.mapping.is_empty());
    assert!(!result.passes.iter().any(|p| p.pass == "identifier_normalizer"));
    assert!(!result.passes.iter().any(|p| p.pass == "pretty_printer"));
}

#[test]
fn test_pass_names_follow_pipeline_order() {
    let deobfuscator = Deobfuscator::new(DeobfuscateOptions::default());
    assert_eq!(
        deobfuscator.pass_names(),
        vec![
            "identifier_normalizer",
            "dead_return",
            "unused_bindings",
            "string_decoder",
            "arithmetic",
            "dead_code",
            "unused_stores",
            "pretty_printer",
        ]
    );
}

#[test]
fn test_report_json_contains_mapping() {
    let result = Deobfuscator::new(DeobfuscateOptions::default())
        .run("local a = 1\nlocal a = 2\nprint(a)")
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&result.report_json().unwrap()).unwrap();
    assert_eq!(json["mapping"]["bindings"][0]["original"], "a");
    assert_eq!(json["mapping"]["bindings"][0]["synthetic"], "var0");
    assert_eq!(json["redefinitions"][0]["renamed"], "var0_1");
    assert!(json.get("code").is_none());
}

#[test]
fn test_normalizer_twice_keeps_synthetic_names() {
    let (once, _) = normalize_identifiers(FIXTURE).unwrap();
    let (twice, mapping) = normalize_identifiers(&once).unwrap();
    assert!(mapping.is_empty());
    assert_eq!(once, twice);
}

#[test]
fn test_flip_round_trips_operator() {
    for op in ["+", "-"] {
        let src = format!("var2 = var0 {} var1", op);
        let (once, _) = flip_operators(&src);
        assert_ne!(once, src);
        let (twice, _) = flip_operators(&once);
        assert_eq!(twice, src);
    }
}

#[test]
fn test_prettify_do_block() {
    let lines: Vec<String> = prettify("do x end", 4).lines().map(String::from).collect();
    assert_eq!(lines, vec!["do", "    x", "end"]);
}
