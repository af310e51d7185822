use nectar_core::sanitize::{
    is_safe_for_store, repair_json, sanitize_filename, sanitize_json_text, sanitize_str,
    sanitize_url, SanitizeOptions,
};
use serde_json::{Value, json};

#[test]
fn nonstrict_keeps_tab_newline_cr_and_drops_the_rest() {
    let input = "a\tb\nc\rd\u{0000}e\u{000B}f\u{009F}g";
    let opts = SanitizeOptions::default();
    assert_eq!(sanitize_str(input, &opts), "a\tb\nc\rdefg");
}

#[test]
fn strict_drops_whitespace_and_vertical_controls() {
    let input = "a\tb\nc\u{000B}d\u{000C}e";
    assert_eq!(sanitize_str(input, &SanitizeOptions::strict()), "abcde");
}

#[test]
fn replacement_is_applied_per_removed_code_point() {
    let opts = SanitizeOptions {
        replacement: "?".to_string(),
        ..SanitizeOptions::default()
    };
    assert_eq!(sanitize_str("a\u{0000}\u{0001}b", &opts), "a??b");
}

#[test]
fn repair_closes_trailing_commas_strings_and_braces() {
    let broken = r#"{"tags": ["a", "b",], "name": "trunc"#;
    let repaired = repair_json(broken);
    let value: Value = serde_json::from_str(&repaired).expect("repaired payload parses");
    assert_eq!(value["tags"], json!(["a", "b"]));
}

#[test]
fn repair_is_idempotent() {
    let broken = r#"{"urls": [{"tags": ["x",]}"#;
    let once = repair_json(broken);
    assert_eq!(repair_json(&once), once);
}

#[test]
fn repair_escapes_a_stray_inner_quote_on_key_value_lines() {
    // One unescaped quote inside the value leaves the line with an odd
    // quote count, which is what the heuristic keys on.
    let broken = "{\n\"name\": \"evil \"inner corp\"\n}";
    let repaired = repair_json(broken);
    let value: Value = serde_json::from_str(&repaired).expect("repaired payload parses");
    assert_eq!(value["name"], json!("evil \"inner corp"));
}

#[test]
fn unrepairable_text_degrades_to_strict_sanitization() {
    let hopeless = "not json \u{0000} at all : [}{";
    let out = sanitize_json_text(hopeless);
    assert!(is_safe_for_store(&out));
    assert!(serde_json::from_str::<Value>(&out).is_err());
}

#[test]
fn valid_text_reserializes_compact_and_clean() {
    let text = "{\"ip\": {\"asname\": \"Evil\\u0000Corp\", \"ascountry\": \"US\\u0016\"}}";
    let out = sanitize_json_text(text);
    let value: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["ip"]["asname"], json!("EvilCorp"));
    assert_eq!(value["ip"]["ascountry"], json!("US"));
    assert!(is_safe_for_store(&out));
}

#[test]
fn filename_strips_traversal_and_nulls() {
    assert_eq!(sanitize_filename("../etc/\u{0000}passwd"), "etcpasswd");
    assert_eq!(sanitize_filename("..\\boot.ini"), "boot.ini");
    assert_eq!(sanitize_filename(""), "");
}

#[test]
fn filename_truncates_to_512_code_points() {
    let long: String = "x".repeat(600);
    assert_eq!(sanitize_filename(&long).chars().count(), 512);
}

#[test]
fn url_trims_and_truncates() {
    assert_eq!(
        sanitize_url("  https://example.com/a\u{0007}b  "),
        "https://example.com/ab"
    );
    let long = format!("https://example.com/{}", "q".repeat(1200));
    assert_eq!(sanitize_url(&long).chars().count(), 1024);
}

#[test]
fn store_safety_rejects_raw_and_escaped_controls() {
    assert!(is_safe_for_store(r#"{"a": "clean"}"#));
    assert!(is_safe_for_store("tabs\tand\nnewlines are fine"));
    assert!(!is_safe_for_store("raw\u{0001}control"));
    assert!(!is_safe_for_store("{\"a\": \"\\u0000\"}"));
    assert!(!is_safe_for_store("{\"a\": \"\\u007f\"}"));
    // U+0041 is 'A'; a benign escape must pass.
    assert!(is_safe_for_store("{\"a\": \"\\u0041\"}"));
}
