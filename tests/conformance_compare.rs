#![allow(missing_docs)]

use formgauge::{
    ErrorKind, ParseReport, ReportedPart,
    conformance::{ExpectedResult, Validity, compare},
};

fn expected(json: &str) -> ExpectedResult {
    serde_json::from_str(json).expect("expected result should deserialize")
}

fn text_part(name: &str, body: &str) -> ReportedPart {
    ReportedPart {
        name: name.to_owned(),
        body_text: Some(body.to_owned()),
        body_size: body.len() as u64,
        ..ReportedPart::default()
    }
}

fn success(parts: Vec<ReportedPart>) -> ParseReport {
    ParseReport {
        valid: true,
        parts: Some(parts),
        error_type: None,
        error_message: None,
    }
}

#[test]
fn matching_report_is_clean() {
    let want = expected(
        r#"{"valid": true, "parts": [{"name": "a", "filename": null, "body_text": "hello", "body_size": 5}]}"#,
    );
    let comparison = compare(&want, &success(vec![text_part("a", "hello")]));

    assert_eq!(comparison.validity, Validity::Match);
    assert!(comparison.is_clean(), "{}", comparison.describe());
}

#[test]
fn absent_expected_fields_are_not_checked() {
    let want = expected(r#"{"parts": [{"name": "a"}]}"#);
    let mut actual = text_part("a", "anything");
    actual.filename = Some("x.bin".to_owned());
    actual.content_type = Some("application/octet-stream".to_owned());

    assert!(compare(&want, &success(vec![actual])).is_clean());
}

#[test]
fn explicit_null_filename_must_be_absent() {
    let want = expected(r#"{"parts": [{"name": "f", "filename": null}]}"#);
    let mut actual = text_part("f", "");
    actual.filename = Some(String::new());

    let comparison = compare(&want, &success(vec![actual]));
    assert_eq!(comparison.mismatches.len(), 1);
    assert_eq!(comparison.mismatches[0].field, "filename");
    assert_eq!(comparison.mismatches[0].expected, "null");
    assert_eq!(comparison.mismatches[0].actual, "\"\"");
}

#[test]
fn collects_every_mismatch() {
    let want = expected(
        r#"{"parts": [
            {"name": "a", "body_text": "one"},
            {"name": "b", "content_type": "text/plain", "body_size": 3}
        ]}"#,
    );
    let mut second = text_part("c", "xy");
    second.content_type = Some("text/html".to_owned());

    let comparison = compare(&want, &success(vec![text_part("a", "uno"), second]));
    let fields: Vec<(Option<usize>, &str)> = comparison
        .mismatches
        .iter()
        .map(|mismatch| (mismatch.part, mismatch.field))
        .collect();
    assert_eq!(
        fields,
        [
            (Some(0), "body_text"),
            (Some(1), "name"),
            (Some(1), "content_type"),
            (Some(1), "body_size"),
        ]
    );
    assert_err_contains(&comparison.describe(), "part 1: name mismatch");
}

#[test]
fn part_count_difference_is_reported_with_zipped_parts() {
    let want = expected(r#"{"parts": [{"name": "a"}, {"name": "b"}]}"#);
    let comparison = compare(&want, &success(vec![text_part("z", "")]));

    assert_eq!(comparison.mismatches[0].field, "part_count");
    assert_eq!(comparison.mismatches[0].part, None);
    assert_eq!(comparison.mismatches[1].field, "name");
    assert_eq!(comparison.mismatches.len(), 2);
}

#[test]
fn base64_expectation_matches_text_body() {
    let want = expected(r#"{"parts": [{"body_base64": "aGVsbG8="}]}"#);
    assert!(compare(&want, &success(vec![text_part("a", "hello")])).is_clean());

    let binary = ReportedPart {
        name: "bin".to_owned(),
        body_base64: Some("AJ+SlnA=".to_owned()),
        body_size: 5,
        ..ReportedPart::default()
    };
    let want = expected(r#"{"parts": [{"body_base64": "AJ+SlnA="}]}"#);
    assert!(compare(&want, &success(vec![binary])).is_clean());
}

#[test]
fn sha256_expectation_is_derived_when_not_reported() {
    let want = expected(
        r#"{"parts": [{"body_sha256": "2CF24DBA5FB0A30E26E83B2AC5B9E29E1B161E5C1FA7425E73043362938B9824"}]}"#,
    );
    let comparison = compare(&want, &success(vec![text_part("a", "hello")]));
    assert!(comparison.is_clean(), "{}", comparison.describe());
}

#[test]
fn unexpected_failure_is_a_mismatch() {
    let want = expected(r#"{"valid": true, "parts": []}"#);
    let actual = ParseReport::failure(ErrorKind::Truncated, "multipart body truncated");

    let comparison = compare(&want, &actual);
    assert_eq!(comparison.validity, Validity::UnexpectedFailure);
    assert!(!comparison.is_clean());
    assert_err_contains(&comparison.describe(), "multipart body truncated");
}

#[test]
fn success_on_invalid_input_is_lenient() {
    let want = expected(r#"{"valid": false, "error_type": "missing_terminator"}"#);
    let comparison = compare(&want, &success(vec![text_part("a", "x")]));

    assert_eq!(comparison.validity, Validity::LenientSuccess);
    assert!(comparison.mismatches.is_empty());
}

#[test]
fn differing_error_type_is_advisory_only() {
    let want = expected(r#"{"valid": false, "error_type": "missing_terminator"}"#);
    let actual = ParseReport::failure(ErrorKind::Truncated, "truncated");

    let comparison = compare(&want, &actual);
    assert!(comparison.is_clean());
    assert_eq!(comparison.advisories.len(), 1);
    assert_err_contains(&comparison.advisories[0], "expected missing_terminator, got truncated");
}

fn assert_err_contains(actual: &str, expected_fragment: &str) {
    assert!(
        actual.contains(expected_fragment),
        "expected `{actual}` to contain `{expected_fragment}`"
    );
}
