use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::{
    conformance::fixture::{ExpectedPart, ExpectedResult},
    report::{ParseReport, ReportedPart, sha256_hex},
};

/// How actual validity relates to expected validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// Both succeeded or both failed.
    Match,
    /// The body was expected to parse but did not.
    UnexpectedFailure,
    /// The body was expected to fail but parsed anyway.
    LenientSuccess,
}

/// One field-level difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Part index, or `None` for message-level fields.
    pub part: Option<usize>,
    /// Compared field, such as `name` or `body_text`.
    pub field: &'static str,
    /// Expected value, rendered for display.
    pub expected: String,
    /// Actual value, rendered for display.
    pub actual: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(index) = self.part {
            write!(f, "part {index}: ")?;
        }
        write!(
            f,
            "{} mismatch - expected {}, got {}",
            self.field, self.expected, self.actual
        )
    }
}

/// Structural diff between an expected result and a parse report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    /// Validity outcome.
    pub validity: Validity,
    /// Every field-level difference found.
    pub mismatches: Vec<Mismatch>,
    /// Notes that never affect the verdict, such as differing error tags.
    pub advisories: Vec<String>,
}

impl Comparison {
    /// A comparison with matching validity and no differences.
    pub fn matched() -> Self {
        Self {
            validity: Validity::Match,
            mismatches: Vec::new(),
            advisories: Vec::new(),
        }
    }

    /// Returns `true` when validity matches and no field differs.
    pub fn is_clean(&self) -> bool {
        self.validity == Validity::Match && self.mismatches.is_empty()
    }

    /// All mismatches joined into one line.
    pub fn describe(&self) -> String {
        self.mismatches
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Compares `actual` against `expected` without stopping at the first
/// difference.
pub fn compare(expected: &ExpectedResult, actual: &ParseReport) -> Comparison {
    let mut comparison = Comparison::matched();

    match (expected.valid, actual.valid) {
        (true, true) => compare_parts(&expected.parts, actual.parts(), &mut comparison.mismatches),
        (true, false) => {
            comparison.validity = Validity::UnexpectedFailure;
            comparison.mismatches.push(Mismatch {
                part: None,
                field: "valid",
                expected: "true".to_owned(),
                actual: match &actual.error_message {
                    Some(message) => format!("false ({message})"),
                    None => "false".to_owned(),
                },
            });
        }
        (false, true) => comparison.validity = Validity::LenientSuccess,
        (false, false) => {
            let actual_tag = actual.error_type.map(|kind| kind.as_tag());
            if let Some(expected_tag) = expected.error_type.as_deref() {
                if actual_tag != Some(expected_tag) {
                    comparison.advisories.push(format!(
                        "error_type differs: expected {expected_tag}, got {}",
                        actual_tag.unwrap_or("none")
                    ));
                }
            }
        }
    }

    comparison
}

fn compare_parts(expected: &[ExpectedPart], actual: &[ReportedPart], out: &mut Vec<Mismatch>) {
    if expected.len() != actual.len() {
        out.push(Mismatch {
            part: None,
            field: "part_count",
            expected: expected.len().to_string(),
            actual: actual.len().to_string(),
        });
    }

    for (index, (expected, actual)) in expected.iter().zip(actual).enumerate() {
        compare_part(index, expected, actual, out);
    }
}

fn compare_part(index: usize, expected: &ExpectedPart, actual: &ReportedPart, out: &mut Vec<Mismatch>) {
    let mut check = |field: &'static str, expected: String, actual: String| {
        if expected != actual {
            out.push(Mismatch {
                part: Some(index),
                field,
                expected,
                actual,
            });
        }
    };

    if let Some(name) = &expected.name {
        check("name", quoted(Some(name)), quoted(Some(&actual.name)));
    }

    if let Some(filename) = &expected.filename {
        check(
            "filename",
            quoted(filename.as_deref()),
            quoted(actual.filename.as_deref()),
        );
    }

    if let Some(content_type) = &expected.content_type {
        check(
            "content_type",
            quoted(Some(content_type)),
            quoted(actual.content_type.as_deref()),
        );
    }

    if let Some(text) = &expected.body_text {
        check(
            "body_text",
            quoted(Some(text)),
            quoted(actual.body_text.as_deref()),
        );
    } else if let Some(encoded) = &expected.body_base64 {
        let actual_encoded = match (&actual.body_base64, &actual.body_text) {
            (Some(encoded), _) => encoded.clone(),
            (None, Some(text)) => STANDARD.encode(text.as_bytes()),
            (None, None) => String::new(),
        };
        check("body_base64", encoded.clone(), actual_encoded);
    } else if let Some(digest) = &expected.body_sha256 {
        let actual_digest = actual
            .body_sha256
            .clone()
            .or_else(|| actual.body_bytes().map(|bytes| sha256_hex(&bytes)))
            .unwrap_or_default();
        check(
            "body_sha256",
            digest.to_ascii_lowercase(),
            actual_digest.to_ascii_lowercase(),
        );
    }

    if let Some(size) = expected.body_size {
        check("body_size", size.to_string(), actual.body_size.to_string());
    }
}

fn quoted(value: Option<&str>) -> String {
    match value {
        Some(value) => format!("{value:?}"),
        None => "null".to_owned(),
    }
}
