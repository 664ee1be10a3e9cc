use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::{
    config::{GenerateOptions, LineEnding},
    part::{Message, Part},
};

const TAG_OPTIONAL: &str = "optional";
const TAG_LENIENT: &str = "lenient";

/// Errors raised while loading fixtures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FixtureError {
    /// Fixture JSON could not be decoded.
    #[error("invalid fixture json: {0}")]
    Json(#[from] serde_json::Error),
    /// A fixture header could not be represented as an HTTP header.
    #[error("invalid fixture header `{name}`")]
    InvalidHeader {
        /// Offending header name.
        name: String,
    },
    /// A `body_base64` value is not valid base64.
    #[error("part {index} has an invalid body_base64 value")]
    InvalidBase64 {
        /// Zero-based part index.
        index: usize,
    },
}

/// Expected outcome of parsing one fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedResult {
    /// Whether the body must parse.
    #[serde(default = "default_true")]
    pub valid: bool,
    /// Expected error tag. Advisory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Expected parts, in wire order.
    #[serde(default)]
    pub parts: Vec<ExpectedPart>,
}

impl Default for ExpectedResult {
    fn default() -> Self {
        Self {
            valid: true,
            error_type: None,
            parts: Vec::new(),
        }
    }
}

/// One expected part. Absent fields are not checked.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExpectedPart {
    /// Field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `Some(None)` expects no filename, `Some(Some(""))` an empty one.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub filename: Option<Option<String>>,
    /// Media type without parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Exact UTF-8 body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,
    /// Base64 of the body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_base64: Option<String>,
    /// Lowercase hex SHA-256 of the body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_sha256: Option<String>,
    /// Body length in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_size: Option<u64>,
}

/// Parser settings a fixture asks for.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FixtureParserOptions {
    /// `false` requires LF and bare CR line endings to be accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict_line_endings: Option<bool>,
    /// Header block cap in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_header_size: Option<usize>,
    /// Whether folded header lines must be unfolded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_header_folding: Option<bool>,
    /// Settings this crate does not know about.
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

impl FixtureParserOptions {
    /// Returns `true` when no setting is requested.
    pub fn is_empty(&self) -> bool {
        self.strict_line_endings.is_none()
            && self.max_header_size.is_none()
            && self.allow_header_folding.is_none()
            && self.other.is_empty()
    }
}

/// Metadata and expectations of one parse fixture (`test.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDescriptor {
    /// Stable test identifier.
    pub id: String,
    /// Short title.
    #[serde(default)]
    pub name: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
    /// Suite category, such as `basic` or `malformed`.
    #[serde(default)]
    pub category: String,
    /// Tags such as `required`, `optional`, `lenient`.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Expected result in strict mode.
    #[serde(default)]
    pub expected: ExpectedResult,
    /// Expected result when the implementation parses leniently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lenient_expected: Option<ExpectedResult>,
    /// Parser settings the fixture depends on.
    #[serde(default, skip_serializing_if = "FixtureParserOptions::is_empty")]
    pub parser_options: FixtureParserOptions,
}

impl TestDescriptor {
    /// Returns `true` when tagged `optional`. Untagged tests are required.
    pub fn is_optional(&self) -> bool {
        self.has_tag(TAG_OPTIONAL)
    }

    /// Returns `true` when the fixture only makes sense for lenient parsers.
    pub fn is_lenient_only(&self) -> bool {
        self.has_tag(TAG_LENIENT)
    }

    /// Expected result for a strict or lenient run.
    pub fn expected_for(&self, lenient: bool) -> &ExpectedResult {
        match (&self.lenient_expected, lenient) {
            (Some(expected), true) => expected,
            _ => &self.expected,
        }
    }

    fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }
}

/// A parse fixture: descriptor, transport headers, and raw body.
#[derive(Debug, Clone)]
pub struct ConformanceCase {
    /// Test metadata.
    pub descriptor: TestDescriptor,
    /// Transport headers (`headers.json`).
    pub headers: HeaderMap,
    /// Raw body (`input.raw`).
    pub body: Bytes,
}

impl ConformanceCase {
    /// Creates a case with a single `Content-Type` header.
    pub fn new(
        descriptor: TestDescriptor,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<Self, FixtureError> {
        let mut headers = HeaderMap::new();
        let value =
            HeaderValue::from_str(content_type).map_err(|_| FixtureError::InvalidHeader {
                name: http::header::CONTENT_TYPE.to_string(),
            })?;
        headers.insert(http::header::CONTENT_TYPE, value);

        Ok(Self {
            descriptor,
            headers,
            body: body.into(),
        })
    }

    /// Loads a case from the JSON text of `test.json` and `headers.json`.
    pub fn from_json(
        test_json: &str,
        headers_json: &str,
        body: impl Into<Bytes>,
    ) -> Result<Self, FixtureError> {
        let descriptor: TestDescriptor = serde_json::from_str(test_json)?;
        let raw_headers: BTreeMap<String, String> = serde_json::from_str(headers_json)?;

        let mut headers = HeaderMap::new();
        for (name, value) in raw_headers {
            let invalid = || FixtureError::InvalidHeader { name: name.clone() };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let header_value = HeaderValue::from_str(&value).map_err(|_| invalid())?;
            headers.append(header_name, header_value);
        }

        Ok(Self {
            descriptor,
            headers,
            body: body.into(),
        })
    }

    /// Test identifier.
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }
}

/// How generated output is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Generated bytes must re-parse to the requested structure.
    #[default]
    RoundTrip,
    /// Generation only has to succeed.
    None,
}

/// Constraints on generated output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenerationConstraints {
    /// Explicit boundary to use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary: Option<String>,
    /// Characters the boundary may be drawn from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary_chars: Option<String>,
    /// Line ending to write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_ending: Option<LineEnding>,
    /// Whether the output must end with the final delimiter.
    #[serde(default = "default_true")]
    pub final_terminator: bool,
}

/// One part of a generation request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenerationPart {
    /// Field name.
    pub name: String,
    /// Optional filename; `Some("")` is kept as an empty filename.
    #[serde(default)]
    pub filename: Option<String>,
    /// Part `Content-Type`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Text body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,
    /// Base64 body, used when `body_text` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_base64: Option<String>,
}

/// A generation fixture: parts to serialize plus constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Stable test identifier.
    pub id: String,
    /// Tags such as `required` or `optional`.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Parts to generate, in order.
    pub parts: Vec<GenerationPart>,
    /// Output constraints.
    #[serde(default)]
    pub constraints: GenerationConstraints,
    /// Output validation.
    #[serde(default)]
    pub validation: ValidationMode,
}

impl GenerationRequest {
    /// Returns `true` when tagged `optional`.
    pub fn is_optional(&self) -> bool {
        self.tags.iter().any(|tag| tag == TAG_OPTIONAL)
    }

    /// Builds the message to generate.
    pub fn to_message(&self) -> Result<Message, FixtureError> {
        let mut message = Message::new();

        for (index, wanted) in self.parts.iter().enumerate() {
            let mut part = Part::new(wanted.name.clone());
            if let Some(filename) = &wanted.filename {
                part = part.with_filename(filename.clone());
            }
            if let Some(content_type) = &wanted.content_type {
                part = part.with_content_type(content_type.clone());
            }

            let body = match (&wanted.body_text, &wanted.body_base64) {
                (Some(text), _) => Bytes::from(text.clone()),
                (None, Some(encoded)) => STANDARD
                    .decode(encoded)
                    .map(Bytes::from)
                    .map_err(|_| FixtureError::InvalidBase64 { index })?,
                (None, None) => Bytes::new(),
            };
            message.parts.push(part.with_body(body));
        }

        Ok(message)
    }

    /// Generator options derived from the constraints.
    pub fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            boundary: self.constraints.boundary.clone(),
            line_ending: self.constraints.line_ending.unwrap_or_default(),
            final_terminator: self.constraints.final_terminator,
            ..GenerateOptions::default()
        }
    }

    /// The structure a round-trip parse must reproduce.
    ///
    /// Output without the final delimiter must be rejected.
    pub fn expected(&self) -> ExpectedResult {
        if !self.constraints.final_terminator {
            return ExpectedResult {
                valid: false,
                error_type: Some("truncated".to_owned()),
                parts: Vec::new(),
            };
        }

        let parts = self
            .parts
            .iter()
            .map(|wanted| ExpectedPart {
                name: Some(wanted.name.clone()),
                filename: Some(wanted.filename.clone()),
                content_type: wanted.content_type.as_deref().map(essence),
                body_text: wanted.body_text.clone(),
                body_base64: wanted
                    .body_text
                    .is_none()
                    .then(|| wanted.body_base64.clone().unwrap_or_default()),
                ..ExpectedPart::default()
            })
            .collect();

        ExpectedResult {
            valid: true,
            error_type: None,
            parts,
        }
    }
}

fn essence(content_type: &str) -> String {
    content_type
        .split_once(';')
        .map_or(content_type, |(essence, _)| essence)
        .trim()
        .to_owned()
}

fn default_true() -> bool {
    true
}

// Distinguishes an explicit `null` from an absent field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
