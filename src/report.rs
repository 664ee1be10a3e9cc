use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    error::{ErrorKind, ParseError},
    parser::headers::{CONTENT_DISPOSITION, has_filename_param},
    part::{Message, Part},
};

/// Structural parse outcome, as exchanged with the comparator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParseReport {
    /// Whether the body parsed successfully.
    pub valid: bool,
    /// Parts in wire order. Absent when parsing failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<ReportedPart>>,
    /// Error tag when parsing failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorKind>,
    /// Human-readable error when parsing failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ParseReport {
    /// Reports a successfully parsed message.
    pub fn success(message: &Message) -> Self {
        Self {
            valid: true,
            parts: Some(message.parts.iter().map(ReportedPart::from_part).collect()),
            error_type: None,
            error_message: None,
        }
    }

    /// Reports a parse failure.
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            valid: false,
            parts: None,
            error_type: Some(kind),
            error_message: Some(message.into()),
        }
    }

    /// Builds a report from a codec result.
    pub fn from_result(result: &Result<Message, ParseError>) -> Self {
        match result {
            Ok(message) => Self::success(message),
            Err(err) => Self::failure(err.kind(), err.to_string()),
        }
    }

    /// Reported parts, or an empty slice when parsing failed.
    pub fn parts(&self) -> &[ReportedPart] {
        self.parts.as_deref().unwrap_or_default()
    }
}

/// One part as seen by the comparator.
///
/// `filename` is serialized as `null` when absent so that "no filename" and
/// `filename=""` stay distinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReportedPart {
    /// Field name.
    pub name: String,
    /// Effective filename.
    #[serde(default)]
    pub filename: Option<String>,
    /// Decoded `filename*`, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename_star: Option<String>,
    /// Media type of the part, without parameters.
    #[serde(default)]
    pub content_type: Option<String>,
    /// `charset` parameter of the part `Content-Type`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    /// Body as text, when it is valid UTF-8.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,
    /// Body as standard base64, when it is not valid UTF-8.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_base64: Option<String>,
    /// Lowercase hex SHA-256 of the body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_sha256: Option<String>,
    /// Body length in bytes.
    pub body_size: u64,
}

impl ReportedPart {
    /// Describes a parsed part.
    pub fn from_part(part: &Part) -> Self {
        let filename = part.effective_filename().map(str::to_owned).or_else(|| {
            part.headers
                .get(CONTENT_DISPOSITION)
                .filter(|raw| has_filename_param(raw))
                .map(|_| String::new())
        });

        let content_type = part.content_type.as_deref().map(|value| {
            value
                .split_once(';')
                .map_or(value, |(essence, _)| essence)
                .trim()
                .to_owned()
        });

        let (body_text, body_base64) = match part.body_text() {
            Some(text) => (Some(text.to_owned()), None),
            None => (None, Some(STANDARD.encode(&part.body))),
        };

        Self {
            name: part.name.clone(),
            filename,
            filename_star: part.filename_star.clone(),
            content_type,
            charset: part.charset(),
            body_text,
            body_base64,
            body_sha256: Some(sha256_hex(&part.body)),
            body_size: part.body.len() as u64,
        }
    }

    /// Raw body bytes reconstructed from the text or base64 form.
    pub fn body_bytes(&self) -> Option<Vec<u8>> {
        if let Some(text) = &self.body_text {
            return Some(text.as_bytes().to_vec());
        }
        STANDARD.decode(self.body_base64.as_deref()?).ok()
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
