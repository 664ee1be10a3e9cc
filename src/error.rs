use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Closed set of error tags shared by the codec and the conformance layer.
///
/// The serialized form is the snake_case tag used in parse reports and
/// expected-result fixtures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Boundary missing, malformed, or not the one used by the body.
    BoundaryMismatch,
    /// Input ended without a final `--boundary--` delimiter.
    MissingTerminator,
    /// Input ended inside a header block or a part body.
    Truncated,
    /// A part header block had no `Content-Disposition`.
    MissingContentDisposition,
    /// A header line or parameter list could not be parsed.
    #[serde(rename = "invalid_header")]
    InvalidHeaderSyntax,
    /// A required header appeared more than once in one part.
    #[serde(rename = "duplicate_header")]
    DuplicateRequiredHeader,
    /// The chosen boundary occurs inside a part body (generation only).
    BoundaryCollision,
    /// Any condition not otherwise classified.
    ParseError,
}

impl ErrorKind {
    /// Returns the stable tag for this kind.
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::BoundaryMismatch => "boundary_mismatch",
            Self::MissingTerminator => "missing_terminator",
            Self::Truncated => "truncated",
            Self::MissingContentDisposition => "missing_content_disposition",
            Self::InvalidHeaderSyntax => "invalid_header",
            Self::DuplicateRequiredHeader => "duplicate_header",
            Self::BoundaryCollision => "boundary_collision",
            Self::ParseError => "parse_error",
        }
    }

    /// Looks up a kind by tag. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let kind = match tag {
            "boundary_mismatch" => Self::BoundaryMismatch,
            "missing_terminator" => Self::MissingTerminator,
            "truncated" => Self::Truncated,
            "missing_content_disposition" => Self::MissingContentDisposition,
            "invalid_header" => Self::InvalidHeaderSyntax,
            "duplicate_header" => Self::DuplicateRequiredHeader,
            "boundary_collision" => Self::BoundaryCollision,
            "parse_error" => Self::ParseError,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Configuration-time validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A configured numeric limit must be strictly greater than zero.
    #[error("limit `{limit}` must be greater than 0")]
    InvalidLimitValue {
        /// Name of the limit.
        limit: &'static str,
    },
    /// A per-part limit exceeded the configured total limit.
    #[error("limit `{limit}` ({value}) cannot exceed `max_total_size` ({max_total_size})")]
    LimitExceedsTotalSize {
        /// Name of the limit that exceeded `max_total_size`.
        limit: &'static str,
        /// Configured value of `limit`.
        value: u64,
        /// Configured `max_total_size`.
        max_total_size: u64,
    },
    /// An explicitly configured generation boundary is not a valid boundary.
    #[error("configured boundary is invalid: {reason}")]
    InvalidBoundary {
        /// Why the boundary was rejected.
        reason: String,
    },
    /// Boundary regeneration was enabled with zero attempts.
    #[error("collision policy `regenerate` requires at least one attempt")]
    ZeroRegenerateAttempts,
}

/// Terminal parse failures. A parse either yields a complete message or
/// exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The boundary is absent, malformed, or not used by the body.
    #[error("boundary mismatch: {reason}")]
    BoundaryMismatch {
        /// Failure detail.
        reason: String,
    },
    /// The body never reached a final delimiter.
    #[error("multipart body is missing the final boundary terminator")]
    MissingTerminator,
    /// The input ended before the current header block or body was closed.
    #[error("multipart body truncated inside {context}")]
    Truncated {
        /// Scanner region where input ran out.
        context: &'static str,
    },
    /// A part has no `Content-Disposition` header.
    #[error("part {index} is missing the Content-Disposition header")]
    MissingContentDisposition {
        /// Zero-based part index.
        index: usize,
    },
    /// A header line, header block, or parameter list is malformed.
    #[error("invalid header syntax: {reason}")]
    InvalidHeaderSyntax {
        /// Failure detail.
        reason: String,
    },
    /// A required header was repeated under the rejecting policy.
    #[error("part {index} repeats required header `{name}`")]
    DuplicateRequiredHeader {
        /// Zero-based part index.
        index: usize,
        /// Header name as it appeared first.
        name: String,
    },
    /// Generic parser failure with message context.
    #[error("{message}")]
    Message {
        /// Parser failure message.
        message: String,
    },
}

impl ParseError {
    /// Creates a generic parser error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub(crate) fn boundary(reason: impl Into<String>) -> Self {
        Self::BoundaryMismatch {
            reason: reason.into(),
        }
    }

    pub(crate) fn header(reason: impl Into<String>) -> Self {
        Self::InvalidHeaderSyntax {
            reason: reason.into(),
        }
    }

    /// Returns the taxonomy tag of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BoundaryMismatch { .. } => ErrorKind::BoundaryMismatch,
            Self::MissingTerminator => ErrorKind::MissingTerminator,
            Self::Truncated { .. } => ErrorKind::Truncated,
            Self::MissingContentDisposition { .. } => ErrorKind::MissingContentDisposition,
            Self::InvalidHeaderSyntax { .. } => ErrorKind::InvalidHeaderSyntax,
            Self::DuplicateRequiredHeader { .. } => ErrorKind::DuplicateRequiredHeader,
            Self::Message { .. } => ErrorKind::ParseError,
        }
    }
}

/// Generation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum GenerateError {
    /// The boundary occurs inside a part body, preamble, or epilogue.
    #[error("boundary `{boundary}` collides with message content")]
    BoundaryCollision {
        /// The colliding boundary.
        boundary: String,
    },
    /// Every regenerated boundary collided with the content.
    #[error("no collision-free boundary found after {attempts} attempts")]
    CollisionRetriesExhausted {
        /// Number of boundaries tried.
        attempts: usize,
    },
    /// The boundary violates the boundary grammar.
    #[error("invalid boundary: {reason}")]
    InvalidBoundary {
        /// Failure detail.
        reason: String,
    },
    /// A part cannot be serialized.
    #[error("part {index} cannot be generated: {reason}")]
    InvalidPart {
        /// Zero-based part index.
        index: usize,
        /// Failure detail.
        reason: String,
    },
    /// The preamble cannot be serialized.
    #[error("preamble cannot be generated: {reason}")]
    InvalidPreamble {
        /// Failure detail.
        reason: String,
    },
}

impl GenerateError {
    /// Returns the taxonomy tag of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BoundaryCollision { .. } | Self::CollisionRetriesExhausted { .. } => {
                ErrorKind::BoundaryCollision
            }
            Self::InvalidBoundary { .. } => ErrorKind::BoundaryMismatch,
            Self::InvalidPart { .. } | Self::InvalidPreamble { .. } => ErrorKind::ParseError,
        }
    }
}

/// Runtime error type used by `formgauge`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration error surfaced at runtime.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Multipart parser failure.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Multipart generation failure.
    #[error(transparent)]
    Generate(#[from] GenerateError),
    /// The upstream chunk source failed.
    #[error("stream read failed: {0}")]
    StreamRead(BoxError),
}

impl Error {
    /// Returns the taxonomy tag of this error, when it has one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Parse(err) => Some(err.kind()),
            Self::Generate(err) => Some(err.kind()),
            Self::Config(_) | Self::StreamRead(_) => None,
        }
    }
}
