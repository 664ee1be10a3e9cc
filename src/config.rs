use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, limits::Limits, parser::boundary};

/// Line endings accepted by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEndingMode {
    /// Only CRLF terminates lines and precedes delimiters.
    #[default]
    Strict,
    /// CRLF, bare LF, and bare CR are all accepted.
    Lenient,
}

/// Handling of a repeated `Content-Disposition` header inside one part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateHeaderPolicy {
    /// Fail the parse with a duplicate-header error.
    #[default]
    Reject,
    /// Use the first occurrence.
    KeepFirst,
    /// Use the last occurrence.
    KeepLast,
}

/// How strictly the transport boundary parameter is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryValidation {
    /// Reject boundaries outside the RFC 2046 character class or length.
    #[default]
    Strict,
    /// Accept any non-empty token and let the scanner decide.
    Lenient,
}

/// Parser configuration. The default is [`ParserOptions::strict`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Accepted line endings.
    pub line_endings: LineEndingMode,
    /// Whether obsolete header folding (continuation lines) is unfolded.
    pub header_folding: bool,
    /// Duplicate `Content-Disposition` policy.
    pub duplicate_headers: DuplicateHeaderPolicy,
    /// Whether every part must carry `Content-Disposition` with a `name`.
    pub require_content_disposition: bool,
    /// Boundary parameter validation.
    pub boundary_validation: BoundaryValidation,
    /// Resource limits.
    pub limits: Limits,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self::strict()
    }
}

impl ParserOptions {
    /// RFC-conformant parsing: CRLF only, no folding, duplicates rejected.
    pub fn strict() -> Self {
        Self {
            line_endings: LineEndingMode::Strict,
            header_folding: false,
            duplicate_headers: DuplicateHeaderPolicy::Reject,
            require_content_disposition: true,
            boundary_validation: BoundaryValidation::Strict,
            limits: Limits::default(),
        }
    }

    /// Compatibility parsing for non-conformant producers.
    pub fn lenient() -> Self {
        Self {
            line_endings: LineEndingMode::Lenient,
            header_folding: true,
            duplicate_headers: DuplicateHeaderPolicy::KeepFirst,
            require_content_disposition: false,
            boundary_validation: BoundaryValidation::Lenient,
            limits: Limits::default(),
        }
    }

    /// Returns `true` when the scanner accepts LF and bare CR line endings.
    pub fn is_lenient(&self) -> bool {
        self.line_endings == LineEndingMode::Lenient
    }

    /// Validates limit values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;

        if limits.max_header_size == 0 {
            return Err(ConfigError::InvalidLimitValue {
                limit: "max_header_size",
            });
        }
        if limits.max_parts == Some(0) {
            return Err(ConfigError::InvalidLimitValue { limit: "max_parts" });
        }
        if limits.max_part_size == Some(0) {
            return Err(ConfigError::InvalidLimitValue {
                limit: "max_part_size",
            });
        }
        if limits.max_total_size == Some(0) {
            return Err(ConfigError::InvalidLimitValue {
                limit: "max_total_size",
            });
        }

        if let (Some(part), Some(total)) = (limits.max_part_size, limits.max_total_size) {
            if part > total {
                return Err(ConfigError::LimitExceedsTotalSize {
                    limit: "max_part_size",
                    value: part,
                    max_total_size: total,
                });
            }
        }

        Ok(())
    }
}

/// Line ending written by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEnding {
    /// `\r\n`
    #[default]
    Crlf,
    /// `\n`; only lenient parsers read this back.
    Lf,
}

impl LineEnding {
    /// Returns the raw bytes of this line ending.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Crlf => b"\r\n",
            Self::Lf => b"\n",
        }
    }
}

/// What the generator does when the boundary occurs in the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Fail with a boundary-collision error so the caller can retry.
    #[default]
    Fail,
    /// Draw fresh random boundaries until one is collision-free.
    Regenerate {
        /// Number of fresh boundaries to try.
        max_attempts: usize,
    },
}

/// Generator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Explicit boundary. A random one is drawn when absent.
    pub boundary: Option<String>,
    /// Line ending written after every line.
    pub line_ending: LineEnding,
    /// Boundary collision handling.
    pub collision_policy: CollisionPolicy,
    /// Whether the final `--boundary--` delimiter is written.
    ///
    /// Disabling it produces deliberately malformed output.
    pub final_terminator: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            boundary: None,
            line_ending: LineEnding::Crlf,
            collision_policy: CollisionPolicy::Fail,
            final_terminator: true,
        }
    }
}

impl GenerateOptions {
    /// Creates default generation options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an explicit boundary.
    pub fn with_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    /// Sets the written line ending.
    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Sets the collision policy.
    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    /// Validates the explicit boundary and the collision policy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(boundary) = &self.boundary {
            boundary::validate_boundary(boundary).map_err(|err| ConfigError::InvalidBoundary {
                reason: err.to_string(),
            })?;
        }

        if self.collision_policy == (CollisionPolicy::Regenerate { max_attempts: 0 }) {
            return Err(ConfigError::ZeroRegenerateAttempts);
        }

        Ok(())
    }

    /// Parser options able to read back what these options generate.
    pub fn matching_parser_options(&self) -> ParserOptions {
        match self.line_ending {
            LineEnding::Crlf => ParserOptions::strict(),
            LineEnding::Lf => ParserOptions {
                line_endings: LineEndingMode::Lenient,
                ..ParserOptions::strict()
            },
        }
    }
}
