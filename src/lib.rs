#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Streaming `multipart/form-data` codec with a conformance comparator.
//!
//! The [`Codec`] parses a body into a [`Message`] (or exactly one
//! [`ParseError`]) and generates bodies that parse back to the same message.
//! The [`conformance`] module scores any parser's structured output against
//! fixture expectations and turns it into passed, failed, or skipped verdicts.

/// Fluent builder API.
pub mod builder;
/// Parse and generate entry point.
pub mod codec;
/// Parser and generator configuration.
pub mod config;
/// Comparator, verdict engine, and harness.
pub mod conformance;
/// Error types exposed by this crate.
pub mod error;
/// Message serialization.
pub mod generator;
/// Parser resource limits.
pub mod limits;
/// Low-level parser components.
pub mod parser;
/// Parsed part and message types.
pub mod part;
/// Structured parse reports.
pub mod report;

pub use builder::CodecBuilder;
pub use codec::Codec;
pub use config::{
    BoundaryValidation, CollisionPolicy, DuplicateHeaderPolicy, GenerateOptions, LineEnding,
    LineEndingMode, ParserOptions,
};
pub use error::{ConfigError, Error, ErrorKind, GenerateError, ParseError};
pub use generator::Generated;
pub use limits::Limits;
pub use part::{HeaderEntry, Message, Part, PartHeaders};
pub use report::{ParseReport, ReportedPart};

/// Parses `body` strictly, taking the boundary from `content_type`.
pub fn parse(body: &[u8], content_type: &str) -> Result<Message, ParseError> {
    Codec::new().parse_with_content_type(body, content_type)
}

/// Generates `message` with a random boundary and CRLF line endings.
pub fn generate(message: &Message) -> Result<Generated, GenerateError> {
    Codec::new().generate(message)
}
