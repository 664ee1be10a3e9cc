use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use http::HeaderMap;

use crate::{
    builder::CodecBuilder,
    config::{GenerateOptions, ParserOptions},
    error::{ConfigError, Error, GenerateError, ParseError},
    generator::{self, Generated},
    parser::{
        boundary::extract_boundary,
        scanner::{ScanTail, Scanner},
        stream::MultipartStream,
    },
    part::Message,
};

/// Parse and generate entry point holding validated options.
#[derive(Debug, Clone, Default)]
pub struct Codec {
    parser: ParserOptions,
    generator: GenerateOptions,
}

impl Codec {
    /// Creates a codec with strict parsing and default generation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a codec with explicit, validated parser options.
    pub fn with_options(parser: ParserOptions) -> Result<Self, ConfigError> {
        parser.validate()?;
        Ok(Self {
            parser,
            generator: GenerateOptions::default(),
        })
    }

    pub(crate) fn from_parts(parser: ParserOptions, generator: GenerateOptions) -> Self {
        Self { parser, generator }
    }

    /// Creates a fluent builder.
    pub fn builder() -> CodecBuilder {
        CodecBuilder::default()
    }

    /// Active parser options.
    pub fn parser_options(&self) -> &ParserOptions {
        &self.parser
    }

    /// Active generator options.
    pub fn generate_options(&self) -> &GenerateOptions {
        &self.generator
    }

    /// Parses `body` using the boundary from the `Content-Type` header.
    pub fn parse(&self, body: &[u8], headers: &HeaderMap) -> Result<Message, ParseError> {
        self.parse_with_content_type(body, content_type(headers)?)
    }

    /// Parses `body` using the boundary from a `Content-Type` value.
    pub fn parse_with_content_type(
        &self,
        body: &[u8],
        content_type: &str,
    ) -> Result<Message, ParseError> {
        let boundary = extract_boundary(content_type, self.parser.boundary_validation)?;
        self.parse_with_boundary(body, &boundary)
    }

    /// Parses `body` with an already extracted boundary.
    ///
    /// Either every part is returned or none is.
    pub fn parse_with_boundary(&self, body: &[u8], boundary: &str) -> Result<Message, ParseError> {
        let mut scanner = Scanner::new(boundary, self.parser.clone())?;
        let mut parts = scanner.feed(body)?;
        let ScanTail {
            parts: rest,
            preamble,
            epilogue,
        } = scanner.finish()?;
        parts.extend(rest);

        Ok(Message {
            parts,
            preamble,
            epilogue,
        })
    }

    /// Wraps a chunk stream in an incremental part stream.
    pub fn parse_stream<S>(
        &self,
        stream: S,
        content_type: &str,
    ) -> Result<MultipartStream<S>, ParseError> {
        let boundary = extract_boundary(content_type, self.parser.boundary_validation)?;
        MultipartStream::new(boundary, stream, self.parser.clone())
    }

    /// Reads a whole chunk stream into a message.
    pub async fn parse_stream_to_message<S, E>(
        &self,
        stream: S,
        content_type: &str,
    ) -> Result<Message, Error>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let mut parts = self.parse_stream(stream, content_type)?;
        let mut message = Message::new();
        while let Some(part) = parts.try_next().await? {
            message.parts.push(part);
        }
        message.preamble = parts.preamble().cloned();
        message.epilogue = parts.epilogue().cloned();
        Ok(message)
    }

    /// Serializes `message` with this codec's generator options.
    pub fn generate(&self, message: &Message) -> Result<Generated, GenerateError> {
        generator::generate(message, &self.generator)
    }

    /// Serializes `message` with explicit generator options.
    pub fn generate_with(
        &self,
        message: &Message,
        options: &GenerateOptions,
    ) -> Result<Generated, GenerateError> {
        generator::generate(message, options)
    }
}

fn content_type(headers: &HeaderMap) -> Result<&str, ParseError> {
    headers
        .get(http::header::CONTENT_TYPE)
        .ok_or_else(|| ParseError::new("missing Content-Type header"))?
        .to_str()
        .map_err(|_| ParseError::new("Content-Type header is not visible ASCII"))
}
