use crate::{
    codec::Codec,
    config::{
        BoundaryValidation, CollisionPolicy, DuplicateHeaderPolicy, GenerateOptions, LineEnding,
        LineEndingMode, ParserOptions,
    },
    error::ConfigError,
    limits::Limits,
};

/// Builder for configuring a [`Codec`].
#[derive(Debug, Clone, Default)]
pub struct CodecBuilder {
    parser: ParserOptions,
    generator: GenerateOptions,
}

impl CodecBuilder {
    /// Creates a builder with strict parsing and default generation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the lenient parser preset.
    pub fn lenient() -> Self {
        Self {
            parser: ParserOptions::lenient(),
            generator: GenerateOptions::default(),
        }
    }

    /// Returns the current parser options snapshot.
    pub fn parser_options(&self) -> &ParserOptions {
        &self.parser
    }

    /// Replaces the full parser options.
    pub fn with_parser_options(mut self, options: ParserOptions) -> Self {
        self.parser = options;
        self
    }

    /// Replaces the full generator options.
    pub fn with_generate_options(mut self, options: GenerateOptions) -> Self {
        self.generator = options;
        self
    }

    /// Sets accepted line endings.
    pub fn line_endings(mut self, mode: LineEndingMode) -> Self {
        self.parser.line_endings = mode;
        self
    }

    /// Enables or disables header unfolding.
    pub fn header_folding(mut self, enabled: bool) -> Self {
        self.parser.header_folding = enabled;
        self
    }

    /// Sets the duplicate `Content-Disposition` policy.
    pub fn duplicate_headers(mut self, policy: DuplicateHeaderPolicy) -> Self {
        self.parser.duplicate_headers = policy;
        self
    }

    /// Sets whether every part must carry `Content-Disposition`.
    pub fn require_content_disposition(mut self, required: bool) -> Self {
        self.parser.require_content_disposition = required;
        self
    }

    /// Sets boundary parameter validation.
    pub fn boundary_validation(mut self, validation: BoundaryValidation) -> Self {
        self.parser.boundary_validation = validation;
        self
    }

    /// Sets resource limits.
    pub fn limits(mut self, limits: Limits) -> Self {
        self.parser.limits = limits;
        self
    }

    /// Sets the header block cap.
    pub fn max_header_size(mut self, size: usize) -> Self {
        self.parser.limits.max_header_size = size;
        self
    }

    /// Uses a fixed generation boundary.
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.generator.boundary = Some(boundary.into());
        self
    }

    /// Sets the generated line ending.
    pub fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.generator.line_ending = line_ending;
        self
    }

    /// Sets the boundary collision policy.
    pub fn collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.generator.collision_policy = policy;
        self
    }

    /// Validates builder configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parser.validate()?;
        self.generator.validate()
    }

    /// Finalizes and returns a validated codec.
    pub fn build(self) -> Result<Codec, ConfigError> {
        self.validate()?;
        Ok(Codec::from_parts(self.parser, self.generator))
    }
}
