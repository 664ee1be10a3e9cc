use std::{panic::AssertUnwindSafe, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use http::HeaderMap;
use tokio::{sync::Semaphore, task::JoinSet};

use crate::{
    codec::Codec,
    config::{LineEndingMode, ParserOptions},
    conformance::{
        compare::{Comparison, compare},
        fixture::{ConformanceCase, FixtureParserOptions, GenerationRequest, ValidationMode},
        verdict::{Evaluation, Outcome, Requirement, VerdictRecord, decide},
    },
    generator,
    report::ParseReport,
};

/// Error type implementations may return from [`Implementation::parse`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

const DEFAULT_CONCURRENCY: usize = 8;

/// A multipart parser under test.
///
/// Implementations must tolerate concurrent calls when the harness runs with
/// a concurrency above one.
#[async_trait]
pub trait Implementation: Send + Sync {
    /// Display name.
    fn name(&self) -> &str;

    /// Whether the implementation accepts non-CRLF line endings.
    fn is_lenient(&self) -> bool {
        false
    }

    /// Describes the first fixture setting this implementation cannot honor.
    fn unsupported_option(&self, options: &FixtureParserOptions) -> Option<String> {
        let _ = options;
        None
    }

    /// Parses one body and reports the outcome.
    ///
    /// An `Err` means the implementation itself broke, not that the input was
    /// malformed; malformed input is an `Ok` report with `valid: false`.
    async fn parse(
        &self,
        body: Bytes,
        headers: &HeaderMap,
        options: &FixtureParserOptions,
    ) -> Result<ParseReport, BoxError>;
}

/// This crate's own codec, exposed as an [`Implementation`].
#[derive(Debug, Clone)]
pub struct ReferenceImplementation {
    base: ParserOptions,
}

impl ReferenceImplementation {
    /// RFC-conformant parsing.
    pub fn strict() -> Self {
        Self {
            base: ParserOptions::strict(),
        }
    }

    /// Compatibility parsing.
    pub fn lenient() -> Self {
        Self {
            base: ParserOptions::lenient(),
        }
    }

    /// Uses explicit base options.
    pub fn with_options(base: ParserOptions) -> Self {
        Self { base }
    }

    /// Applies fixture settings on top of the base options.
    pub fn parser_options(&self, fixture: &FixtureParserOptions) -> ParserOptions {
        let mut options = self.base.clone();

        if let Some(strict) = fixture.strict_line_endings {
            options.line_endings = if strict {
                LineEndingMode::Strict
            } else {
                LineEndingMode::Lenient
            };
        }
        if let Some(size) = fixture.max_header_size {
            options.limits.max_header_size = size;
        }
        if let Some(folding) = fixture.allow_header_folding {
            options.header_folding = folding;
        }

        options
    }
}

#[async_trait]
impl Implementation for ReferenceImplementation {
    fn name(&self) -> &str {
        if self.base.is_lenient() {
            "formgauge (lenient)"
        } else {
            "formgauge"
        }
    }

    fn is_lenient(&self) -> bool {
        self.base.is_lenient()
    }

    fn unsupported_option(&self, options: &FixtureParserOptions) -> Option<String> {
        if options.max_header_size == Some(0) {
            return Some("max_header_size must be greater than 0".to_owned());
        }
        options.other.keys().next().cloned()
    }

    async fn parse(
        &self,
        body: Bytes,
        headers: &HeaderMap,
        options: &FixtureParserOptions,
    ) -> Result<ParseReport, BoxError> {
        let codec = Codec::with_options(self.parser_options(options))?;
        Ok(ParseReport::from_result(&codec.parse(&body, headers)))
    }
}

/// Runs fixtures against an [`Implementation`] and produces one verdict per
/// fixture.
#[derive(Debug)]
pub struct Harness<I> {
    implementation: Arc<I>,
    concurrency: usize,
}

impl<I> Harness<I>
where
    I: Implementation + 'static,
{
    /// Creates a harness with the default concurrency.
    pub fn new(implementation: I) -> Self {
        Self {
            implementation: Arc::new(implementation),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Sets how many cases run at once. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// The implementation under test.
    pub fn implementation(&self) -> &I {
        &self.implementation
    }

    /// Runs one parse fixture.
    pub async fn run_case(&self, case: &ConformanceCase) -> VerdictRecord {
        evaluate_case(self.implementation.as_ref(), case).await
    }

    /// Runs every fixture concurrently. Verdicts come back in input order.
    ///
    /// A panicking or failing case yields a verdict for that case only.
    pub async fn run(&self, cases: Vec<ConformanceCase>) -> Vec<VerdictRecord> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let identities: Vec<(String, Requirement)> = cases
            .iter()
            .map(|case| {
                (
                    case.id().to_owned(),
                    Requirement::from_optional(case.descriptor.is_optional()),
                )
            })
            .collect();

        let mut tasks = JoinSet::new();
        for (index, case) in cases.into_iter().enumerate() {
            let implementation = Arc::clone(&self.implementation);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let outcome = AssertUnwindSafe(evaluate_case(implementation.as_ref(), &case))
                    .catch_unwind()
                    .await;
                (index, outcome.map_err(|panic| panic_message(panic.as_ref())))
            });
        }

        let mut records: Vec<Option<VerdictRecord>> = vec![None; identities.len()];
        while let Some(joined) = tasks.join_next().await {
            let Ok((index, outcome)) = joined else {
                continue;
            };
            let record = outcome.unwrap_or_else(|message| {
                let (test_id, requirement) = &identities[index];
                crashed(test_id, *requirement, message)
            });
            records[index] = Some(record);
        }

        records
            .into_iter()
            .zip(identities)
            .map(|(record, (test_id, requirement))| {
                record.unwrap_or_else(|| crashed(&test_id, requirement, "task aborted".to_owned()))
            })
            .collect()
    }

    /// Generates a request's message and, for round-trip validation, has the
    /// implementation parse it back.
    pub async fn run_generation(&self, request: &GenerationRequest) -> VerdictRecord {
        let requirement = Requirement::from_optional(request.is_optional());
        let crash = |reason: String| crashed(&request.id, requirement, reason);

        let message = match request.to_message() {
            Ok(message) => message,
            Err(err) => return crash(err.to_string()),
        };
        let generated = match generator::generate(&message, &request.generate_options()) {
            Ok(generated) => generated,
            Err(err) => return crash(err.to_string()),
        };

        if let Some(allowed) = &request.constraints.boundary_chars {
            if let Some(bad) = generated.boundary.chars().find(|ch| !allowed.contains(*ch)) {
                return crash(format!("boundary uses disallowed character {bad:?}"));
            }
        }

        let outcome = match request.validation {
            ValidationMode::None => Outcome::Compared(Comparison::matched()),
            ValidationMode::RoundTrip => {
                let mut headers = HeaderMap::new();
                let content_type = match generated.content_type.parse::<http::HeaderValue>() {
                    Ok(value) => value,
                    Err(err) => return crash(format!("generated Content-Type: {err}")),
                };
                headers.insert(http::header::CONTENT_TYPE, content_type);

                let options = FixtureParserOptions {
                    strict_line_endings: Some(
                        request.generate_options().matching_parser_options().line_endings
                            == LineEndingMode::Strict,
                    ),
                    ..FixtureParserOptions::default()
                };

                if let Some(option) = self.implementation.unsupported_option(&options) {
                    return decide(&Evaluation {
                        test_id: request.id.clone(),
                        requirement,
                        unsupported: Some(option),
                        outcome: Outcome::NotRun,
                    });
                }

                match self
                    .implementation
                    .parse(generated.body.clone(), &headers, &options)
                    .await
                {
                    Ok(report) => Outcome::Compared(compare(&request.expected(), &report)),
                    Err(err) => Outcome::Crashed(err.to_string()),
                }
            }
        };

        decide(&Evaluation {
            test_id: request.id.clone(),
            requirement,
            unsupported: None,
            outcome,
        })
    }
}

async fn evaluate_case<I>(implementation: &I, case: &ConformanceCase) -> VerdictRecord
where
    I: Implementation + ?Sized,
{
    let descriptor = &case.descriptor;
    let requirement = Requirement::from_optional(descriptor.is_optional());

    let unsupported = if descriptor.is_lenient_only() && !implementation.is_lenient() {
        Some("lenient parsing".to_owned())
    } else {
        implementation.unsupported_option(&descriptor.parser_options)
    };

    let outcome = if unsupported.is_some() {
        Outcome::NotRun
    } else {
        match implementation
            .parse(case.body.clone(), &case.headers, &descriptor.parser_options)
            .await
        {
            Ok(report) => Outcome::Compared(compare(
                descriptor.expected_for(implementation.is_lenient()),
                &report,
            )),
            Err(err) => Outcome::Crashed(err.to_string()),
        }
    };

    decide(&Evaluation {
        test_id: descriptor.id.clone(),
        requirement,
        unsupported,
        outcome,
    })
}

fn crashed(test_id: &str, requirement: Requirement, reason: String) -> VerdictRecord {
    #[cfg(feature = "tracing")]
    tracing::warn!(test_id, %reason, "conformance case crashed");

    decide(&Evaluation {
        test_id: test_id.to_owned(),
        requirement,
        unsupported: None,
        outcome: Outcome::Crashed(reason),
    })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        return (*message).to_owned();
    }
    if let Some(message) = panic.downcast_ref::<String>() {
        return message.clone();
    }
    "panic".to_owned()
}
