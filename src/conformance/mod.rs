/// Structural comparison of reports against expectations.
pub mod compare;
/// Fixture descriptors and generation requests.
pub mod fixture;
/// Concurrent execution of fixtures against an implementation.
pub mod harness;
/// Ordered verdict rules and run summaries.
pub mod verdict;

pub use compare::{Comparison, Mismatch, Validity, compare};
pub use fixture::{
    ConformanceCase, ExpectedPart, ExpectedResult, FixtureError, FixtureParserOptions,
    GenerationConstraints, GenerationPart, GenerationRequest, TestDescriptor, ValidationMode,
};
pub use harness::{BoxError, Harness, Implementation, ReferenceImplementation};
pub use verdict::{Evaluation, Outcome, Requirement, Status, Summary, VerdictRecord, decide};
