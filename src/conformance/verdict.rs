use serde::{Deserialize, Serialize};

use crate::conformance::compare::{Comparison, Validity};

/// Final classification of one test execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The implementation behaved as expected.
    Passed,
    /// A required test did not behave as expected.
    Failed,
    /// The test did not apply, or an optional test did not match.
    Skipped,
}

/// Whether a mismatch fails the run or only skips the test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requirement {
    /// Mismatches fail the test. The default for untagged tests.
    #[default]
    Required,
    /// Mismatches downgrade to a skip.
    Optional,
}

impl Requirement {
    /// `Optional` when `optional` is `true`.
    pub fn from_optional(optional: bool) -> Self {
        if optional {
            Self::Optional
        } else {
            Self::Required
        }
    }
}

/// One verdict per test execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictRecord {
    /// Test identifier.
    pub test_id: String,
    /// Outcome.
    pub status: Status,
    /// Why this status was chosen.
    pub reason: String,
}

/// What happened when the test was executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The implementation was not invoked.
    NotRun,
    /// The implementation answered and was compared.
    Compared(Comparison),
    /// The implementation errored or panicked.
    Crashed(String),
}

/// Inputs to the verdict rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Test identifier.
    pub test_id: String,
    /// Required or optional.
    pub requirement: Requirement,
    /// Set when the implementation cannot honor a parser setting the test needs.
    pub unsupported: Option<String>,
    /// Execution outcome.
    pub outcome: Outcome,
}

type Rule = fn(&Evaluation) -> Option<(Status, String)>;

/// Verdict rules, applied in order; the first that matches decides.
///
/// `Optional` only ever turns a failure into a skip; it never turns a
/// mismatch into a pass.
pub const RULES: [(&str, Rule); 4] = [
    ("option_unsupported", option_unsupported),
    ("lenient_success", lenient_success),
    ("clean_match", clean_match),
    ("mismatch", mismatch),
];

/// Applies [`RULES`] to `evaluation`.
pub fn decide(evaluation: &Evaluation) -> VerdictRecord {
    let (_rule, (status, reason)) = RULES
        .iter()
        .find_map(|(name, rule)| rule(evaluation).map(|verdict| (*name, verdict)))
        .unwrap_or(("mismatch", (Status::Failed, "no rule matched".to_owned())));

    #[cfg(feature = "tracing")]
    tracing::debug!(test_id = %evaluation.test_id, ?status, rule = _rule, %reason, "verdict");

    VerdictRecord {
        test_id: evaluation.test_id.clone(),
        status,
        reason,
    }
}

fn option_unsupported(evaluation: &Evaluation) -> Option<(Status, String)> {
    let option = evaluation.unsupported.as_deref()?;
    Some((Status::Skipped, format!("option unsupported: {option}")))
}

fn lenient_success(evaluation: &Evaluation) -> Option<(Status, String)> {
    match &evaluation.outcome {
        Outcome::Compared(comparison) if comparison.validity == Validity::LenientSuccess => {
            Some((Status::Skipped, "lenient parsing".to_owned()))
        }
        _ => None,
    }
}

fn clean_match(evaluation: &Evaluation) -> Option<(Status, String)> {
    match &evaluation.outcome {
        Outcome::Compared(comparison) if comparison.is_clean() => {
            let reason = match comparison.advisories.as_slice() {
                [] => "ok".to_owned(),
                advisories => format!("ok ({})", advisories.join("; ")),
            };
            Some((Status::Passed, reason))
        }
        _ => None,
    }
}

fn mismatch(evaluation: &Evaluation) -> Option<(Status, String)> {
    let detail = match &evaluation.outcome {
        Outcome::NotRun => "test was not executed".to_owned(),
        Outcome::Compared(comparison) => comparison.describe(),
        Outcome::Crashed(reason) => format!("implementation crashed: {reason}"),
    };

    let status = match evaluation.requirement {
        Requirement::Required => Status::Failed,
        Requirement::Optional => Status::Skipped,
    };
    Some((status, detail))
}

/// Counts of verdicts over a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    /// Number of verdicts.
    pub total: usize,
    /// Passed verdicts.
    pub passed: usize,
    /// Failed verdicts.
    pub failed: usize,
    /// Skipped verdicts.
    pub skipped: usize,
}

impl Summary {
    /// Tallies `records`.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a VerdictRecord>) -> Self {
        records.into_iter().fold(Self::default(), |mut summary, record| {
            summary.total += 1;
            match record.status {
                Status::Passed => summary.passed += 1,
                Status::Failed => summary.failed += 1,
                Status::Skipped => summary.skipped += 1,
            }
            summary
        })
    }

    /// Returns `true` when nothing failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}
