#![allow(missing_docs)]

use formgauge::conformance::{
    Comparison, Evaluation, Mismatch, Outcome, Requirement, Status, Summary, Validity,
    VerdictRecord, decide, verdict::RULES,
};

fn evaluation(requirement: Requirement, outcome: Outcome) -> Evaluation {
    Evaluation {
        test_id: "case-001".to_owned(),
        requirement,
        unsupported: None,
        outcome,
    }
}

fn mismatched() -> Comparison {
    Comparison {
        validity: Validity::Match,
        mismatches: vec![Mismatch {
            part: Some(0),
            field: "name",
            expected: "\"a\"".to_owned(),
            actual: "\"b\"".to_owned(),
        }],
        advisories: Vec::new(),
    }
}

#[test]
fn rules_are_ordered() {
    let names: Vec<&str> = RULES.iter().map(|(name, _)| *name).collect();
    assert_eq!(
        names,
        ["option_unsupported", "lenient_success", "clean_match", "mismatch"]
    );
}

#[test]
fn clean_match_passes() {
    let record = decide(&evaluation(
        Requirement::Required,
        Outcome::Compared(Comparison::matched()),
    ));
    assert_eq!(
        record,
        VerdictRecord {
            test_id: "case-001".to_owned(),
            status: Status::Passed,
            reason: "ok".to_owned(),
        }
    );
}

#[test]
fn advisories_are_kept_in_the_reason() {
    let mut comparison = Comparison::matched();
    comparison
        .advisories
        .push("error_type differs: expected truncated, got missing_terminator".to_owned());

    let record = decide(&evaluation(Requirement::Required, Outcome::Compared(comparison)));
    assert_eq!(record.status, Status::Passed);
    assert!(record.reason.starts_with("ok ("));
}

#[test]
fn required_mismatch_fails_and_optional_mismatch_skips() {
    let required = decide(&evaluation(
        Requirement::Required,
        Outcome::Compared(mismatched()),
    ));
    assert_eq!(required.status, Status::Failed);
    assert_eq!(required.reason, "part 0: name mismatch - expected \"a\", got \"b\"");

    let optional = decide(&evaluation(
        Requirement::Optional,
        Outcome::Compared(mismatched()),
    ));
    assert_eq!(optional.status, Status::Skipped);
    assert_eq!(optional.reason, required.reason);
}

#[test]
fn optional_never_upgrades_to_pass() {
    let record = decide(&evaluation(
        Requirement::Optional,
        Outcome::Compared(Comparison {
            validity: Validity::UnexpectedFailure,
            mismatches: Vec::new(),
            advisories: Vec::new(),
        }),
    ));
    assert_eq!(record.status, Status::Skipped);
}

#[test]
fn lenient_success_is_skipped_even_when_required() {
    let record = decide(&evaluation(
        Requirement::Required,
        Outcome::Compared(Comparison {
            validity: Validity::LenientSuccess,
            mismatches: Vec::new(),
            advisories: Vec::new(),
        }),
    ));
    assert_eq!(record.status, Status::Skipped);
    assert_eq!(record.reason, "lenient parsing");
}

#[test]
fn unsupported_option_wins_over_everything() {
    let mut input = evaluation(Requirement::Required, Outcome::Compared(mismatched()));
    input.unsupported = Some("max_header_size".to_owned());

    let record = decide(&input);
    assert_eq!(record.status, Status::Skipped);
    assert_eq!(record.reason, "option unsupported: max_header_size");
}

#[test]
fn crashes_fail_required_tests() {
    let record = decide(&evaluation(
        Requirement::Required,
        Outcome::Crashed("boom".to_owned()),
    ));
    assert_eq!(record.status, Status::Failed);
    assert_eq!(record.reason, "implementation crashed: boom");

    let record = decide(&evaluation(Requirement::Required, Outcome::NotRun));
    assert_eq!(record.status, Status::Failed);
}

#[test]
fn summary_counts_each_status() {
    let records = [
        (Status::Passed, "ok"),
        (Status::Passed, "ok"),
        (Status::Skipped, "lenient parsing"),
        (Status::Failed, "name mismatch"),
    ]
    .map(|(status, reason)| VerdictRecord {
        test_id: "t".to_owned(),
        status,
        reason: reason.to_owned(),
    });

    let summary = Summary::from_records(&records);
    assert_eq!(
        summary,
        Summary {
            total: 4,
            passed: 2,
            failed: 1,
            skipped: 1,
        }
    );
    assert!(!summary.is_success());
    assert!(Summary::from_records(&records[..3]).is_success());
}

#[test]
fn verdicts_serialize_with_snake_case_status() {
    let record = VerdictRecord {
        test_id: "t".to_owned(),
        status: Status::Skipped,
        reason: "lenient parsing".to_owned(),
    };
    let json = serde_json::to_value(&record).expect("record should serialize");
    assert_eq!(json["status"], "skipped");
}
