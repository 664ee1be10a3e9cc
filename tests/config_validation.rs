#![allow(missing_docs)]

use formgauge::{
    Codec, CollisionPolicy, ConfigError, GenerateOptions, LineEnding, LineEndingMode, Limits,
    ParserOptions,
};

#[test]
fn default_parser_options_are_strict() {
    let options = ParserOptions::default();
    assert_eq!(options, ParserOptions::strict());
    assert!(!options.is_lenient());
    assert!(options.require_content_disposition);
    assert!(!options.header_folding);
    assert!(options.validate().is_ok());
}

#[test]
fn lenient_preset_relaxes_line_endings_and_headers() {
    let options = ParserOptions::lenient();
    assert!(options.is_lenient());
    assert!(options.header_folding);
    assert!(!options.require_content_disposition);
    assert!(options.validate().is_ok());
}

#[test]
fn rejects_zero_header_size() {
    let options = ParserOptions {
        limits: Limits::new().with_max_header_size(0),
        ..ParserOptions::default()
    };

    let result = options.validate();
    assert!(matches!(
        result,
        Err(ConfigError::InvalidLimitValue {
            limit: "max_header_size"
        })
    ));
    assert!(Codec::with_options(options).is_err());
}

#[test]
fn rejects_invalid_numeric_limit_values() {
    for (limits, name) in [
        (Limits::new().with_max_parts(0), "max_parts"),
        (Limits::new().with_max_part_size(0), "max_part_size"),
        (Limits::new().with_max_total_size(0), "max_total_size"),
    ] {
        let options = ParserOptions {
            limits,
            ..ParserOptions::default()
        };
        assert_eq!(
            options.validate(),
            Err(ConfigError::InvalidLimitValue { limit: name })
        );
    }
}

#[test]
fn rejects_part_limit_above_total_limit() {
    let options = ParserOptions {
        limits: Limits::new()
            .with_max_part_size(2048)
            .with_max_total_size(1024),
        ..ParserOptions::default()
    };

    let err = options.validate().expect_err("must fail");
    assert!(matches!(
        err,
        ConfigError::LimitExceedsTotalSize {
            value: 2048,
            max_total_size: 1024,
            ..
        }
    ));
    assert_err_contains(&err.to_string(), "cannot exceed `max_total_size`");
}

#[test]
fn generate_options_validate_explicit_boundary() {
    let options = GenerateOptions::new().with_boundary("not valid!");
    let err = options.validate().expect_err("must fail");
    assert!(matches!(err, ConfigError::InvalidBoundary { .. }));
    assert_err_contains(&err.to_string(), "invalid characters");

    assert!(GenerateOptions::new().with_boundary("ok-boundary").validate().is_ok());
}

#[test]
fn regenerate_policy_needs_attempts() {
    let options =
        GenerateOptions::new().with_collision_policy(CollisionPolicy::Regenerate { max_attempts: 0 });
    assert_eq!(options.validate(), Err(ConfigError::ZeroRegenerateAttempts));
}

#[test]
fn matching_parser_options_follow_line_ending() {
    let crlf = GenerateOptions::new().matching_parser_options();
    assert_eq!(crlf, ParserOptions::strict());

    let lf = GenerateOptions::new()
        .with_line_ending(LineEnding::Lf)
        .matching_parser_options();
    assert_eq!(lf.line_endings, LineEndingMode::Lenient);
    assert!(lf.require_content_disposition);
}

#[test]
fn options_deserialize_with_defaults() {
    let options: ParserOptions =
        serde_json::from_str(r#"{"line_endings": "lenient", "limits": {"max_parts": 10}}"#)
            .expect("options should deserialize");
    assert_eq!(options.line_endings, LineEndingMode::Lenient);
    assert_eq!(options.limits.max_parts, Some(10));
    assert_eq!(options.limits.max_header_size, Limits::default().max_header_size);
    assert!(!options.header_folding);

    let generate: GenerateOptions = serde_json::from_str(
        r#"{"line_ending": "lf", "collision_policy": {"regenerate": {"max_attempts": 4}}}"#,
    )
    .expect("options should deserialize");
    assert_eq!(generate.line_ending, LineEnding::Lf);
    assert_eq!(
        generate.collision_policy,
        CollisionPolicy::Regenerate { max_attempts: 4 }
    );
    assert!(generate.final_terminator);
}

fn assert_err_contains(actual: &str, expected_fragment: &str) {
    assert!(
        actual.contains(expected_fragment),
        "expected `{actual}` to contain `{expected_fragment}`"
    );
}
