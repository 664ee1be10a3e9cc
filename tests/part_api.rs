#![allow(missing_docs)]

use bytes::Bytes;
use formgauge::{ErrorKind, Message, ParseError, ParseReport, Part, PartHeaders, ReportedPart};

#[test]
fn part_builders_keep_disposition_header_in_sync() {
    let part = Part::new("upload")
        .with_filename("a \"quoted\" name.txt")
        .with_content_type("text/plain")
        .with_body("data");

    assert_eq!(
        part.headers.get("content-disposition"),
        Some("form-data; name=\"upload\"; filename=\"a \\\"quoted\\\" name.txt\"")
    );
    assert_eq!(part.headers.get("CONTENT-TYPE"), Some("text/plain"));
    assert_eq!(part.headers.len(), 2);
    assert_eq!(part.body_text(), Some("data"));
    assert!(part.is_file());
}

#[test]
fn mime_and_charset_come_from_content_type() {
    let part = Part::new("t").with_content_type("text/html; charset=\"ISO-8859-1\"");
    let mime = part.mime().expect("content type should parse");
    assert_eq!(mime.essence_str(), "text/html");
    assert_eq!(part.charset().as_deref(), Some("ISO-8859-1"));

    assert_eq!(Part::new("plain").mime(), None);
    assert_eq!(Part::new("plain").charset(), None);
}

#[test]
fn headers_are_case_insensitive_and_ordered() {
    let mut headers = PartHeaders::new();
    headers.push("X-Trace", "1");
    headers.push("x-trace", "2");
    headers.push("Content-Type", "text/plain");

    let traces: Vec<&str> = headers.get_all("X-TRACE").collect();
    assert_eq!(traces, ["1", "2"]);
    assert_eq!(headers.count("x-trace"), 2);

    headers.set("X-Trace", "3");
    assert_eq!(headers.get("x-trace"), Some("3"));
    assert_eq!(headers.count("x-trace"), 2);

    headers.remove("X-TRACE");
    assert_eq!(headers.len(), 1);
    let names: Vec<&str> = headers.iter().map(|entry| entry.name()).collect();
    assert_eq!(names, ["Content-Type"]);
}

#[test]
fn empty_epilogue_is_absent() {
    let message = Message::new().with_epilogue(Bytes::new());
    assert_eq!(message.epilogue, None);
    assert!(message.is_empty());
}

#[test]
fn report_keeps_empty_filename_when_parameter_is_present() {
    let reported = ReportedPart::from_part(&Part::new("f").with_filename(""));
    assert_eq!(reported.filename.as_deref(), Some(""));

    let json = serde_json::to_value(&reported).expect("part should serialize");
    assert_eq!(json["filename"], "");
}

#[test]
fn report_prefers_decoded_filename_star() {
    let part = Part::new("f")
        .with_filename("fallback.txt")
        .with_filename_star("naïve.txt");
    let reported = ReportedPart::from_part(&part);

    assert_eq!(reported.filename.as_deref(), Some("naïve.txt"));
    assert_eq!(reported.filename_star.as_deref(), Some("naïve.txt"));
}

#[test]
fn failed_parse_reports_tag_and_no_parts() {
    let report = ParseReport::from_result(&Err(ParseError::MissingTerminator));
    assert!(!report.valid);
    assert_eq!(report.error_type, Some(ErrorKind::MissingTerminator));
    assert!(report.parts().is_empty());

    let json = serde_json::to_value(&report).expect("report should serialize");
    assert_eq!(json["error_type"], "missing_terminator");
    assert!(json.get("parts").is_none());
}

#[test]
fn successful_parse_reports_every_part() {
    let message = Message::new()
        .with_part(Part::new("a").with_body("x"))
        .with_part(Part::new("b").with_body(vec![0xde, 0xad]));

    let report = ParseReport::from_result(&Ok(message));
    assert!(report.valid);
    assert_eq!(report.parts().len(), 2);
    assert_eq!(report.parts()[1].body_base64.as_deref(), Some("3q0="));
    assert_eq!(report.parts()[1].body_size, 2);
}
