use std::borrow::Cow;

use bytes::{BufMut, Bytes, BytesMut};
use http::HeaderName;
use memchr::memmem;
use uuid::Uuid;

use crate::{
    config::{CollisionPolicy, GenerateOptions, LineEnding},
    error::GenerateError,
    parser::{
        boundary::validate_boundary,
        headers::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    part::{Message, Part},
};

const BOUNDARY_PREFIX: &str = "----formgauge-";
const TSPECIALS: &[char] = &[
    ' ', '(', ')', '<', '>', '@', ',', ';', ':', '\\', '"', '/', '[', ']', '?', '=',
];

type WireHeaders<'a> = Vec<(&'a str, Cow<'a, str>)>;

/// Serialized multipart body together with the boundary it uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    /// Boundary used in the body.
    pub boundary: String,
    /// Transport `Content-Type` value carrying the boundary.
    pub content_type: String,
    /// Serialized body.
    pub body: Bytes,
}

/// Returns a fresh random boundary.
pub fn random_boundary() -> String {
    format!("{BOUNDARY_PREFIX}{}", Uuid::new_v4().simple())
}

/// Builds the transport `Content-Type` value for `boundary`, quoting it when
/// it contains characters outside the token grammar.
pub fn content_type_for(boundary: &str) -> String {
    if boundary.contains(TSPECIALS) {
        format!("multipart/form-data; boundary=\"{boundary}\"")
    } else {
        format!("multipart/form-data; boundary={boundary}")
    }
}

/// Serializes `message` as `multipart/form-data`.
///
/// `Content-Disposition` and `Content-Type` are written from the typed part
/// fields. No header may span lines or carry surrounding whitespace, and with
/// LF output no body or preamble may end in CR. A boundary that occurs in any
/// body, the preamble, or the epilogue is handled per [`CollisionPolicy`].
pub fn generate(message: &Message, options: &GenerateOptions) -> Result<Generated, GenerateError> {
    let mut part_headers = Vec::with_capacity(message.parts.len());
    for (index, part) in message.parts.iter().enumerate() {
        let headers = wire_headers(part);
        check_part(index, part, &headers, options.line_ending)?;
        part_headers.push(headers);
    }

    if options.line_ending == LineEnding::Lf
        && message
            .preamble
            .as_ref()
            .is_some_and(|preamble| preamble.ends_with(b"\r"))
    {
        return Err(GenerateError::InvalidPreamble {
            reason: "preamble ends with CR, which LF output cannot delimit".to_owned(),
        });
    }

    let boundary = choose_boundary(message, options)?;
    let body = write_message(message, &part_headers, &boundary, options);

    Ok(Generated {
        content_type: content_type_for(&boundary),
        boundary,
        body,
    })
}

fn choose_boundary(message: &Message, options: &GenerateOptions) -> Result<String, GenerateError> {
    let first = match &options.boundary {
        Some(boundary) => {
            validate_boundary(boundary).map_err(|err| GenerateError::InvalidBoundary {
                reason: err.to_string(),
            })?;
            boundary.clone()
        }
        None => random_boundary(),
    };

    if !collides(message, &first) {
        return Ok(first);
    }

    let CollisionPolicy::Regenerate { max_attempts } = options.collision_policy else {
        return Err(GenerateError::BoundaryCollision { boundary: first });
    };

    for _attempt in 1..=max_attempts {
        let candidate = random_boundary();
        #[cfg(feature = "tracing")]
        tracing::debug!(
            attempt = _attempt,
            boundary = %candidate,
            "regenerating colliding boundary"
        );

        if !collides(message, &candidate) {
            return Ok(candidate);
        }
    }

    Err(GenerateError::CollisionRetriesExhausted {
        attempts: max_attempts,
    })
}

fn collides(message: &Message, boundary: &str) -> bool {
    let finder = memmem::Finder::new(boundary.as_bytes());
    let mut regions = message
        .parts
        .iter()
        .map(|part| &part.body[..])
        .chain(message.preamble.as_deref())
        .chain(message.epilogue.as_deref());

    regions.any(|region| finder.find(region).is_some())
}

// The headers put on the wire for `part`. The first `Content-Disposition`
// keeps its wording only when it still names the typed fields; the first
// `Content-Type` always carries `part.content_type` and is dropped without one.
fn wire_headers(part: &Part) -> WireHeaders<'_> {
    let mut headers: WireHeaders<'_> = Vec::with_capacity(part.headers.len() + 2);
    let mut has_disposition = false;
    let mut has_content_type = false;

    for entry in &part.headers {
        match entry.key() {
            "content-disposition" if !has_disposition => {
                has_disposition = true;
                let value = if part.disposition_agrees(entry.value()) {
                    Cow::Borrowed(entry.value())
                } else {
                    Cow::Owned(part.disposition_value())
                };
                headers.push((entry.name(), value));
            }
            "content-type" if !has_content_type => {
                let Some(content_type) = &part.content_type else {
                    continue;
                };
                has_content_type = true;
                headers.push((entry.name(), Cow::Borrowed(content_type.as_str())));
            }
            _ => headers.push((entry.name(), Cow::Borrowed(entry.value()))),
        }
    }

    if !has_disposition {
        headers.insert(0, (CONTENT_DISPOSITION, Cow::Owned(part.disposition_value())));
    }
    if let (false, Some(content_type)) = (has_content_type, &part.content_type) {
        headers.push((CONTENT_TYPE, Cow::Borrowed(content_type.as_str())));
    }

    headers
}

fn check_part(
    index: usize,
    part: &Part,
    headers: &[(&str, Cow<'_, str>)],
    line_ending: LineEnding,
) -> Result<(), GenerateError> {
    let invalid = |reason: String| GenerateError::InvalidPart { index, reason };

    for (name, value) in headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| invalid(format!("`{name}` is not a valid header name")))?;
        if value.contains(['\r', '\n']) {
            return Err(invalid(format!("header `{name}` spans lines")));
        }
        if value.starts_with([' ', '\t']) || value.ends_with([' ', '\t']) {
            return Err(invalid(format!(
                "header `{name}` has leading or trailing whitespace"
            )));
        }
    }

    if line_ending == LineEnding::Lf && part.body.ends_with(b"\r") {
        return Err(invalid(
            "body ends with CR, which LF output cannot delimit".to_owned(),
        ));
    }

    Ok(())
}

fn write_message(
    message: &Message,
    part_headers: &[WireHeaders<'_>],
    boundary: &str,
    options: &GenerateOptions,
) -> Bytes {
    let line_ending = options.line_ending.as_bytes();
    let body_len: usize = message.parts.iter().map(|part| part.body.len()).sum();
    let mut out = BytesMut::with_capacity(body_len + 256 * (message.parts.len() + 1));

    if let Some(preamble) = &message.preamble {
        out.put_slice(preamble);
        out.put_slice(line_ending);
    }

    for (part, headers) in message.parts.iter().zip(part_headers) {
        put_delimiter(&mut out, boundary);
        out.put_slice(line_ending);

        for (name, value) in headers {
            out.put_slice(name.as_bytes());
            out.put_slice(b": ");
            out.put_slice(value.as_bytes());
            out.put_slice(line_ending);
        }
        out.put_slice(line_ending);
        out.put_slice(&part.body);
        out.put_slice(line_ending);
    }

    if options.final_terminator {
        put_delimiter(&mut out, boundary);
        out.put_slice(b"--");
        out.put_slice(line_ending);

        if let Some(epilogue) = &message.epilogue {
            out.put_slice(epilogue);
        }
    }

    out.freeze()
}

fn put_delimiter(out: &mut BytesMut, boundary: &str) {
    out.put_slice(b"--");
    out.put_slice(boundary.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_boundaries_are_valid_and_distinct() {
        let first = random_boundary();
        let second = random_boundary();
        assert!(validate_boundary(&first).is_ok());
        assert!(first.starts_with(BOUNDARY_PREFIX));
        assert_ne!(first, second);
    }

    #[test]
    fn content_type_quotes_boundaries_with_separators() {
        assert_eq!(
            content_type_for("abc-123"),
            "multipart/form-data; boundary=abc-123"
        );
        assert_eq!(
            content_type_for("a b=c"),
            "multipart/form-data; boundary=\"a b=c\""
        );
    }

    #[test]
    fn collision_scan_covers_preamble_and_epilogue() {
        let message = Message::new()
            .with_part(Part::new("a").with_body("plain"))
            .with_epilogue("trailer --XYZ");
        assert!(collides(&message, "XYZ"));
        assert!(!collides(&message, "QRS"));
    }
}
