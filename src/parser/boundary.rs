use crate::{config::BoundaryValidation, error::ParseError, parser::headers};

const MAX_BOUNDARY_LEN: usize = 70;

/// Extracts the `boundary` parameter from a transport `Content-Type` value.
///
/// The media type must be `multipart/*`. Under [`BoundaryValidation::Strict`]
/// the token is checked against the RFC 2046 grammar; the lenient mode only
/// requires a non-empty single-line token and lets the scanner decide.
pub fn extract_boundary(
    content_type: &str,
    validation: BoundaryValidation,
) -> Result<String, ParseError> {
    let strict = validation == BoundaryValidation::Strict;
    let (essence, params) = match content_type.split_once(';') {
        Some((essence, params)) => (essence.trim(), params),
        None => (content_type.trim(), ""),
    };

    if strict {
        let media = essence
            .parse::<mime::Mime>()
            .map_err(|_| ParseError::new("invalid Content-Type header"))?;
        if media.type_() != mime::MULTIPART {
            return Err(ParseError::new("Content-Type must be multipart/*"));
        }
    } else if !essence.to_ascii_lowercase().starts_with("multipart/") {
        return Err(ParseError::new("Content-Type must be multipart/*"));
    }

    let boundary = headers::parse_header_parameters(params, strict)
        .map_err(|err| {
            ParseError::boundary(format!("malformed Content-Type parameters ({err})"))
        })?
        .into_iter()
        .find(|(key, _)| key == "boundary")
        .map(|(_, value)| value)
        .ok_or_else(|| ParseError::boundary("missing multipart boundary parameter"))?;

    if strict {
        validate_boundary(&boundary)?;
    } else if boundary.is_empty() || boundary.contains(['\r', '\n']) {
        return Err(ParseError::boundary("multipart boundary is empty or spans lines"));
    }

    Ok(boundary)
}

/// Checks a boundary against the RFC 2046 grammar: 1 to 70 characters from
/// the boundary character class, not ending in a space.
pub fn validate_boundary(boundary: &str) -> Result<(), ParseError> {
    if boundary.is_empty() {
        return Err(ParseError::boundary("multipart boundary cannot be empty"));
    }

    if boundary.len() > MAX_BOUNDARY_LEN {
        return Err(ParseError::boundary(
            "multipart boundary cannot exceed 70 characters",
        ));
    }

    if boundary.ends_with(' ') {
        return Err(ParseError::boundary(
            "multipart boundary cannot end with whitespace",
        ));
    }

    if !boundary.bytes().all(is_boundary_char) {
        return Err(ParseError::boundary(
            "multipart boundary contains invalid characters",
        ));
    }

    Ok(())
}

/// Returns `true` for bytes allowed in a boundary (`bchars`).
pub fn is_boundary_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'\'' | b'(' | b')' | b'+' | b'_' | b',' | b'-' | b'.' | b'/' | b':' | b'=' | b'?' | b' '
        )
}
