use std::borrow::Cow;

use encoding_rs::{Encoding, WINDOWS_1252};
use http::HeaderName;

use crate::{
    error::ParseError,
    part::{HeaderEntry, PartHeaders},
};

/// Canonical `Content-Disposition` header name.
pub const CONTENT_DISPOSITION: &str = "Content-Disposition";
/// Canonical `Content-Type` header name.
pub const CONTENT_TYPE: &str = "Content-Type";

const FORM_DATA: &str = "form-data";

/// Decoded `Content-Disposition` parameters of one part.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentDisposition {
    /// Disposition type, lowercased. Normally `form-data`.
    pub disposition: String,
    /// `name` parameter.
    pub name: Option<String>,
    /// `filename` parameter. `Some("")` when present with an empty value.
    pub filename: Option<String>,
    /// Decoded `filename*` parameter. `None` when absent or undecodable.
    pub filename_star: Option<String>,
}

/// Appends one raw header line (line ending stripped) to `headers`.
///
/// A line starting with space or tab continues the previous header when
/// `folding` is enabled and is a syntax error otherwise.
pub fn push_header_line(
    headers: &mut PartHeaders,
    line: &[u8],
    folding: bool,
    strict: bool,
) -> Result<(), ParseError> {
    if matches!(line.first(), Some(b' ' | b'\t')) {
        if !folding {
            return Err(ParseError::header("unexpected continuation line"));
        }
        let continuation = decode_header_bytes(line);
        let Some(previous) = headers.last_mut() else {
            return Err(ParseError::header("continuation line before any header"));
        };
        previous.append_folded(continuation.trim_matches(is_ows));
        return Ok(());
    }

    let (name, value) = parse_header_line(line, strict)?;
    headers.push_entry(HeaderEntry::new(name, value));
    Ok(())
}

/// Parses `name ":" OWS value OWS`.
pub fn parse_header_line(line: &[u8], strict: bool) -> Result<(String, String), ParseError> {
    let Some(colon) = memchr::memchr(b':', line) else {
        return Err(ParseError::header("header line has no `:` separator"));
    };

    let raw_name = &line[..colon];
    let raw_name = if strict {
        raw_name
    } else {
        trim_ows_bytes(raw_name)
    };
    if raw_name.is_empty() {
        return Err(ParseError::header("empty header name"));
    }
    HeaderName::from_bytes(raw_name)
        .map_err(|_| ParseError::header("header name is not a valid token"))?;

    // token bytes are ASCII, so this cannot lose information
    let name = String::from_utf8_lossy(raw_name).into_owned();
    let value = decode_header_bytes(&line[colon + 1..])
        .trim_matches(is_ows)
        .to_owned();

    Ok((name, value))
}

/// Decodes header bytes as UTF-8, falling back to windows-1252.
pub fn decode_header_bytes(raw: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(raw) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(raw);
            text
        }
    }
}

/// Parses a `Content-Disposition` value.
///
/// Parameter order does not matter. A `filename*` that cannot be decoded is
/// treated as absent.
pub fn parse_content_disposition(
    value: &str,
    strict: bool,
) -> Result<ContentDisposition, ParseError> {
    let (disposition, params) = match value.split_once(';') {
        Some((disposition, params)) => (disposition, params),
        None => (value, ""),
    };

    let disposition = disposition.trim().to_ascii_lowercase();
    if disposition.is_empty() {
        return Err(ParseError::header("Content-Disposition has no disposition type"));
    }
    if strict && disposition != FORM_DATA {
        return Err(ParseError::header(format!(
            "Content-Disposition type `{disposition}` is not form-data"
        )));
    }

    let mut parsed = ContentDisposition {
        disposition,
        ..ContentDisposition::default()
    };

    for (key, value) in parse_header_parameters(params, strict)? {
        match key.as_str() {
            "name" => parsed.name = Some(value),
            "filename" => parsed.filename = Some(value),
            "filename*" => parsed.filename_star = decode_extended_value(&value),
            _ => {}
        }
    }

    Ok(parsed)
}

/// Tokenizes `key=value` pairs separated by `;`.
///
/// Keys are lowercased; quoted values are unescaped. In strict mode a
/// malformed or repeated parameter is an error; otherwise malformed
/// parameters are skipped and the first occurrence wins.
pub fn parse_header_parameters(
    params: &str,
    strict: bool,
) -> Result<Vec<(String, String)>, ParseError> {
    let mut out: Vec<(String, String)> = Vec::new();

    for segment in split_semicolon_aware(params) {
        let trimmed = segment.trim_matches(is_ows);
        if trimmed.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = trimmed.split_once('=') else {
            if strict {
                return Err(ParseError::header(format!(
                    "parameter `{trimmed}` has no value"
                )));
            }
            continue;
        };

        let key = raw_key.trim_matches(is_ows).to_ascii_lowercase();
        if key.is_empty() {
            if strict {
                return Err(ParseError::header("parameter has an empty name"));
            }
            continue;
        }

        let value = match parse_parameter_value(raw_value.trim_matches(is_ows), strict) {
            Ok(value) => value,
            Err(err) if strict => return Err(err),
            Err(_) => continue,
        };

        if out.iter().any(|(existing, _)| *existing == key) {
            if strict {
                return Err(ParseError::header(format!("parameter `{key}` is repeated")));
            }
            continue;
        }

        out.push((key, value));
    }

    Ok(out)
}

/// Returns `true` when the raw header text names a filename parameter.
///
/// This is what tells `filename=""` apart from no filename at all.
pub fn has_filename_param(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    lower.contains("filename=") || lower.contains("filename*=")
}

/// Decodes an RFC 5987 `charset'language'percent-encoded` value.
///
/// Returns `None` for an unknown charset, malformed percent-encoding, or
/// bytes that are invalid in the declared charset.
pub fn decode_extended_value(value: &str) -> Option<String> {
    let (charset, rest) = value.split_once('\'')?;
    let (_language, encoded) = rest.split_once('\'')?;

    let encoding = Encoding::for_label(charset.trim().as_bytes())?;
    let bytes = percent_decode(encoded)?;
    encoding
        .decode_without_bom_handling_and_without_replacement(&bytes)
        .map(Cow::into_owned)
}

/// Encodes `value` as an RFC 5987 `UTF-8''…` extended value.
pub fn encode_extended_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 7);
    out.push_str("UTF-8''");
    for &byte in value.as_bytes() {
        if is_attr_char(byte) {
            out.push(char::from(byte));
        } else {
            out.push('%');
            out.push(char::from(HEX_UPPER[usize::from(byte >> 4)]));
            out.push(char::from(HEX_UPPER[usize::from(byte & 0x0f)]));
        }
    }
    out
}

/// Wraps `value` in a quoted-string, escaping `\` and `"`.
pub fn quote_parameter_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if matches!(ch, '"' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

fn parse_parameter_value(raw: &str, strict: bool) -> Result<String, ParseError> {
    if let Some(quoted) = raw.strip_prefix('"') {
        return unescape_quoted_string(quoted, strict);
    }

    if strict && raw.contains('"') {
        return Err(ParseError::header("invalid quoted parameter value"));
    }

    Ok(raw.to_owned())
}

// `value` is everything after the opening quote.
fn unescape_quoted_string(value: &str, strict: bool) -> Result<String, ParseError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| ParseError::header("dangling escape in quoted parameter"))?;
                out.push(escaped);
            }
            '"' => {
                let trailing = chars.as_str().trim_matches(is_ows);
                if strict && !trailing.is_empty() {
                    return Err(ParseError::header("text after closing quote"));
                }
                return Ok(out);
            }
            _ => out.push(ch),
        }
    }

    if strict {
        return Err(ParseError::header("unterminated quoted parameter"));
    }
    Ok(out)
}

fn percent_decode(value: &str) -> Option<Vec<u8>> {
    let mut bytes = Vec::with_capacity(value.len());
    let raw = value.as_bytes();
    let mut index = 0;

    while index < raw.len() {
        if raw[index] == b'%' {
            let hi = hex_value(*raw.get(index + 1)?)?;
            let lo = hex_value(*raw.get(index + 2)?)?;
            bytes.push((hi << 4) | lo);
            index += 3;
            continue;
        }

        bytes.push(raw[index]);
        index += 1;
    }

    Some(bytes)
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn is_attr_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'!' | b'#' | b'$' | b'&' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
        )
}

fn is_ows(ch: char) -> bool {
    ch == ' ' || ch == '\t'
}

fn trim_ows_bytes(raw: &[u8]) -> &[u8] {
    let start = raw
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t'))
        .unwrap_or(raw.len());
    let end = raw
        .iter()
        .rposition(|b| !matches!(b, b' ' | b'\t'))
        .map_or(start, |idx| idx + 1);
    &raw[start..end]
}

pub(crate) fn split_semicolon_aware(value: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in value.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }

        match ch {
            '\\' if in_quotes => {
                current.push(ch);
                escaped = true;
            }
            '"' => {
                current.push(ch);
                in_quotes = !in_quotes;
            }
            ';' if !in_quotes => {
                segments.push(current);
                current = String::new();
            }
            _ => current.push(ch),
        }
    }

    segments.push(current);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_semicolons_outside_quotes_only() {
        let segments = split_semicolon_aware(" name=\"a;b\"; filename=\"c\\\";d\"");
        assert_eq!(segments, [" name=\"a;b\"", " filename=\"c\\\";d\""]);
    }

    #[test]
    fn extended_value_round_trips_non_ascii() {
        let encoded = encode_extended_value("résumé 文档.pdf");
        assert!(encoded.starts_with("UTF-8''r%C3%A9sum%C3%A9%20"));
        assert_eq!(decode_extended_value(&encoded).as_deref(), Some("résumé 文档.pdf"));
    }

    #[test]
    fn trims_optional_whitespace_from_name_bytes() {
        assert_eq!(trim_ows_bytes(b" \tX-Name \t"), b"X-Name");
        assert_eq!(trim_ows_bytes(b"   "), b"");
    }

    #[test]
    fn percent_decode_rejects_short_escape() {
        assert!(percent_decode("abc%2").is_none());
        assert!(percent_decode("abc%zz").is_none());
        assert_eq!(percent_decode("a%20b").as_deref(), Some(&b"a b"[..]));
    }
}
