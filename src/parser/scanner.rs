use bytes::{Buf, Bytes, BytesMut};
use memchr::memmem;

use crate::{
    config::{DuplicateHeaderPolicy, ParserOptions},
    error::ParseError,
    parser::{
        boundary::is_boundary_char,
        headers::{CONTENT_DISPOSITION, CONTENT_TYPE, parse_content_disposition, push_header_line},
    },
    part::{Part, PartHeaders},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Preamble,
    HeaderBlock,
    Body,
    Epilogue,
    Failed,
}

/// Everything left once the scanner has seen the end of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTail {
    /// Parts completed by the final call.
    pub parts: Vec<Part>,
    /// Bytes before the first delimiter.
    pub preamble: Option<Bytes>,
    /// Bytes after the final delimiter line.
    pub epilogue: Option<Bytes>,
}

/// Push-based multipart scanner.
///
/// Chunks are fed in arrival order; completed parts are returned as soon as
/// their closing delimiter is recognized. Only the unsearched tail of the
/// input (at most one delimiter plus a line ending) is held back between
/// calls, in addition to the body of the part being accumulated.
#[derive(Debug)]
pub struct Scanner {
    delimiter: Vec<u8>,
    finder: memmem::Finder<'static>,
    options: ParserOptions,
    state: State,
    buffer: BytesMut,
    content: BytesMut,
    headers: PartHeaders,
    header_bytes: usize,
    current: Option<Part>,
    preamble: Option<Bytes>,
    parts_seen: usize,
    total_bytes: u64,
    error: Option<ParseError>,
}

impl Scanner {
    /// Creates a scanner for an already extracted boundary.
    pub fn new(boundary: &str, options: ParserOptions) -> Result<Self, ParseError> {
        if boundary.is_empty() || boundary.contains(['\r', '\n']) {
            return Err(ParseError::boundary(
                "multipart boundary is empty or spans lines",
            ));
        }

        let delimiter = format!("--{boundary}").into_bytes();
        let finder = memmem::Finder::new(&delimiter).into_owned();

        Ok(Self {
            delimiter,
            finder,
            options,
            state: State::Preamble,
            buffer: BytesMut::new(),
            content: BytesMut::new(),
            headers: PartHeaders::new(),
            header_bytes: 0,
            current: None,
            preamble: None,
            parts_seen: 0,
            total_bytes: 0,
            error: None,
        })
    }

    /// Feeds the next chunk and returns the parts it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Part>, ParseError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        self.total_bytes += chunk.len() as u64;
        if self.options.limits.total_size_exceeded(self.total_bytes) {
            return Err(self.fail(ParseError::new(
                "multipart body exceeds the total size limit",
            )));
        }

        self.buffer.extend_from_slice(chunk);
        let mut parts = Vec::new();
        match self.advance(false, &mut parts) {
            Ok(()) => Ok(parts),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Signals end of input.
    ///
    /// Succeeds only when the final delimiter was seen.
    pub fn finish(mut self) -> Result<ScanTail, ParseError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }

        let mut parts = Vec::new();
        if let Err(err) = self.advance(true, &mut parts) {
            return Err(self.fail(err));
        }

        if self.state != State::Epilogue {
            return Err(self.fail(ParseError::MissingTerminator));
        }

        let epilogue = strip_epilogue_prefix(&self.content);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            parts = self.parts_seen,
            total_bytes = self.total_bytes,
            "multipart scan complete"
        );

        Ok(ScanTail {
            parts,
            preamble: self.preamble.take(),
            epilogue: (!epilogue.is_empty()).then(|| Bytes::copy_from_slice(epilogue)),
        })
    }

    fn fail(&mut self, err: ParseError) -> ParseError {
        #[cfg(feature = "tracing")]
        tracing::debug!(error = %err, part = self.parts_seen, "multipart scan failed");
        self.state = State::Failed;
        self.error = Some(err.clone());
        err
    }

    fn advance(&mut self, eof: bool, out: &mut Vec<Part>) -> Result<(), ParseError> {
        loop {
            let progressed = match self.state {
                State::Preamble => self.scan_preamble(eof)?,
                State::HeaderBlock => self.scan_header_block(eof)?,
                State::Body => self.scan_body(eof, out)?,
                State::Epilogue => {
                    let rest = self.buffer.split();
                    self.content.extend_from_slice(&rest);
                    false
                }
                State::Failed => false,
            };

            if !progressed {
                return Ok(());
            }
        }
    }

    fn scan_preamble(&mut self, eof: bool) -> Result<bool, ParseError> {
        match self.find_delimiter(eof)? {
            Found::Delimiter {
                content_end,
                start,
                next,
                last,
            } => {
                let at_offset_zero = self.content.is_empty() && start == 0;
                let leading = self.buffer.split_to(content_end);
                self.buffer.advance(next - content_end);
                self.content.extend_from_slice(&leading);
                let preamble = self.content.split().freeze();
                self.preamble = (!at_offset_zero).then_some(preamble);
                self.enter_after_delimiter(last);
                Ok(true)
            }
            Found::Pending { safe } => {
                let settled = self.buffer.split_to(safe);
                self.content.extend_from_slice(&settled);
                if eof {
                    return Err(self.unmatched_preamble());
                }
                Ok(false)
            }
        }
    }

    fn scan_header_block(&mut self, eof: bool) -> Result<bool, ParseError> {
        let max = self.options.limits.max_header_size;

        loop {
            let Some((line_end, next)) = self.find_line_end(eof)? else {
                if self.header_bytes + self.buffer.len() > max {
                    return Err(header_block_too_large(max));
                }
                if !eof {
                    return Ok(false);
                }
                if self.header_bytes == 0 && self.buffer.is_empty() {
                    return Err(ParseError::MissingTerminator);
                }
                return Err(ParseError::Truncated {
                    context: "part headers",
                });
            };

            self.header_bytes += next;
            if self.header_bytes > max {
                return Err(header_block_too_large(max));
            }

            let line = self.buffer.split_to(next);
            let line = &line[..line_end];
            if line.is_empty() {
                self.open_part()?;
                self.state = State::Body;
                return Ok(true);
            }

            push_header_line(
                &mut self.headers,
                line,
                self.options.header_folding,
                !self.options.is_lenient(),
            )?;
        }
    }

    fn scan_body(&mut self, eof: bool, out: &mut Vec<Part>) -> Result<bool, ParseError> {
        match self.find_delimiter(eof)? {
            Found::Delimiter {
                content_end,
                next,
                last,
                ..
            } => {
                let tail = self.buffer.split_to(content_end);
                self.buffer.advance(next - content_end);
                self.append_body(&tail)?;

                let body = self.content.split().freeze();
                let Some(mut part) = self.current.take() else {
                    return Err(ParseError::new("part body without headers"));
                };
                part.body = body;

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    index = self.parts_seen - 1,
                    name = %part.name,
                    body_size = part.body.len(),
                    "multipart part complete"
                );

                out.push(part);
                self.enter_after_delimiter(last);
                Ok(true)
            }
            Found::Pending { safe } => {
                let settled = self.buffer.split_to(safe);
                self.append_body(&settled)?;
                if eof {
                    return Err(ParseError::Truncated {
                        context: "part body",
                    });
                }
                Ok(false)
            }
        }
    }

    fn enter_after_delimiter(&mut self, last: bool) {
        self.state = if last {
            State::Epilogue
        } else {
            State::HeaderBlock
        };
        self.headers = PartHeaders::new();
        self.header_bytes = 0;
    }

    fn append_body(&mut self, bytes: &[u8]) -> Result<(), ParseError> {
        self.content.extend_from_slice(bytes);
        if self.options.limits.part_size_exceeded(self.content.len()) {
            return Err(ParseError::new(format!(
                "part {} exceeds the part size limit",
                self.parts_seen.saturating_sub(1)
            )));
        }
        Ok(())
    }

    fn open_part(&mut self) -> Result<(), ParseError> {
        let index = self.parts_seen;
        self.parts_seen += 1;
        if self.options.limits.part_count_exceeded(self.parts_seen) {
            return Err(ParseError::new("multipart body exceeds the part count limit"));
        }

        let headers = std::mem::take(&mut self.headers);
        let strict = !self.options.is_lenient();
        let dispositions: Vec<&str> = headers.get_all(CONTENT_DISPOSITION).collect();

        let raw = match (dispositions.as_slice(), self.options.duplicate_headers) {
            ([], _) if self.options.require_content_disposition => {
                return Err(ParseError::MissingContentDisposition { index });
            }
            ([], _) => None,
            ([only], _) => Some(*only),
            ([first, ..], DuplicateHeaderPolicy::KeepFirst) => Some(*first),
            ([.., last], DuplicateHeaderPolicy::KeepLast) => Some(*last),
            (_, DuplicateHeaderPolicy::Reject) => {
                let name = headers
                    .iter()
                    .find(|entry| entry.key() == "content-disposition")
                    .map_or(CONTENT_DISPOSITION, |entry| entry.name())
                    .to_owned();
                return Err(ParseError::DuplicateRequiredHeader { index, name });
            }
        };

        let disposition = raw
            .map(|raw| parse_content_disposition(raw, strict))
            .transpose()?
            .unwrap_or_default();

        let name = match disposition.name {
            Some(name) => name,
            None if strict && raw.is_some() => {
                return Err(ParseError::header(format!(
                    "part {index} Content-Disposition has no name parameter"
                )));
            }
            None => String::new(),
        };

        let content_type = headers.get(CONTENT_TYPE).map(str::to_owned);

        self.current = Some(Part {
            name,
            filename: disposition.filename,
            filename_star: disposition.filename_star,
            content_type,
            headers,
            body: Bytes::new(),
        });
        Ok(())
    }

    // Locates the next real delimiter in the buffer. Candidates that are not
    // preceded by an accepted line ending, or that continue with more
    // boundary characters, are ordinary content.
    fn find_delimiter(&self, eof: bool) -> Result<Found, ParseError> {
        let buf = &self.buffer[..];
        let lenient = self.options.is_lenient();
        // a body needs its own line ending before the delimiter unless lenient
        let at_start = self.content.is_empty() && (self.state == State::Preamble || lenient);
        let mut from = 0;

        while let Some(offset) = self.finder.find(&buf[from..]) {
            let pos = from + offset;
            from = pos + 1;

            let Some(content_end) = line_ending_before(buf, pos, at_start, lenient) else {
                continue;
            };

            let suffix_start = pos + self.delimiter.len();
            match classify_suffix(&buf[suffix_start..], eof, lenient) {
                Suffix::Final => {
                    return Ok(Found::Delimiter {
                        content_end,
                        start: pos,
                        next: suffix_start + 2,
                        last: true,
                    });
                }
                Suffix::Next(consumed) => {
                    return Ok(Found::Delimiter {
                        content_end,
                        start: pos,
                        next: suffix_start + consumed,
                        last: false,
                    });
                }
                Suffix::NotDelimiter => continue,
                Suffix::NeedMore => return Ok(Found::Pending { safe: content_end }),
                Suffix::Ended => return Err(ParseError::MissingTerminator),
                Suffix::Invalid => {
                    return Err(ParseError::header(
                        "unexpected bytes after boundary delimiter",
                    ));
                }
            }
        }

        // keep room for a partial delimiter and its leading line ending
        let keep = if eof { 0 } else { self.delimiter.len() + 1 };
        Ok(Found::Pending {
            safe: buf.len().saturating_sub(keep),
        })
    }

    fn find_line_end(&self, eof: bool) -> Result<Option<(usize, usize)>, ParseError> {
        let buf = &self.buffer[..];
        let lenient = self.options.is_lenient();

        let Some(pos) = memchr::memchr2(b'\r', b'\n', buf) else {
            return Ok(None);
        };

        if buf[pos] == b'\n' {
            if !lenient {
                return Err(ParseError::header("bare LF in part headers"));
            }
            return Ok(Some((pos, pos + 1)));
        }

        match buf.get(pos + 1) {
            Some(b'\n') => Ok(Some((pos, pos + 2))),
            Some(_) if lenient => Ok(Some((pos, pos + 1))),
            Some(_) => Err(ParseError::header("bare CR in part headers")),
            None if lenient && eof => Ok(Some((pos, pos + 1))),
            None => Ok(None),
        }
    }

    fn unmatched_preamble(&self) -> ParseError {
        let mut seen = self.content.iter().chain(self.buffer.iter());
        if seen.next() == Some(&b'-') && seen.next() == Some(&b'-') {
            return ParseError::boundary("body delimiter does not match the declared boundary");
        }
        ParseError::MissingTerminator
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Found {
    Delimiter {
        content_end: usize,
        start: usize,
        next: usize,
        last: bool,
    },
    Pending {
        safe: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Suffix {
    Final,
    Next(usize),
    NotDelimiter,
    NeedMore,
    Ended,
    Invalid,
}

fn line_ending_before(buf: &[u8], pos: usize, at_start: bool, lenient: bool) -> Option<usize> {
    if pos == 0 {
        return at_start.then_some(0);
    }

    let crlf = pos >= 2 && &buf[pos - 2..pos] == b"\r\n";
    if crlf {
        return Some(pos - 2);
    }

    (lenient && matches!(buf[pos - 1], b'\n' | b'\r')).then(|| pos - 1)
}

// Inspects the bytes after `"--" boundary`.
fn classify_suffix(suffix: &[u8], eof: bool, lenient: bool) -> Suffix {
    match suffix {
        [] if eof => return Suffix::Ended,
        [] | [b'-'] if !eof => return Suffix::NeedMore,
        [b'-', b'-', ..] => return Suffix::Final,
        [first, ..] if *first != b' ' && is_boundary_char(*first) => return Suffix::NotDelimiter,
        _ => {}
    }

    let padding = suffix
        .iter()
        .take_while(|byte| matches!(byte, b' ' | b'\t'))
        .count();

    match &suffix[padding..] {
        [] if eof => Suffix::Ended,
        [] => Suffix::NeedMore,
        [b'\r', b'\n', ..] => Suffix::Next(padding + 2),
        [b'\r'] if !eof => Suffix::NeedMore,
        [b'\r'] if !lenient => Suffix::Ended,
        [b'\r', ..] if lenient => Suffix::Next(padding + 1),
        [b'\n', ..] if lenient => Suffix::Next(padding + 1),
        [next, ..] if padding > 0 && is_boundary_char(*next) => Suffix::NotDelimiter,
        _ => Suffix::Invalid,
    }
}

// Drops transport padding and the line ending that close the final delimiter.
fn strip_epilogue_prefix(raw: &[u8]) -> &[u8] {
    let padding = raw
        .iter()
        .take_while(|byte| matches!(byte, b' ' | b'\t'))
        .count();
    let rest = &raw[padding..];

    for line_ending in [&b"\r\n"[..], b"\n", b"\r"] {
        if let Some(rest) = rest.strip_prefix(line_ending) {
            return rest;
        }
    }
    raw
}

fn header_block_too_large(max: usize) -> ParseError {
    ParseError::header(format!("part header block exceeds {max} bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_classification_follows_delimiter_grammar() {
        assert_eq!(classify_suffix(b"--\r\n", false, false), Suffix::Final);
        assert_eq!(classify_suffix(b"\r\nContent", false, false), Suffix::Next(2));
        assert_eq!(classify_suffix(b" \t\r\n", false, false), Suffix::Next(4));
        assert_eq!(classify_suffix(b"x\r\n", false, false), Suffix::NotDelimiter);
        assert_eq!(classify_suffix(b"  tail\r\n", false, false), Suffix::NotDelimiter);
        assert_eq!(classify_suffix(b"\n", false, false), Suffix::Invalid);
        assert_eq!(classify_suffix(b"\n", false, true), Suffix::Next(1));
        assert_eq!(classify_suffix(b"\r", false, true), Suffix::NeedMore);
        assert_eq!(classify_suffix(b"\r", true, true), Suffix::Next(1));
        assert_eq!(classify_suffix(b"\r", true, false), Suffix::Ended);
        assert_eq!(classify_suffix(b" \r", true, false), Suffix::Ended);
        assert_eq!(classify_suffix(b"", true, false), Suffix::Ended);
        assert_eq!(classify_suffix(b"!", false, false), Suffix::Invalid);
    }

    #[test]
    fn only_accepted_line_endings_precede_a_delimiter() {
        assert_eq!(line_ending_before(b"ab\r\n--B", 4, false, false), Some(2));
        assert_eq!(line_ending_before(b"ab\n--B", 3, false, false), None);
        assert_eq!(line_ending_before(b"ab\n--B", 3, false, true), Some(2));
        assert_eq!(line_ending_before(b"ab\r--B", 3, false, true), Some(2));
        assert_eq!(line_ending_before(b"--B", 0, true, false), Some(0));
        assert_eq!(line_ending_before(b"--B", 0, false, false), None);
    }

    #[test]
    fn epilogue_prefix_drops_padding_and_one_line_ending() {
        assert_eq!(strip_epilogue_prefix(b"  \r\ntrailer\r\n"), b"trailer\r\n");
        assert_eq!(strip_epilogue_prefix(b"\r\n"), b"");
        assert_eq!(strip_epilogue_prefix(b""), b"");
        assert_eq!(strip_epilogue_prefix(b" note"), b" note");
    }
}
