use std::{
    collections::VecDeque,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures::Stream;

use crate::{
    config::ParserOptions,
    error::{Error, ParseError},
    parser::scanner::{ScanTail, Scanner},
    part::Part,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Reading,
    Draining,
    Done,
}

/// Incremental multipart parser over a chunked byte stream.
///
/// Parts are yielded as soon as their closing delimiter arrives. A terminal
/// error is yielded once, after which the stream ends.
#[derive(Debug)]
pub struct MultipartStream<S> {
    stream: S,
    scanner: Option<Scanner>,
    ready: VecDeque<Part>,
    state: StreamState,
    preamble: Option<Bytes>,
    epilogue: Option<Bytes>,
}

impl<S> MultipartStream<S> {
    /// Creates a new streaming parser for a known multipart boundary.
    pub fn new(
        boundary: impl AsRef<str>,
        stream: S,
        options: ParserOptions,
    ) -> Result<Self, ParseError> {
        let scanner = Scanner::new(boundary.as_ref(), options)?;

        Ok(Self {
            stream,
            scanner: Some(scanner),
            ready: VecDeque::new(),
            state: StreamState::Reading,
            preamble: None,
            epilogue: None,
        })
    }

    /// Preamble bytes, available once the stream has ended successfully.
    pub fn preamble(&self) -> Option<&Bytes> {
        self.preamble.as_ref()
    }

    /// Epilogue bytes, available once the stream has ended successfully.
    pub fn epilogue(&self) -> Option<&Bytes> {
        self.epilogue.as_ref()
    }

    fn fail(&mut self, err: Error) -> Poll<Option<Result<Part, Error>>> {
        self.state = StreamState::Done;
        self.scanner = None;
        self.ready.clear();
        Poll::Ready(Some(Err(err)))
    }

    fn finish_scan(&mut self) -> Result<(), ParseError> {
        let Some(scanner) = self.scanner.take() else {
            return Ok(());
        };
        let ScanTail {
            parts,
            preamble,
            epilogue,
        } = scanner.finish()?;

        self.ready.extend(parts);
        self.preamble = preamble;
        self.epilogue = epilogue;
        Ok(())
    }
}

impl<S, E> Stream for MultipartStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Item = Result<Part, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(part) = self.ready.pop_front() {
                return Poll::Ready(Some(Ok(part)));
            }

            match self.state {
                StreamState::Done => return Poll::Ready(None),
                StreamState::Draining => {
                    self.state = StreamState::Done;
                    if let Err(err) = self.finish_scan() {
                        return self.fail(err.into());
                    }
                    continue;
                }
                StreamState::Reading => {}
            }

            match Pin::new(&mut self.stream).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    let Some(scanner) = self.scanner.as_mut() else {
                        return Poll::Ready(None);
                    };
                    match scanner.feed(&chunk) {
                        Ok(parts) => self.ready.extend(parts),
                        Err(err) => return self.fail(err.into()),
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    return self.fail(Error::StreamRead(err.into()));
                }
                Poll::Ready(None) => self.state = StreamState::Draining,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
