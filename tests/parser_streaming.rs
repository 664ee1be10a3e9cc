#![allow(missing_docs)]

use std::io;

use bytes::Bytes;
use formgauge::{Codec, Error, ErrorKind, ParseError, ParserOptions, parser::MultipartStream};
use futures::{StreamExt, channel::mpsc, stream};

const CONTENT_TYPE: &str = "multipart/form-data; boundary=XBOUND";

const TWO_PARTS: &str = concat!(
    "preamble\r\n",
    "--XBOUND\r\n",
    "Content-Disposition: form-data; name=\"alpha\"\r\n",
    "\r\n",
    "one\r\n",
    "--XBOUND\r\n",
    "Content-Disposition: form-data; name=\"beta\"; filename=\"b.txt\"\r\n",
    "Content-Type: text/plain\r\n",
    "\r\n",
    "two\r\n",
    "--XBOUND--\r\n",
    "epilogue",
);

#[tokio::test]
async fn parses_chunked_stream_and_yields_parts() {
    let chunks = split_bytes(TWO_PARTS.as_bytes(), &[3, 2, 7, 1, 4, 9, 5, 8, 6, 64]);
    let stream = stream::iter(chunks.into_iter().map(Ok::<Bytes, io::Error>));
    let mut multipart = MultipartStream::new("XBOUND", stream, ParserOptions::strict())
        .expect("boundary should be valid");

    let first = multipart
        .next()
        .await
        .expect("first item should exist")
        .expect("first part should parse");
    assert_eq!(first.name, "alpha");
    assert!(first.filename.is_none());
    assert_eq!(first.body, Bytes::from_static(b"one"));

    let second = multipart
        .next()
        .await
        .expect("second item should exist")
        .expect("second part should parse");
    assert_eq!(second.name, "beta");
    assert_eq!(second.filename.as_deref(), Some("b.txt"));
    assert_eq!(second.content_type.as_deref(), Some("text/plain"));
    assert_eq!(second.body, Bytes::from_static(b"two"));

    assert!(multipart.next().await.is_none());
    assert_eq!(multipart.preamble(), Some(&Bytes::from_static(b"preamble")));
    assert_eq!(multipart.epilogue(), Some(&Bytes::from_static(b"epilogue")));
}

#[tokio::test]
async fn every_chunking_yields_the_same_message() {
    let codec = Codec::new();
    let whole = codec
        .parse_with_content_type(TWO_PARTS.as_bytes(), CONTENT_TYPE)
        .expect("whole body should parse");

    for size in [1, 2, 3, 5, 11, 17, 4096] {
        let sizes = vec![size; TWO_PARTS.len() / size + 1];
        let chunks = split_bytes(TWO_PARTS.as_bytes(), &sizes);
        let stream = stream::iter(chunks.into_iter().map(Ok::<Bytes, io::Error>));

        let streamed = codec
            .parse_stream_to_message(stream, CONTENT_TYPE)
            .await
            .expect("chunked body should parse");
        assert_eq!(streamed, whole, "chunk size {size}");
    }
}

#[tokio::test]
async fn yields_first_part_before_input_completes() {
    let first_chunk = concat!(
        "--B\r\n",
        "Content-Disposition: form-data; name=\"first\"\r\n",
        "\r\n",
        "one\r\n",
        "--B\r\n",
        "Content-Disposition: form-data; name=\"second\"\r\n",
        "\r\n"
    );
    let second_chunk = concat!("two\r\n", "--B--\r\n");

    let (tx, rx) = mpsc::unbounded::<Result<Bytes, io::Error>>();
    let mut multipart =
        MultipartStream::new("B", rx, ParserOptions::strict()).expect("boundary should be valid");

    tx.unbounded_send(Ok(Bytes::from_static(first_chunk.as_bytes())))
        .expect("send first chunk");

    let first = multipart
        .next()
        .await
        .expect("first item should exist")
        .expect("first part should parse");
    assert_eq!(first.name, "first");
    assert_eq!(first.body, Bytes::from_static(b"one"));

    tx.unbounded_send(Ok(Bytes::from_static(second_chunk.as_bytes())))
        .expect("send second chunk");
    drop(tx);

    let second = multipart
        .next()
        .await
        .expect("second item should exist")
        .expect("second part should parse");
    assert_eq!(second.name, "second");
    assert_eq!(second.body, Bytes::from_static(b"two"));
    assert!(multipart.next().await.is_none());
}

#[tokio::test]
async fn reports_incomplete_terminal_boundary() {
    let body = concat!(
        "--B\r\n",
        "Content-Disposition: form-data; name=\"a\"\r\n",
        "\r\n",
        "x\r\n",
        "--B\r\n",
    );
    let stream = stream::iter([Ok::<Bytes, io::Error>(Bytes::from_static(body.as_bytes()))]);
    let mut multipart =
        MultipartStream::new("B", stream, ParserOptions::strict()).expect("boundary should be valid");

    let first = multipart
        .next()
        .await
        .expect("first item should exist")
        .expect("first part should parse");
    assert_eq!(first.name, "a");

    let err = multipart
        .next()
        .await
        .expect("error item should exist")
        .expect_err("stream should fail");
    assert!(matches!(err, Error::Parse(ParseError::MissingTerminator)));
    assert_eq!(err.kind(), Some(ErrorKind::MissingTerminator));
    assert!(multipart.next().await.is_none());
}

#[tokio::test]
async fn reports_invalid_headers_as_parse_error() {
    let body = concat!(
        "--B\r\n",
        "Content-Disposition form-data; name=\"a\"\r\n",
        "\r\n",
        "x\r\n",
        "--B--\r\n",
    );
    let stream = stream::iter([Ok::<Bytes, io::Error>(Bytes::from_static(body.as_bytes()))]);
    let mut multipart =
        MultipartStream::new("B", stream, ParserOptions::strict()).expect("boundary should be valid");

    let item = multipart.next().await.expect("error item should exist");
    assert!(matches!(
        item,
        Err(Error::Parse(ParseError::InvalidHeaderSyntax { .. }))
    ));
    assert!(multipart.next().await.is_none());
}

#[tokio::test]
async fn upstream_failure_is_a_stream_read_error() {
    let chunks = vec![
        Ok(Bytes::from_static(b"--B\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nx")),
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away")),
    ];
    let codec = Codec::new();
    let err = codec
        .parse_stream_to_message(stream::iter(chunks), "multipart/form-data; boundary=B")
        .await
        .expect_err("stream should fail");

    assert!(matches!(err, Error::StreamRead(_)));
    assert_eq!(err.kind(), None);
    assert_err_contains(&err.to_string(), "peer went away");
}

#[tokio::test]
async fn rejects_bad_content_type_before_reading() {
    let stream = stream::iter(Vec::<Result<Bytes, io::Error>>::new());
    let err = Codec::new()
        .parse_stream(stream, "text/plain")
        .expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::ParseError);
}

fn split_bytes(input: &[u8], chunk_sizes: &[usize]) -> Vec<Bytes> {
    let mut chunks = Vec::new();
    let mut index = 0usize;

    for &size in chunk_sizes {
        if index >= input.len() {
            break;
        }
        let end = (index + size).min(input.len());
        chunks.push(Bytes::copy_from_slice(&input[index..end]));
        index = end;
    }

    if index < input.len() {
        chunks.push(Bytes::copy_from_slice(&input[index..]));
    }

    chunks
}

fn assert_err_contains(actual: &str, expected_fragment: &str) {
    assert!(
        actual.contains(expected_fragment),
        "expected `{actual}` to contain `{expected_fragment}`"
    );
}
