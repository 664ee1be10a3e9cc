/// Multipart boundary parsing helpers.
pub mod boundary;
/// Multipart part header parsing helpers.
pub mod headers;
/// Push-based multipart scanner state machine.
pub mod scanner;
/// Async stream adapter over the scanner.
pub mod stream;

pub use boundary::{extract_boundary, is_boundary_char, validate_boundary};
pub use headers::{
    ContentDisposition, decode_extended_value, encode_extended_value, has_filename_param,
    parse_content_disposition, parse_header_parameters,
};
pub use scanner::{ScanTail, Scanner};
pub use stream::MultipartStream;
