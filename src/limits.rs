use serde::{Deserialize, Serialize};

/// Default cap on a single part header block, in bytes.
pub const DEFAULT_MAX_HEADER_SIZE: usize = 8 * 1024;

/// Resource limits enforced while scanning a multipart body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum size in bytes of one part header block, including line endings.
    ///
    /// Exceeding it is reported as invalid header syntax.
    pub max_header_size: usize,
    /// Maximum number of parts in one message.
    pub max_parts: Option<usize>,
    /// Maximum body size in bytes of a single part.
    pub max_part_size: Option<u64>,
    /// Maximum size in bytes of the whole multipart body.
    pub max_total_size: Option<u64>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            max_parts: None,
            max_part_size: None,
            max_total_size: None,
        }
    }
}

impl Limits {
    /// Creates the default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the header block cap.
    pub fn with_max_header_size(mut self, size: usize) -> Self {
        self.max_header_size = size;
        self
    }

    /// Sets the part count cap.
    pub fn with_max_parts(mut self, parts: usize) -> Self {
        self.max_parts = Some(parts);
        self
    }

    /// Sets the per-part body cap.
    pub fn with_max_part_size(mut self, size: u64) -> Self {
        self.max_part_size = Some(size);
        self
    }

    /// Sets the whole-body cap.
    pub fn with_max_total_size(mut self, size: u64) -> Self {
        self.max_total_size = Some(size);
        self
    }

    pub(crate) fn part_size_exceeded(&self, size: usize) -> bool {
        self.max_part_size.is_some_and(|max| size as u64 > max)
    }

    pub(crate) fn total_size_exceeded(&self, size: u64) -> bool {
        self.max_total_size.is_some_and(|max| size > max)
    }

    pub(crate) fn part_count_exceeded(&self, count: usize) -> bool {
        self.max_parts.is_some_and(|max| count > max)
    }
}
