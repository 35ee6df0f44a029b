//! Line-oriented identifier extraction from batch file content.
//!
//! Input format: one header line, then `<prefix><separator><identifier>`
//! per line, with the separator drawn from the configured allow-list.
//! The reader is lazy and fail-fast: the first line without an allowed
//! separator yields a validation error and the sequence ends there.

use marketfeed_shared::{MarketFeedError, Result, UploadConfig};

/// Lazy iterator over validated identifiers in a batch file.
///
/// Skips the header line unconditionally. Each subsequent line either
/// yields `Ok(identifier)` — the line with the first occurrence of its
/// matched separator removed and trimmed — or `Err(Validation)` naming
/// the offending line, after which the iterator is fused.
pub struct IdentifierReader<'a> {
    lines: std::str::Lines<'a>,
    upload: &'a UploadConfig,
    failed: bool,
}

impl<'a> IdentifierReader<'a> {
    /// Create a reader over `raw`, consuming the header line immediately.
    pub fn new(raw: &'a str, upload: &'a UploadConfig) -> Self {
        let mut lines = raw.lines();
        lines.next(); // skip header
        Self {
            lines,
            upload,
            failed: false,
        }
    }
}

impl Iterator for IdentifierReader<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let line = self.lines.next()?;

        match self.upload.allowed_separator(line) {
            Some(sep) => Some(Ok(line.replacen(sep, "", 1).trim().to_string())),
            None => {
                self.failed = true;
                Some(Err(MarketFeedError::validation(format!(
                    "no allowed separator in line: {line}"
                ))))
            }
        }
    }
}
