//! SVG sanitization seam.
//!
//! The pipeline treats sanitization as a black box behind the [`Sanitizer`]
//! trait: bytes in, clean bytes out, or a rejection. Deployments inject a
//! real sanitization library; the shipped [`BaselineSanitizer`] is a
//! conservative verify-or-reject pass that never rewrites a document. A
//! clean document comes back byte-identical, and anything carrying active
//! content is rejected outright rather than patched.

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SanitizeError {
    #[error("not an SVG document")]
    NotSvg,
    #[error("document is not valid UTF-8")]
    InvalidEncoding,
    #[error("active content rejected: {0}")]
    ActiveContent(&'static str),
}

/// Black-box sanitizer contract: `sanitize(bytes) -> bytes | error`.
pub trait Sanitizer: Sync {
    fn sanitize(&self, bytes: &[u8]) -> Result<Vec<u8>, SanitizeError>;
}

/// Conservative built-in sanitizer.
///
/// Rejects script elements, event-handler attributes, `javascript:` URLs,
/// foreignObject embedding, and external entity declarations. Documents
/// passing every check are returned unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaselineSanitizer;

impl BaselineSanitizer {
    pub fn new() -> Self {
        Self
    }
}

/// Lowercased substrings whose presence rejects the document.
const REJECTED_FRAGMENTS: &[(&str, &str)] = &[
    ("<script", "script element"),
    ("javascript:", "javascript URL"),
    ("<foreignobject", "foreignObject element"),
    ("<!entity", "entity declaration"),
    ("<!doctype", "doctype declaration"),
];

impl Sanitizer for BaselineSanitizer {
    fn sanitize(&self, bytes: &[u8]) -> Result<Vec<u8>, SanitizeError> {
        let text = std::str::from_utf8(bytes).map_err(|_| SanitizeError::InvalidEncoding)?;
        let lower = text.to_ascii_lowercase();

        if !lower.contains("<svg") {
            return Err(SanitizeError::NotSvg);
        }
        for (fragment, label) in REJECTED_FRAGMENTS {
            if lower.contains(fragment) {
                return Err(SanitizeError::ActiveContent(label));
            }
        }
        if has_event_handler_attribute(&lower) {
            return Err(SanitizeError::ActiveContent("event handler attribute"));
        }

        Ok(bytes.to_vec())
    }
}

/// Detect `onload=`, `onclick=`, etc. as attributes, without tripping on
/// ordinary words containing "on" (`second=`, `iteration`).
fn has_event_handler_attribute(lower: &str) -> bool {
    let bytes = lower.as_bytes();
    let mut search_from = 0;
    while let Some(pos) = lower[search_from..].find("on") {
        let start = search_from + pos;
        search_from = start + 2;

        // Attribute names begin after whitespace
        if start == 0 || !bytes[start - 1].is_ascii_whitespace() {
            continue;
        }
        // `on` followed by letters up to `=`
        let rest = &bytes[start + 2..];
        let name_len = rest.iter().take_while(|b| b.is_ascii_alphabetic()).count();
        if name_len == 0 {
            continue;
        }
        let mut after = start + 2 + name_len;
        while after < bytes.len() && bytes[after].is_ascii_whitespace() {
            after += 1;
        }
        if after < bytes.len() && bytes[after] == b'=' {
            return true;
        }
    }
    false
}
