//! Attachment data and the dual-key lookup table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A decoded MIME part carrying a file.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Filename of the attachment. Generated if missing from the headers.
    pub filename: String,

    /// Content-ID for inline parts referenced from HTML, with any enclosing
    /// angle brackets already stripped.
    pub content_id: Option<String>,

    /// Decoded content bytes.
    pub data: Vec<u8>,
}

/// Where extracted attachments landed on disk.
///
/// Every attachment is registered under its content-id (when present) and
/// under its original filename, so `cid:` references resolve either way.
/// Lookups fail closed: an unknown key means unresolved, never a guess.
/// When two attachments share a key, the later one wins.
#[derive(Debug, Default)]
pub struct AttachmentIndex {
    paths: HashMap<String, PathBuf>,
}

impl AttachmentIndex {
    /// Register `path` under `key`.
    pub fn insert(&mut self, key: impl Into<String>, path: impl Into<PathBuf>) {
        self.paths.insert(key.into(), path.into());
    }

    /// Resolve a content-id or filename to its extracted path.
    pub fn get(&self, key: &str) -> Option<&Path> {
        self.paths.get(key).map(PathBuf::as_path)
    }

    /// Number of registered keys (not attachments).
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether no key is registered.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Strip one pair of enclosing angle brackets from a content-id.
///
/// Headers carry `Content-ID: <part1@mailer>`, HTML references it as
/// `cid:part1@mailer`; both sides are normalized to the bare form.
pub fn normalize_content_id(cid: &str) -> &str {
    cid.strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(cid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_content_id() {
        assert_eq!(normalize_content_id("<img1@mail>"), "img1@mail");
        assert_eq!(normalize_content_id("img1@mail"), "img1@mail");
        // Only a matched pair is stripped
        assert_eq!(normalize_content_id("<img1@mail"), "<img1@mail");
        assert_eq!(normalize_content_id("img1@mail>"), "img1@mail>");
        assert_eq!(normalize_content_id(""), "");
    }

    #[test]
    fn test_index_dual_key_lookup() {
        let mut index = AttachmentIndex::default();
        index.insert("img1@mail", "attachments/abc.a0.pic.png");
        index.insert("pic.png", "attachments/abc.a0.pic.png");

        assert_eq!(
            index.get("img1@mail"),
            Some(Path::new("attachments/abc.a0.pic.png"))
        );
        assert_eq!(
            index.get("pic.png"),
            Some(Path::new("attachments/abc.a0.pic.png"))
        );
        assert_eq!(index.get("other"), None);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_index_last_write_wins() {
        let mut index = AttachmentIndex::default();
        index.insert("pic.png", "attachments/a.a0.pic.png");
        index.insert("pic.png", "attachments/a.a1.pic.png");
        assert_eq!(
            index.get("pic.png"),
            Some(Path::new("attachments/a.a1.pic.png"))
        );
    }
}
