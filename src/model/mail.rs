//! The parsed message as the conversion pipeline consumes it.

use super::attachment::Attachment;

/// One parsed email message.
///
/// Immutable once parsed; owned by the pipeline for the duration of one
/// file's conversion. Bodies and headers arrive already decoded (charset
/// and RFC 2047 encoded-words resolved by the parser), so everything
/// downstream works on UTF-8 strings.
#[derive(Debug, Clone, Default)]
pub struct Mail {
    /// Decoded subject line. Empty if the header is missing.
    pub subject: String,

    /// The `Content-Language` header value, if present.
    pub content_language: Option<String>,

    /// Decoded HTML body. For plain-text-only messages this is an HTML
    /// rendering of the text part; `None` when the message has no body
    /// at all.
    pub html: Option<String>,

    /// Attachments in message order.
    pub attachments: Vec<Attachment>,
}

impl Mail {
    /// Whether the message carries any attachments.
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}
