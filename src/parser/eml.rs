//! Parser for individual `.eml` files (bare RFC 5322 messages).

use std::path::Path;

use mail_parser::{MessageParser, MimeHeaders};

use crate::error::{ConvertError, Result};
use crate::model::attachment::{normalize_content_id, Attachment};
use crate::model::mail::Mail;

/// Read and parse a single `.eml` file.
pub fn load_eml(path: impl AsRef<Path>) -> Result<Mail> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConvertError::FileNotFound(path.to_path_buf())
        } else {
            ConvertError::io(path, e)
        }
    })?;

    parse_mail(&data).ok_or_else(|| ConvertError::ParseMail(path.to_path_buf()))
}

/// Parse a raw RFC 5322 message into a [`Mail`].
///
/// Returns `None` when `mail-parser` cannot make sense of the input at all.
/// Bodies come back decoded: charsets are resolved to UTF-8 and, for
/// plain-text-only messages, the text part is rendered as HTML.
pub fn parse_mail(raw: &[u8]) -> Option<Mail> {
    let msg = MessageParser::default().parse(raw)?;

    let subject = msg.subject().unwrap_or_default().to_string();

    let content_language = msg
        .header("Content-Language")
        .and_then(|value| value.as_text())
        .map(str::to_string);

    let html = msg.body_html(0).map(|body| body.into_owned());

    let attachments = msg
        .attachments()
        .enumerate()
        .map(|(idx, part)| {
            let filename = part
                .attachment_name()
                .map(String::from)
                .unwrap_or_else(|| format!("attachment_{idx}"));

            let content_id = part
                .content_id()
                .map(|id| normalize_content_id(id).to_string());

            Attachment {
                filename,
                content_id,
                data: part.contents().to_vec(),
            }
        })
        .collect();

    Some(Mail {
        subject,
        content_language,
        html,
        attachments,
    })
}
