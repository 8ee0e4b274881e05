//! Reference rewriting: point every media element at its local copy.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;

use lol_html::html_content::Element;
use lol_html::{element, HtmlRewriter, Settings};

use crate::error::{ConvertError, Result};
use crate::model::attachment::AttachmentIndex;
use crate::sniff;

use super::report::{Report, Warning};
use super::scan::MediaRef;
use super::UnresolvedRemote;

/// Resolution inputs for one document.
pub struct RewriteContext<'a> {
    /// Extracted attachments, keyed by content-id and filename.
    pub attachments: &'a AttachmentIndex,

    /// Successfully fetched URLs and where their bytes landed. Failed or
    /// never-scheduled URLs are absent.
    pub fetched: &'a HashMap<String, PathBuf>,

    /// Whether remote downloading ran at all. When it did not, a remote
    /// reference being unresolved is expected and not worth a warning.
    pub download_remote: bool,

    /// Policy for remote references without a fetched file.
    pub unresolved_remote: UnresolvedRemote,

    /// Per-item progress logging.
    pub verbose: bool,
}

/// Rewrite every media-bearing element of `html` against the resolution
/// tables.
///
/// Each element makes exactly one transition: rewritten to a local path,
/// removed, or left as-is. Presentation attributes pointing at never-fetched
/// remote variants (`loading`, `srcset`) are stripped first.
pub fn rewrite_document(
    html: &str,
    ctx: &RewriteContext<'_>,
    report: &mut Report,
) -> Result<String> {
    let report = RefCell::new(report);
    let mut output = Vec::with_capacity(html.len());

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("img", |el| rewrite_media_element(el, true, ctx, &report)),
                element!("video", |el| rewrite_media_element(el, false, ctx, &report)),
                element!("source", |el| rewrite_media_element(el, false, ctx, &report)),
            ],
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );

    rewriter
        .write(html.as_bytes())
        .map_err(|e| ConvertError::Rewrite(e.to_string()))?;
    rewriter
        .end()
        .map_err(|e| ConvertError::Rewrite(e.to_string()))?;

    String::from_utf8(output).map_err(|e| ConvertError::Rewrite(e.to_string()))
}

fn rewrite_media_element(
    el: &mut Element,
    expects_image: bool,
    ctx: &RewriteContext<'_>,
    report: &RefCell<&mut Report>,
) -> lol_html::HandlerResult {
    el.remove_attribute("loading");
    el.remove_attribute("srcset");

    // No reference, nothing to resolve (e.g. a <video> holding <source>
    // children).
    let Some(src) = el.get_attribute("src") else {
        return Ok(());
    };

    match MediaRef::classify(&src) {
        MediaRef::Http(url) => {
            let Some(local) = ctx.fetched.get(&url) else {
                if ctx.download_remote {
                    report
                        .borrow_mut()
                        .warn(Warning::UnresolvedRemote { url });
                }
                if ctx.unresolved_remote == UnresolvedRemote::Remove {
                    el.remove();
                }
                return Ok(());
            };

            let detected = match sniff::detect_file(local) {
                Ok(detected) => detected,
                Err(e) => {
                    // The table said fetched, but the file cannot be read
                    // back; treat the reference as unresolved.
                    report.borrow_mut().warn(Warning::FetchFailed {
                        url,
                        cause: format!("cannot read '{}': {e}", local.display()),
                    });
                    return Ok(());
                }
            };

            if expects_image && !sniff::is_image(detected) {
                report.borrow_mut().warn(Warning::TypeMismatch {
                    url,
                    detected: detected.to_string(),
                });
                el.remove();
                return Ok(());
            }

            let local = local.to_string_lossy();
            if ctx.verbose {
                tracing::info!(from = %url, to = %local, "Replaced media reference");
            }
            el.set_attribute("src", &local)?;
        }

        MediaRef::Cid(cid) => match ctx.attachments.get(&cid) {
            Some(local) => {
                let local = local.to_string_lossy();
                if ctx.verbose {
                    tracing::info!(from = %src, to = %local, "Replaced media reference");
                }
                el.set_attribute("src", &local)?;
            }
            None => {
                report.borrow_mut().warn(Warning::UnresolvedCid { cid });
            }
        },

        MediaRef::Other(raw) => {
            report
                .borrow_mut()
                .warn(Warning::UnsupportedReference { src: raw });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context<'a>(
        attachments: &'a AttachmentIndex,
        fetched: &'a HashMap<String, PathBuf>,
    ) -> RewriteContext<'a> {
        RewriteContext {
            attachments,
            fetched,
            download_remote: true,
            unresolved_remote: UnresolvedRemote::Keep,
            verbose: false,
        }
    }

    #[test]
    fn test_cid_hit_is_rewritten() {
        let mut attachments = AttachmentIndex::default();
        attachments.insert("img1@mail", "attachments/k.a0.pic.png");
        let fetched = HashMap::new();
        let mut report = Report::new();

        let out = rewrite_document(
            r#"<html><body><img src="cid:img1@mail"></body></html>"#,
            &context(&attachments, &fetched),
            &mut report,
        )
        .unwrap();

        assert!(out.contains(r#"src="attachments/k.a0.pic.png""#), "{out}");
        assert!(report.warnings().is_empty());
    }

    #[test]
    fn test_cid_miss_is_left_with_warning() {
        let attachments = AttachmentIndex::default();
        let fetched = HashMap::new();
        let mut report = Report::new();

        let out = rewrite_document(
            r#"<img src="cid:ghost@mail">"#,
            &context(&attachments, &fetched),
            &mut report,
        )
        .unwrap();

        assert!(out.contains(r#"src="cid:ghost@mail""#), "{out}");
        assert_eq!(report.warnings().len(), 1);
        assert!(matches!(
            &report.warnings()[0],
            Warning::UnresolvedCid { cid } if cid == "ghost@mail"
        ));
    }

    #[test]
    fn test_presentation_attributes_are_stripped() {
        let attachments = AttachmentIndex::default();
        let fetched = HashMap::new();
        let mut report = Report::new();

        let out = rewrite_document(
            r#"<img loading="lazy" srcset="http://x.test/a-2x.jpg 2x" src="cid:ghost">"#,
            &context(&attachments, &fetched),
            &mut report,
        )
        .unwrap();

        assert!(!out.contains("loading"), "{out}");
        assert!(!out.contains("srcset"), "{out}");
    }

    #[test]
    fn test_fetched_image_is_rewritten() {
        let tmp = tempfile::tempdir().unwrap();
        let local = tmp.path().join("abc.jpg");
        std::fs::write(&local, b"\xFF\xD8\xFF\xE0rest-of-jpeg").unwrap();

        let attachments = AttachmentIndex::default();
        let mut fetched = HashMap::new();
        fetched.insert("http://x.test/a.jpg".to_string(), local.clone());
        let mut report = Report::new();

        let out = rewrite_document(
            r#"<img src="http://x.test/a.jpg">"#,
            &context(&attachments, &fetched),
            &mut report,
        )
        .unwrap();

        assert!(
            out.contains(&format!(r#"src="{}""#, local.display())),
            "{out}"
        );
        assert!(report.warnings().is_empty());
    }

    #[test]
    fn test_non_image_payload_removes_img() {
        let tmp = tempfile::tempdir().unwrap();
        let local = tmp.path().join("abc.jpg");
        std::fs::write(&local, b"<html><body>404 not found</body></html>").unwrap();

        let attachments = AttachmentIndex::default();
        let mut fetched = HashMap::new();
        fetched.insert("http://x.test/a.jpg".to_string(), local);
        let mut report = Report::new();

        let out = rewrite_document(
            r#"<p>before</p><img src="http://x.test/a.jpg"><p>after</p>"#,
            &context(&attachments, &fetched),
            &mut report,
        )
        .unwrap();

        assert!(!out.contains("<img"), "{out}");
        assert!(out.contains("before") && out.contains("after"), "{out}");
        assert!(matches!(
            &report.warnings()[0],
            Warning::TypeMismatch { detected, .. } if detected == "text/html"
        ));
    }

    #[test]
    fn test_video_does_not_expect_image() {
        let tmp = tempfile::tempdir().unwrap();
        let local = tmp.path().join("clip.mp4");
        std::fs::write(&local, b"\x00\x00\x00\x20ftypisomrest").unwrap();

        let attachments = AttachmentIndex::default();
        let mut fetched = HashMap::new();
        fetched.insert("http://x.test/clip.mp4".to_string(), local.clone());
        let mut report = Report::new();

        let out = rewrite_document(
            r#"<video src="http://x.test/clip.mp4"></video>"#,
            &context(&attachments, &fetched),
            &mut report,
        )
        .unwrap();

        assert!(
            out.contains(&format!(r#"src="{}""#, local.display())),
            "{out}"
        );
        assert!(report.warnings().is_empty());
    }

    #[test]
    fn test_unresolved_remote_kept_and_warned() {
        let attachments = AttachmentIndex::default();
        let fetched = HashMap::new();
        let mut report = Report::new();

        let out = rewrite_document(
            r#"<img src="http://x.test/gone.jpg">"#,
            &context(&attachments, &fetched),
            &mut report,
        )
        .unwrap();

        assert!(out.contains("http://x.test/gone.jpg"), "{out}");
        assert!(matches!(
            &report.warnings()[0],
            Warning::UnresolvedRemote { url } if url == "http://x.test/gone.jpg"
        ));
    }

    #[test]
    fn test_unresolved_remote_silent_when_download_disabled() {
        let attachments = AttachmentIndex::default();
        let fetched = HashMap::new();
        let mut ctx = context(&attachments, &fetched);
        ctx.download_remote = false;
        let mut report = Report::new();

        let out = rewrite_document(r#"<img src="http://x.test/a.jpg">"#, &ctx, &mut report).unwrap();

        assert!(out.contains("http://x.test/a.jpg"), "{out}");
        assert!(report.warnings().is_empty());
    }

    #[test]
    fn test_unresolved_remote_remove_policy() {
        let attachments = AttachmentIndex::default();
        let fetched = HashMap::new();
        let mut ctx = context(&attachments, &fetched);
        ctx.unresolved_remote = UnresolvedRemote::Remove;
        let mut report = Report::new();

        let out = rewrite_document(
            r#"<p>text</p><img src="http://x.test/gone.jpg">"#,
            &ctx,
            &mut report,
        )
        .unwrap();

        assert!(!out.contains("<img"), "{out}");
        assert!(out.contains("text"), "{out}");
    }

    #[test]
    fn test_other_scheme_left_and_warned() {
        let attachments = AttachmentIndex::default();
        let fetched = HashMap::new();
        let mut report = Report::new();

        let out = rewrite_document(
            r#"<img src="data:image/gif;base64,R0lGOD"><video controls><source src="http://x.test/c.webm"></video>"#,
            &context(&attachments, &fetched),
            &mut report,
        )
        .unwrap();

        assert!(out.contains("data:image/gif;base64,R0lGOD"), "{out}");
        // data: warned as unsupported; the source URL warned as unresolved
        assert_eq!(report.warnings().len(), 2);
        assert!(matches!(&report.warnings()[0], Warning::UnsupportedReference { .. }));
    }
}
