//! Media reference classification and the document scanner.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use scraper::{Html, Selector};
use url::Url;

use crate::model::attachment::normalize_content_id;

use super::report::{Report, Warning};
use super::short_hash;

/// Elements whose `src` attribute names fetchable media.
pub const MEDIA_SELECTOR: &str = "img, video, source";

/// A classified `src` attribute value.
///
/// Classification happens exactly once per element; the rewriter matches on
/// the variant instead of re-checking string prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRef {
    /// An absolute http(s) URL.
    Http(String),

    /// A `cid:` reference, prefix stripped and angle brackets normalized.
    Cid(String),

    /// Anything else: data URLs, relative paths, unknown schemes, or an
    /// empty/missing `src`.
    Other(String),
}

impl MediaRef {
    /// Classify a raw `src` attribute value.
    pub fn classify(src: &str) -> Self {
        if src.starts_with("http://") || src.starts_with("https://") {
            Self::Http(src.to_string())
        } else if let Some(cid) = src.strip_prefix("cid:") {
            Self::Cid(normalize_content_id(cid).to_string())
        } else {
            Self::Other(src.to_string())
        }
    }
}

/// One deduplicated remote fetch: the source URL and its local destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub url: String,
    pub dest: PathBuf,
}

/// Collect the deduplicated download set of `doc`.
///
/// Walks every media-bearing element in document order, keeps the `Http`
/// references, and assigns each distinct URL one deterministic destination
/// under `media_dir`: the URL hash plus the extension of the URL path.
/// Malformed URLs are warned about once and excluded from the set. The scan
/// never mutates the document.
pub fn collect_media(doc: &Html, media_dir: &Path, report: &mut Report) -> Vec<FetchJob> {
    let selector = Selector::parse(MEDIA_SELECTOR).expect("valid selector");

    let mut seen: HashSet<String> = HashSet::new();
    let mut jobs = Vec::new();

    for element in doc.select(&selector) {
        let Some(src) = element.value().attr("src") else {
            continue;
        };
        let MediaRef::Http(url) = MediaRef::classify(src) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }

        match Url::parse(&url) {
            Ok(parsed) => {
                let filename = format!("{}{}", short_hash(&url), path_extension(parsed.path()));
                jobs.push(FetchJob {
                    url,
                    dest: media_dir.join(filename),
                });
            }
            Err(e) => {
                report.warn(Warning::MalformedUrl {
                    src: url,
                    cause: e.to_string(),
                });
            }
        }
    }

    jobs
}

/// Extension of the final path segment, dot included; empty when absent.
/// The query string never reaches here (`Url::path` excludes it).
fn path_extension(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or("");
    match name.rfind('.') {
        Some(pos) => &name[pos..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            MediaRef::classify("http://x.test/a.jpg"),
            MediaRef::Http("http://x.test/a.jpg".into())
        );
        assert_eq!(
            MediaRef::classify("https://x.test/a.jpg"),
            MediaRef::Http("https://x.test/a.jpg".into())
        );
        assert_eq!(
            MediaRef::classify("cid:img1@mail"),
            MediaRef::Cid("img1@mail".into())
        );
        assert_eq!(
            MediaRef::classify("cid:<img1@mail>"),
            MediaRef::Cid("img1@mail".into())
        );
        assert_eq!(
            MediaRef::classify("data:image/gif;base64,R0lGOD"),
            MediaRef::Other("data:image/gif;base64,R0lGOD".into())
        );
        assert_eq!(MediaRef::classify("pic/local.png"), MediaRef::Other("pic/local.png".into()));
        assert_eq!(MediaRef::classify(""), MediaRef::Other(String::new()));
    }

    #[test]
    fn test_collect_media_dedup_and_order() {
        let html = r#"<html><body>
            <img src="http://x.test/a.jpg">
            <img src="http://x.test/b.png">
            <img src="http://x.test/a.jpg">
            <video src="http://x.test/clip.mp4"></video>
            <source src="http://x.test/b.png">
            <img src="cid:inline@mail">
            <img alt="no src">
        </body></html>"#;
        let doc = Html::parse_document(html);
        let mut report = Report::new();

        let jobs = collect_media(&doc, Path::new("media"), &mut report);

        assert!(report.warnings().is_empty());
        let urls: Vec<&str> = jobs.iter().map(|j| j.url.as_str()).collect();
        assert_eq!(
            urls,
            [
                "http://x.test/a.jpg",
                "http://x.test/b.png",
                "http://x.test/clip.mp4"
            ]
        );
    }

    #[test]
    fn test_collect_media_destinations() {
        let html = r#"<img src="http://x.test/pics/photo.jpg?width=600">
                      <img src="http://x.test/no-extension">"#;
        let doc = Html::parse_document(html);
        let mut report = Report::new();

        let jobs = collect_media(&doc, Path::new("media"), &mut report);
        assert_eq!(jobs.len(), 2);

        let first = jobs[0].dest.to_string_lossy().into_owned();
        assert!(first.starts_with("media/"), "{first}");
        assert!(first.ends_with(".jpg"), "query must not leak into the name: {first}");
        assert!(!first.contains("600"));

        let second = jobs[1].dest.to_string_lossy().into_owned();
        assert!(!second.contains('.'), "no extension expected: {second}");

        // Same URL, same destination, every time.
        let again = collect_media(&doc, Path::new("media"), &mut Report::new());
        assert_eq!(jobs, again);
    }

    #[test]
    fn test_collect_media_malformed_url_warns_once() {
        let html = r#"<img src="http://"><img src="http://">"#;
        let doc = Html::parse_document(html);
        let mut report = Report::new();

        let jobs = collect_media(&doc, Path::new("media"), &mut report);

        assert!(jobs.is_empty());
        assert_eq!(report.warnings().len(), 1);
        assert!(matches!(
            &report.warnings()[0],
            Warning::MalformedUrl { src, .. } if src == "http://"
        ));
    }

    #[test]
    fn test_path_extension() {
        assert_eq!(path_extension("/pics/photo.jpg"), ".jpg");
        assert_eq!(path_extension("/pics/archive.tar.gz"), ".gz");
        assert_eq!(path_extension("/plain"), "");
        assert_eq!(path_extension("/"), "");
        assert_eq!(path_extension(""), "");
    }
}
