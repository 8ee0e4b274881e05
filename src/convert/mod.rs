//! The conversion pipeline: one `.eml` file in, one `.html` file out.
//!
//! Control flow per message: parse, drop ad blocks, extract attachments,
//! scan for remote media, run the bounded fetch batch, rewrite every media
//! reference, finalize title/lang/charset, write the output file. The DOM is
//! only touched after the fetch batch has fully settled.

pub mod extract;
pub mod fetch;
pub mod finalize;
pub mod report;
pub mod rewrite;
pub mod scan;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use scraper::{Html, Selector};
use sha2::{Digest, Sha256};

use crate::error::{ConvertError, Result};
use crate::parser::eml;

use report::{Report, Warning};
use rewrite::RewriteContext;

/// What to do with a remote reference that ends up without a fetched file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnresolvedRemote {
    /// Leave the element as-is.
    #[default]
    Keep,

    /// Remove the element from the output.
    Remove,
}

impl FromStr for UnresolvedRemote {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "keep" => Ok(Self::Keep),
            "remove" => Ok(Self::Remove),
            other => Err(format!("unknown policy '{other}', expected 'keep' or 'remove'")),
        }
    }
}

impl fmt::Display for UnresolvedRemote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keep => f.write_str("keep"),
            Self::Remove => f.write_str("remove"),
        }
    }
}

/// Options driving a conversion run.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Download remote media. When false the fetch engine is skipped
    /// entirely and every http(s) reference stays as it was.
    pub download_remote: bool,

    /// Per-item progress logging.
    pub verbose: bool,

    /// Where downloaded media lands.
    pub media_dir: PathBuf,

    /// Where extracted attachments land.
    pub attachment_dir: PathBuf,

    /// Policy for remote references without a fetched file.
    pub unresolved_remote: UnresolvedRemote,

    /// User-Agent header for remote fetches; a default is derived from the
    /// crate name and version when unset.
    pub user_agent: Option<String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            download_remote: false,
            verbose: false,
            media_dir: PathBuf::from("media"),
            attachment_dir: PathBuf::from("attachments"),
            unresolved_remote: UnresolvedRemote::Keep,
            user_agent: None,
        }
    }
}

/// What one successful conversion produced.
#[derive(Debug)]
pub struct Conversion {
    /// The written `.html` file.
    pub output: PathBuf,

    /// Recoverable problems hit along the way, in order.
    pub warnings: Vec<Warning>,
}

/// Converts `.eml` files into self-contained HTML documents.
pub struct Converter {
    client: reqwest::Client,
    options: ConvertOptions,
}

impl Converter {
    pub fn new(options: ConvertOptions) -> Result<Self> {
        let user_agent = options.user_agent.clone().unwrap_or_else(|| {
            concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
        });
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .use_rustls_tls()
            .build()
            .map_err(|e| ConvertError::HttpClient(e.to_string()))?;
        Ok(Self { client, options })
    }

    /// Convert one message. The output lands next to the input with the
    /// extension swapped to `.html`; media and attachments are written into
    /// the configured directories as a side effect.
    pub async fn convert_file(&self, source: &Path) -> Result<Conversion> {
        let mut report = Report::new();

        let mail = eml::load_eml(source)?;
        let body = match mail.html.as_deref() {
            Some(body) => body.to_string(),
            None => {
                tracing::warn!(file = %source.display(), "Message has no body");
                String::new()
            }
        };

        // Parsing normalizes whatever the message carried into a full
        // document (html/head/body), which the rewrite passes rely on.
        let mut doc = Html::parse_document(&body);
        remove_ad_blocks(&mut doc);

        let attachments = extract::extract_attachments(
            &mail,
            source,
            &self.options.attachment_dir,
            self.options.verbose,
            &mut report,
        )?;

        let jobs = scan::collect_media(&doc, &self.options.media_dir, &mut report);
        let fetched = if self.options.download_remote && !jobs.is_empty() {
            std::fs::create_dir_all(&self.options.media_dir).map_err(|e| {
                ConvertError::CreateDir {
                    path: self.options.media_dir.clone(),
                    source: e,
                }
            })?;
            fetch::fetch_all(&self.client, jobs, &mut report).await
        } else {
            HashMap::new()
        };

        let ctx = RewriteContext {
            attachments: &attachments,
            fetched: &fetched,
            download_remote: self.options.download_remote,
            unresolved_remote: self.options.unresolved_remote,
            verbose: self.options.verbose,
        };
        let rewritten = rewrite::rewrite_document(&doc.root_element().html(), &ctx, &mut report)?;
        let finalized = finalize::finalize_document(&rewritten, &mail)?;

        let output = source.with_extension("html");
        std::fs::write(&output, &finalized).map_err(|e| ConvertError::WriteOutput {
            path: output.clone(),
            source: e,
        })?;

        Ok(Conversion {
            output,
            warnings: report.into_warnings(),
        })
    }
}

/// Drop feed-reader ad blocks: a `<center>` wrapping a `<div>` whose text
/// advertises "ads from inoreader".
fn remove_ad_blocks(doc: &mut Html) {
    let centers = Selector::parse("center").expect("valid selector");
    let divs = Selector::parse("div").expect("valid selector");

    let doomed: Vec<_> = doc
        .select(&centers)
        .filter(|center| {
            center
                .select(&divs)
                .any(|div| div.text().collect::<String>().contains("ads from inoreader"))
        })
        .map(|center| center.id())
        .collect();

    for id in doomed {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// Stable 32-hex-char hash used for deterministic file names.
pub(crate) fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(32);
    hex
}
