//! Document finalization: title, language, and charset metadata.

use lol_html::html_content::ContentType;
use lol_html::{element, HtmlRewriter, Settings};
use scraper::{Html, Selector};

use crate::error::{ConvertError, Result};
use crate::model::mail::Mail;

/// What the rewritten document already declares.
struct Facts {
    has_title: bool,
    title_empty: bool,
    has_lang: bool,
    declares_charset: bool,
}

fn gather_facts(html: &str) -> Facts {
    let doc = Html::parse_document(html);
    let titles = Selector::parse("title").expect("valid selector");
    let metas = Selector::parse("meta").expect("valid selector");

    let title = doc.select(&titles).next();
    let has_title = title.is_some();
    let title_empty = title
        .map(|t| t.text().collect::<String>().trim().is_empty())
        .unwrap_or(false);

    let has_lang = doc.root_element().value().attr("lang").is_some();

    let declares_charset = doc.select(&metas).any(|meta| {
        let v = meta.value();
        v.attr("charset").is_some()
            || v.attr("http-equiv")
                .map(|h| h.eq_ignore_ascii_case("content-type"))
                .unwrap_or(false)
    });

    Facts {
        has_title,
        title_empty,
        has_lang,
        declares_charset,
    }
}

/// Fill in the metadata the document is missing.
///
/// The title text is the decoded subject: a missing `<title>` is appended to
/// `<head>`, an empty one gets its text set. `lang` comes from the message's
/// Content-Language header when the document declares none. The pipeline
/// works on decoded UTF-8 throughout, so a missing charset declaration is
/// inserted as UTF-8 and an existing one is rewritten to UTF-8 to match the
/// bytes actually written.
pub fn finalize_document(html: &str, mail: &Mail) -> Result<String> {
    let facts = gather_facts(html);

    let mut handlers = Vec::new();

    if !facts.declares_charset || !facts.has_title {
        let subject = mail.subject.clone();
        let add_charset = !facts.declares_charset;
        let add_title = !facts.has_title;
        handlers.push(element!("head", move |el| {
            if add_charset {
                el.prepend(r#"<meta charset="utf-8">"#, ContentType::Html);
            }
            if add_title {
                el.append(
                    &format!("<title>{}</title>", escape_text(&subject)),
                    ContentType::Html,
                );
            }
            Ok(())
        }));
    }

    if facts.has_title && facts.title_empty && !mail.subject.is_empty() {
        let subject = mail.subject.clone();
        handlers.push(element!("title", move |el| {
            el.set_inner_content(&subject, ContentType::Text);
            Ok(())
        }));
    }

    if !facts.has_lang {
        if let Some(lang) = mail.content_language.clone() {
            handlers.push(element!("html", move |el| {
                el.set_attribute("lang", &lang)?;
                Ok(())
            }));
        }
    }

    if facts.declares_charset {
        handlers.push(element!("meta", |el| {
            if el.has_attribute("charset") {
                el.set_attribute("charset", "utf-8")?;
            } else if el
                .get_attribute("http-equiv")
                .map(|h| h.eq_ignore_ascii_case("content-type"))
                .unwrap_or(false)
            {
                el.set_attribute("content", "text/html; charset=utf-8")?;
            }
            Ok(())
        }));
    }

    let mut output = Vec::with_capacity(html.len());
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
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

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
