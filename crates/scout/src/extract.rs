//! Flatten fetched HTML into the tagged text block fed back to the model.
//!
//! Every page, readable or not, renders to the same three-section envelope:
//!
//! ```text
//! <HTML CONTENT>
//! ...
//! </HTML CONTENT>
//! <PUBLISHED DATE>
//! ...
//! </PUBLISHED DATE>
//! <URL>
//! ...
//! </URL>
//! ```
pub mod date;

use chrono::NaiveDate;
use scraper::{Html, Node};

pub const NO_PUBLISHED_DATE: &str = "No published date found";
pub const UNREADABLE_PAGE_NOTICE: &str = "There was an error reading this page, disregard it!";

/// Tags whose text survives extraction
const TEXT_TAGS: &[&str] = &[
    "a",
    "p",
    "span",
    "em",
    "strong",
    "blockquote",
    "q",
    "cite",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
];

/// Extracted text plus metadata for one fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceDocument {
    pub url: String,
    pub text: String,
    pub published: Option<NaiveDate>,
    pub fetch_error: Option<String>,
}

impl EvidenceDocument {
    /// Extract a document from a fetched HTML body
    pub fn from_html(url: &str, body: &[u8]) -> Self {
        let html = String::from_utf8_lossy(body);
        let document = Html::parse_document(&html);

        let text = flatten_text(&document);
        let published = match date::published_date(&document, url) {
            Ok(date) => Some(date),
            Err(e) => {
                tracing::warn!(url, error = %e, "Failed to extract date");
                None
            }
        };

        Self {
            url: url.to_string(),
            text,
            published,
            fetch_error: None,
        }
    }

    /// Placeholder for a page that could not be fetched or read
    pub fn unreadable<E: ToString>(url: &str, error: E) -> Self {
        Self {
            url: url.to_string(),
            text: UNREADABLE_PAGE_NOTICE.to_string(),
            published: None,
            fetch_error: Some(error.to_string()),
        }
    }

    /// Render the three-section envelope
    pub fn render(&self) -> String {
        let published = self
            .published
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| NO_PUBLISHED_DATE.to_string());

        format!(
            "<HTML CONTENT>\n{}\n</HTML CONTENT>\n<PUBLISHED DATE>\n{}\n</PUBLISHED DATE>\n<URL>\n{}\n</URL>\n",
            self.text, published, self.url
        )
    }
}

/// Walk the document in source order, keeping text whose most recently opened tag is in
/// [`TEXT_TAGS`]. Closing tags do not reset the current tag, so trailing text after an
/// inline child is attributed to that child.
fn flatten_text(document: &Html) -> String {
    let mut out = String::new();
    let mut current: Option<(&str, Option<&str>)> = None;

    for node in document.tree.root().descendants() {
        match node.value() {
            Node::Element(element) => {
                let name = element.name();
                current = TEXT_TAGS
                    .contains(&name)
                    .then(|| (name, element.attr("href")));
            }
            Node::Text(text) => {
                let Some((tag, href)) = current else { continue };
                let data = text.trim();
                if data.is_empty() {
                    continue;
                }
                match tag {
                    "a" => {
                        out.push_str(&format!("[{}]({})", data, href.unwrap_or_default()));
                    }
                    "h1" | "h2" | "h3" => {
                        out.push_str("## ");
                        out.push_str(data);
                    }
                    "h4" | "h5" | "h6" => {
                        out.push_str("### ");
                        out.push_str(data);
                    }
                    _ => out.push_str(data),
                }
                out.push('\n');
            }
            _ => {}
        }
    }

    out.truncate(out.trim_end().len());
    out
}
