use crate::login::is_login_form;
use crate::result::{HeadingCounts, MarkupVersion};
use scraper::{ElementRef, Html, Node};
use tracing::debug;

/// Signals gathered by one walk over a parsed document, before any link is
/// resolved or probed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSignals {
    pub title: String,
    pub markup_version: MarkupVersion,
    pub heading_counts: HeadingCounts,
    pub has_login_form: bool,
    /// Literal `href` values of anchors, in document order.
    pub hrefs: Vec<String>,
}

/// Accumulator owned by a single traversal.
#[derive(Default)]
struct SignalBuilder {
    title: Option<String>,
    markup_version: Option<MarkupVersion>,
    heading_counts: HeadingCounts,
    has_login_form: bool,
    hrefs: Vec<String>,
}

impl SignalBuilder {
    fn visit(&mut self, element: ElementRef<'_>) {
        let name = element.value().name();
        match name {
            "html" => {
                if self.markup_version.is_none() {
                    self.markup_version = Some(detect_markup_version(element));
                }
            }
            "title" => {
                if self.title.is_none() {
                    let text = element.text().collect::<String>();
                    let text = text.trim();
                    if !text.is_empty() {
                        self.title = Some(text.to_string());
                    }
                }
            }
            "a" => {
                if let Some(href) = element.value().attr("href")
                    && !href.is_empty()
                {
                    debug!("Found link: {}", href);
                    self.hrefs.push(href.to_string());
                }
            }
            "form" => {
                if !self.has_login_form && is_login_form(element) {
                    self.has_login_form = true;
                }
            }
            _ => {
                if let Some(level) = HeadingCounts::level_of(name) {
                    self.heading_counts.increment(level);
                }
            }
        }
    }

    fn finish(self) -> DocumentSignals {
        DocumentSignals {
            title: self.title.unwrap_or_default(),
            markup_version: self.markup_version.unwrap_or_default(),
            heading_counts: self.heading_counts,
            has_login_form: self.has_login_form,
            hrefs: self.hrefs,
        }
    }
}

/// Walks the whole element tree once, depth-first in document order, and
/// collects every signal in the same pass. Matched elements are still
/// descended into, so nested headings, forms and anchors are all seen.
pub fn analyze_document(document: &Html) -> DocumentSignals {
    let mut builder = SignalBuilder::default();

    for node in document.root_element().descendants() {
        if let Some(element) = ElementRef::wrap(node) {
            builder.visit(element);
        }
    }

    builder.finish()
}

/// Parses raw page bytes. Invalid UTF-8 sequences are replaced rather than rejected.
pub fn parse_markup(body: &[u8]) -> Html {
    Html::parse_document(&String::from_utf8_lossy(body))
}

fn detect_markup_version(html: ElementRef<'_>) -> MarkupVersion {
    // A doctype next to the root element wins
    if let Some(parent) = html.parent()
        && parent.value().is_document()
    {
        let has_html_doctype = parent.children().any(|sibling| match sibling.value() {
            Node::Doctype(doctype) => doctype.name().to_lowercase().contains("html"),
            _ => false,
        });
        if has_html_doctype {
            return MarkupVersion::Html5;
        }
    }

    let xhtml = html
        .value()
        .attrs()
        .any(|(key, value)| key == "xmlns" || value.contains("xhtml"));
    if xhtml {
        MarkupVersion::Xhtml
    } else {
        MarkupVersion::Html5
    }
}
