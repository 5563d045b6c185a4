//! Main-content selection
//!
//! Policy pages wrap the document in site navigation, banners and footers.
//! Those are removed and the text of the first non-empty content container
//! is kept, falling back to `<body>`. The result still goes through
//! [`sanitize_html`] for the output-shape guarantees.

use scraper::{Html, Selector};

use crate::source::sanitize::sanitize_html;

/// Page chrome dropped before any text is read
const BOILERPLATE: &str = "script, style, noscript, template, nav, header, footer";

/// Content containers in priority order
const CONTENT_ROOTS: &[&str] = &["main", "[role=\"main\"]", "article", "body"];

/// Text of the page's main content, boilerplate removed
pub fn extract_main_text(html: &str) -> String {
    let mut document = Html::parse_document(html);

    if let Ok(boilerplate) = Selector::parse(BOILERPLATE) {
        let chrome: Vec<_> = document.select(&boilerplate).map(|el| el.id()).collect();
        for id in chrome {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    for root in CONTENT_ROOTS {
        let Ok(selector) = Selector::parse(root) else {
            continue;
        };
        let text = document
            .select(&selector)
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .find(|text| !text.trim().is_empty());
        if let Some(text) = text {
            return text;
        }
    }

    String::new()
}

/// Fetched page to the plain text embedded in prompts
pub fn page_text(html: &str) -> String {
    sanitize_html(&extract_main_text(html))
}
