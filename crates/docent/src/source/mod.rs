//! Source document acquisition
//!
//! Fetching with retries and fallback, main-content extraction, HTML
//! sanitization, and the document type the rest of the pipeline consumes.

pub mod extract;
pub mod fallback;
pub mod fetcher;
pub mod sanitize;
pub mod types;

pub use extract::{extract_main_text, page_text};
pub use fallback::FALLBACK_TEXT;
pub use fetcher::{ContentFetcher, FetchError, RetryPolicy};
pub use sanitize::sanitize_html;
pub use types::{Origin, SourceDocument, SourceStats};
