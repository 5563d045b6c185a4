//! Document types produced by the fetcher

use serde::Serialize;

/// Where a document's text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Fetched from the primary or backup URL
    Live,
    /// Bundled substitute served when live retrieval failed
    Fallback,
}

/// The document text plus its counts.
///
/// Counts are derived from `content` at construction and the fields are
/// private, so they cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    content: String,
    character_count: usize,
    word_count: usize,
    #[serde(rename = "source")]
    origin: Origin,
}

impl SourceDocument {
    pub fn new(content: String, origin: Origin) -> Self {
        let character_count = content.chars().count();
        let word_count = content.split_whitespace().count();
        Self {
            content,
            character_count,
            word_count,
            origin,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn character_count(&self) -> usize {
        self.character_count
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_live(&self) -> bool {
        self.origin == Origin::Live
    }

    /// Counts without the body, for the stats endpoint and chat answers
    pub fn stats(&self) -> SourceStats {
        SourceStats {
            character_count: self.character_count,
            word_count: self.word_count,
            source: self.origin,
        }
    }
}

/// Document counts without the content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStats {
    pub character_count: usize,
    pub word_count: usize,
    pub source: Origin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_content() {
        let doc = SourceDocument::new("Meal  allowance\nrates".to_string(), Origin::Live);
        assert_eq!(doc.character_count(), 21);
        assert_eq!(doc.word_count(), 3);
        assert!(doc.is_live());
    }

    #[test]
    fn counts_are_unicode_scalars() {
        let doc = SourceDocument::new("café à".to_string(), Origin::Live);
        assert_eq!(doc.character_count(), 6);
        assert_eq!(doc.word_count(), 2);
    }

    #[test]
    fn empty_document_has_no_words() {
        let doc = SourceDocument::new(String::new(), Origin::Fallback);
        assert_eq!(doc.character_count(), 0);
        assert_eq!(doc.word_count(), 0);
    }

    #[test]
    fn serializes_with_source_field() {
        let doc = SourceDocument::new("a b".to_string(), Origin::Fallback);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["content"], "a b");
        assert_eq!(json["characterCount"], 3);
        assert_eq!(json["wordCount"], 2);
        assert_eq!(json["source"], "fallback");
    }
}
