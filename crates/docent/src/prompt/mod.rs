//! Grounding prompt assembly
//!
//! Builds the system instruction that pins the model to the fetched
//! document, and the user instruction carrying the question.

use crate::config::PromptConfig;
use crate::source::SourceDocument;

/// Marker substituted for the middle of an oversized document
pub const TRUNCATION_MARKER: &str = " ... [content truncated for length] ... ";

/// System instruction template
///
/// Placeholders: {title} - document name, {content} - sanitized document text
pub const SYSTEM_PROMPT: &str = r#"You are an expert assistant specialized in the {title}.

Source Content:
{content}

When answering:
1. Answer ONLY from the source content above; never rely on outside knowledge
2. If the information is not in the source content, say so explicitly
3. Cite the relevant sections whenever they can be identified
4. Organize answers with bullet points, numbered steps and **bold** key terms for clarity
5. Keep responses clear, accurate and concise

Remember: only provide information that is directly supported by the source content."#;

/// The two instructions sent upstream for one question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    pub system: String,
    pub user: String,
    /// Characters of document text embedded in `system`, after truncation
    pub embedded_chars: usize,
}

/// Composes [`PromptSet`]s for a fixed document title and size bound
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    document_title: String,
    max_content_chars: usize,
}

impl PromptBuilder {
    pub fn new(config: &PromptConfig) -> Self {
        Self {
            document_title: config.document_title.clone(),
            max_content_chars: config.max_content_chars,
        }
    }

    pub fn compose(&self, document: &SourceDocument, question: &str) -> PromptSet {
        let content = truncate_middle(document.content(), self.max_content_chars);
        let embedded_chars = content.chars().count();

        // Title first, so a literal "{title}" inside the document survives
        let system = SYSTEM_PROMPT
            .replacen("{title}", &self.document_title, 1)
            .replacen("{content}", &content, 1);

        PromptSet {
            system,
            user: question.to_string(),
            embedded_chars,
        }
    }
}

/// Keep the first and last `max_chars / 2` characters of `text` and put
/// [`TRUNCATION_MARKER`] between them. Text within the bound is returned as is.
pub fn truncate_middle(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }

    let half = max_chars / 2;
    let head_end = text
        .char_indices()
        .nth(half)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let tail_start = text
        .char_indices()
        .nth(total - half)
        .map(|(i, _)| i)
        .unwrap_or(text.len());

    let mut out = String::with_capacity(head_end + TRUNCATION_MARKER.len() + text.len() - tail_start);
    out.push_str(&text[..head_end]);
    out.push_str(TRUNCATION_MARKER);
    out.push_str(&text[tail_start..]);
    out
}
