//! Answer post-processing
//!
//! Normalizes model output into a consistent markdown shape. Every rule
//! leaves already-normalized text alone, which makes the whole transform
//! idempotent: `format(format(x)) == format(x)`.
//!
//! Line rules, applied to each line in order:
//! - `- x`, `* x`, `+ x`, `• x` become `• x`
//! - `1) x`, `1. x` become `1. x`
//! - a line ending in `:` that is not a list item becomes `### x`, if it
//!   is still short once the inline rules below have run
//!
//! Inline rules: known acronyms are wrapped in `**`, and bracketed section
//! references like `[4.2]` or `[Section 4.2]` become `(Section 4.2)`.
//!
//! Finally a `---` separator is placed before every header that is not at
//! the top or already preceded by one, and blank-line runs are collapsed.

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Acronyms emphasized wherever they appear as whole words
pub const ACRONYMS: &[&str] = &[
    "CFTDTI", "CAF", "DND", "CF", "TD", "PMV", "IR", "NJC", "CBI", "TB", "RTS",
];

/// Lines longer than this ending in `:` are sentences, not headers
const MAX_HEADER_CHARS: usize = 80;

const SEPARATOR: &str = "---";

static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)[-*+•]\s+(.*)$").expect("valid bullet regex"));

static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)(\d{1,3})[.)]\s+(.*)$").expect("valid numbered regex"));

static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s").expect("valid header regex"));

static ACRONYM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?:{})\b", ACRONYMS.join("|"))).expect("valid acronym regex")
});

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?:(?i:section|sec\.|s\.)\s*)?(\d+(?:\.\d+)*)\]").expect("valid reference regex")
});

/// Post-processor for model answers
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseFormatter;

impl ResponseFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn format(&self, text: &str) -> String {
        format_response(text)
    }
}

/// Apply every rule to `text`
pub fn format_response(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for raw in text.lines() {
        let line = format_line(raw.trim_end());
        if is_header(&line) && needs_separator(&lines) {
            lines.push(String::new());
            lines.push(SEPARATOR.to_string());
            lines.push(String::new());
        }
        lines.push(line);
    }

    collapse_blank_lines(lines)
}

fn format_line(line: &str) -> String {
    if let Some(caps) = BULLET.captures(line) {
        return rewrite_inline(&format!("{}• {}", &caps[1], &caps[2]));
    }
    if let Some(caps) = NUMBERED.captures(line) {
        return rewrite_inline(&format!("{}{}. {}", &caps[1], &caps[2], &caps[3]));
    }

    // Header length is judged on the rewritten text, which is what a
    // second pass will see
    let rewritten = rewrite_inline(line);
    match header_title(&rewritten) {
        Some(title) => format!("### {title}"),
        None => rewritten,
    }
}

fn rewrite_inline(line: &str) -> String {
    let cited = REFERENCE.replace_all(line, |caps: &Captures| {
        // `[1](url)` is a markdown link, not a reference
        let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
        if line[end..].starts_with('(') {
            caps[0].to_string()
        } else {
            format!("(Section {})", &caps[1])
        }
    });

    emphasize_acronyms(&cited)
}

/// The text of a colon-terminated line that should become a header
fn header_title(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if HEADER.is_match(trimmed) || trimmed.chars().count() > MAX_HEADER_CHARS {
        return None;
    }
    let title = trimmed.strip_suffix(':')?.trim_end();
    if title.is_empty() || title.ends_with(':') {
        return None;
    }
    Some(title)
}

fn emphasize_acronyms(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut last = 0;
    for m in ACRONYM.find_iter(line) {
        out.push_str(&line[last..m.start()]);
        let before = &line[..m.start()];
        let after = &line[m.end()..];
        // Anything touching an asterisk is already inside emphasis
        if before.ends_with('*') || after.starts_with('*') {
            out.push_str(m.as_str());
        } else {
            out.push_str("**");
            out.push_str(m.as_str());
            out.push_str("**");
        }
        last = m.end();
    }
    out.push_str(&line[last..]);
    out
}

fn is_header(line: &str) -> bool {
    HEADER.is_match(line.trim_start())
}

/// A header needs a separator unless it opens the text or one is already
/// the last non-blank line
fn needs_separator(lines: &[String]) -> bool {
    match lines.iter().rev().find(|l| !l.trim().is_empty()) {
        Some(previous) => previous.trim() != SEPARATOR,
        None => false,
    }
}

fn collapse_blank_lines(lines: Vec<String>) -> String {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        let blank = line.trim().is_empty();
        if blank && out.last().is_none_or(|l| l.is_empty()) {
            continue;
        }
        out.push(if blank { String::new() } else { line });
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_idempotent(input: &str) {
        let once = format_response(input);
        let twice = format_response(&once);
        assert_eq!(once, twice, "not idempotent for input {input:?}");
    }

    #[test]
    fn normalizes_bullets() {
        let out = format_response("- one\n* two\n+ three\n  • four");
        assert_eq!(out, "• one\n• two\n• three\n  • four");
    }

    #[test]
    fn normalizes_numbered_lists() {
        assert_eq!(format_response("1) first\n2.   second"), "1. first\n2. second");
    }

    #[test]
    fn promotes_colon_lines_with_separators() {
        let out = format_response("Intro text.\nMeals:\n- Breakfast\nLodging:\n- Hotel");
        assert_eq!(
            out,
            "Intro text.\n\n---\n\n### Meals\n• Breakfast\n\n---\n\n### Lodging\n• Hotel"
        );
    }

    #[test]
    fn leading_header_has_no_separator() {
        assert_eq!(format_response("Summary:\ntext"), "### Summary\ntext");
    }

    #[test]
    fn list_items_and_long_lines_are_not_headers() {
        let long = format!("{}:", "word ".repeat(30).trim_end());
        let input = format!("- Note:\n1. Step:\n{long}");
        let out = format_response(&input);
        assert!(!out.contains("###"));
    }

    #[test]
    fn emphasizes_acronyms_once() {
        assert_eq!(
            format_response("CAF members follow the CFTDTI."),
            "**CAF** members follow the **CFTDTI**."
        );
        assert_eq!(format_response("**CAF** already bold"), "**CAF** already bold");
        assert_eq!(format_response("CAFE and TDY stay"), "CAFE and TDY stay");
    }

    #[test]
    fn converts_references_to_citations() {
        assert_eq!(
            format_response("Rates apply [4.2] and [Section 5] and [s. 3.1.1]."),
            "Rates apply (Section 4.2) and (Section 5) and (Section 3.1.1)."
        );
        assert_eq!(
            format_response("see [1](https://example.com)"),
            "see [1](https://example.com)"
        );
    }

    #[test]
    fn header_length_is_measured_after_citation_rewrite() {
        let line = format!("{} [section          3]:", "a".repeat(60));
        assert_eq!(
            format_response(&line),
            format!("### {} (Section 3)", "a".repeat(60))
        );

        let long = format!("{} CAF TD:", "a".repeat(70));
        assert_eq!(
            format_response(&long),
            format!("{} **CAF** **TD**:", "a".repeat(70))
        );
    }

    #[test]
    fn collapses_blank_runs_and_trims() {
        assert_eq!(format_response("\n\na\n\n\n\nb\n\n"), "a\n\nb");
    }

    #[test]
    fn idempotent_on_representative_answers() {
        let samples = [
            "",
            "plain sentence",
            "Meals:\n- Breakfast: $20\n- Lunch [4.2]\n\nIncidentals:\n1) Daily rate applies to CAF members",
            "## Existing header\n---\n### Another\ntext",
            "Note:\nNote:\n:\n::\n- \n*emphasis* and **CAF** and *TD*",
            "**CAF members** travel per CFTDTI [Section 2]:",
            "   indented:   \n\t- tabbed bullet\n\r\nwindows line\r\n",
            "a\n\n\n---\n\n\nHeader:\n\n\n",
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa [section          3]:",
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa CAF TD:",
        ];
        for sample in samples {
            assert_idempotent(sample);
        }
    }

    #[test]
    fn idempotent_on_generated_inputs() {
        let fragments = [
            "Meals:", "- item", "* item", "1) step", "2. step", "", "  ", "CAF", "[3.1]",
            "**bold**", "---", "# Title", "text CFTDTI text", "x:", "• done",
        ];
        // every ordered pair and triple of fragments
        for a in fragments {
            for b in fragments {
                assert_idempotent(&format!("{a}\n{b}"));
                for c in fragments {
                    assert_idempotent(&format!("{a}\n{b}\n{c}"));
                }
            }
        }
    }
}
