//! HTML to plain text
//!
//! A pure text transform over fetched markup. It is not a parser and makes
//! no attempt to build a DOM; it guarantees only the output shape:
//!
//! - no `<` or `>` characters survive, even from malformed markup
//! - runs of whitespace become one ASCII space, and the ends are trimmed
//!
//! Edge cases:
//! - `<script>`/`<style>`/`<noscript>` blocks and comments are dropped with
//!   their contents. An unterminated block swallows the rest of the input.
//! - Nested tags are removed one tag at a time, so nesting depth is irrelevant.
//! - A dangling `<tag` without `>` is dropped up to the end of the input.
//! - Stray `<` ... `>` pairs in prose are indistinguishable from a tag and go too.
//! - `&lt;` and `&gt;` stay encoded; decoding them would reintroduce brackets.

use regex::Regex;
use std::sync::LazyLock;

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?(?:-->|\z)").expect("valid comment regex"));

static SCRIPT_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<script\b.*?(?:</script\s*>|\z)|<style\b.*?(?:</style\s*>|\z)|<noscript\b.*?(?:</noscript\s*>|\z)",
    )
    .expect("valid script regex")
});

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^<>]*>").expect("valid tag regex"));

static DANGLING_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^<>]*\z").expect("valid dangling tag regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Entities decoded after tag stripping, in order
const ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&amp;", "&"),
];

/// Reduce an HTML page to single-spaced plain text
pub fn sanitize_html(html: &str) -> String {
    let text = COMMENT.replace_all(html, " ");
    let text = SCRIPT_LIKE.replace_all(&text, " ");
    let text = TAG.replace_all(&text, " ");
    let text = DANGLING_TAG.replace_all(&text, " ");

    let mut text = text.replace(['<', '>'], " ");
    for (entity, replacement) in ENTITIES {
        text = text.replace(entity, replacement);
    }

    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_clean(output: &str) {
        assert!(!output.contains('<'), "found '<' in {output:?}");
        assert!(!output.contains('>'), "found '>' in {output:?}");
        assert!(!output.contains("  "), "double space in {output:?}");
        assert_eq!(output, output.trim());
        assert!(!output.contains(['\n', '\t', '\r']));
    }

    #[test]
    fn strips_tags_and_collapses_whitespace() {
        let html = "<html>\n<body>\n  <h1>Meals</h1>\n\t<p>Lunch   is covered.</p></body></html>";
        assert_eq!(sanitize_html(html), "Meals Lunch is covered.");
    }

    #[test]
    fn drops_script_and_style_contents() {
        let html = r#"<p>Before</p><script type="text/javascript">var x = "<b>";</script>
            <STYLE>p { color: red; }</STYLE><noscript>enable js</noscript><p>After</p>"#;
        assert_eq!(sanitize_html(html), "Before After");
    }

    #[test]
    fn drops_comments() {
        assert_eq!(sanitize_html("a<!-- <p>hidden</p> -->b"), "a b");
    }

    #[test]
    fn unterminated_script_swallows_rest() {
        assert_eq!(sanitize_html("keep<script>alert(1)"), "keep");
    }

    #[test]
    fn nested_tags() {
        let html = "<div><ul><li><a href='#'><span>Rates</span></a></li></ul></div>";
        assert_eq!(sanitize_html(html), "Rates");
    }

    #[test]
    fn malformed_markup_leaves_no_brackets() {
        let cases = [
            "a < b and c > d",
            "<div class=\"x\"<p>text",
            "text <unterminated",
            ">>> quoted <<<",
            "<<p>>double<</p>>",
            "<",
            "",
        ];
        for html in cases {
            assert_clean(&sanitize_html(html));
        }
        // stray brackets that pair up read as a tag
        assert_eq!(sanitize_html("a < b and c > d"), "a d");
    }

    #[test]
    fn decodes_common_entities_but_not_brackets() {
        let html = "Fish&nbsp;&amp;&nbsp;Chips &quot;daily&quot; it&#39;s &lt;ok&gt;";
        let out = sanitize_html(html);
        assert_eq!(out, "Fish & Chips \"daily\" it's &lt;ok&gt;");
        assert_clean(&out);
    }

    #[test]
    fn double_encoded_amp_is_decoded_once() {
        assert_eq!(sanitize_html("&amp;lt;"), "&lt;");
    }

    #[test]
    fn whitespace_only_page_is_empty() {
        assert_eq!(sanitize_html("<p>  \n </p>"), "");
    }

    #[test]
    fn unicode_whitespace_collapses() {
        assert_eq!(sanitize_html("a\u{00a0}\u{2003}b"), "a b");
    }
}
