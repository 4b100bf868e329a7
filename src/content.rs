//! Converts user-authored Markdown into sanitized HTML for publishing.
//!
//! Regex patterns are compile-time validated via the `lazy_regex!` macro.
//! The output is restricted to a fixed tag whitelist; raw HTML outside the
//! whitelist is escaped, attributes other than `a href` are dropped, and
//! link schemes are limited to http/https/mailto.

use lazy_regex::lazy_regex;
use uuid::Uuid;

/// HTML tags allowed to pass through to WordPress
const ALLOWED_TAGS: &[&str] = &[
    "p",
    "br",
    "strong",
    "em",
    "b",
    "i",
    "a",
    "ul",
    "ol",
    "li",
    "code",
    "pre",
    "blockquote",
    "h1",
    "h2",
    "h3",
];

/// URL schemes permitted in links
const ALLOWED_SCHEMES: &[&str] = &["http://", "https://", "mailto:"];

/// Match code blocks with optional language: ```language\ncode```
static RE_CODE_BLOCK_FENCE: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"```(\w+)?\n?([\s\S]*?)```");

/// Match inline code: `code`
static RE_INLINE_CODE: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"`([^`\n]+)`");

/// Match any HTML-shaped tag
static RE_HTML_TAG: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"</?([a-zA-Z][a-zA-Z0-9]*)([^<>]*)>");

/// Extract an href attribute value
static RE_HREF: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r#"href\s*=\s*["']([^"']+)["']"#);

/// Match markdown links: [text](url)
static RE_LINK: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"\[([^\]]+)\]\(([^)\s]+)\)");

/// Match bold text: **text** or __text__ (single line)
static RE_BOLD: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"\*\*([^*\n]+)\*\*|__([^_\n]+)__");

/// Match italic text: *text* or _text_ (single line, so list markers survive)
static RE_ITALIC: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"\*([^*\n]+)\*|_([^_\n]+)_");

/// Match unordered list items at start of line
static RE_BULLET: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"^[-*]\s+(.*)$");

/// Match ordered list items at start of line
static RE_ORDERED: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"^\d+\.\s+(.*)$");

/// Match 3+ consecutive newlines
static RE_MULTI_NEWLINE: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"\n{3,}");

/// Fragments parked behind placeholder tokens while the surrounding text is
/// escaped and rewritten
struct Parked {
    fragments: Vec<(String, String)>,
}

impl Parked {
    const fn new() -> Self {
        Self {
            fragments: Vec::new(),
        }
    }

    /// Park a finished HTML fragment and return its placeholder token.
    /// Tokens are UUID-based so hostile input cannot guess them, and free
    /// of `_`/`*` so the inline-markdown pass cannot mangle them. `block`
    /// marks fragments that must not be wrapped in a paragraph.
    fn park(&mut self, html: String, block: bool) -> String {
        let kind = if block { "blk" } else { "inl" };
        let token = format!("{{md-{kind}:{}}}", Uuid::new_v4().as_simple());
        self.fragments.push((token.clone(), html));
        token
    }

    fn restore(&self, mut text: String) -> String {
        for (token, replacement) in self.fragments.iter().rev() {
            text = text.replace(token, replacement);
        }
        text
    }
}

fn is_block_token(line: &str) -> bool {
    line.starts_with("{md-blk:") && line.ends_with('}') && !line.contains(char::is_whitespace)
}

fn scheme_allowed(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    ALLOWED_SCHEMES.iter().any(|s| lower.starts_with(s))
}

/// Pull code spans out of the text so later passes cannot touch their
/// contents.
fn extract_code(text: &str, parked: &mut Parked) -> String {
    let out = RE_CODE_BLOCK_FENCE
        .replace_all(text, |caps: &regex::Captures| {
            let lang = caps.get(1).map_or("", |m| m.as_str());
            let code = caps.get(2).map_or("", |m| m.as_str()).trim();
            let escaped = html_escape::encode_text(code);
            let html = if lang.is_empty() {
                format!("<pre><code>{escaped}</code></pre>")
            } else {
                format!("<pre><code class=\"language-{lang}\">{escaped}</code></pre>")
            };
            parked.park(html, true)
        })
        .to_string();

    RE_INLINE_CODE
        .replace_all(&out, |caps: &regex::Captures| {
            let code = caps.get(1).map_or("", |m| m.as_str());
            let escaped = html_escape::encode_text(code);
            parked.park(format!("<code>{escaped}</code>"), false)
        })
        .to_string()
}

/// Sanitize raw HTML: whitelisted tags are rebuilt bare (href kept on `a`
/// when its scheme is allowed) and parked; everything else, including stray
/// angle brackets, is escaped.
fn sanitize_raw_html(text: &str, parked: &mut Parked) -> String {
    let rewritten = RE_HTML_TAG.replace_all(text, |caps: &regex::Captures| {
        let full = caps.get(0).map_or("", |m| m.as_str());
        let name = caps.get(1).map_or("", |m| m.as_str()).to_ascii_lowercase();
        let attrs = caps.get(2).map_or("", |m| m.as_str());

        if !ALLOWED_TAGS.contains(&name.as_str()) {
            let inner = full.trim_start_matches('<').trim_end_matches('>');
            return format!("&lt;{inner}&gt;");
        }

        let tag = if full.starts_with("</") {
            format!("</{name}>")
        } else if name == "a" {
            match RE_HREF.captures(attrs).and_then(|c| c.get(1)) {
                Some(url) if scheme_allowed(url.as_str()) => {
                    format!("<a href=\"{}\">", url.as_str())
                }
                _ => "<a>".to_string(),
            }
        } else {
            format!("<{name}>")
        };
        parked.park(tag, false)
    });

    rewritten.replace('<', "&lt;").replace('>', "&gt;")
}

fn apply_inline_markdown(text: &str, parked: &mut Parked) -> String {
    // Links first, and parked immediately: a generated href may contain
    // underscores the italic pass would otherwise chew on.
    let mut out = RE_LINK
        .replace_all(text, |caps: &regex::Captures| {
            let label = caps.get(1).map_or("", |m| m.as_str());
            let url = caps.get(2).map_or("", |m| m.as_str());
            if scheme_allowed(url) {
                // A quote in the URL must not break out of the attribute
                let url = url.replace('"', "%22");
                parked.park(format!("<a href=\"{url}\">{label}</a>"), false)
            } else {
                label.to_string()
            }
        })
        .to_string();

    out = RE_BOLD
        .replace_all(&out, |caps: &regex::Captures| {
            let inner = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map_or("", |m| m.as_str());
            format!("<strong>{inner}</strong>")
        })
        .to_string();

    RE_ITALIC
        .replace_all(&out, |caps: &regex::Captures| {
            let inner = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map_or("", |m| m.as_str());
            format!("<em>{inner}</em>")
        })
        .to_string()
}

/// Group the lines of one blank-line-separated block into paragraphs and
/// lists. A block that is a lone code placeholder stays bare.
fn render_block(block: &str) -> String {
    let trimmed = block.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if is_block_token(trimmed) {
        return trimmed.to_string();
    }

    let mut out = String::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut items: Vec<String> = Vec::new();
    let mut ordered = false;

    fn flush_paragraph(out: &mut String, paragraph: &mut Vec<&str>) {
        if !paragraph.is_empty() {
            out.push_str("<p>");
            out.push_str(&paragraph.join("<br>"));
            out.push_str("</p>");
            paragraph.clear();
        }
    }
    fn flush_list(out: &mut String, items: &mut Vec<String>, ordered: bool) {
        if !items.is_empty() {
            out.push_str(if ordered { "<ol>" } else { "<ul>" });
            for item in items.iter() {
                out.push_str("<li>");
                out.push_str(item);
                out.push_str("</li>");
            }
            out.push_str(if ordered { "</ol>" } else { "</ul>" });
            items.clear();
        }
    }

    for line in trimmed.lines() {
        if let Some(caps) = RE_BULLET.captures(line) {
            flush_paragraph(&mut out, &mut paragraph);
            if ordered {
                flush_list(&mut out, &mut items, true);
                ordered = false;
            }
            items.push(caps.get(1).map_or("", |m| m.as_str()).to_string());
        } else if let Some(caps) = RE_ORDERED.captures(line) {
            flush_paragraph(&mut out, &mut paragraph);
            if !ordered {
                flush_list(&mut out, &mut items, false);
                ordered = true;
            }
            items.push(caps.get(1).map_or("", |m| m.as_str()).to_string());
        } else {
            flush_list(&mut out, &mut items, ordered);
            paragraph.push(line);
        }
    }
    flush_list(&mut out, &mut items, ordered);
    flush_paragraph(&mut out, &mut paragraph);

    out
}

/// Convert Markdown-ish user input into sanitized HTML.
///
/// Supported: ` ``` ` fences, `` ` `` inline code, `**`/`__` bold,
/// `*`/`_` italic, `[text](url)` links, `-`/`*` and `1.` lists, blank-line
/// paragraphs with `<br>` line breaks. Raw HTML survives only when the tag
/// is whitelisted.
///
/// # Examples
///
/// ```
/// use pressgate::content::markdown_to_html;
/// assert_eq!(
///     markdown_to_html("**bold** move"),
///     "<p><strong>bold</strong> move</p>"
/// );
/// ```
#[must_use]
pub fn markdown_to_html(input: &str) -> String {
    let mut parked = Parked::new();

    let text = RE_MULTI_NEWLINE.replace_all(input, "\n\n").to_string();
    let text = extract_code(&text, &mut parked);
    let text = sanitize_raw_html(&text, &mut parked);
    let text = apply_inline_markdown(&text, &mut parked);

    let html = text
        .split("\n\n")
        .map(render_block)
        .filter(|b| !b.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    parked.restore(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_italic_and_links() {
        assert_eq!(
            markdown_to_html("**b** and *i* and [x](https://e.com)"),
            "<p><strong>b</strong> and <em>i</em> and <a href=\"https://e.com\">x</a></p>"
        );
    }

    #[test]
    fn underscore_variants() {
        assert_eq!(
            markdown_to_html("__b__ and _i_"),
            "<p><strong>b</strong> and <em>i</em></p>"
        );
    }

    #[test]
    fn disallowed_scheme_renders_text_only() {
        let html = markdown_to_html("[click](javascript:alert(1))");
        assert!(!html.contains("<a"));
        assert!(html.contains("click"));
    }

    #[test]
    fn link_href_with_underscores_is_preserved() {
        let html = markdown_to_html("[x](https://e.com/a_b_c)");
        assert!(html.contains("<a href=\"https://e.com/a_b_c\">x</a>"));
    }

    #[test]
    fn script_tags_are_escaped() {
        let html = markdown_to_html("<script>alert(1)</script>");
        assert!(!html.contains("<script"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn whitelisted_raw_html_survives_without_attributes() {
        let html = markdown_to_html("a <b onclick=\"x()\">c</b> d");
        assert!(html.contains("<b>c</b>"));
        assert!(!html.contains("onclick"));
    }

    #[test]
    fn anchor_keeps_safe_href_only() {
        let html = markdown_to_html("<a href=\"https://e.com\" onclick=\"x\">t</a>");
        assert!(html.contains("<a href=\"https://e.com\">t</a>"));

        let bad = markdown_to_html("<a href=\"javascript:x\">t</a>");
        assert!(bad.contains("<a>t</a>"));
    }

    #[test]
    fn code_block_contents_are_untouched() {
        let html = markdown_to_html("```\n**not bold** <script>\n```");
        assert!(html.contains("**not bold**"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.starts_with("<pre><code>"));
    }

    #[test]
    fn fenced_language_is_carried() {
        let html = markdown_to_html("```rust\nlet x = 1;\n```");
        assert!(html.contains("<pre><code class=\"language-rust\">"));
    }

    #[test]
    fn lists_are_grouped() {
        assert_eq!(
            markdown_to_html("- one\n- two"),
            "<ul><li>one</li><li>two</li></ul>"
        );
        assert_eq!(
            markdown_to_html("1. one\n2. two"),
            "<ol><li>one</li><li>two</li></ol>"
        );
    }

    #[test]
    fn paragraphs_and_line_breaks() {
        let html = markdown_to_html("line one\nline two\n\nsecond para");
        assert_eq!(html, "<p>line one<br>line two</p>\n<p>second para</p>");
    }

    #[test]
    fn naked_brackets_are_escaped() {
        let html = markdown_to_html("1 < 2 and 3 > 2");
        assert!(html.contains("1 &lt; 2"));
        assert!(html.contains("3 &gt; 2"));
    }
}
