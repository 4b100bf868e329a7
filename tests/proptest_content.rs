//! Property tests for the Markdown → sanitized HTML pipeline.

use pressgate::content::markdown_to_html;
use proptest::prelude::*;

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

proptest! {
    /// No input, however hostile, yields an unescaped script tag.
    #[test]
    fn no_script_tag_ever_survives(input in ".{0,300}") {
        let html = markdown_to_html(&input);
        prop_assert!(!html.to_ascii_lowercase().contains("<script"));
    }

    /// Every tag in the output comes from the whitelist.
    #[test]
    fn all_output_tags_are_whitelisted(input in ".{0,300}") {
        let html = markdown_to_html(&input);
        let tag_re = regex::Regex::new(r"</?([a-zA-Z][a-zA-Z0-9]*)").expect("valid regex");
        for caps in tag_re.captures_iter(&html) {
            let name = caps
                .get(1)
                .map(|m| m.as_str().to_ascii_lowercase())
                .unwrap_or_default();
            prop_assert!(
                ALLOWED_TAGS.contains(&name.as_str()),
                "unexpected tag <{name}> in output: {html}"
            );
        }
    }

    /// The transform never panics, whatever arrives.
    #[test]
    fn never_panics(input in ".{0,500}") {
        let _ = markdown_to_html(&input);
    }

    /// Plain alphanumeric text round-trips inside a paragraph untouched.
    #[test]
    fn plain_text_is_preserved(input in "[a-zA-Z0-9]{1,20}( [a-zA-Z0-9]{1,20}){0,5}") {
        let html = markdown_to_html(&input);
        prop_assert_eq!(html, format!("<p>{input}</p>"));
    }
}
