//! Input normalisation for user-submitted text.

use std::collections::HashSet;

/// Cleans article rich text down to a safe markup subset.
///
/// Scripts, event handlers, `style` and unknown tags are dropped; links get
/// `rel="noopener noreferrer nofollow"`.
pub fn sanitize_rich_text(input: &str) -> String {
    rich_text_policy().clean(input).to_string()
}

/// Whether markup still renders any text once every tag is stripped.
pub fn has_visible_text(markup: &str) -> bool {
    !ammonia::Builder::empty()
        .clean(markup)
        .to_string()
        .trim()
        .is_empty()
}

fn rich_text_policy() -> ammonia::Builder<'static> {
    let mut builder = ammonia::Builder::default();
    builder
        .add_tags(&["figure", "figcaption", "mark"])
        .link_rel(Some("noopener noreferrer nofollow"))
        .url_schemes(HashSet::from(["http", "https", "mailto"]));
    builder
}

pub fn escape_like_pattern(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '%' | '_' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}
