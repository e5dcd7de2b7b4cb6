//! Extraction of tagged fields from free-form model output.
//!
//! Models are asked to wrap each field in `<tag>...</tag>`. This is not an
//! XML parser: matching is case-sensitive, takes the first opening tag and
//! the first closing tag after it, and ignores nesting.

/// Returns the trimmed text between `<tag>` and `</tag>`, or `None` when
/// either tag is missing.
pub fn extract_tag<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");

    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    Some(text[start..end].trim())
}
