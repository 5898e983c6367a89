/// Derive a URL slug from free text.
///
/// Letters and digits are lowercased and kept, apostrophes are dropped, and
/// every other run of characters becomes a single `-`. Leading and trailing
/// separators are trimmed.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.extend(ch.to_lowercase());
        } else if ch != '\'' && ch != '\u{2019}' {
            pending_separator = true;
        }
    }

    slug
}
