/// Default number of bytes of context on each side of an occurrence.
pub const DEFAULT_CONTEXT_CHARS: usize = 80;

/// Largest char boundary of `text` that is `<= index`.
pub fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut i = index;
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Smallest char boundary of `text` that is `>= index`.
pub fn ceil_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut i = index;
    while !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// The text around `[start,end)`, extended by up to `radius` bytes on each
/// side. Partial words at either edge are dropped and whitespace is
/// collapsed; the result never splits a character.
pub fn context_window(text: &str, start: usize, end: usize, radius: usize) -> String {
    let start = floor_char_boundary(text, start);
    let end = ceil_char_boundary(text, end).max(start);
    let mut from = floor_char_boundary(text, start.saturating_sub(radius));
    let mut to = ceil_char_boundary(text, end.saturating_add(radius));

    if from > 0
        && !text[..from].ends_with(char::is_whitespace)
        && let Some(ws) = text[from..start].find(char::is_whitespace)
    {
        from += ws;
    }
    if to < text.len()
        && !text[to..].starts_with(char::is_whitespace)
        && let Some(ws) = text[end..to].rfind(char::is_whitespace)
    {
        to = end + ws;
    }

    collapse_whitespace(&text[from..to])
}

/// Replace runs of whitespace with a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether the first letter of `text` is upper case.
pub fn starts_upper_case(text: &str) -> bool {
    text.chars()
        .find(|c| c.is_alphabetic())
        .is_some_and(char::is_uppercase)
}

pub fn has_alphanumeric(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}
