//! Character-safe text helpers used when building prompts and diagnostics

use std::borrow::Cow;

pub struct TextUtils;

impl TextUtils {
    /// First `n` characters of `text`, never splitting a code point.
    pub fn first_chars(text: &str, n: usize) -> &str {
        match text.char_indices().nth(n) {
            Some((pos, _)) => &text[..pos],
            None => text,
        }
    }

    /// Truncate text to at most `max_chars` characters, ending in an ellipsis when cut.
    pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> Cow<'_, str> {
        if text.chars().count() <= max_chars {
            Cow::Borrowed(text)
        } else if max_chars <= 3 {
            Cow::Borrowed(&"..."[..max_chars])
        } else {
            let mut result = String::with_capacity(max_chars + 2);
            result.push_str(Self::first_chars(text, max_chars - 3));
            result.push_str("...");
            Cow::Owned(result)
        }
    }

    /// Count non-empty, comma separated fields in a header line.
    pub fn count_columns(header: &str) -> usize {
        header
            .split(',')
            .filter(|field| !field.trim().is_empty())
            .count()
    }
}
