//! Filename sanitization for names taken from URLs and redirect headers.

/// Longest file name most filesystems accept (bytes).
const NAME_MAX: usize = 255;

/// Makes a remote-supplied name safe to join onto the output directory.
///
/// - Replaces NUL, path separators, control characters and `<>:"|?*` with `_`
/// - Collapses runs of replacement underscores
/// - Trims leading/trailing whitespace and dots (no hidden files, no `..`)
/// - Truncates to 255 bytes on a char boundary
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_replaced = false;

    for c in name.chars() {
        let bad = c == '\0'
            || c == '/'
            || c == '\\'
            || c.is_control()
            || matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*');
        if bad {
            if !prev_replaced {
                out.push('_');
            }
            prev_replaced = true;
        } else {
            out.push(c);
            prev_replaced = false;
        }
    }

    let trimmed = out.trim_matches(|c: char| c.is_whitespace() || c == '.');

    if trimmed.len() > NAME_MAX {
        let mut take = NAME_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].to_string()
    } else {
        trimmed.to_string()
    }
}
