//! Char- and line-aware slicing helpers.
//!
//! Every helper returns a borrowed sub-slice that always falls on a UTF-8
//! char boundary, so callers can splice the pieces without re-validating.

/// Number of chars (not bytes) in `s`.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The first `count` chars of `s`, or all of it when shorter.
pub fn take_chars_head(s: &str, count: usize) -> &str {
    match s.char_indices().nth(count) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// The last `count` chars of `s`, or all of it when shorter.
pub fn take_chars_tail(s: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    match s.char_indices().rev().nth(count - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

/// Number of lines in `s`, counting a trailing partial line.
pub fn line_count(s: &str) -> usize {
    s.lines().count()
}

/// The first `count` lines of `s`, without the final newline.
pub fn take_lines_head(s: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    match s.match_indices('\n').nth(count - 1) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// The last `count` lines of `s`. A trailing newline is not counted as an
/// extra empty line.
pub fn take_lines_tail(s: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    let body = s.strip_suffix('\n').unwrap_or(s);
    match body.rmatch_indices('\n').nth(count - 1) {
        Some((idx, _)) => &s[idx + 1..],
        None => s,
    }
}
