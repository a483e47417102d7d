#[derive(Clone)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

pub(super) fn scan_digits(bytes: &[u8], start: usize) -> Option<(usize, &str)> {
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == start {
        None
    } else {
        std::str::from_utf8(&bytes[start..idx])
            .ok()
            .map(|digits| (idx, digits))
    }
}

pub(super) fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

pub(super) fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

pub(super) fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// `#{`, `${` or `@{` at `idx`.
pub(super) fn token_open(bytes: &[u8], idx: usize) -> Option<u8> {
    match (bytes.get(idx), bytes.get(idx + 1)) {
        (Some(&sigil @ (b'#' | b'$' | b'@')), Some(b'{')) => Some(sigil),
        _ => None,
    }
}

/// Characters that end a `:name` / `&name` parameter.
pub(super) fn is_name_separator(b: u8) -> bool {
    b.is_ascii_whitespace()
        || matches!(
            b,
            b':' | b','
                | b';'
                | b'('
                | b')'
                | b'{'
                | b'}'
                | b'\\'
                | b'|'
                | b'&'
                | b'^'
                | b'~'
                | b'!'
                | b'='
                | b'<'
                | b'>'
                | b'+'
                | b'-'
                | b'*'
                | b'%'
                | b'/'
        )
}

pub(super) fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

/// End of a `:name` starting at `start`; brackets in the name are kept (`:ids[0]`).
pub(super) fn scan_name(bytes: &[u8], start: usize) -> usize {
    let mut idx = start;
    let mut brackets = 0u32;
    while idx < bytes.len() {
        let b = bytes[idx];
        match b {
            b'[' => brackets += 1,
            b']' if brackets > 0 => brackets -= 1,
            b']' => break,
            _ if brackets == 0 && (is_name_separator(b) || b == b'\'' || b == b'"') => break,
            _ => {}
        }
        idx += 1;
    }
    // a trailing '.' is the end of a sentence, not part of the path
    while idx > start && bytes[idx - 1] == b'.' {
        idx -= 1;
    }
    idx
}

/// Index of the `}` that closes the token body starting at `start`.
///
/// Nested braces and quoted text inside the body are skipped, so
/// `@{and, id in @{in, :ids}}` closes at the last brace.
pub(super) fn find_closing_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0u32;
    let mut quote: Option<u8> = None;
    let mut idx = start;
    while idx < bytes.len() {
        let b = bytes[idx];
        if let Some(q) = quote {
            if b == q {
                if bytes.get(idx + 1) == Some(&q) {
                    idx += 1; // skip escaped quote
                } else {
                    quote = None;
                }
            }
        } else {
            match b {
                b'\'' | b'"' => quote = Some(b),
                b'{' => depth += 1,
                b'}' if depth == 0 => return Some(idx),
                b'}' => depth -= 1,
                _ => {}
            }
        }
        idx += 1;
    }
    None
}

/// Split a token body at top-level commas. Commas inside quotes, parentheses,
/// brackets or nested braces do not split.
pub(super) fn split_top_level(body: &str) -> Vec<&str> {
    let bytes = body.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0u32;
    let mut quote: Option<u8> = None;
    let mut start = 0;
    let mut idx = 0;
    while idx < bytes.len() {
        let b = bytes[idx];
        if let Some(q) = quote {
            if b == q {
                if bytes.get(idx + 1) == Some(&q) {
                    idx += 1;
                } else {
                    quote = None;
                }
            }
        } else {
            match b {
                b'\'' | b'"' => quote = Some(b),
                b'{' | b'(' | b'[' => depth += 1,
                b'}' | b')' | b']' => depth = depth.saturating_sub(1),
                b',' if depth == 0 => {
                    parts.push(&body[start..idx]);
                    start = idx + 1;
                }
                _ => {}
            }
        }
        idx += 1;
    }
    parts.push(&body[start..]);
    parts
}

/// Byte offset just past the `n`th top-level comma, if there is one.
pub(super) fn after_nth_comma(body: &str, n: usize) -> Option<usize> {
    let mut offset = 0;
    let parts = split_top_level(body);
    if parts.len() <= n {
        return None;
    }
    for part in parts.iter().take(n) {
        offset += part.len() + 1;
    }
    Some(offset)
}

pub(super) fn try_start_dollar_quote(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let mut idx = start + 1;
    while idx < bytes.len() && bytes[idx] != b'$' {
        let b = bytes[idx];
        if !(b.is_ascii_alphanumeric() || b == b'_') {
            return None;
        }
        idx += 1;
    }

    if idx < bytes.len() && bytes[idx] == b'$' {
        let tag = String::from_utf8(bytes[start + 1..idx].to_vec()).ok()?;
        Some((tag, idx))
    } else {
        None
    }
}

pub(super) fn matches_tag(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let end = idx + 1 + tag.len();
    end < bytes.len()
        && bytes[idx + 1..=end].starts_with(tag.as_bytes())
        && bytes.get(end) == Some(&b'$')
}
