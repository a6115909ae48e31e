/// Splits a source line into whitespace-separated tokens, keeping at most
/// `max_tokens` of them.
pub fn tokens(line: &str, max_tokens: usize) -> Vec<&str> {
    line.split_ascii_whitespace().take(max_tokens).collect()
}

/// Returns the label name when `line` is a single identifier immediately
/// followed by a trailing `:`.
pub fn label(line: &str) -> Option<&str> {
    let name = line.trim().strip_suffix(':')?;
    if is_identifier(name) {
        Some(name)
    } else {
        None
    }
}

pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Checks whether a line opens with `prefix`, ignoring indentation.
///
/// This is a plain text prefix test: `"iffy"` starts with `"if"`.
pub fn starts_with(line: &str, prefix: &str) -> bool {
    line.trim_start().starts_with(prefix)
}

/// Finds the line that closes the construct opened at `start`.
///
/// Lines after `start` beginning with `opener` increase the depth and lines
/// beginning with `closer` decrease it; the closer that brings the depth back
/// to zero is returned. Openers are tested first, so a line matching both
/// counts as an opener.
pub fn find_matching_end<S: AsRef<str>>(
    lines: &[S],
    start: usize,
    opener: &str,
    closer: &str,
) -> Option<usize> {
    let mut depth = 1usize;
    for (index, line) in lines.iter().enumerate().skip(start + 1) {
        let line = line.as_ref();
        if starts_with(line, opener) {
            depth += 1;
        } else if starts_with(line, closer) {
            depth -= 1;
            if depth == 0 {
                return Some(index);
            }
        }
    }
    None
}
