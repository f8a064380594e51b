//! Lexical helpers for the type grammar.
//!
//! Type strings nest arbitrarily (`Array(Tuple(Nullable(Int32), String))`),
//! so the splitters here track parenthesis depth and quote state instead of
//! splitting naively.

/// Strip one matching pair of outer round brackets.
///
/// Returns `None` when the string does not start with `(`, does not end with
/// `)`, or the outer brackets do not pair with each other.
pub(crate) fn trim_round_brackets(s: &str) -> Option<&str> {
    let s = s.trim();
    if !s.starts_with('(') || !s.ends_with(')') {
        return None;
    }
    // The closing bracket must belong to the opening one.
    let mut depth = 0_i32;
    for (i, ch) in s.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && i != s.len() - 1 {
                    return None;
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    Some(&s[1..s.len() - 1])
}

/// Split on commas at parenthesis depth zero, outside quoted sections.
///
/// Commas nested inside other parentheses or inside `'...'` literals never
/// split. Segments are trimmed. An all-whitespace input yields no segments.
pub(crate) fn split_top_level(s: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0_i32;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, ch) in s.char_indices() {
        if in_quotes {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '\'' {
                in_quotes = false;
            }
            continue;
        }
        match ch {
            '\'' => in_quotes = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                segments.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = s[start..].trim();
    if !last.is_empty() || !segments.is_empty() {
        segments.push(last);
    }
    segments
}

/// Parse a leading single-quoted literal, handling `\\` and `\'` escapes.
///
/// Returns the unescaped content and the remainder after the closing quote.
pub(crate) fn parse_quoted(s: &str) -> Option<(String, &str)> {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, '\'')) => {}
        _ => return None,
    }
    let mut content = String::new();
    let mut escaped = false;
    for (i, ch) in chars {
        if escaped {
            content.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == '\'' {
            return Some((content, &s[i + ch.len_utf8()..]));
        } else {
            content.push(ch);
        }
    }
    None
}

/// Parse one `'name' = code` enum member segment.
pub(crate) fn parse_enum_member(segment: &str) -> Option<(String, i16)> {
    let (name, rest) = parse_quoted(segment.trim())?;
    let rest = rest.trim_start();
    let code = rest.strip_prefix('=')?.trim();
    code.parse::<i16>().ok().map(|code| (name, code))
}
