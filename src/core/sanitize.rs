// src/core/sanitize.rs
use std::borrow::Cow;

/// Collapse whitespace runs to a single space and trim both ends.
pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space { out.push(' '); prev_space = true; }
        } else { out.push(ch); prev_space = false; }
    }
    out.trim().to_string()
}

/// Finalize the raw text collected for one table cell.
///
/// Non-breaking spaces become plain spaces and every line is trimmed. A cell that
/// still spans several lines keeps its `\n` separators; a single-line cell has
/// its whitespace runs collapsed.
pub fn normalize_cell(raw: &str) -> String {
    let text = raw.replace('\u{a0}', " ");
    let joined = split_lines(&text)
        .into_iter()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");

    if joined.contains('\n') {
        joined.trim().to_string()
    } else {
        normalize_ws(&joined)
    }
}

pub fn is_line_break(ch: char) -> bool {
    matches!(
        ch,
        '\n' | '\r' | '\u{0b}' | '\u{0c}' | '\u{1c}' | '\u{1d}' | '\u{1e}' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Split on any line break (`\r\n` counts once). A trailing break does not
/// produce a trailing empty line and an empty input yields no lines.
pub fn split_lines(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut chars = s.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        if !is_line_break(ch) {
            continue;
        }
        out.push(&s[start..i]);
        start = i + ch.len_utf8();
        if ch == '\r' {
            if let Some(&(j, '\n')) = chars.peek() {
                chars.next();
                start = j + 1;
            }
        }
    }
    if start < s.len() {
        out.push(&s[start..]);
    }
    out
}

/// Decode character references (`&amp;`, `&#160;`, `&#xA0;`, …) in markup text.
/// Unknown or malformed references are left as they are.
pub fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        match decode_reference(tail) {
            Some((decoded, used)) => {
                out.push_str(&decoded);
                rest = &tail[used..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// `tail` starts right after the `&`. Returns the replacement and the number of
/// bytes of `tail` it consumed.
fn decode_reference(tail: &str) -> Option<(Cow<'static, str>, usize)> {
    if let Some(num) = tail.strip_prefix('#') {
        let (radix, digits_at) = match num.as_bytes().first() {
            Some(b'x') | Some(b'X') => (16, 2),
            _ => (10, 1),
        };
        let body = &tail[digits_at..];
        let len = body
            .bytes()
            .take_while(|b| if radix == 16 { b.is_ascii_hexdigit() } else { b.is_ascii_digit() })
            .count();
        if len == 0 {
            return None;
        }
        let ch = u32::from_str_radix(&body[..len], radix)
            .ok()
            .filter(|&code| code != 0)
            .and_then(char::from_u32)
            .unwrap_or('\u{fffd}');
        let mut used = digits_at + len;
        if body[len..].starts_with(';') {
            used += 1;
        }
        return Some((Cow::Owned(ch.to_string()), used));
    }

    let len = tail
        .bytes()
        .take(32)
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    if len == 0 {
        return None;
    }
    let name = &tail[..len];
    if tail[len..].starts_with(';') {
        if let Some(ch) = named_entity(name) {
            return Some((Cow::Borrowed(ch), len + 1));
        }
    }

    // A few legacy names are honoured without the semicolon (`&nbspfoo`).
    ["nbsp", "amp", "quot", "copy", "reg", "lt", "gt"]
        .into_iter()
        .find(|legacy| name.starts_with(legacy))
        .and_then(|legacy| named_entity(legacy).map(|ch| (Cow::Borrowed(ch), legacy.len())))
}

fn named_entity(name: &str) -> Option<&'static str> {
    let ch = match name {
        "nbsp" => "\u{a0}",
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "ensp" => "\u{2002}",
        "emsp" => "\u{2003}",
        "thinsp" => "\u{2009}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "hellip" => "\u{2026}",
        "middot" => "\u{b7}",
        "bull" => "\u{2022}",
        "laquo" => "\u{ab}",
        "raquo" => "\u{bb}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "deg" => "\u{b0}",
        "times" => "\u{d7}",
        "divide" => "\u{f7}",
        "plusmn" => "\u{b1}",
        "cent" => "\u{a2}",
        "pound" => "\u{a3}",
        "yen" => "\u{a5}",
        "euro" => "\u{20ac}",
        "sect" => "\u{a7}",
        "para" => "\u{b6}",
        "larr" => "\u{2190}",
        "uarr" => "\u{2191}",
        "rarr" => "\u{2192}",
        "darr" => "\u{2193}",
        _ => return None,
    };
    Some(ch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_cells_collapse_whitespace() {
        assert_eq!(normalize_cell("  B  \t C "), "B C");
        assert_eq!(normalize_cell("A"), "A");
    }

    #[test]
    fn nbsp_only_cell_is_empty() {
        assert_eq!(normalize_cell("\u{a0} \u{a0}\t"), "");
        assert_eq!(normalize_cell(""), "");
    }

    #[test]
    fn explicit_breaks_survive_with_trimmed_lines() {
        assert_eq!(normalize_cell(" Flight AB1 \n  Gate 3 "), "Flight AB1\nGate 3");
    }

    #[test]
    fn source_indentation_around_a_single_line_is_dropped() {
        assert_eq!(normalize_cell("\n      Haikou\n    "), "Haikou");
    }

    #[test]
    fn multi_line_cells_keep_inner_spacing_and_blank_lines() {
        // Only the line ends are trimmed once the cell is multi-line.
        assert_eq!(normalize_cell("A  B\n\nC"), "A  B\n\nC");
    }

    #[test]
    fn split_lines_matches_line_semantics() {
        assert_eq!(split_lines(""), Vec::<&str>::new());
        assert_eq!(split_lines("\n"), vec![""]);
        assert_eq!(split_lines("a\r\nb\rc\n"), vec!["a", "b", "c"]);
        assert_eq!(split_lines("a\u{2028}b"), vec!["a", "b"]);
    }

    #[test]
    fn decodes_named_and_numeric_references() {
        assert_eq!(decode_entities("A&amp;B"), "A&B");
        assert_eq!(decode_entities("x&nbsp;y"), "x\u{a0}y");
        assert_eq!(decode_entities("&#72;&#x69;"), "Hi");
        assert_eq!(decode_entities("&#0;"), "\u{fffd}");
        assert_eq!(decode_entities("&nbspHaikou"), "\u{a0}Haikou");
    }

    #[test]
    fn leaves_unknown_references_alone() {
        assert_eq!(decode_entities("R&D"), "R&D");
        assert_eq!(decode_entities("&bogus; & &#;"), "&bogus; & &#;");
        assert!(matches!(decode_entities("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn normalize_ws_trims_and_collapses() {
        assert_eq!(normalize_ws("  a \n\n b  "), "a b");
    }
}
