// src/core/tokens.rs
// Forward-only markup tokenizer feeding the table scanner.
// Yields start tags, end tags and decoded text. Comments, doctypes and
// processing instructions produce nothing; `script`/`style` bodies come back
// as raw text so markup inside them is never mistaken for real tags.

use std::borrow::Cow;

use super::sanitize::decode_entities;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token<'a> {
    /// `<name …>` or `<name …/>`; `name` is ASCII-lowercased.
    StartTag { name: String, self_closing: bool },
    /// `</name>`; `name` is ASCII-lowercased.
    EndTag { name: String },
    Text(Cow<'a, str>),
}

pub struct Tokens<'a> {
    s: &'a str,
    b: &'a [u8],
    i: usize,
    n: usize,
    raw_until: Option<&'static str>,
}

impl<'a> Tokens<'a> {
    pub fn new(s: &'a str) -> Self {
        Self { s, b: s.as_bytes(), i: 0, n: s.len(), raw_until: None }
    }

    /// Does the `<` at `at` open markup (as opposed to being literal text)?
    #[inline]
    fn opens_markup(&self, at: usize) -> bool {
        match self.b.get(at + 1) {
            Some(c) if c.is_ascii_alphabetic() => true,
            Some(b'!') | Some(b'?') => true,
            Some(b'/') => self.b.get(at + 2).is_some_and(|c| c.is_ascii_alphabetic()),
            _ => false,
        }
    }

    #[inline]
    fn find_byte(&self, from: usize, ch: u8) -> Option<usize> {
        self.b.get(from..)?.iter().position(|&c| c == ch).map(|off| from + off)
    }

    fn find_ci(&self, from: usize, pat: &str) -> Option<usize> {
        let pat = pat.as_bytes();
        if pat.is_empty() || from >= self.n {
            return None;
        }
        self.b[from..]
            .windows(pat.len())
            .position(|w| w.eq_ignore_ascii_case(pat))
            .map(|off| from + off)
    }

    /// Tag names run until whitespace, `/` or `>`.
    fn name_end(&self, from: usize) -> usize {
        let mut j = from;
        while j < self.n {
            match self.b[j] {
                b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' | b'/' | b'>' | 0 => break,
                _ => j += 1,
            }
        }
        j
    }

    /// Position of the `>` closing a start tag. Quoted attribute values may
    /// contain `>`.
    fn start_tag_end(&self, from: usize) -> Option<usize> {
        let mut j = from;
        while j < self.n {
            match self.b[j] {
                b'>' => return Some(j),
                b'=' => {
                    j += 1;
                    while j < self.n && self.b[j].is_ascii_whitespace() {
                        j += 1;
                    }
                    if let Some(&q) = self.b.get(j) {
                        if q == b'"' || q == b'\'' {
                            j = self.find_byte(j + 1, q)? + 1;
                            continue;
                        }
                    }
                }
                _ => j += 1,
            }
        }
        None
    }

    fn text(&mut self) -> Token<'a> {
        let start = self.i;
        let mut j = start + 1;
        while j < self.n {
            if self.b[j] == b'<' && self.opens_markup(j) {
                break;
            }
            j += 1;
        }
        self.i = j;
        Token::Text(decode_entities(&self.s[start..j]))
    }

    fn raw_text(&mut self, element: &'static str) -> Option<Token<'a>> {
        let start = self.i;
        let end = self.find_ci(start, &format!("</{element}")).unwrap_or(self.n);
        self.i = end;
        (end > start).then(|| Token::Text(Cow::Borrowed(&self.s[start..end])))
    }

    /// Consume the markup starting at `self.i` (a `<` that opens markup).
    /// Returns `None` for markup that yields no token.
    fn markup(&mut self) -> Option<Token<'a>> {
        let lt = self.i;
        match self.b[lt + 1] {
            b'!' => {
                self.i = if self.s[lt..].starts_with("<!--") {
                    self.s[lt + 4..].find("-->").map_or(self.n, |off| lt + 4 + off + 3)
                } else {
                    self.find_byte(lt, b'>').map_or(self.n, |gt| gt + 1)
                };
                None
            }
            b'?' => {
                self.i = self.find_byte(lt, b'>').map_or(self.n, |gt| gt + 1);
                None
            }
            b'/' => {
                let name_end = self.name_end(lt + 2);
                let name = self.s[lt + 2..name_end].to_ascii_lowercase();
                self.i = self.find_byte(name_end, b'>').map_or(self.n, |gt| gt + 1);
                Some(Token::EndTag { name })
            }
            _ => {
                let name_end = self.name_end(lt + 1);
                let Some(gt) = self.start_tag_end(name_end) else {
                    // Unterminated tag: the rest of the input is text.
                    let rest = &self.s[lt..];
                    self.i = self.n;
                    return Some(Token::Text(Cow::Borrowed(rest)));
                };
                let name = self.s[lt + 1..name_end].to_ascii_lowercase();
                let self_closing = gt > name_end && self.b[gt - 1] == b'/';
                self.i = gt + 1;
                if !self_closing {
                    self.raw_until = match name.as_str() {
                        "script" => Some("script"),
                        "style" => Some("style"),
                        _ => None,
                    };
                }
                Some(Token::StartTag { name, self_closing })
            }
        }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.i < self.n {
            if let Some(element) = self.raw_until.take() {
                if let Some(tok) = self.raw_text(element) {
                    return Some(tok);
                }
                continue;
            }
            if self.b[self.i] == b'<' && self.opens_markup(self.i) {
                if let Some(tok) = self.markup() {
                    return Some(tok);
                }
                continue;
            }
            return Some(self.text());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(name: &str) -> Token<'static> {
        Token::StartTag { name: s!(name), self_closing: false }
    }
    fn end(name: &str) -> Token<'static> {
        Token::EndTag { name: s!(name) }
    }
    fn text(t: &str) -> Token<'static> {
        Token::Text(Cow::Owned(s!(t)))
    }

    #[test]
    fn splits_tags_and_text() {
        let toks: Vec<_> = Tokens::new("<TD class=x>A &amp; B</Td>").collect();
        assert_eq!(toks, vec![start("td"), text("A & B"), end("td")]);
    }

    #[test]
    fn self_closing_break_is_flagged() {
        let toks: Vec<_> = Tokens::new("<br/><br /><br>").collect();
        assert_eq!(
            toks,
            vec![
                Token::StartTag { name: s!("br"), self_closing: true },
                Token::StartTag { name: s!("br"), self_closing: true },
                start("br"),
            ]
        );
    }

    #[test]
    fn quoted_attribute_may_contain_gt() {
        let toks: Vec<_> = Tokens::new(r#"<td title="a > b" data-x='<'>x</td>"#).collect();
        assert_eq!(toks, vec![start("td"), text("x"), end("td")]);
    }

    #[test]
    fn comments_and_doctype_are_skipped() {
        let toks: Vec<_> = Tokens::new("<!DOCTYPE html><!-- <table> --><p>hi</p><?xml x?>").collect();
        assert_eq!(toks, vec![start("p"), text("hi"), end("p")]);
    }

    #[test]
    fn script_body_is_raw_text() {
        let toks: Vec<_> = Tokens::new("<script>if (a<b) { '<table>' }</SCRIPT>x").collect();
        assert_eq!(
            toks,
            vec![start("script"), text("if (a<b) { '<table>' }"), end("script"), text("x")]
        );
    }

    #[test]
    fn lone_angle_bracket_is_text() {
        let toks: Vec<_> = Tokens::new("a < b <3 </ c").collect();
        assert_eq!(toks, vec![text("a < b <3 </ c")]);
    }

    #[test]
    fn unterminated_tag_becomes_text() {
        let toks: Vec<_> = Tokens::new("x<td class=").collect();
        assert_eq!(toks, vec![text("x"), text("<td class=")]);
    }
}
