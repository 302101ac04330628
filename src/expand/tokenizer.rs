//! expand::tokenizer
//!
//! Streaming HTML tokenizer that reports exact byte offsets.
//!
//! Attribute values and text are kept verbatim (no entity decoding) so a
//! document can be re-emitted without changing bytes the author wrote.
//! Content of `script`, `style`, `textarea` and `title` is raw text up to
//! the matching end tag.

/// Elements whose content is not tokenized.
const RAW_TEXT: &[&str] = &["script", "style", "textarea", "title"];

/// One attribute as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// Lowercased name
    pub name: String,
    /// Raw value, `None` for a bare attribute
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    StartTag {
        name: String,
        attrs: Vec<Attr>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    Text,
    Comment,
    Doctype,
}

/// A token and the byte range `start..end` it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

/// Tokenizer over a source string.
///
/// # Example
///
/// ```
/// use gitfolio::expand::tokenizer::{Tokenizer, TokenKind};
///
/// let src = "<p edit id=a>Hi</p>";
/// let tokens: Vec<_> = Tokenizer::new(src).collect();
/// assert_eq!(tokens[0].end, 13);
/// assert_eq!(&src[tokens[1].start..tokens[1].end], "Hi");
/// assert!(matches!(tokens[2].kind, TokenKind::EndTag { .. }));
/// ```
#[derive(Debug)]
pub struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    raw_until: Option<String>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            raw_until: None,
        }
    }

    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    fn starts_with_at(&self, at: usize, needle: &str) -> bool {
        self.bytes()
            .get(at..at + needle.len())
            .is_some_and(|s| s.eq_ignore_ascii_case(needle.as_bytes()))
    }

    /// Whether a tag, comment or declaration begins at `at`.
    fn markup_starts_at(&self, at: usize) -> bool {
        let bytes = self.bytes();
        if bytes.get(at) != Some(&b'<') {
            return false;
        }
        match bytes.get(at + 1) {
            Some(b) if b.is_ascii_alphabetic() => true,
            Some(b'/') => bytes.get(at + 2).is_some_and(|b| b.is_ascii_alphabetic()),
            Some(b'!') | Some(b'?') => true,
            _ => false,
        }
    }

    fn find_from(&self, at: usize, needle: &str) -> Option<usize> {
        self.src.get(at..)?.find(needle).map(|i| at + i)
    }

    fn raw_text(&mut self, name: String) -> Option<Token> {
        let start = self.pos;
        let closing = format!("</{}", name);
        let mut at = start;
        let end = loop {
            match self.src.get(at..).and_then(|rest| rest.find('<')) {
                Some(i) if self.starts_with_at(at + i, &closing) => break at + i,
                Some(i) => at = at + i + 1,
                None => break self.src.len(),
            }
        };
        self.pos = end;
        (end > start).then_some(Token {
            kind: TokenKind::Text,
            start,
            end,
        })
    }

    fn text(&mut self) -> Token {
        let bytes = self.bytes();
        let start = self.pos;
        let mut at = start + 1;
        loop {
            match bytes[at..].iter().position(|&b| b == b'<') {
                Some(i) if self.markup_starts_at(at + i) => {
                    at += i;
                    break;
                }
                Some(i) => at += i + 1,
                None => {
                    at = bytes.len();
                    break;
                }
            }
        }
        self.pos = at;
        Token {
            kind: TokenKind::Text,
            start,
            end: self.pos,
        }
    }

    fn comment(&mut self) -> Token {
        let start = self.pos;
        let end = self
            .find_from(start + 4, "-->")
            .map_or(self.src.len(), |i| i + 3);
        self.pos = end;
        Token {
            kind: TokenKind::Comment,
            start,
            end,
        }
    }

    fn declaration(&mut self) -> Token {
        let start = self.pos;
        let end = self.find_from(start, ">").map_or(self.src.len(), |i| i + 1);
        self.pos = end;
        Token {
            kind: TokenKind::Doctype,
            start,
            end,
        }
    }

    fn end_tag(&mut self) -> Token {
        let start = self.pos;
        let name_start = start + 2;
        let name_end = self.scan_while(name_start, |b| !b.is_ascii_whitespace() && b != b'>');
        let name = self.src[name_start..name_end].to_ascii_lowercase();
        let end = self.find_from(name_end, ">").map_or(self.src.len(), |i| i + 1);
        self.pos = end;
        Token {
            kind: TokenKind::EndTag { name },
            start,
            end,
        }
    }

    fn start_tag(&mut self) -> Token {
        let bytes = self.bytes();
        let start = self.pos;
        let name_start = start + 1;
        let name_end = self.scan_while(name_start, |b| {
            !b.is_ascii_whitespace() && b != b'>' && b != b'/'
        });
        let name = self.src[name_start..name_end].to_ascii_lowercase();

        let mut attrs = Vec::new();
        let mut self_closing = false;
        let mut at = name_end;

        loop {
            at = self.scan_while(at, |b| b.is_ascii_whitespace());
            match bytes.get(at) {
                None => break,
                Some(b'>') => {
                    at += 1;
                    break;
                }
                Some(b'/') => {
                    if bytes.get(at + 1) == Some(&b'>') {
                        self_closing = true;
                        at += 2;
                        break;
                    }
                    at += 1;
                    continue;
                }
                Some(_) => {}
            }

            let attr_start = at;
            at = self.scan_while(at, |b| {
                !b.is_ascii_whitespace() && b != b'=' && b != b'>' && b != b'/'
            });
            if at == attr_start {
                // Stray '=' with no name.
                at += 1;
                continue;
            }
            let attr_name = self.src[attr_start..at].to_ascii_lowercase();

            let after_name = self.scan_while(at, |b| b.is_ascii_whitespace());
            let value = if bytes.get(after_name) == Some(&b'=') {
                let value_start = self.scan_while(after_name + 1, |b| b.is_ascii_whitespace());
                match bytes.get(value_start) {
                    Some(&quote) if quote == b'"' || quote == b'\'' => {
                        let close = self
                            .src
                            .get(value_start + 1..)
                            .and_then(|rest| rest.find(quote as char))
                            .map_or(self.src.len(), |i| value_start + 1 + i);
                        at = (close + 1).min(self.src.len());
                        Some(self.src[value_start + 1..close].to_string())
                    }
                    _ => {
                        let value_end =
                            self.scan_while(value_start, |b| !b.is_ascii_whitespace() && b != b'>');
                        at = value_end;
                        Some(self.src[value_start..value_end].to_string())
                    }
                }
            } else {
                None
            };

            attrs.push(Attr {
                name: attr_name,
                value,
            });
        }

        self.pos = at;
        if !self_closing && RAW_TEXT.contains(&name.as_str()) {
            self.raw_until = Some(name.clone());
        }

        Token {
            kind: TokenKind::StartTag {
                name,
                attrs,
                self_closing,
            },
            start,
            end: at,
        }
    }

    fn scan_while(&self, mut at: usize, pred: impl Fn(u8) -> bool) -> usize {
        let bytes = self.bytes();
        while at < bytes.len() && pred(bytes[at]) {
            at += 1;
        }
        at
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if let Some(name) = self.raw_until.take() {
            if let Some(token) = self.raw_text(name) {
                return Some(token);
            }
        }

        if self.pos >= self.src.len() {
            return None;
        }

        if !self.markup_starts_at(self.pos) {
            return Some(self.text());
        }

        let token = if self.starts_with_at(self.pos, "<!--") {
            self.comment()
        } else if self.starts_with_at(self.pos, "<!") || self.starts_with_at(self.pos, "<?") {
            self.declaration()
        } else if self.starts_with_at(self.pos, "</") {
            self.end_tag()
        } else {
            self.start_tag()
        };
        Some(token)
    }
}
