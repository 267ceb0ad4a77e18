//! Flat tokenizer for markup text.
//!
//! Grammar, case-insensitive, whitespace allowed around parameters:
//!
//! ```text
//! open  := "<hex" param ">" | "<gradient" param param ">" | "<rainbow" ">"
//! param := ws* "," ws* "#"? hex{6} ws*
//! close := "</" ("hex" | "gradient" | "rainbow") ws* ">"
//! ```
//!
//! Anything that does not match, including tags with malformed parameters,
//! stays literal text.

use std::fmt;

use crate::color::Rgb;
use crate::legacy::{is_legacy_code, AMPERSAND, SECTION};

/// The three span tag kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Hex,
    Gradient,
    Rainbow,
}

impl TagKind {
    /// Rendering order.
    pub const ALL: [TagKind; 3] = [TagKind::Hex, TagKind::Gradient, TagKind::Rainbow];

    /// Lower-case tag name as written in markup.
    pub fn name(&self) -> &'static str {
        match self {
            TagKind::Hex => "hex",
            TagKind::Gradient => "gradient",
            TagKind::Rainbow => "rainbow",
        }
    }

    /// Case-insensitive lookup by tag name.
    pub fn from_name(name: &str) -> Option<Self> {
        TagKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed opening tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Hex(Rgb),
    Gradient { from: Rgb, to: Rgb },
    Rainbow,
}

impl Tag {
    pub fn kind(&self) -> TagKind {
        match self {
            Tag::Hex(_) => TagKind::Hex,
            Tag::Gradient { .. } => TagKind::Gradient,
            Tag::Rainbow => TagKind::Rainbow,
        }
    }
}

/// One token, borrowing its source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Text(&'a str),
    /// A marker plus its code, copied through untouched.
    Escape(&'a str),
    Open { tag: Tag, raw: &'a str },
    Close { kind: TagKind, raw: &'a str },
}

impl<'a> Token<'a> {
    /// The exact source text of this token.
    pub fn raw(&self) -> &'a str {
        match self {
            Token::Text(raw) | Token::Escape(raw) => raw,
            Token::Open { raw, .. } | Token::Close { raw, .. } => raw,
        }
    }

    /// Whether this is a closing tag of `kind`.
    pub fn closes(&self, kind: TagKind) -> bool {
        matches!(self, Token::Close { kind: k, .. } if *k == kind)
    }
}

/// Splits `input` into tokens. Concatenating every [`Token::raw`] yields
/// `input` again.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while let Some(c) = input[pos..].chars().next() {
        match match_token(&input[pos..]) {
            Some((token, len)) => {
                if text_start < pos {
                    tokens.push(Token::Text(&input[text_start..pos]));
                }
                tokens.push(token);
                pos += len;
                text_start = pos;
            }
            None => pos += c.len_utf8(),
        }
    }

    if text_start < input.len() {
        tokens.push(Token::Text(&input[text_start..]));
    }
    tokens
}

fn match_token(rest: &str) -> Option<(Token<'_>, usize)> {
    let mut chars = rest.chars();
    let first = chars.next()?;
    match first {
        SECTION => {
            let code = chars.next()?;
            let len = first.len_utf8() + code.len_utf8();
            Some((Token::Escape(&rest[..len]), len))
        }
        AMPERSAND => {
            let code = chars.next()?;
            is_legacy_code(code).then(|| (Token::Escape(&rest[..2]), 2))
        }
        '<' => parse_tag(rest),
        _ => None,
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        &self.bytes[start..self.pos]
    }
}

fn parse_tag(rest: &str) -> Option<(Token<'_>, usize)> {
    let mut cursor = Cursor {
        bytes: rest.as_bytes(),
        pos: 0,
    };
    if !cursor.eat(b'<') {
        return None;
    }
    let closing = cursor.eat(b'/');
    let name = cursor.take_while(|b| b.is_ascii_alphabetic());
    let kind = TagKind::from_name(std::str::from_utf8(name).ok()?)?;

    if closing {
        cursor.skip_whitespace();
        if !cursor.eat(b'>') {
            return None;
        }
        let raw = &rest[..cursor.pos];
        return Some((Token::Close { kind, raw }, cursor.pos));
    }

    let mut colors = Vec::with_capacity(2);
    loop {
        cursor.skip_whitespace();
        if cursor.eat(b'>') {
            break;
        }
        if !cursor.eat(b',') {
            return None;
        }
        cursor.skip_whitespace();
        cursor.eat(b'#');
        let digits = cursor.take_while(|b| b.is_ascii_hexdigit());
        if digits.len() != 6 {
            return None;
        }
        colors.push(Rgb::from_hex(std::str::from_utf8(digits).ok()?).ok()?);
    }

    let tag = match (kind, colors.as_slice()) {
        (TagKind::Hex, [color]) => Tag::Hex(*color),
        (TagKind::Gradient, [from, to]) => Tag::Gradient {
            from: *from,
            to: *to,
        },
        (TagKind::Rainbow, []) => Tag::Rainbow,
        _ => return None,
    };
    let raw = &rest[..cursor.pos];
    Some((Token::Open { tag, raw }, cursor.pos))
}
