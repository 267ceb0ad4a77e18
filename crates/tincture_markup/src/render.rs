//! Span rendering.
//!
//! Each tag kind is resolved in its own pass over the output of the previous
//! pass: hex, then gradient, then rainbow. `&` translation runs last, so the
//! untranslated pairs are still recognised as escapes while colors are
//! computed.

use tracing::trace;

use crate::color::{ColorStop, Rgb};
use crate::legacy::{translate_alternate_codes, AMPERSAND};
use crate::token::{tokenize, Tag, TagKind, Token};

/// Renders markup into native escape sequences.
///
/// The engine is a small `Copy` value holding two switches; build it once
/// from configuration and share it freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkupEngine {
    translate_ampersand: bool,
    tags_apply_to_rest: bool,
}

impl Default for MarkupEngine {
    fn default() -> Self {
        Self {
            translate_ampersand: true,
            tags_apply_to_rest: true,
        }
    }
}

impl MarkupEngine {
    /// `&` translation on, unclosed tags color the rest of the line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `&` pairs become native `§` pairs.
    pub fn with_translate_ampersand(mut self, translate: bool) -> Self {
        self.translate_ampersand = translate;
        self
    }

    /// Whether an unclosed tag colors the remainder of the string. When off,
    /// the unclosed tag is left as literal text.
    pub fn with_tags_apply_to_rest(mut self, apply: bool) -> Self {
        self.tags_apply_to_rest = apply;
        self
    }

    /// Renders `input`.
    ///
    /// Never fails and never drops text: malformed tags stay literal, and
    /// spans with nothing visible lose only their tags.
    ///
    /// # Arguments
    ///
    /// * `input` - Text with `<hex>`, `<gradient>`, `<rainbow>` tags and `&`
    ///   or `§` codes
    ///
    /// # Returns
    ///
    /// The text with every span expanded to one hex escape per visible
    /// character, and `&` codes translated when enabled.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tincture_markup::MarkupEngine;
    ///
    /// let out = MarkupEngine::new().render("<hex,FF0000>hi</hex> &athere");
    /// assert_eq!(out, "§x§f§f§0§0§0§0h§x§f§f§0§0§0§0i §athere");
    /// ```
    pub fn render(&self, input: &str) -> String {
        let mut out = input.to_string();
        if out.contains('<') {
            for kind in TagKind::ALL {
                out = self.render_kind(&out, kind);
            }
        }
        if self.translate_ampersand {
            out = translate_alternate_codes(AMPERSAND, &out);
        }
        out
    }

    /// Resolves every span of `kind` and strips orphan closing tags of it.
    ///
    /// Spans are resolved one at a time, first opening tag first, and each
    /// scan runs against the string the previous span produced. A same-kind
    /// opening tag nested in a span therefore survives the outer span and then
    /// colors from its own position onwards.
    fn render_kind(&self, input: &str, kind: TagKind) -> String {
        let mut out = input.to_string();

        loop {
            let tokens = tokenize(&out);
            let first_open = tokens.iter().enumerate().find_map(|(i, token)| match token {
                Token::Open { tag, .. } if tag.kind() == kind => Some((i, *tag)),
                _ => None,
            });
            let Some((start, tag)) = first_open else {
                break;
            };

            let end = match tokens[start + 1..].iter().position(|t| t.closes(kind)) {
                Some(offset) => start + 1 + offset,
                None if self.tags_apply_to_rest => tokens.len(),
                None => {
                    // Every later opening tag is unclosed too.
                    trace!("Unclosed <{}> left literal", kind);
                    break;
                }
            };

            let mut next = String::with_capacity(out.len() * 2);
            tokens[..start].iter().for_each(|t| next.push_str(t.raw()));
            paint_span(&mut next, &tag, &tokens[start + 1..end]);
            tokens
                .iter()
                .skip(end + 1)
                .for_each(|t| next.push_str(t.raw()));
            out = next;
        }

        tokenize(&out)
            .into_iter()
            .filter(|token| !token.closes(kind))
            .map(|token| token.raw())
            .collect()
    }
}

/// Line breaks take no color, so they do not shift gradient positions.
fn is_visible(c: char) -> bool {
    c != '\n' && c != '\r'
}

fn visible_count(span: &[Token<'_>]) -> usize {
    span.iter()
        .map(|token| match token {
            Token::Text(text) => text.chars().filter(|&c| is_visible(c)).count(),
            _ => 0,
        })
        .sum()
}

/// Colors for `n` visible characters under `tag`, in order.
///
/// Gradients interpolate from the first to the last character, so for
/// `n >= 2` the ends are exactly `from` and `to`. Rainbows step the hue by
/// `1 / n` starting at red. A single character takes the `from` color or
/// red.
pub fn color_stops(tag: &Tag, n: usize) -> Vec<ColorStop> {
    (0..n)
        .map(|i| {
            let offset = if n == 1 {
                0.0
            } else {
                i as f64 / (n - 1) as f64
            };
            let color = match *tag {
                Tag::Hex(color) => color,
                Tag::Gradient { from, to } => from.lerp(to, offset),
                Tag::Rainbow => {
                    let hue = if n == 1 { 0.0 } else { i as f32 / n as f32 };
                    Rgb::from_hsb(hue, 1.0, 1.0)
                }
            };
            ColorStop { offset, color }
        })
        .collect()
}

/// Writes `span` with a color escape before every visible character.
///
/// Escapes and tags are copied through and not counted.
fn paint_span(out: &mut String, tag: &Tag, span: &[Token<'_>]) {
    let stops = color_stops(tag, visible_count(span));
    let mut stops = stops.iter();

    for token in span {
        match token {
            Token::Text(text) => {
                for c in text.chars() {
                    if is_visible(c) {
                        if let Some(stop) = stops.next() {
                            stop.color.write_escape(out);
                        }
                    }
                    out.push(c);
                }
            }
            other => out.push_str(other.raw()),
        }
    }
}

/// Renders with the default engine.
pub fn colorize(input: &str) -> String {
    MarkupEngine::default().render(input)
}
