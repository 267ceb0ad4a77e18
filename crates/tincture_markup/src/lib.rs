//! # Tincture Markup
//!
//! Renders chat markup into the host's native color escapes.
//!
//! Supported input:
//!
//! * legacy pairs written with `&` or `§` (`&a`, `§l`, ...)
//! * `<hex,RRGGBB>...</hex>`
//! * `<gradient,RRGGBB,RRGGBB>...</gradient>`
//! * `<rainbow>...</rainbow>`
//!
//! Tags are case-insensitive, tolerate whitespace around parameters and apply
//! to the rest of the string when left unclosed. Existing escape pairs inside
//! a span are preserved and never count towards gradient or rainbow positions.
//!
//! ```rust
//! use tincture_markup::MarkupEngine;
//!
//! let engine = MarkupEngine::default();
//! assert_eq!(engine.render("&aHello"), "§aHello");
//! assert_eq!(engine.render("<hex,FF0000>!</hex>"), "§x§f§f§0§0§0§0!");
//! ```
//!
//! There is no style stack and no styling beyond color.

pub mod color;
pub mod legacy;
pub mod render;
pub mod tags;
pub mod token;

pub use color::{ColorParseError, ColorStop, Rgb};
pub use legacy::{
    is_legacy_code, strip_color_codes, strip_native_codes, translate_alternate_codes, AMPERSAND,
    SECTION,
};
pub use render::{color_stops, colorize, MarkupEngine};
pub use tags::strip_special_tags;
pub use token::{tokenize, Tag, TagKind, Token};
