//! RGB colors, interpolation and the native hex escape form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::legacy::SECTION;

/// Errors from parsing a `RRGGBB` color.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ColorParseError {
    #[error("expected 6 hex digits, found {0}")]
    InvalidLength(usize),
    #[error("invalid hex digit '{0}'")]
    InvalidDigit(char),
}

/// An 8-bit RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Creates a color from its channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `RRGGBB` or `#RRGGBB`, case-insensitive.
    pub fn from_hex(hex: &str) -> Result<Self, ColorParseError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(ColorParseError::InvalidDigit(bad));
        }
        if digits.len() != 6 {
            return Err(ColorParseError::InvalidLength(digits.len()));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| ColorParseError::InvalidLength(6))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Linear interpolation towards `to`; each channel rounded half up.
    pub fn lerp(self, to: Rgb, t: f64) -> Rgb {
        let mix = |a: u8, b: u8| {
            let value = f64::from(a) + (f64::from(b) - f64::from(a)) * t;
            (value + 0.5).floor().clamp(0.0, 255.0) as u8
        };
        Rgb::new(mix(self.r, to.r), mix(self.g, to.g), mix(self.b, to.b))
    }

    /// Converts hue/saturation/brightness (each in `[0, 1]`) to RGB.
    ///
    /// The hue wraps, so `1.0` equals `0.0`.
    pub fn from_hsb(hue: f32, saturation: f32, brightness: f32) -> Rgb {
        let scale = |x: f32| (x * 255.0 + 0.5) as u8;
        if saturation == 0.0 {
            let v = scale(brightness);
            return Rgb::new(v, v, v);
        }

        let h = (hue - hue.floor()) * 6.0;
        let f = h - h.floor();
        let p = brightness * (1.0 - saturation);
        let q = brightness * (1.0 - saturation * f);
        let t = brightness * (1.0 - saturation * (1.0 - f));

        let (r, g, b) = match h as u32 {
            0 => (brightness, t, p),
            1 => (q, brightness, p),
            2 => (p, brightness, t),
            3 => (p, q, brightness),
            4 => (t, p, brightness),
            _ => (brightness, p, q),
        };
        Rgb::new(scale(r), scale(g), scale(b))
    }

    /// Appends the native 14-character form, `§x§r§r§g§g§b§b`.
    pub fn write_escape(&self, out: &mut String) {
        out.push(SECTION);
        out.push('x');
        for digit in self.to_hex().chars() {
            out.push(SECTION);
            out.push(digit);
        }
    }

    /// The native escape as a new string.
    pub fn to_escape(&self) -> String {
        let mut out = String::with_capacity(28);
        self.write_escape(&mut out);
        out
    }

    /// Lower-case `rrggbb` without a leading `#`.
    pub fn to_hex(&self) -> String {
        format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rgb::from_hex(s.trim())
    }
}

impl TryFrom<String> for Rgb {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_string()
    }
}

/// The color assigned to one visible character of a span.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    /// Position within the span in `[0, 1]`.
    pub offset: f64,
    pub color: Rgb,
}
