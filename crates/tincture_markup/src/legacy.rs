//! Two-character legacy escape pairs.
//!
//! The host's renderer understands `§` followed by a code character. Users
//! type `&` instead, which is translated as the last rendering step.

/// The host's native escape marker.
pub const SECTION: char = '§';

/// The user-facing marker translated to [`SECTION`].
pub const AMPERSAND: char = '&';

/// Colors `0-9a-f`, formats `k-o`, reset `r` and the hex introducer `x`.
pub fn is_legacy_code(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), '0'..='9' | 'a'..='f' | 'k'..='o' | 'r' | 'x')
}

/// Rewrites `marker` + legacy code to `§` + the lower-cased code.
///
/// Pairs are not rescanned, so `&&a` becomes `&§a`.
pub fn translate_alternate_codes(marker: char, input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match chars.peek() {
            Some(&code) if c == marker && is_legacy_code(code) => {
                out.push(SECTION);
                out.push(code.to_ascii_lowercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

fn strip_pairs(input: &str, is_marker: impl Fn(char) -> bool) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match chars.peek() {
            Some(&code) if is_marker(c) && is_legacy_code(code) => {
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

/// Removes legacy pairs written with either marker.
///
/// Hex sequences (`§x§r§r§g§g§b§b` and the `&` form) are made of legacy pairs,
/// so they disappear too.
pub fn strip_color_codes(input: &str) -> String {
    strip_pairs(input, |c| c == SECTION || c == AMPERSAND)
}

/// Removes only native `§` pairs, leaving typed `&` text alone.
pub fn strip_native_codes(input: &str) -> String {
    strip_pairs(input, |c| c == SECTION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_alternate_codes() {
        assert_eq!(translate_alternate_codes('&', "&aHi &LBold"), "§aHi §lBold");
        assert_eq!(translate_alternate_codes('&', "fish & chips &z"), "fish & chips &z");
        assert_eq!(translate_alternate_codes('&', "&&a"), "&§a");
        assert_eq!(translate_alternate_codes('&', "trailing &"), "trailing &");
    }

    #[test]
    fn test_strip_color_codes_handles_both_markers() {
        assert_eq!(strip_color_codes("&cRed §lbold"), "Red bold");
        assert_eq!(strip_color_codes("§x§f§f§0§0§0§0A"), "A");
        assert_eq!(strip_color_codes("&x&f&f&0&0&0&0B"), "B");
        assert_eq!(strip_color_codes("salt & pepper &zoo"), "salt & pepper &zoo");
    }

    #[test]
    fn test_strip_native_codes_keeps_ampersand_text() {
        assert_eq!(strip_native_codes("§aHello &bthere"), "Hello &bthere");
    }
}
