//! Lenient removal of span tags from untrusted text.

use crate::token::TagKind;

/// Length of a tag-like run at the start of `rest`, if any.
///
/// Matches `<` `/`? tag-name, then anything up to the next `>` that does not
/// cross another `<`. Parameters are not validated, so `<hex,nothex>` counts.
fn special_tag_len(rest: &str) -> Option<usize> {
    let body = rest.strip_prefix('<')?;
    let body = body.strip_prefix('/').unwrap_or(body);
    let name_len = body
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .count();
    TagKind::from_name(&body[..name_len])?;

    let after_name = &body[name_len..];
    match after_name.chars().next() {
        Some(c) if c == '>' || c == ',' || c.is_whitespace() => {}
        _ => return None,
    }

    let end = after_name.find(['<', '>'])?;
    if !after_name[end..].starts_with('>') {
        return None;
    }
    Some(rest.len() - after_name.len() + end + 1)
}

/// Removes every hex, gradient and rainbow tag, opening or closing, even
/// with malformed parameters. Legacy codes are untouched.
pub fn strip_special_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;
    while let Some(offset) = input[pos..].find('<') {
        let start = pos + offset;
        out.push_str(&input[pos..start]);
        match special_tag_len(&input[start..]) {
            Some(len) => pos = start + len,
            None => {
                out.push('<');
                pos = start + 1;
            }
        }
    }
    out.push_str(&input[pos..]);
    out
}
