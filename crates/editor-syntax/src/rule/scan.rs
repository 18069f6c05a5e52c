//! Character scanners shared by the literal and numeric rules.
//!
//! Offsets are byte offsets into a UTF-8 line. Most scanners only compare ASCII
//! bytes, which never collide with UTF-8 continuation bytes.

use crate::delimiters::WordDelimiters;
use crate::keyword_list::CaseSensitivity;

pub(crate) fn char_at(text: &str, offset: usize) -> Option<char> {
    text.get(offset..)?.chars().next()
}

pub(crate) fn char_before(text: &str, offset: usize) -> Option<char> {
    text.get(..offset)?.chars().next_back()
}

fn byte_at(text: &str, offset: usize) -> Option<u8> {
    text.as_bytes().get(offset).copied()
}

fn is_digit(b: Option<u8>) -> bool {
    b.is_some_and(|b| b.is_ascii_digit())
}

fn is_octal(b: Option<u8>) -> bool {
    matches!(b, Some(b'0'..=b'7'))
}

fn is_hex(b: Option<u8>) -> bool {
    b.is_some_and(|b| b.is_ascii_hexdigit())
}

/// Numeric rules only start at the beginning of the line or after a delimiter.
fn starts_word(text: &str, offset: usize, delimiters: &WordDelimiters) -> bool {
    char_before(text, offset).is_none_or(|c| delimiters.contains(c))
}

/// End offset of a C escape sequence (`\n`, `\x4F`, `\012`, ...) at `offset`,
/// or `offset` if there is none.
pub(crate) fn escaped_char(text: &str, offset: usize) -> usize {
    if byte_at(text, offset) != Some(b'\\') || text.len() < offset + 2 {
        return offset;
    }

    match byte_at(text, offset + 1) {
        Some(
            b'a' | b'b' | b'e' | b'f' | b'n' | b'r' | b't' | b'v' | b'"' | b'\'' | b'?' | b'\\',
        ) => offset + 2,
        Some(b'x') => {
            if !is_hex(byte_at(text, offset + 2)) {
                return offset;
            }
            if is_hex(byte_at(text, offset + 3)) {
                offset + 4
            } else {
                offset + 3
            }
        }
        // A bare `\0` is fine, unlike a bare `\x`.
        Some(b'0'..=b'7') => {
            if !is_octal(byte_at(text, offset + 2)) {
                return offset + 2;
            }
            if is_octal(byte_at(text, offset + 3)) {
                offset + 4
            } else {
                offset + 3
            }
        }
        _ => offset,
    }
}

pub(crate) fn identifier(text: &str, offset: usize) -> usize {
    let mut chars = text[offset..].char_indices();
    match chars.next() {
        Some((_, c)) if c.is_alphabetic() || c == '_' => {}
        _ => return offset,
    }
    for (i, c) in chars {
        if !c.is_alphanumeric() && c != '_' {
            return offset + i;
        }
    }
    text.len()
}

pub(crate) fn spaces(text: &str, offset: usize) -> usize {
    text[offset..]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map_or(text.len(), |(i, _)| offset + i)
}

pub(crate) fn int(text: &str, offset: usize, delimiters: &WordDelimiters) -> usize {
    if !starts_word(text, offset, delimiters) {
        return offset;
    }
    let mut end = offset;
    while is_digit(byte_at(text, end)) {
        end += 1;
    }
    end
}

pub(crate) fn float(text: &str, offset: usize, delimiters: &WordDelimiters) -> usize {
    if !starts_word(text, offset, delimiters) {
        return offset;
    }

    let mut end = offset;
    while is_digit(byte_at(text, end)) {
        end += 1;
    }
    if byte_at(text, end) != Some(b'.') {
        return offset;
    }
    end += 1;
    while is_digit(byte_at(text, end)) {
        end += 1;
    }
    // A lone decimal point is not a number.
    if end == offset + 1 {
        return offset;
    }

    let mut exp = end;
    if !matches!(byte_at(text, exp), Some(b'e' | b'E')) {
        return end;
    }
    exp += 1;
    if matches!(byte_at(text, exp), Some(b'+' | b'-')) {
        exp += 1;
    }
    let digits_start = exp;
    while is_digit(byte_at(text, exp)) {
        exp += 1;
    }
    if exp == digits_start { end } else { exp }
}

pub(crate) fn c_char(text: &str, offset: usize) -> usize {
    if text.len() < offset + 3 {
        return offset;
    }
    if byte_at(text, offset) != Some(b'\'') || byte_at(text, offset + 1) == Some(b'\'') {
        return offset;
    }

    let mut end = escaped_char(text, offset + 1);
    if end == offset + 1 {
        if byte_at(text, end) == Some(b'\\') {
            return offset;
        }
        end += char_at(text, end).map_or(1, char::len_utf8);
    }
    if byte_at(text, end) == Some(b'\'') {
        end + 1
    } else {
        offset
    }
}

pub(crate) fn c_hex(text: &str, offset: usize, delimiters: &WordDelimiters) -> usize {
    if !starts_word(text, offset, delimiters) || text.len() < offset + 3 {
        return offset;
    }
    if byte_at(text, offset) != Some(b'0')
        || !matches!(byte_at(text, offset + 1), Some(b'x' | b'X'))
        || !is_hex(byte_at(text, offset + 2))
    {
        return offset;
    }
    let mut end = offset + 3;
    while is_hex(byte_at(text, end)) {
        end += 1;
    }
    end
}

pub(crate) fn c_oct(text: &str, offset: usize, delimiters: &WordDelimiters) -> usize {
    if !starts_word(text, offset, delimiters) || text.len() < offset + 2 {
        return offset;
    }
    if byte_at(text, offset) != Some(b'0') || !is_octal(byte_at(text, offset + 1)) {
        return offset;
    }
    let mut end = offset + 2;
    while is_octal(byte_at(text, end)) {
        end += 1;
    }
    end
}

pub(crate) fn range(text: &str, offset: usize, begin: char, end: char) -> usize {
    if char_at(text, offset) != Some(begin) {
        return offset;
    }
    let body = offset + begin.len_utf8();
    text[body..]
        .char_indices()
        .find(|(_, c)| *c == end)
        .map_or(offset, |(i, c)| body + i + c.len_utf8())
}

fn chars_eq(a: char, b: char, case_sensitivity: CaseSensitivity) -> bool {
    match case_sensitivity {
        CaseSensitivity::Sensitive => a == b,
        CaseSensitivity::Insensitive => a == b || a.to_lowercase().eq(b.to_lowercase()),
    }
}

/// End offset of `pattern` if the text continues with it at `offset`.
pub(crate) fn literal(
    text: &str,
    offset: usize,
    pattern: &str,
    case_sensitivity: CaseSensitivity,
) -> Option<usize> {
    if case_sensitivity == CaseSensitivity::Sensitive {
        return text[offset..]
            .starts_with(pattern)
            .then(|| offset + pattern.len());
    }

    let mut end = offset;
    let mut rest = text[offset..].char_indices();
    for p in pattern.chars() {
        let (i, c) = rest.next()?;
        if !chars_eq(p, c, case_sensitivity) {
            return None;
        }
        end = offset + i + c.len_utf8();
    }
    Some(end)
}

/// Replace `%1`, `%2`, ... with captured texts, highest index first so `%10`
/// is not clobbered by `%1`.
pub(crate) fn replace_captures(pattern: &str, captures: &[String], quote: bool) -> String {
    let mut out = pattern.to_string();
    for i in (1..captures.len()).rev() {
        let value = if quote {
            regex::escape(&captures[i])
        } else {
            captures[i].clone()
        };
        out = out.replace(&format!("%{i}"), &value);
    }
    out
}
