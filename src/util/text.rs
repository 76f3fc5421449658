use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";

/// Cut `s` to at most `max_width` terminal columns, then append "...".
///
/// Text that already fits is returned borrowed and unchanged. Width is
/// measured per character, so wide CJK characters and emoji count double and
/// a cut never lands inside a multi-byte character.
///
/// ```
/// use gator::util::truncate_with_ellipsis;
///
/// assert_eq!(truncate_with_ellipsis("Short", 10), "Short");
/// assert_eq!(truncate_with_ellipsis("Hello World", 5), "Hello...");
/// ```
pub fn truncate_with_ellipsis(s: &str, max_width: usize) -> Cow<'_, str> {
    if UnicodeWidthStr::width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let mut width = 0;
    let mut cut = 0;
    for (idx, c) in s.char_indices() {
        let char_width = UnicodeWidthChar::width(c).unwrap_or(0);
        if width + char_width > max_width {
            break;
        }
        width += char_width;
        cut = idx + c.len_utf8();
    }

    Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS))
}

/// Remove terminal control sequences from feed-supplied text before printing.
///
/// Drops C0 controls other than tab, newline and carriage return, DEL, ANSI
/// CSI sequences (`ESC [ ... final`), OSC sequences (`ESC ] ...` up to BEL or
/// `ESC \`) and any other bare ESC. Clean input is returned borrowed.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    fn is_control(c: char) -> bool {
        (c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r')) || c == '\u{7f}'
    }

    if !s.chars().any(is_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\u{1b}' {
            if !is_control(c) {
                out.push(c);
            }
            continue;
        }

        match chars.peek() {
            Some('[') => {
                chars.next();
                // Parameter and intermediate bytes, then one final byte
                for c in chars.by_ref() {
                    if ('\u{40}'..='\u{7e}').contains(&c) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == '\u{07}' {
                        break;
                    }
                    if c == '\u{1b}' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    Cow::Owned(out)
}
