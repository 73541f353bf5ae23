//! Where to cut an oversized span into two leaves.
//!
//! A newline close to the middle wins, so chunk edges tend to follow line
//! edges. Without one the cut falls back to the middle, pulled left onto a
//! grapheme boundary (or at least a UTF-8 lead byte) so no character is torn
//! across two leaves.

use unicode_segmentation::GraphemeCursor;

const NEWLINE_WINDOW: usize = 256;

/// Index to split `text` at; always in `1..text.len()` for spans of two or
/// more bytes.
pub fn split_index(text: &[u8]) -> usize {
    let len = text.len();
    let half = len / 2;
    let window = (len / 4).min(NEWLINE_WINDOW);

    let right_end = (half + window).min(len);
    if let Some(found) = memchr::memchr(b'\n', &text[half..right_end]) {
        let at = half + found + 1;
        if at < len {
            return at;
        }
    }

    let left_start = half.saturating_sub(window.saturating_sub(1)).max(1);
    if left_start < half {
        if let Some(found) = memchr::memrchr(b'\n', &text[left_start..half]) {
            return left_start + found + 1;
        }
    }

    boundary_before(text, half)
}

// Closest cut at or before `at` that keeps characters whole.
fn boundary_before(text: &[u8], at: usize) -> usize {
    let at = at.max(1);
    let Ok(s) = std::str::from_utf8(text) else {
        return lead_byte_before(text, at);
    };

    let mut char_at = at;
    while !s.is_char_boundary(char_at) {
        char_at -= 1;
    }
    if char_at == 0 {
        return at;
    }

    let mut cursor = GraphemeCursor::new(char_at, s.len(), true);
    match cursor.is_boundary(s, 0) {
        Ok(true) => char_at,
        _ => match cursor.prev_boundary(s, 0) {
            Ok(Some(prev)) if prev > 0 => prev,
            _ => char_at,
        },
    }
}

fn lead_byte_before(text: &[u8], at: usize) -> usize {
    let is_continuation = |byte: u8| byte & 0xC0 == 0x80;
    let mut cut = at;
    // a UTF-8 sequence carries at most three continuation bytes
    while cut > 0 && at - cut < 3 && is_continuation(text[cut]) {
        cut -= 1;
    }
    if cut == 0 { at } else { cut }
}
