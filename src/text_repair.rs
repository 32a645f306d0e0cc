//! Mojibake repair.
//!
//! Archive exporters commonly write UTF-8 text whose bytes were read back as
//! one character per byte, so `"é"` arrives as `"Ã©"`. [`repair`] reverses
//! that: each UTF-16 code unit contributes its low 8 bits as one byte, and
//! the byte sequence is decoded as UTF-8.
//!
//! The repair is accepted only when the bytes decode cleanly, the result
//! differs from the input, and no more than 10% of the result is U+FFFD.
//! Otherwise the input is returned untouched, so the function never fails and
//! is a no-op on text that is already correct.

use std::borrow::Cow;

const REPLACEMENT: char = '\u{FFFD}';

/// Repair `value` if it looks like mis-decoded UTF-8, else return it as-is.
pub fn repair(value: &str) -> Cow<'_, str> {
    if value.is_empty() || value.is_ascii() {
        return Cow::Borrowed(value);
    }

    let bytes: Vec<u8> = value.encode_utf16().map(|unit| unit as u8).collect();
    let decoded = match String::from_utf8(bytes) {
        Ok(decoded) => decoded,
        Err(_) => return Cow::Borrowed(value),
    };

    if decoded == value {
        return Cow::Borrowed(value);
    }

    let total = decoded.encode_utf16().count();
    let replaced = decoded.chars().filter(|&c| c == REPLACEMENT).count();
    let limit = (total / 10).max(1);
    if replaced > limit {
        return Cow::Borrowed(value);
    }

    Cow::Owned(decoded)
}

/// Owned convenience wrapper around [`repair`].
pub fn repair_owned(value: &str) -> String {
    repair(value).into_owned()
}
