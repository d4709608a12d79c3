//! Value hashing for index keys.
//!
//! Index files are laid out by these hashes, so both the text rendering and
//! the fold below are part of the on-disk format. Changing either one makes
//! existing index files unreadable in practice.

use serde_json::{Number, Value};
use std::borrow::Cow;

/// Text that `null` renders to before hashing.
pub const NULL_SENTINEL: &str = "<nil>";

/// Renders a leaf value to the text that gets hashed.
///
/// - strings verbatim
/// - `true` / `false`
/// - `null` as [`NULL_SENTINEL`]
/// - integers in plain decimal
/// - floats as the shortest round-trip decimal, never with an exponent and
///   without a trailing `.0` (so `1.0` and `1` render alike)
/// - arrays and objects as compact JSON with keys in sorted order
#[must_use]
pub fn canonical_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        Value::Bool(true) => Cow::Borrowed("true"),
        Value::Bool(false) => Cow::Borrowed("false"),
        Value::Null => Cow::Borrowed(NULL_SENTINEL),
        Value::Number(n) => Cow::Owned(render_number(n)),
        Value::Array(_) | Value::Object(_) => Cow::Owned(value.to_string()),
    }
}

fn render_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        // -0 and 0 are the same key
        Some(f) if f == 0.0 => "0".to_string(),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Folds text into a 64-bit hash.
///
/// `hash = c + (hash << 6) + (hash << 16) - hash` over every code point,
/// with signed 64-bit wraparound, reinterpreted as unsigned.
#[must_use]
pub fn str_hash(text: &str) -> u64 {
    let mut hash: i64 = 0;
    for c in text.chars() {
        hash = i64::from(u32::from(c))
            .wrapping_add(hash << 6)
            .wrapping_add(hash << 16)
            .wrapping_sub(hash);
    }
    hash as u64
}

/// Hashes a leaf value as an index key.
#[must_use]
pub fn hash_value(value: &Value) -> u64 {
    str_hash(&canonical_text(value))
}
