//! Per-slot metadata and its line codec.
//!
//! Metadata is a flat string-to-string map. On disk each slot's metadata is
//! one line of `key=value;key2=value2` with `\`, `;`, and `=` escaped by a
//! backslash. Keys are sorted on encode so line content is stable; empty
//! maps round-trip to empty strings.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Arbitrary key-value metadata attached to a stored vector.
pub type Metadata = HashMap<String, String>;

fn escape_token(s: &str, out: &mut String) {
    for c in s.chars() {
        if c == '\\' || c == ';' || c == '=' {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Encode a metadata map into a single line. Empty maps encode to `""`.
pub fn encode(meta: &Metadata) -> String {
    if meta.is_empty() {
        return String::new();
    }

    let mut items: Vec<(&String, &String)> = meta.iter().collect();
    items.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::new();
    for (i, (key, value)) in items.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        escape_token(key, &mut out);
        out.push('=');
        escape_token(value, &mut out);
    }
    out
}

/// Decode a metadata line. The empty string decodes to an empty map.
///
/// A trailing backslash is rejected as [`Error::Corrupted`]. Pairs with an
/// empty key are dropped.
pub fn decode(line: &str) -> Result<Metadata> {
    let mut out = Metadata::new();
    if line.is_empty() {
        return Ok(out);
    }

    let mut key = String::new();
    let mut value = String::new();
    let mut in_key = true;
    let mut esc = false;

    let mut flush = |key: &mut String, value: &mut String| {
        if !key.is_empty() {
            out.insert(std::mem::take(key), std::mem::take(value));
        } else {
            key.clear();
            value.clear();
        }
    };

    for c in line.chars() {
        if esc {
            let target = if in_key { &mut key } else { &mut value };
            target.push(c);
            esc = false;
            continue;
        }
        match c {
            '\\' => esc = true,
            '=' if in_key => in_key = false,
            ';' if !in_key => {
                flush(&mut key, &mut value);
                in_key = true;
            }
            _ => {
                let target = if in_key { &mut key } else { &mut value };
                target.push(c);
            }
        }
    }

    if esc {
        return Err(Error::Corrupted("metadata: trailing escape".to_string()));
    }
    if !key.is_empty() || !value.is_empty() {
        flush(&mut key, &mut value);
    }
    Ok(out)
}
