//! JSON Pointer (RFC 6901) parsing for proxy paths.

use crate::error::{Error, Result};

/// Split a pointer such as `/user/tags/0` into unescaped reference tokens.
///
/// The empty pointer refers to the root and yields no tokens.
pub(crate) fn parse(pointer: &str) -> Result<Vec<String>> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let rest = pointer
        .strip_prefix('/')
        .ok_or_else(|| Error::InvalidPath(pointer.to_string()))?;

    rest.split('/').map(|token| unescape(token, pointer)).collect()
}

fn unescape(token: &str, pointer: &str) -> Result<String> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => return Err(Error::InvalidPath(pointer.to_string())),
        }
    }
    Ok(out)
}

/// Parse an array index token. Leading zeros are rejected.
pub(crate) fn index(token: &str) -> Option<usize> {
    if token.len() > 1 && token.starts_with('0') {
        return None;
    }
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}
