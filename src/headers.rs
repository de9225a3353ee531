//! Header map with canonical display names.
//!
//! HTTP/2 carries field names lowercased on the wire; handlers see them in
//! canonical `Dashed-Capitalized` form, the familiar HTTP/1.x spelling. The
//! map stores keys canonically and keeps insertion-independent (sorted)
//! iteration order so response encoding is deterministic.

use std::collections::{BTreeMap, HashMap};

/// Multi-valued header map keyed by canonical header name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: BTreeMap<String, Vec<String>>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `name` (canonicalized).
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        self.entries
            .entry(canonicalize(name))
            .or_default()
            .push(value.into());
    }

    /// Replace all values of `name` with a single value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.entries.insert(canonicalize(name), vec![value.into()]);
    }

    /// First value of `name`, if present. Lookup is case-insensitive.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&canonicalize(name))
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// All values of `name`.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .get(&canonicalize(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&canonicalize(name))
    }

    /// Iterate `(canonical_name, values)` in sorted name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append under an already-canonical key, skipping re-canonicalization.
    pub(crate) fn add_canonical(&mut self, name: String, value: String) {
        self.entries.entry(name).or_default().push(value);
    }

    /// Mutable access to the sole value of `name`, when there is exactly one.
    pub(crate) fn single_mut(&mut self, name: &str) -> Option<&mut String> {
        match self.entries.get_mut(name) {
            Some(values) if values.len() == 1 => values.first_mut(),
            _ => None,
        }
    }
}

/// Canonical display form of a header name: first letter of each
/// dash-separated segment uppercased, the rest lowercased.
pub fn canonicalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if c == '-' {
            out.push('-');
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Canonicalize through the connection-local cache; wire names repeat
/// heavily across requests on one connection.
pub(crate) fn canonical_header_name(cache: &mut HashMap<String, String>, name: &str) -> String {
    if let Some(cached) = cache.get(name) {
        return cached.clone();
    }
    let canon = canonicalize(name);
    cache.insert(name.to_string(), canon.clone());
    canon
}

/// Whether `name` is a valid HTTP/2 wire field name: a non-empty token with
/// no uppercase letters, optionally after a leading `:` for pseudo-headers.
pub(crate) fn valid_wire_header_name(name: &str) -> bool {
    let name = name.strip_prefix(':').unwrap_or(name);
    !name.is_empty() && name.bytes().all(is_lower_token_byte)
}

fn is_lower_token_byte(b: u8) -> bool {
    matches!(b,
        b'a'..=b'z'
        | b'0'..=b'9'
        | b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*'
        | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~')
}
