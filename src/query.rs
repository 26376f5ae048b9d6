// Copyright 2023 Dmitry Tantsur <dtantsur@protonmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Editing query parameters of a URI.
//!
//! These functions work on URI text rather than on a parsed
//! [Url](https://docs.rs/url), so that query parameters which are not being
//! edited keep their exact encoded representation.

use log::trace;

use super::codec::{self, UriPart, VARIABLE_NAME};
use super::{Error, ErrorKind};

/// Normalize a parameter name to the restricted variable-name character set
/// from RFC 6570: letters, digits, `_` and interior `.`.
fn normalize_name(name: &str) -> Result<String, Error> {
    if name.is_empty() {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "Query parameter name cannot be empty",
        ));
    }

    let already_restricted = name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.')
        && !name.starts_with('.')
        && !name.ends_with('.');
    if already_restricted {
        return Ok(name.to_string());
    }

    // Re-encode from scratch so that an already escaped name is not escaped
    // twice.
    let decoded = codec::decode(name)?;
    let mut encoded = percent_encoding::utf8_percent_encode(&decoded, VARIABLE_NAME).to_string();
    // Dots are only valid in the interior of a name.
    if let Some(rest) = encoded.strip_prefix('.') {
        encoded = format!("%2E{}", rest);
    }
    if let Some(rest) = encoded.strip_suffix('.') {
        encoded = format!("{}%2E", rest);
    }
    Ok(encoded)
}

/// Split a URI into everything up to the fragment and the fragment itself
/// (with its `#`).
#[inline]
fn split_fragment(uri: &str) -> (&str, &str) {
    match uri.find('#') {
        Some(pos) => uri.split_at(pos),
        None => (uri, ""),
    }
}

/// Whether two parameter names are equal up to percent-encoding.
///
/// `%2e`, `%2E` and a literal `.` all match each other. Text that is not
/// validly encoded is compared literally.
fn names_match(left: &str, right: &str) -> bool {
    if left == right {
        return true;
    }
    let left = codec::decode_bytes(left).unwrap_or_else(|_| left.as_bytes().to_vec());
    let right = codec::decode_bytes(right).unwrap_or_else(|_| right.as_bytes().to_vec());
    left == right
}

/// Append a query parameter to a URI.
///
/// The name is normalized to the restricted variable-name character set, the
/// value is percent-encoded for the query-value context. A missing value
/// makes this a no-op.
///
/// ```rust
/// let uri = oscall::query::add("http://h/p", "type", Some("compute")).unwrap();
/// assert_eq!(uri, "http://h/p?type=compute");
/// let uri = oscall::query::add(&uri, "per_page", Some("10")).unwrap();
/// assert_eq!(uri, "http://h/p?type=compute&per_page=10");
/// ```
pub fn add(uri: &str, name: &str, value: Option<&str>) -> Result<String, Error> {
    if uri.is_empty() {
        return Err(Error::new(ErrorKind::InvalidInput, "URI cannot be empty"));
    }
    let name = normalize_name(name)?;
    let value = match value {
        Some(value) => codec::encode(value, UriPart::QueryValue),
        None => return Ok(uri.to_string()),
    };

    let (base, fragment) = split_fragment(uri);
    let separator = match base.find('?') {
        None => "?",
        Some(pos) if pos == base.len() - 1 => "",
        Some(..) => "&",
    };
    Ok(format!("{}{}{}={}{}", base, separator, name, value, fragment))
}

/// Remove every occurrence of a query parameter from a URI.
///
/// The name is matched byte-for-byte or in any equivalent percent-encoded
/// spelling. Remaining parameters keep their order and encoding.
pub fn remove(uri: &str, name: &str) -> Result<String, Error> {
    if uri.is_empty() {
        return Err(Error::new(ErrorKind::InvalidInput, "URI cannot be empty"));
    }
    if name.is_empty() {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "Query parameter name cannot be empty",
        ));
    }

    let (base, fragment) = split_fragment(uri);
    let (path, query) = match base.find('?') {
        Some(pos) => (&base[..pos], &base[pos + 1..]),
        None => return Ok(uri.to_string()),
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| match pair.split_once('=') {
            Some((key, _)) => !names_match(key, name),
            None => true,
        })
        .collect();
    if kept.len() == query.split('&').count() {
        return Ok(uri.to_string());
    }
    trace!("Removing query parameter {} from {}", name, uri);

    let joined = kept.join("&");
    if joined.is_empty() {
        Ok(format!("{}{}", path, fragment))
    } else {
        Ok(format!("{}?{}{}", path, joined, fragment))
    }
}

/// Set a query parameter on a URI, replacing any previous occurrences.
///
/// The resulting URI contains the parameter at most once, appended at the
/// end of the query. A missing value only removes the parameter.
pub fn set(uri: &str, name: &str, value: Option<&str>) -> Result<String, Error> {
    let removed = remove(uri, name)?;
    match value {
        Some(value) => add(&removed, name, Some(value)),
        None => Ok(removed),
    }
}
