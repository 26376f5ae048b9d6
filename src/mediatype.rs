// Copyright 2019 Dmitry Tantsur <divius.inside@gmail.com>
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

//! Media types and content-type negotiation.
//!
//! Servers extend the set of media types at runtime, so [MediaType] is an
//! open set of interned values rather than an enumeration: looking up the
//! same name twice yields the same shared instance, and unknown names
//! round-trip without loss.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use http::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use lazy_static::lazy_static;

use super::{Error, ErrorKind};

lazy_static! {
    static ref REGISTRY: RwLock<HashMap<String, Arc<MediaType>>> = RwLock::new(HashMap::new());

    /// The universal wildcard `*/*`.
    pub static ref ANY: Arc<MediaType> = MediaType::get("*/*").unwrap();

    /// `application/json`.
    pub static ref JSON: Arc<MediaType> = MediaType::get("application/json").unwrap();

    /// `application/octet-stream`.
    pub static ref OCTET_STREAM: Arc<MediaType> = MediaType::get("application/octet-stream").unwrap();
}

/// An interned media type or media type pattern.
///
/// The name is canonicalized to lower case. Patterns may use `*` as the
/// subtype (`text/*`) or be the universal wildcard `*/*`.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MediaType {
    name: String,
    slash: Option<usize>,
}

impl MediaType {
    /// Look up or create the shared instance for a media type name.
    ///
    /// Creation is idempotent under concurrent lookup: all callers observe
    /// the same instance for the same (case-insensitive) name.
    pub fn get(name: &str) -> Result<Arc<MediaType>, Error> {
        if name.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Media type name cannot be empty",
            ));
        }
        let canonical = name.trim().to_lowercase();

        if let Some(existing) = REGISTRY.read().expect("media type registry").get(&canonical) {
            return Ok(Arc::clone(existing));
        }

        let mut registry = REGISTRY.write().expect("media type registry");
        // somebody else may have inserted it between the two locks
        let entry = registry.entry(canonical.clone()).or_insert_with(|| {
            Arc::new(MediaType {
                slash: canonical.find('/'),
                name: canonical,
            })
        });
        Ok(Arc::clone(entry))
    }

    /// The canonical (lower-case) name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The part before the `/`, if any.
    #[inline]
    pub fn type_prefix(&self) -> Option<&str> {
        self.slash.map(|pos| &self.name[..pos])
    }

    /// Whether this is the universal wildcard `*/*`.
    #[inline]
    pub fn is_any(&self) -> bool {
        self.name == "*/*"
    }

    /// Whether this is a type wildcard such as `text/*`.
    #[inline]
    pub fn is_type_wildcard(&self) -> bool {
        !self.is_any() && self.slash.map(|pos| &self.name[pos + 1..]) == Some("*")
    }

    /// Whether a response content type matches this pattern.
    ///
    /// The comparison is case-insensitive; a type wildcard matches on the
    /// prefix before the `/`.
    pub fn accepts(&self, content_type: &str) -> bool {
        let content_type = content_type.trim().to_lowercase();
        if self.is_any() {
            true
        } else if self.is_type_wildcard() {
            match (self.type_prefix(), content_type.find('/')) {
                (Some(prefix), Some(pos)) => prefix == &content_type[..pos],
                _ => false,
            }
        } else {
            self.name == content_type
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Whether a response content type is acceptable for the given patterns.
///
/// A response is acceptable when the pattern list is empty, when it contains
/// the universal wildcard, a matching type wildcard, or an exact
/// case-insensitive match. A missing content type is never acceptable when
/// any pattern was declared.
pub fn is_acceptable(accept: &[Arc<MediaType>], content_type: Option<&str>) -> bool {
    if accept.is_empty() {
        return true;
    }
    match content_type {
        Some(content_type) => accept.iter().any(|pattern| pattern.accepts(content_type)),
        None => false,
    }
}

/// Extract the accept patterns declared in request headers.
///
/// Each `Accept` header may carry several comma-separated patterns; quality
/// and other `;` parameters are dropped. Values that are not valid header
/// text are skipped.
pub fn accept_patterns(headers: &HeaderMap) -> Vec<Arc<MediaType>> {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|pattern| {
            let pattern = pattern.split(';').next().unwrap_or("").trim();
            if pattern.is_empty() {
                None
            } else {
                MediaType::get(pattern).ok()
            }
        })
        .collect()
}

/// Extract the bare content type from response headers, dropping parameters
/// such as `; charset=utf-8`.
pub fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or("")
                .trim()
                .to_lowercase()
        })
        .filter(|value| !value.is_empty())
}
