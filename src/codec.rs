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

//! Percent-encoding and decoding for the distinct parts of a URI.
//!
//! The encode tables follow RFC 3986: a character is emitted literally when
//! it is allowed in the requested [UriPart](enum.UriPart.html) and as an
//! uppercase `%XX` escape of its UTF-8 bytes otherwise. Decoding is strict:
//! a `%` not followed by two hexadecimal digits is an error, unlike the
//! lenient behavior of the `percent-encoding` crate.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::{Error, ErrorKind};

/// Escapes everything outside of RFC 3986 `unreserved`.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// `unreserved` / `sub-delims`.
const SUB_DELIMS: &AsciiSet = &UNRESERVED
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=');

/// `reg-name` plus the IP-literal brackets.
const HOST: &AsciiSet = &SUB_DELIMS.remove(b':').remove(b'[').remove(b']');

/// `pchar` without the segment separator.
const PATH_SEGMENT: &AsciiSet = &SUB_DELIMS.remove(b':').remove(b'@');

/// One or more `pchar` segments separated by `/`.
const PATH: &AsciiSet = &PATH_SEGMENT.remove(b'/');

/// `query` and `fragment` are `pchar` plus `/` and `?`.
const QUERY: &AsciiSet = &PATH.remove(b'?');

/// A query value additionally escapes `&` to keep parameter boundaries
/// unambiguous.
const QUERY_VALUE: &AsciiSet = &QUERY.add(b'&');

/// Anything meaningful in a URI, with the `!*'()` marks escaped.
const ANY: &AsciiSet = &QUERY
    .remove(b'#')
    .remove(b'[')
    .remove(b']')
    .add(b'!')
    .add(b'*')
    .add(b'\'')
    .add(b'(')
    .add(b')');

/// Same as [ANY](constant.ANY.html) but keeping `()!*` literal.
const ANY_URL: &AsciiSet = &ANY.remove(b'(').remove(b')').remove(b'!').remove(b'*');

/// RFC 6570 restricted variable names: letters, digits, `_` and `.`.
pub(crate) const VARIABLE_NAME: &AsciiSet = &NON_ALPHANUMERIC.remove(b'_').remove(b'.');

/// A part of a URI with its own set of allowed characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum UriPart {
    /// The host (registered name or IP literal).
    Host,
    /// The whole path, keeping `/` separators literal.
    Path,
    /// A single path segment; `/` is escaped.
    PathSegment,
    /// The whole query string.
    Query,
    /// The value of one query parameter; `&` is escaped.
    QueryValue,
    /// The fragment.
    Fragment,
    /// Any URI text with the `!*'()` marks escaped.
    Any,
    /// Any URI text with the `!*'()` marks kept literal.
    AnyUrl,
}

impl UriPart {
    #[inline]
    fn escape_set(&self) -> &'static AsciiSet {
        match self {
            UriPart::Host => HOST,
            UriPart::Path => PATH,
            UriPart::PathSegment => PATH_SEGMENT,
            UriPart::Query => QUERY,
            UriPart::QueryValue => QUERY_VALUE,
            UriPart::Fragment => QUERY,
            UriPart::Any => ANY,
            UriPart::AnyUrl => ANY_URL,
        }
    }
}

/// Percent-encode `text` for use in the given URI part.
///
/// Characters allowed in the part are emitted literally, everything else as
/// uppercase `%XX` escapes of the UTF-8 byte sequence.
pub fn encode(text: &str, part: UriPart) -> String {
    utf8_percent_encode(text, part.escape_set()).to_string()
}

#[inline]
fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Reverse percent-encoding, returning the raw byte sequence.
///
/// Fails with [InvalidUri](enum.ErrorKind.html#variant.InvalidUri) if a `%`
/// is not followed by two hexadecimal digits.
pub fn decode_bytes(text: &str) -> Result<Vec<u8>, Error> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().enumerate();
    while let Some((pos, &b)) = iter.next() {
        if b == b'%' {
            let high = iter.next().and_then(|(_, &c)| hex_value(c));
            let low = iter.next().and_then(|(_, &c)| hex_value(c));
            match (high, low) {
                (Some(high), Some(low)) => result.push((high << 4) | low),
                _ => {
                    return Err(Error::new(
                        ErrorKind::InvalidUri,
                        format!("Malformed percent escape at position {}", pos),
                    ))
                }
            }
        } else {
            result.push(b);
        }
    }
    Ok(result)
}

/// Reverse percent-encoding, re-interpreting the bytes as UTF-8.
pub fn decode(text: &str) -> Result<String, Error> {
    String::from_utf8(decode_bytes(text)?).map_err(|e| {
        Error::new(
            ErrorKind::InvalidUri,
            "Decoded bytes are not valid UTF-8".to_string(),
        )
        .with_source(e)
    })
}

#[cfg(test)]
mod test {
    use super::{decode, decode_bytes, encode, UriPart};
    use crate::ErrorKind;

    const PARTS: &[UriPart] = &[
        UriPart::Host,
        UriPart::Path,
        UriPart::PathSegment,
        UriPart::Query,
        UriPart::QueryValue,
        UriPart::Fragment,
        UriPart::Any,
        UriPart::AnyUrl,
    ];

    #[test]
    fn test_encode_unreserved_passthrough() {
        for part in PARTS {
            assert_eq!(encode("AZaz09-._~", *part), "AZaz09-._~");
        }
    }

    #[test]
    fn test_encode_space_and_percent() {
        for part in PARTS {
            assert_eq!(encode("a b", *part), "a%20b");
            assert_eq!(encode("50%", *part), "50%25");
        }
    }

    #[test]
    fn test_encode_path_keeps_slash() {
        assert_eq!(encode("a/b/c", UriPart::Path), "a/b/c");
        assert_eq!(encode("a/b/c", UriPart::PathSegment), "a%2Fb%2Fc");
    }

    #[test]
    fn test_encode_query_value_escapes_separator() {
        assert_eq!(encode("a&b=c", UriPart::Query), "a&b=c");
        assert_eq!(encode("a&b=c", UriPart::QueryValue), "a%26b=c");
    }

    #[test]
    fn test_encode_host_brackets() {
        assert_eq!(encode("[2001:db8::1]", UriPart::Host), "[2001:db8::1]");
        assert_eq!(encode("[x]", UriPart::Path), "%5Bx%5D");
    }

    #[test]
    fn test_encode_marks() {
        assert_eq!(encode("(!*)", UriPart::AnyUrl), "(!*)");
        assert_eq!(encode("(!*)", UriPart::Any), "%28%21%2A%29");
    }

    #[test]
    fn test_encode_utf8() {
        assert_eq!(encode("café", UriPart::Path), "caf%C3%A9");
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode("caf%C3%A9").unwrap(), "café");
        assert_eq!(decode("a%20b%26c").unwrap(), "a b&c");
        assert_eq!(decode("plain").unwrap(), "plain");
        // hex digit case does not matter
        assert_eq!(decode("%2f%2F").unwrap(), "//");
    }

    #[test]
    fn test_decode_malformed() {
        for s in &["%", "%2", "%2x", "%%20", "a%zz"] {
            let err = decode(s).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidUri);
        }
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let err = decode("%FF%FE").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUri);
        assert_eq!(decode_bytes("%FF%FE").unwrap(), vec![0xFF, 0xFE]);
    }

    #[test]
    fn test_round_trip() {
        let samples = &["hello world", "a/b?c=d&e#f", "café ño", "100% (!*) [ok]"];
        for sample in samples {
            for part in PARTS {
                assert_eq!(decode(&encode(sample, *part)).unwrap(), *sample);
            }
        }
    }
}
