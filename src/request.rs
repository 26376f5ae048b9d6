// Copyright 2019 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Requests prepared for sending through a transport.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use url::Url;

use super::mediatype::{self, MediaType};
use super::{Error, ErrorKind};

/// How much of the response to wait for before `send` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompletionOption {
    /// Return as soon as the headers have arrived, leaving the body
    /// unread for streaming.
    ResponseRead,
    /// Read and buffer the whole body before returning.
    #[default]
    ContentRead,
}

/// An HTTP request prepared for sending.
///
/// A `PreparedRequest` is owned by exactly one API call until it is sent.
/// The mutators consume and return the request in the builder style:
///
/// ```rust
/// # fn example() -> Result<(), oscall::Error> {
/// use reqwest::{Method, Url};
///
/// let request = oscall::PreparedRequest::new(
///     Method::GET,
///     Url::parse("https://cloud.local/servers").expect("hard-coded URL"),
/// )
/// .header("accept", "application/json")?;
/// # Ok(()) }
/// # example().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl PreparedRequest {
    /// Create a new request with no headers and no body.
    pub fn new(method: Method, url: Url) -> PreparedRequest {
        PreparedRequest {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Add a header to the request.
    pub fn header<K, V>(mut self, key: K, value: V) -> Result<PreparedRequest, Error>
    where
        HeaderName: TryFrom<K>,
        HeaderValue: TryFrom<V>,
    {
        let key = HeaderName::try_from(key)
            .map_err(|_| Error::new(ErrorKind::InvalidInput, "Invalid header name"))?;
        let value = HeaderValue::try_from(value)
            .map_err(|_| Error::new(ErrorKind::InvalidInput, "Invalid header value"))?;
        let _ = self.headers.append(key, value);
        Ok(self)
    }

    /// Add an accept pattern to the request.
    pub fn accept(self, pattern: &MediaType) -> Result<PreparedRequest, Error> {
        self.header(ACCEPT, pattern.name())
    }

    /// Set a raw body.
    pub fn body<B: Into<Bytes>>(mut self, body: B) -> PreparedRequest {
        self.body = Some(body.into());
        self
    }

    /// Set a JSON body, declaring the content type.
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Result<PreparedRequest, Error> {
        let body = serde_json::to_vec(body).map_err(|e| {
            Error::new(ErrorKind::InvalidInput, "Cannot serialize the request body")
                .with_source(e)
        })?;
        self.header(CONTENT_TYPE, mediatype::JSON.name())
            .map(|result| result.body(body))
    }

    /// HTTP method.
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Change the HTTP method.
    #[inline]
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Target URL.
    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Change the target URL.
    #[inline]
    pub fn set_url(&mut self, url: Url) {
        self.url = url;
    }

    /// Request headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable request headers.
    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The body, if one was set.
    #[inline]
    pub fn body_bytes(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// The accept patterns declared in the headers, in order.
    pub fn accept_patterns(&self) -> Vec<Arc<MediaType>> {
        mediatype::accept_patterns(&self.headers)
    }

    /// Build the wire-level request. The prepared request stays usable, so
    /// a call can be sent more than once.
    pub(crate) fn to_wire(&self) -> reqwest::Request {
        let mut request = reqwest::Request::new(self.method.clone(), self.url.clone());
        *request.headers_mut() = self.headers.clone();
        if let Some(body) = &self.body {
            *request.body_mut() = Some(reqwest::Body::from(body.clone()));
        }
        request
    }
}

#[cfg(test)]
pub mod test {
    use http::header::{ACCEPT, CONTENT_TYPE};
    use reqwest::Method;
    use serde::Serialize;
    use url::Url;

    use super::{CompletionOption, PreparedRequest};
    use crate::ErrorKind;

    fn target() -> Url {
        Url::parse("http://127.0.0.1/v2/servers").unwrap()
    }

    #[test]
    fn test_default_completion_reads_content() {
        assert_eq!(CompletionOption::default(), CompletionOption::ContentRead);
    }

    #[test]
    fn test_headers_and_accept() {
        let request = PreparedRequest::new(Method::GET, target())
            .accept(&crate::mediatype::JSON)
            .unwrap()
            .header(ACCEPT, "text/*")
            .unwrap();
        let patterns = request.accept_patterns();
        let names: Vec<&str> = patterns.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["application/json", "text/*"]);
    }

    #[test]
    fn test_invalid_header() {
        let err = PreparedRequest::new(Method::GET, target())
            .header("bad header", "x")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[derive(Serialize)]
    struct Payload {
        name: &'static str,
    }

    #[test]
    fn test_json_body() {
        let request = PreparedRequest::new(Method::POST, target())
            .json(&Payload { name: "test" })
            .unwrap();
        assert_eq!(
            request.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(
            request.body_bytes().unwrap().as_ref(),
            br#"{"name":"test"}"#
        );
    }

    #[test]
    fn test_to_wire_keeps_request_usable() {
        let request = PreparedRequest::new(Method::PUT, target()).body("payload");
        let wire = request.to_wire();
        assert_eq!(wire.method(), &Method::PUT);
        assert_eq!(wire.url().as_str(), "http://127.0.0.1/v2/servers");
        // still usable afterwards
        let again = request.to_wire();
        assert_eq!(again.method(), &Method::PUT);
        assert_eq!(request.body_bytes().unwrap().as_ref(), b"payload");
    }
}
