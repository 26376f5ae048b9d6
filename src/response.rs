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

//! Responses received from a transport.

use bytes::Bytes;
#[cfg(feature = "stream")]
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use http::{HeaderMap, StatusCode};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::mediatype;
use super::{Error, ErrorKind};

#[derive(Debug)]
enum Body {
    /// The whole body, already read. An empty buffer stands for an absent
    /// body.
    Buffered(Bytes),
    /// The body has not been read yet and can still be streamed.
    Pending(Box<reqwest::Response>),
    /// The body was handed out as a stream.
    Taken,
}

/// A response with its metadata detached from the body.
///
/// The status, headers and final URL are always available. The body is
/// either buffered (after a `ContentRead` send) or still pending inside the
/// wire-level response (after a `ResponseRead` send), in which case it can
/// be read exactly once.
#[derive(Debug)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    url: Url,
    body: Body,
}

impl ApiResponse {
    /// Capture the metadata of a wire-level response, leaving the body
    /// pending.
    pub fn from_wire(response: reqwest::Response) -> ApiResponse {
        ApiResponse {
            status: response.status(),
            headers: response.headers().clone(),
            url: response.url().clone(),
            body: Body::Pending(Box::new(response)),
        }
    }

    /// Assemble a response from parts with a buffered body.
    ///
    /// Mostly useful for testing calls without a real transport.
    pub fn from_parts(status: StatusCode, headers: HeaderMap, url: Url, body: Bytes) -> ApiResponse {
        ApiResponse {
            status,
            headers,
            url,
            body: Body::Buffered(body),
        }
    }

    /// Response status.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The URL the response was received from.
    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The declared content type without its parameters, if any.
    #[inline]
    pub fn content_type(&self) -> Option<String> {
        mediatype::content_type(&self.headers)
    }

    /// Whether the body has been buffered.
    #[inline]
    pub fn is_buffered(&self) -> bool {
        matches!(self.body, Body::Buffered(..))
    }

    /// Read the whole body into memory, honoring cancellation.
    ///
    /// Does nothing if the body is already buffered.
    pub async fn buffer(&mut self, cancel: &CancellationToken) -> Result<(), Error> {
        let pending = match std::mem::replace(&mut self.body, Body::Taken) {
            Body::Buffered(bytes) => {
                self.body = Body::Buffered(bytes);
                return Ok(());
            }
            Body::Pending(response) => response,
            Body::Taken => {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "The response body has already been taken",
                ))
            }
        };

        let bytes = tokio::select! {
            // cancellation wins when both are ready
            biased;
            _ = cancel.cancelled() => {
                return Err(Error::new_default(ErrorKind::Cancelled));
            }
            bytes = pending.bytes() => bytes?,
        };
        self.body = Body::Buffered(bytes);
        Ok(())
    }

    /// Read the whole body, buffering it first if necessary.
    pub async fn bytes(&mut self, cancel: &CancellationToken) -> Result<Bytes, Error> {
        self.buffer(cancel).await?;
        match &self.body {
            Body::Buffered(bytes) => Ok(bytes.clone()),
            _ => unreachable!("the body was just buffered"),
        }
    }

    /// Read the whole body as UTF-8 text. An absent body yields an empty
    /// string.
    pub async fn text(&mut self, cancel: &CancellationToken) -> Result<String, Error> {
        let bytes = self.bytes(cancel).await?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            Error::new(
                ErrorKind::Deserialization,
                "The response body is not valid UTF-8",
            )
            .with_status(self.status)
            .with_source(e)
        })
    }

    /// Take the body as a stream of chunks.
    ///
    /// The body can only be taken once; a buffered body is returned as a
    /// single chunk.
    #[cfg(feature = "stream")]
    pub fn take_stream(&mut self) -> Result<BoxStream<'static, Result<Bytes, Error>>, Error> {
        match std::mem::replace(&mut self.body, Body::Taken) {
            Body::Buffered(bytes) => Ok(futures::stream::once(async move { Ok(bytes) }).boxed()),
            Body::Pending(response) => Ok(response.bytes_stream().map_err(Error::from).boxed()),
            Body::Taken => Err(Error::new(
                ErrorKind::InvalidInput,
                "The response body has already been taken",
            )),
        }
    }
}

#[cfg(test)]
pub mod test {
    use bytes::Bytes;
    use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
    use http::StatusCode;
    use tokio_util::sync::CancellationToken;
    use url::Url;

    use super::ApiResponse;
    use crate::ErrorKind;

    pub fn canned(status: StatusCode, content_type: Option<&'static str>, body: &str) -> ApiResponse {
        let mut headers = HeaderMap::new();
        if let Some(value) = content_type {
            let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static(value));
        }
        ApiResponse::from_parts(
            status,
            headers,
            Url::parse("http://127.0.0.1/").unwrap(),
            Bytes::copy_from_slice(body.as_bytes()),
        )
    }

    #[tokio::test]
    async fn test_buffered_accessors() {
        let mut response = canned(StatusCode::OK, Some("application/json; charset=utf-8"), "{}");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.content_type().unwrap(), "application/json");
        assert!(response.is_buffered());
        let cancel = CancellationToken::new();
        assert_eq!(response.text(&cancel).await.unwrap(), "{}");
        // reading twice is fine for a buffered body
        assert_eq!(response.bytes(&cancel).await.unwrap().as_ref(), b"{}");
    }

    #[tokio::test]
    async fn test_absent_body_is_empty_text() {
        let mut response = canned(StatusCode::NO_CONTENT, None, "");
        let cancel = CancellationToken::new();
        assert_eq!(response.text(&cancel).await.unwrap(), "");
        assert!(response.content_type().is_none());
    }

    fn pending(body: &'static str) -> ApiResponse {
        let wire = http::Response::builder()
            .status(200)
            .body(body)
            .expect("hard-coded response");
        ApiResponse::from_wire(reqwest::Response::from(wire))
    }

    #[tokio::test]
    async fn test_buffer_pending_body() {
        let mut response = pending("payload");
        assert!(!response.is_buffered());
        let cancel = CancellationToken::new();
        response.buffer(&cancel).await.unwrap();
        assert!(response.is_buffered());
        assert_eq!(response.text(&cancel).await.unwrap(), "payload");
    }

    #[tokio::test]
    async fn test_buffer_cancelled() {
        let mut response = pending("payload");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = response.buffer(&cancel).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[cfg(feature = "stream")]
    #[tokio::test]
    async fn test_take_stream_once() {
        use futures::stream::TryStreamExt;

        let mut response = canned(StatusCode::OK, None, "chunk");
        let stream = response.take_stream().unwrap();
        let chunks: Vec<_> = stream.try_collect().await.unwrap();
        assert_eq!(chunks, vec![Bytes::from_static(b"chunk")]);
        assert!(response.take_stream().is_err());
    }
}
