// Copyright 2021 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Convenience constructors for the common call variants.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "stream")]
use super::call::StreamBody;
use super::call::{check_validator, BoxedDeserialize, CustomBody, HttpApiCall, JsonBody, StringBody};
use super::mediatype;
use super::request::PreparedRequest;
use super::response::ApiResponse;
use super::transport::{HttpTransport, Transport};
use super::Error;

/// Builds API calls around a shared transport.
///
/// Every call built here carries the default [check](fn.check.html)
/// validation, so client and server errors become `Protocol` faults.
/// Cheap to clone; clones share the transport.
#[derive(Debug, Clone)]
pub struct ApiCallFactory {
    transport: Arc<dyn Transport>,
}

impl Default for ApiCallFactory {
    fn default() -> ApiCallFactory {
        ApiCallFactory {
            transport: Arc::new(HttpTransport::new()),
        }
    }
}

impl ApiCallFactory {
    /// Create a factory around the given transport.
    pub fn new<T: Transport + 'static>(transport: T) -> ApiCallFactory {
        ApiCallFactory {
            transport: Arc::new(transport),
        }
    }

    /// A call returning the response body as a string.
    pub fn string(&self, request: PreparedRequest) -> HttpApiCall<StringBody> {
        HttpApiCall::new(Arc::clone(&self.transport), request, StringBody)
            .with_validator(check_validator)
    }

    /// A call returning the response body as the JSON representation of `T`.
    ///
    /// Declares `application/json` as acceptable unless the request already
    /// carries accept patterns.
    pub fn json<T>(&self, request: PreparedRequest) -> Result<HttpApiCall<JsonBody<T>>, Error>
    where
        T: DeserializeOwned + Default + Send,
    {
        let request = if request.accept_patterns().is_empty() {
            request.accept(&mediatype::JSON)?
        } else {
            request
        };
        Ok(
            HttpApiCall::new(Arc::clone(&self.transport), request, JsonBody::default())
                .with_validator(check_validator),
        )
    }

    /// A call handing the response body out as a byte stream.
    #[cfg(feature = "stream")]
    pub fn stream(&self, request: PreparedRequest) -> HttpApiCall<StreamBody> {
        HttpApiCall::new(Arc::clone(&self.transport), request, StreamBody)
            .with_validator(check_validator)
    }

    /// A call with a caller-supplied deserialization function.
    pub fn custom<F, T>(&self, request: PreparedRequest, read: F) -> HttpApiCall<CustomBody<F, T>>
    where
        F: for<'a> Fn(&'a mut ApiResponse, &'a CancellationToken) -> BoxedDeserialize<'a, T>
            + Send
            + Sync,
        T: Send,
    {
        HttpApiCall::new(Arc::clone(&self.transport), request, CustomBody::new(read))
            .with_validator(check_validator)
    }
}

#[cfg(test)]
pub mod test {
    use http::StatusCode;
    use serde::Deserialize;
    use tokio_util::sync::CancellationToken;

    use super::ApiCallFactory;
    use crate::call::{test::request, ApiCall};
    use crate::request::CompletionOption;
    use crate::transport::test::StubTransport;
    use crate::ErrorKind;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Flavor {
        name: String,
    }

    #[tokio::test]
    async fn test_string_call() {
        let factory = ApiCallFactory::new(StubTransport::returning(
            StatusCode::OK,
            Some("text/plain"),
            "hello",
        ));
        let mut call = factory.string(request());
        assert_eq!(
            call.completion_option().unwrap(),
            CompletionOption::ContentRead
        );
        let (_, value) = call.send(&CancellationToken::new()).await.unwrap();
        assert_eq!(value, "hello");
    }

    #[tokio::test]
    async fn test_json_call_declares_accept() {
        let factory = ApiCallFactory::new(StubTransport::returning(
            StatusCode::OK,
            Some("application/json"),
            r#"{"name": "m1.small"}"#,
        ));
        let mut call = factory.json::<Flavor>(request()).unwrap();
        let patterns = call.request().unwrap().accept_patterns();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].name(), "application/json");
        let (_, value) = call.send(&CancellationToken::new()).await.unwrap();
        assert_eq!(
            value,
            Flavor {
                name: "m1.small".into()
            }
        );
    }

    #[tokio::test]
    async fn test_json_call_keeps_existing_accept() {
        let factory = ApiCallFactory::new(StubTransport::returning(
            StatusCode::OK,
            Some("text/plain"),
            "{}",
        ));
        let call = factory
            .json::<Flavor>(request().header("accept", "text/*").unwrap())
            .unwrap();
        let patterns = call.request().unwrap().accept_patterns();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].name(), "text/*");
    }

    #[tokio::test]
    async fn test_factory_installs_check() {
        let factory = ApiCallFactory::new(StubTransport::returning(
            StatusCode::NOT_FOUND,
            Some("application/json"),
            r#"{"itemNotFound": {"message": "No server found"}}"#,
        ));
        let mut call = factory.string(request());
        let err = call.send(&CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("No server found"));
        assert_eq!(
            err.response().unwrap().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[cfg(feature = "stream")]
    #[tokio::test]
    async fn test_stream_call_forces_headers_only() {
        let factory = ApiCallFactory::new(StubTransport::returning(StatusCode::OK, None, "data"));
        let call = factory.stream(request());
        assert_eq!(
            call.completion_option().unwrap(),
            CompletionOption::ResponseRead
        );
    }
}
