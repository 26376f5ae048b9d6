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

//! The API call pipeline: send, validate, deserialize.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use log::trace;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::mediatype;
use super::notify::Channel;
use super::request::{CompletionOption, PreparedRequest};
use super::response::ApiResponse;
use super::transport::Transport;
use super::{Error, ErrorKind};

/// The contract shared by all API call variants and decorators.
///
/// A call owns its [PreparedRequest](struct.PreparedRequest.html) until it
/// is disposed; afterwards the request and completion accessors and `send`
/// fail with [Disposed](enum.ErrorKind.html#variant.Disposed). The
/// notification channels outlive disposal: they belong to the call itself,
/// not to the request it released, and stay subscribable. The `before-send`
/// channel fires before the transport is invoked, the `after-response`
/// channel fires exactly once per send with the outcome, before that
/// outcome reaches the caller.
#[async_trait]
pub trait ApiCall: Send {
    /// The deserialized result type.
    type Output: Send;

    /// The request this call will send.
    fn request(&self) -> Result<&PreparedRequest, Error>;

    /// Mutable access to the request, for changing it before sending.
    fn request_mut(&mut self) -> Result<&mut PreparedRequest, Error>;

    /// How much of the response `send` waits for.
    fn completion_option(&self) -> Result<CompletionOption, Error>;

    /// Change how much of the response `send` waits for.
    fn set_completion_option(&mut self, option: CompletionOption) -> Result<(), Error>;

    /// The channel notified right before the transport is invoked.
    ///
    /// Remains accessible after disposal.
    fn before_send(&self) -> &Channel<PreparedRequest>;

    /// The channel notified with the outcome of every send.
    ///
    /// Remains accessible after disposal.
    fn after_response(&self) -> &Channel<Result<ApiResponse, Error>>;

    /// Send the request and deserialize the response.
    async fn send(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<(ApiResponse, Self::Output), Error>;

    /// Release the request resources. Disposing twice is harmless.
    fn dispose(&mut self);
}

/// A strategy for turning a validated response into a typed value.
#[async_trait]
pub trait DeserializeBody: Send + Sync {
    /// The deserialized result type.
    type Output: Send;

    /// The completion option this strategy needs.
    fn completion_option(&self) -> CompletionOption {
        CompletionOption::ContentRead
    }

    /// Whether the strategy only works with its declared completion option.
    fn requires_completion_option(&self) -> bool {
        false
    }

    /// Deserialize the response body.
    async fn deserialize(
        &self,
        request: &PreparedRequest,
        response: &mut ApiResponse,
        cancel: &CancellationToken,
    ) -> Result<Self::Output, Error>;
}

#[derive(Debug, Deserialize)]
struct Message {
    message: Option<String>,
    faultstring: Option<String>,
    title: Option<String>,
    // Ironic legacy format: JSON inside JSON (sigh)
    error_message: Option<String>,
}

impl Message {
    fn convert(self, recursive: bool) -> Option<String> {
        if let Some(value) = self.message.or(self.faultstring).or(self.title) {
            Some(value)
        } else if recursive {
            self.error_message.and_then(|json| {
                serde_json::from_str::<Message>(&json)
                    .ok()
                    .and_then(|msg| msg.convert(false))
            })
        } else {
            None
        }
    }
}

impl From<Message> for Option<String> {
    fn from(value: Message) -> Option<String> {
        value.convert(true)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorResponse {
    Map(HashMap<String, Message>),
    Message(Message),
}

fn extract_message(text: String) -> String {
    serde_json::from_str::<ErrorResponse>(&text)
        .ok()
        .and_then(|body| match body {
            ErrorResponse::Map(map) => map.into_iter().next().and_then(|(_k, v)| v.into()),
            ErrorResponse::Message(msg) => msg.into(),
        })
        .unwrap_or(text)
}

/// Check for error responses the way OpenStack services report them.
///
/// Client and server error statuses become
/// [Protocol](enum.ErrorKind.html#variant.Protocol) faults with the message
/// mined from the error body (when it has been buffered). The factory
/// installs this on every call it builds; calls constructed directly carry
/// no validation until one is installed.
pub async fn check(response: &mut ApiResponse, cancel: &CancellationToken) -> Result<(), Error> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        let message = if response.is_buffered() {
            extract_message(response.text(cancel).await?)
        } else {
            status
                .canonical_reason()
                .unwrap_or("HTTP request failed")
                .to_string()
        };
        trace!("HTTP request returned {}; error: {}", status, message);
        Err(Error::new(ErrorKind::Protocol, message).with_status(status))
    } else {
        Ok(())
    }
}

/// The future returned by a validation step.
pub type BoxedValidate<'a> = Pin<Box<dyn Future<Output = Result<(), Error>> + Send + 'a>>;

/// A replaceable validation step.
pub type Validator = Box<
    dyn for<'a> Fn(&'a mut ApiResponse, &'a CancellationToken) -> BoxedValidate<'a> + Send + Sync,
>;

/// [check](fn.check.html) in the boxed form accepted by
/// [with_validator](struct.HttpApiCall.html#method.with_validator).
pub fn check_validator<'a>(
    response: &'a mut ApiResponse,
    cancel: &'a CancellationToken,
) -> BoxedValidate<'a> {
    Box::pin(check(response, cancel))
}

/// An API call around a transport, a prepared request and a deserialization
/// strategy.
///
/// `send` runs the pipeline: notify `before-send`, invoke the transport
/// honoring the completion option and cancellation, notify `after-response`
/// with the outcome (exactly once, also on failure), validate when a
/// validator is installed, deserialize, and return the pair of the response
/// and the typed value. Validation and deserialization faults carry the
/// response, reachable through [Error::response](struct.Error.html#method.response).
pub struct HttpApiCall<D: DeserializeBody> {
    transport: Arc<dyn Transport>,
    request: Option<PreparedRequest>,
    completion: CompletionOption,
    validator: Option<Validator>,
    deserializer: D,
    before_send: Channel<PreparedRequest>,
    after_response: Channel<Result<ApiResponse, Error>>,
}

impl<D: DeserializeBody> std::fmt::Debug for HttpApiCall<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("HttpApiCall")
            .field("transport", &self.transport)
            .field("request", &self.request)
            .field("completion", &self.completion)
            .finish()
    }
}

impl<D: DeserializeBody> HttpApiCall<D> {
    /// Create a call with the strategy's default completion option and no
    /// validation step: the raw response passes through unchanged.
    pub fn new(
        transport: Arc<dyn Transport>,
        request: PreparedRequest,
        deserializer: D,
    ) -> HttpApiCall<D> {
        let completion = deserializer.completion_option();
        HttpApiCall {
            transport,
            request: Some(request),
            completion,
            validator: None,
            deserializer,
            before_send: Channel::default(),
            after_response: Channel::default(),
        }
    }

    /// Install a validation step.
    ///
    /// Calls start without one, passing every response through.
    /// [ApiCallFactory](struct.ApiCallFactory.html) installs
    /// [check_validator](fn.check_validator.html) on the calls it builds.
    pub fn with_validator<F>(mut self, validator: F) -> HttpApiCall<D>
    where
        F: for<'a> Fn(&'a mut ApiResponse, &'a CancellationToken) -> BoxedValidate<'a>
            + Send
            + Sync
            + 'static,
    {
        self.validator = Some(Box::new(validator));
        self
    }

    #[inline]
    fn request_ref(&self) -> Result<&PreparedRequest, Error> {
        self.request
            .as_ref()
            .ok_or_else(|| Error::new_default(ErrorKind::Disposed))
    }
}

#[async_trait]
impl<D: DeserializeBody> ApiCall for HttpApiCall<D> {
    type Output = D::Output;

    fn request(&self) -> Result<&PreparedRequest, Error> {
        self.request_ref()
    }

    fn request_mut(&mut self) -> Result<&mut PreparedRequest, Error> {
        self.request
            .as_mut()
            .ok_or_else(|| Error::new_default(ErrorKind::Disposed))
    }

    fn completion_option(&self) -> Result<CompletionOption, Error> {
        let _ = self.request_ref()?;
        Ok(self.completion)
    }

    fn set_completion_option(&mut self, option: CompletionOption) -> Result<(), Error> {
        let _ = self.request_ref()?;
        if option != self.deserializer.completion_option()
            && self.deserializer.requires_completion_option()
        {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "The deserialization strategy does not allow this completion option",
            ));
        }
        self.completion = option;
        Ok(())
    }

    fn before_send(&self) -> &Channel<PreparedRequest> {
        &self.before_send
    }

    fn after_response(&self) -> &Channel<Result<ApiResponse, Error>> {
        &self.after_response
    }

    async fn send(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<(ApiResponse, Self::Output), Error> {
        let request = self
            .request
            .as_ref()
            .ok_or_else(|| Error::new_default(ErrorKind::Disposed))?;

        self.before_send.emit(request);
        let result = self.transport.send(request, self.completion, cancel).await;
        // the outcome is observable exactly once per send, also on failure
        self.after_response.emit(&result);
        let mut response = result?;

        if let Some(validator) = &self.validator {
            if let Err(err) = validator(&mut response, cancel).await {
                return Err(err.with_response(response));
            }
        }

        match self
            .deserializer
            .deserialize(request, &mut response, cancel)
            .await
        {
            Ok(value) => Ok((response, value)),
            Err(err) => Err(err.with_response(response)),
        }
    }

    fn dispose(&mut self) {
        self.request = None;
    }
}

/// Deserializes the body as UTF-8 text. An absent body yields an empty
/// string; the content type is not checked.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringBody;

#[async_trait]
impl DeserializeBody for StringBody {
    type Output = String;

    async fn deserialize(
        &self,
        _request: &PreparedRequest,
        response: &mut ApiResponse,
        cancel: &CancellationToken,
    ) -> Result<String, Error> {
        response.text(cancel).await
    }
}

/// Deserializes the body as the JSON representation of `T`.
///
/// The response content type is first checked against the request's accept
/// patterns. When it is not acceptable - including when the response does
/// not declare a content type at all - the default value of `T` is returned
/// without parsing. This is a best-effort policy: callers that need
/// certainty should re-check
/// [is_acceptable](../mediatype/fn.is_acceptable.html) themselves.
#[derive(Debug)]
pub struct JsonBody<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for JsonBody<T> {
    fn default() -> JsonBody<T> {
        JsonBody {
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T> DeserializeBody for JsonBody<T>
where
    T: DeserializeOwned + Default + Send,
{
    type Output = T;

    async fn deserialize(
        &self,
        request: &PreparedRequest,
        response: &mut ApiResponse,
        cancel: &CancellationToken,
    ) -> Result<T, Error> {
        let accept = request.accept_patterns();
        let content_type = response.content_type();
        if !mediatype::is_acceptable(&accept, content_type.as_deref()) {
            trace!(
                "Response content type {:?} is not acceptable, returning the default value",
                content_type
            );
            return Ok(T::default());
        }

        let status = response.status();
        let text = response.text(cancel).await?;
        serde_json::from_str(&text).map_err(|e| {
            Error::new(ErrorKind::Deserialization, "Cannot parse the JSON body")
                .with_status(status)
                .with_source(e)
        })
    }
}

/// A stream of body chunks.
#[cfg(feature = "stream")]
pub type BodyStream = futures::stream::BoxStream<'static, Result<bytes::Bytes, Error>>;

/// Hands the body out as a byte stream without buffering it.
///
/// Needs the `ResponseRead` completion option so that the body is not read
/// before the caller starts consuming it.
#[cfg(feature = "stream")]
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamBody;

#[cfg(feature = "stream")]
#[async_trait]
impl DeserializeBody for StreamBody {
    type Output = BodyStream;

    fn completion_option(&self) -> CompletionOption {
        CompletionOption::ResponseRead
    }

    // switching a streaming call to ContentRead would buffer the body away
    fn requires_completion_option(&self) -> bool {
        true
    }

    async fn deserialize(
        &self,
        _request: &PreparedRequest,
        response: &mut ApiResponse,
        _cancel: &CancellationToken,
    ) -> Result<BodyStream, Error> {
        response.take_stream()
    }
}

/// The future returned by a custom deserialization function.
pub type BoxedDeserialize<'a, T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send + 'a>>;

/// Delegates deserialization to a caller-supplied function.
pub struct CustomBody<F, T> {
    read: F,
    _marker: PhantomData<fn() -> T>,
}

impl<F, T> std::fmt::Debug for CustomBody<F, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("CustomBody").finish()
    }
}

impl<F, T> CustomBody<F, T>
where
    F: for<'a> Fn(&'a mut ApiResponse, &'a CancellationToken) -> BoxedDeserialize<'a, T>,
{
    /// Create a strategy around a deserialization function.
    pub fn new(read: F) -> CustomBody<F, T> {
        CustomBody {
            read,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, T> DeserializeBody for CustomBody<F, T>
where
    F: for<'a> Fn(&'a mut ApiResponse, &'a CancellationToken) -> BoxedDeserialize<'a, T>
        + Send
        + Sync,
    T: Send,
{
    type Output = T;

    async fn deserialize(
        &self,
        _request: &PreparedRequest,
        response: &mut ApiResponse,
        cancel: &CancellationToken,
    ) -> Result<T, Error> {
        (self.read)(response, cancel).await
    }
}
