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

//! Decorating API calls.
//!
//! A decorator wraps an inner call, forwards its contract and changes the
//! result type through a transform function. The pure delegate and the
//! value-only projection are special cases of the full transform, which
//! also sees the raw response and the cancellation signal.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::call::ApiCall;
use super::notify::Channel;
use super::request::{CompletionOption, PreparedRequest};
use super::response::ApiResponse;
use super::Error;

type TransformFn<S, T> =
    Box<dyn Fn(&ApiResponse, S, &CancellationToken) -> Result<T, Error> + Send + Sync>;

/// A call that wraps another call and transforms its result.
///
/// The decorator owns the inner call: disposing the decorator disposes the
/// inner call transitively. At construction it subscribes to the inner
/// call's notification channels and re-raises their events on its own, so a
/// subscriber attached to the outermost of N layers still observes every
/// event.
pub struct Transformed<C: ApiCall, T> {
    inner: C,
    transform: TransformFn<C::Output, T>,
    before_send: Channel<PreparedRequest>,
    after_response: Channel<Result<ApiResponse, Error>>,
}

impl<C: ApiCall, T> Transformed<C, T> {
    fn with_boxed(inner: C, transform: TransformFn<C::Output, T>) -> Transformed<C, T> {
        let before_send = Channel::<PreparedRequest>::default();
        let after_response = Channel::<Result<ApiResponse, Error>>::default();

        // re-raise the inner call's events to this layer's subscribers
        let outer = before_send.clone();
        inner.before_send().subscribe(move |event| outer.emit(event));
        let outer = after_response.clone();
        inner
            .after_response()
            .subscribe(move |event| outer.emit(event));

        Transformed {
            inner,
            transform,
            before_send,
            after_response,
        }
    }

    /// Wrap a call with a transform of the inner result that also sees the
    /// raw response and the cancellation signal.
    pub fn new<F>(inner: C, transform: F) -> Transformed<C, T>
    where
        F: Fn(&ApiResponse, C::Output, &CancellationToken) -> Result<T, Error>
            + Send
            + Sync
            + 'static,
    {
        Transformed::with_boxed(inner, Box::new(transform))
    }

    /// Wrap a call with a projection of the inner result only.
    pub fn project<F>(inner: C, project: F) -> Transformed<C, T>
    where
        F: Fn(C::Output) -> Result<T, Error> + Send + Sync + 'static,
    {
        Transformed::with_boxed(inner, Box::new(move |_resp, value, _cancel| project(value)))
    }

    /// A reference to the inner call.
    #[inline]
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: ApiCall> Transformed<C, C::Output> {
    /// Wrap a call without changing its behavior.
    ///
    /// Useful as a base for wrapper types that only want a distinct type.
    pub fn delegate(inner: C) -> Transformed<C, C::Output> {
        Transformed::with_boxed(inner, Box::new(|_resp, value, _cancel| Ok(value)))
    }
}

impl<C: ApiCall, T> std::fmt::Debug for Transformed<C, T>
where
    C: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Transformed").field("inner", &self.inner).finish()
    }
}

#[async_trait]
impl<C, T> ApiCall for Transformed<C, T>
where
    C: ApiCall,
    T: Send,
{
    type Output = T;

    fn request(&self) -> Result<&PreparedRequest, Error> {
        self.inner.request()
    }

    fn request_mut(&mut self) -> Result<&mut PreparedRequest, Error> {
        self.inner.request_mut()
    }

    fn completion_option(&self) -> Result<CompletionOption, Error> {
        self.inner.completion_option()
    }

    fn set_completion_option(&mut self, option: CompletionOption) -> Result<(), Error> {
        self.inner.set_completion_option(option)
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
        let (response, value) = self.inner.send(cancel).await?;
        let transformed = (self.transform)(&response, value, cancel)?;
        Ok((response, transformed))
    }

    fn dispose(&mut self) {
        self.inner.dispose();
    }
}
