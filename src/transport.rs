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

//! The transport an API call goes through.

use std::fmt::Debug;

use async_trait::async_trait;
use log::trace;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use super::request::{CompletionOption, PreparedRequest};
use super::response::ApiResponse;
use super::{Error, ErrorKind};

/// Something that can deliver a prepared request and produce a response.
///
/// Implemented by [HttpTransport](struct.HttpTransport.html) for real HTTP;
/// tests supply stub implementations returning canned responses.
#[async_trait]
pub trait Transport: Debug + Send + Sync {
    /// Send the request, honoring the completion option and cancellation.
    ///
    /// With [ContentRead](enum.CompletionOption.html#variant.ContentRead)
    /// the body is fully read before returning, otherwise the response is
    /// returned as soon as the headers have arrived.
    async fn send(
        &self,
        request: &PreparedRequest,
        completion: CompletionOption,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, Error>;
}

/// A transport on top of an HTTP client.
///
/// Uses `Arc` internally and should be reused when possible by cloning it.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with a default client.
    pub fn new() -> HttpTransport {
        HttpTransport::default()
    }

    /// Create a transport on top of an existing client.
    pub fn with_client(client: Client) -> HttpTransport {
        HttpTransport { client }
    }

    /// Get a reference to the inner client.
    #[inline]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &PreparedRequest,
        completion: CompletionOption,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, Error> {
        let wire = request.to_wire();
        trace!("Sending HTTP {} request to {}", wire.method(), wire.url());

        let response = tokio::select! {
            // cancellation wins when both are ready
            biased;
            _ = cancel.cancelled() => {
                trace!("HTTP request to {} cancelled before a response", request.url());
                return Err(Error::new_default(ErrorKind::Cancelled));
            }
            response = self.client.execute(wire) => response?,
        };
        trace!(
            "HTTP request to {} returned {}",
            response.url(),
            response.status()
        );

        let mut response = ApiResponse::from_wire(response);
        if completion == CompletionOption::ContentRead {
            response.buffer(cancel).await?;
        }
        Ok(response)
    }
}
