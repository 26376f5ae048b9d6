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

//! Error and error kinds.

use std::error::Error as BaseError;
use std::fmt;

use http::StatusCode;

use super::response::ApiResponse;

/// Kind of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The transport-level send failed: connection refused, timed out, TLS
    /// failure and similar. Never carries a status code.
    Transport,

    /// The request was cancelled before a response was delivered.
    Cancelled,

    /// The response was rejected by the validation step.
    ///
    /// Carries the response status code so that callers can inspect it.
    Protocol,

    /// The response body could not be converted to the expected type.
    Deserialization,

    /// The call was used after it was disposed.
    Disposed,

    /// A required argument was missing or malformed.
    InvalidInput,

    /// A URI or a percent-encoded sequence could not be decoded.
    InvalidUri,

    /// A textual network address could not be parsed.
    InvalidAddress,
}

impl ErrorKind {
    /// Short default message for this kind.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "Transport failure",
            ErrorKind::Cancelled => "Request cancelled",
            ErrorKind::Protocol => "Response rejected",
            ErrorKind::Deserialization => "Cannot deserialize the response",
            ErrorKind::Disposed => "The call has been disposed",
            ErrorKind::InvalidInput => "Invalid input",
            ErrorKind::InvalidUri => "Malformed URI",
            ErrorKind::InvalidAddress => "Malformed address",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.default_message())
    }
}

/// Error from an API call.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: Option<StatusCode>,
    response: Option<Box<ApiResponse>>,
    source: Option<Box<dyn BaseError + Send + Sync>>,
}

impl Error {
    /// Create a new error of the given kind with the given message.
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Error {
        Error {
            kind,
            message: message.into(),
            status: None,
            response: None,
            source: None,
        }
    }

    /// Create a new error with the kind's default message.
    #[inline]
    pub(crate) fn new_default(kind: ErrorKind) -> Error {
        Error::new(kind, kind.default_message())
    }

    /// Add an HTTP status code to the error.
    #[inline]
    pub fn with_status(mut self, status: StatusCode) -> Error {
        self.status = Some(status);
        self
    }

    /// Attach the response that produced the error.
    ///
    /// Fills in the status code from the response unless one was attached
    /// explicitly.
    pub fn with_response(mut self, response: ApiResponse) -> Error {
        if self.status.is_none() {
            self.status = Some(response.status());
        }
        self.response = Some(Box::new(response));
        self
    }

    /// Attach the underlying cause.
    #[inline]
    pub fn with_source<E>(mut self, source: E) -> Error
    where
        E: BaseError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Error kind.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// HTTP status code, if the error resulted from a rejected response.
    #[inline]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// The response that produced the error, if one was attached.
    #[inline]
    pub fn response(&self) -> Option<&ApiResponse> {
        self.response.as_deref()
    }

    /// Consume the error, extracting the attached response.
    #[inline]
    pub fn into_response(self) -> Option<ApiResponse> {
        self.response.map(|response| *response)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{}: {} (HTTP {})", self.kind, self.message, status),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl BaseError for Error {
    fn source(&self) -> Option<&(dyn BaseError + 'static)> {
        self.source
            .as_ref()
            .map(|e| -> &(dyn BaseError + 'static) { e.as_ref() })
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Error {
        let kind = if value.is_decode() {
            ErrorKind::Deserialization
        } else {
            ErrorKind::Transport
        };
        let message = value.to_string();
        let status = value.status();
        let mut result = Error::new(kind, message).with_source(value);
        result.status = status;
        result
    }
}
