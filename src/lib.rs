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

//! Asynchronous API call composition for OpenStack-family REST services.
//!
//! This crate provides the generic machinery for talking to an OpenStack
//! style REST endpoint: preparing a request, sending it through a
//! replaceable [transport](trait.Transport.html), validating the response
//! and deserializing the body, with decorators for transforming results and
//! lifecycle notifications around every send. It also ships the URI
//! percent-encoding engine ([codec](codec/index.html)), query parameter
//! editing ([query](query/index.html)) and the network value types
//! ([AddressValue](enum.AddressValue.html),
//! [PhysicalAddress](struct.PhysicalAddress.html)) the service layers rely
//! on.
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), oscall::Error> {
//! use reqwest::{Method, Url};
//! use serde::Deserialize;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug, Default, Deserialize)]
//! struct ServersRoot {
//!     servers: Vec<serde_json::Value>,
//! }
//!
//! use oscall::ApiCall;
//!
//! let factory = oscall::ApiCallFactory::default();
//! let url = Url::parse("https://cloud.local:8774/v2.1/servers").expect("hard-coded URL");
//! let request = oscall::PreparedRequest::new(Method::GET, url);
//! let mut call = factory.json::<ServersRoot>(request)?;
//! let (response, root) = call.send(&CancellationToken::new()).await?;
//! println!("{} -> {} servers", response.status(), root.servers.len());
//! # Ok(()) }
//! # #[tokio::main]
//! # async fn main() { example().await.unwrap(); }
//! ```
//!
//! Authentication, service catalogs and per-service request schemas are
//! deliberately out of scope: they live in the layers calling into this
//! crate.

#![crate_name = "oscall"]
#![crate_type = "lib"]
#![doc(html_root_url = "https://docs.rs/oscall/0.1.0")]
// NOTE: we do not use generic deny(warnings) to avoid breakages with new
// versions of the compiler. Add more warnings here as you discover them.
#![deny(
    dead_code,
    improper_ctypes,
    missing_debug_implementations,
    missing_docs,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    trivial_casts,
    trivial_numeric_casts,
    unconditional_recursion,
    unsafe_code,
    unused,
    unused_allocation,
    unused_comparisons,
    unused_doc_comments,
    unused_import_braces,
    unused_parens,
    unused_qualifications,
    unused_results,
    while_true
)]
#![allow(
    clippy::new_ret_no_self,
    clippy::should_implement_trait,
    clippy::wrong_self_convention
)]

mod address;
mod call;
pub mod codec;
mod error;
mod factory;
mod mac;
pub mod mediatype;
mod notify;
pub mod query;
mod request;
mod response;
mod transform;
mod transport;

pub use crate::address::AddressValue;
#[cfg(feature = "stream")]
pub use crate::call::{BodyStream, StreamBody};
pub use crate::call::{
    check, check_validator, ApiCall, BoxedDeserialize, BoxedValidate, CustomBody, DeserializeBody,
    HttpApiCall, JsonBody, StringBody, Validator,
};
pub use crate::codec::UriPart;
pub use crate::error::{Error, ErrorKind};
pub use crate::factory::ApiCallFactory;
pub use crate::mac::PhysicalAddress;
pub use crate::mediatype::MediaType;
pub use crate::notify::Channel;
pub use crate::request::{CompletionOption, PreparedRequest};
pub use crate::response::ApiResponse;
pub use crate::transform::Transformed;
pub use crate::transport::{HttpTransport, Transport};
