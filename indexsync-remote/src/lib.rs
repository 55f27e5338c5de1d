//! Remote indexing service client.
//!
//! [`IndexingApi`] is the seam the engine calls through; [`HttpIndexingApi`]
//! is the production implementation. Write calls that reach the service
//! always produce an [`ApiResponse`], whatever its status; only failures
//! that prevent a response (bad credentials, transport errors) are errors.

mod api;
mod error;
mod http;

pub use api::{validate_credentials, ApiResponse, IndexingApi};
pub use error::{ApiError, ApiResult};
pub use http::{HttpIndexingApi, RemoteConfig};
