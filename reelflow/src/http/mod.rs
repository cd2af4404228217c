//! HTTP plumbing shared by the vendor clients.
//!
//! Clients build [`HttpRequest`] values and hand them to an
//! [`HttpTransport`]. The production transport wraps `reqwest`; tests use
//! [`crate::testing::ScriptedTransport`]. The [`envelope`] helpers turn raw
//! responses into the [`JobError`](crate::errors::JobError) taxonomy.

pub mod envelope;
mod transport;

#[cfg(feature = "reqwest-transport")]
pub use transport::ReqwestTransport;
pub use transport::{
    ContentPolicy, FormPart, HttpRequest, HttpResponse, HttpTransport, Method, RequestBody,
};

#[cfg(test)]
pub use transport::MockHttpTransport;
