//! HeyGen API client: request pipeline, generation payloads, transport seam.

mod api;
pub mod payload;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{extract_error_message, ApiResponse, HeyGenClient, RequestBody};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
