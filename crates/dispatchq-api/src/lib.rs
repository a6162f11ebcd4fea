//! # dispatchq API
//!
//! HTTP interface for the queue engine. JSON bodies use camelCase; errors
//! come back as `{ "error", "code" }` with a status derived from the error
//! kind (404, 409, 422, 503 or 500).

pub mod error;
pub mod http;
pub mod server;
pub mod state;

pub use error::{ApiError, ErrorResponse};
pub use http::create_router;
pub use server::{ApiConfig, ApiServer};
pub use state::AppState;
