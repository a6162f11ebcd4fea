//! HTTP module.
//!
//! REST endpoints over the queue engine.

pub mod items;
pub mod monitoring;
pub mod queues;
pub mod routes;

pub use routes::create_router;
