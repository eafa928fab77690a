// src/api/mod.rs
// HTTP glue composed alongside the WebSocket core.

pub mod http;

pub use http::create_router;
