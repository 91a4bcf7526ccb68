//! HTTP server layer for the image previewer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │           GET /{operation}/{width}/{height}/{*source}           │
//! │                                                                 │
//! │  ┌──────────────────────────┐   ┌──────────────────────────┐    │
//! │  │         handlers         │   │          routes          │    │
//! │  │ (parse, serve, errors)   │   │ (router, CORS, tracing)  │    │
//! │  └──────────────────────────┘   └──────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, preview_handler, AppState, ErrorResponse, HandlerError, HealthResponse,
    PreviewPathParams, CACHE_HIT_HEADER,
};
pub use routes::{create_router, RouterConfig};
