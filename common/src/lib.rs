//! Shared primitives for the X-Wing overlay.
//!
//! This crate holds the small pieces every layer needs and that carry no
//! relay logic of their own:
//!
//! - **common** (this crate): error location tracking, secret-bearing strings
//! - **relay-core**: broker client, routing, relays and the renderer IPC server
//! - **x-wing**: the application shell wiring everything together

pub mod error;
pub mod redacted_uri;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use redacted_uri::RedactedUri;
