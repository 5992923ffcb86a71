//! Typed views over PBAU frames.
//!
//! [`Request`] builds outbound frames with their command-specific payloads;
//! [`Reply`] interprets inbound frames according to the command they echo.

pub mod reply;
pub mod request;

pub use reply::Reply;
pub use request::Request;
