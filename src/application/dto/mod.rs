//! Data Transfer Objects
//!
//! DTOs for API request/response serialization and bus envelopes.

pub mod envelope;
pub mod request;
pub mod response;

pub use envelope::Envelope;
pub use request::*;
pub use response::*;
