//! Data Transfer Objects for REST request/response serialization.
//!
//! ALGO amounts are serialized as JSON strings so no precision is lost to
//! floating point.

pub mod payment_dto;

pub use payment_dto::*;
