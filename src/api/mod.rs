//! Amplitude API adapter
//!
//! Request shaping, Basic auth, the HTTP transport and export decoding.

pub mod auth;
pub mod client;
pub mod decode;
pub mod request;

pub use client::{AmplitudeClient, Payload};
pub use decode::{ExportBatch, ExportPage};
pub use request::{ApiRequest, ResponseKind};
