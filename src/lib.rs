//! Amplitude Analytics over the Model Context Protocol.
//!
//! `api` talks to Amplitude's REST endpoints, `models` validates tool
//! arguments, and `mcp` exposes both as tools and `amplitude://` resources.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod models;

pub use error::{AmplitudeError, Result};
