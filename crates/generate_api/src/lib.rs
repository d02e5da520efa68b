//! Transport-only client for a streaming text-generation endpoint.
//!
//! This crate owns request building, status/error mapping and NDJSON body
//! parsing for the `/api/generate` endpoint only. It contains no prompt
//! construction and no response formatting.
//!
//! Wire contract: the request is `{"model", "prompt", "stream": true}`; the
//! response body is newline-delimited JSON where every object carries a
//! `response` text fragment. End of stream is transport closure.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod ndjson;
pub mod payload;
pub mod retry;
pub mod url;

pub use client::{CancellationSignal, GenerateApiClient, StreamResult};
pub use config::GenerateApiConfig;
pub use error::GenerateApiError;
pub use events::GenerateStreamEvent;
pub use ndjson::NdjsonStreamParser;
pub use payload::GenerateRequest;
pub use reqwest::StatusCode;
pub use url::normalize_generate_url;
