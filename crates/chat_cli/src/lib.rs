//! Line-mode chat front end for the streaming formatter.
//!
//! ## Provider bootstrap
//!
//! `chat` talks to an Ollama-compatible generate endpoint by default:
//!
//! - `STREAM_FORMATTER_PROVIDER=http` (or `--provider http`) streams from
//!   `OLLAMA_HOST` / `--host`
//! - `STREAM_FORMATTER_PROVIDER=mock` replays a scripted demo response
//!
//! ## Output
//!
//! Reasoning streams to stderr as it arrives. The rendered answer is
//! rewritten into the `--html-out` page after every change, and the plain
//! answer text is printed to stdout once the request completes. `--raw`
//! echoes the unprocessed stream as well.
//!
//! Events from superseded or cancelled requests are dropped by [`app::App`].

pub mod app;
pub mod commands;
pub mod document;
pub mod host;
pub mod providers;
