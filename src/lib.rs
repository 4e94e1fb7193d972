//! Job duration estimation for a service-shop booking system.
//!
//! A keyword/age heuristic gives a deterministic estimate for every job. When
//! an OpenAI-compatible model is configured it is asked first, and its answer
//! is used if it yields a number. Rules and model settings can be tuned at
//! runtime through a JSON override document.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod estimation;
pub mod llm;
pub mod server;
pub mod validation;

pub use config::Config;
pub use error::{Error, Result};
