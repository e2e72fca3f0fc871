//! proctor-client — Attempt backend integrations.
//!
//! Implements the `AttemptBackend` trait over HTTP, plus a scripted mock
//! and the TOML configuration that wires a backend to a timer.

pub mod config;
pub mod http;
pub mod mock;

pub use config::{create_backend, load_config, load_config_from, ProctorConfig};
pub use http::HttpBackend;
pub use mock::MockBackend;
