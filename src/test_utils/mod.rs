//! Test-only helpers shared across unit and integration tests.
//!
//! Compiled for unit tests and when the `test-util` feature is enabled.

pub mod collecting_handler;

pub use collecting_handler::CollectingHandler;
