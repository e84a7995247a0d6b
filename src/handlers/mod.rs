//! Handler builders and associated traits.
//!
//! Builders validate user supplied settings before any thread or socket is
//! created, returning [`HandlerBuildError`] instead of a half-configured
//! handler.

use std::io;

use thiserror::Error;

use crate::handler::LogHandler;

pub mod graylog_builder;

pub use graylog_builder::GraylogHandlerBuilder;

/// Errors that may occur while building a handler.
#[derive(Debug, Error)]
pub enum HandlerBuildError {
    /// Invalid user supplied configuration.
    #[error("invalid handler configuration: {0}")]
    InvalidConfig(String),
    /// Underlying I/O error whilst creating the handler.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Trait implemented by all handler builders.
///
/// Builders return boxed [`LogHandler`] objects so the caller can register
/// them without knowing the concrete handler type.
pub trait HandlerBuilderTrait: Send + Sync {
    /// Build the handler instance.
    fn build(&self) -> Result<Box<dyn LogHandler>, HandlerBuildError>;
}
