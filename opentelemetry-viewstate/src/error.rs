use std::result;
use thiserror::Error;

/// A specialized `Result` type for metric operations.
pub type MetricResult<T> = result::Result<T, MetricError>;

/// Errors returned while configuring instruments.
///
/// Recording and collecting never fail; only building an instrument does.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MetricError {
    /// Invalid configuration
    #[error("Config error {0}")]
    Config(String),
    /// The view requested something the instrument cannot provide, such as a
    /// histogram for an asynchronous instrument or a number kind that does not
    /// match the descriptor.
    #[error("Invalid instrument configuration: {0}")]
    InvalidInstrumentConfiguration(&'static str),
}
