use thiserror::Error;

/// Failure taxonomy for the engine. Infrastructure failures
/// (`StoreUnavailable`, `WorkerUnavailable`) degrade at the call site and
/// never abort interaction; data-integrity failures (`InvalidDimensions`,
/// `MalformedInput`) reject the operation atomically.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid grid dimensions: {width}x{height} with {tile_size}px tiles")]
    InvalidDimensions {
        width: u32,
        height: u32,
        tile_size: u32,
    },
    #[error("durable store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("mask worker unavailable: {0}")]
    WorkerUnavailable(String),
    #[error("malformed input: {0}")]
    MalformedInput(String),
}
