use thiserror::Error;

/// Errors a [`Book`](crate::book::Book) reports to its caller. There is no
/// recoverable-vs-fatal distinction beyond this: an invariant violation
/// detected at runtime is a programmer bug and panics rather than returning
/// one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("order {0} not found")]
    NotFound(u64),
}

/// Errors from the market-maker bot's connection to the engine's HTTP/WS
/// surface. Unrelated to [`BookError`] — this is transport, not matching.
#[derive(Error, Debug)]
pub enum MarketMakerError {
    #[error("connection error: {0}")]
    ConnectError(String),
}
