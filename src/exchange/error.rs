//! Dispatcher error types.

use std::fmt;

/// Errors surfaced by the exchange dispatcher.
///
/// Every variant is returned to the caller as a structured `ERROR` response;
/// none of them crosses the dispatcher boundary as a panic. The `Display`
/// output is the `details` string callers see.
#[derive(Debug)]
#[non_exhaustive]
pub enum ExchangeError {
    /// The request payload violated a validation constraint.
    Validation {
        /// What was wrong with the request.
        message: String,
    },

    /// The request targeted an instrument with no book.
    UnknownInstrument {
        /// The instrument that was requested.
        instrument_id: u32,
    },

    /// Cancel targeted an order that is unknown, already cancelled, or
    /// already filled. Not a storage-level error: the book is unchanged and
    /// no events are emitted.
    OrderNotOpen {
        /// The order that was requested.
        order_id: u64,
    },

    /// Book creation targeted an instrument that already has one.
    DuplicateInstrument {
        /// The instrument that was requested.
        instrument_id: u32,
    },

    /// The durable counter backing id allocation failed.
    Storage {
        /// The underlying storage error message.
        message: String,
    },
}

impl ExchangeError {
    /// Convenience constructor for validation failures.
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ExchangeError::Validation {
            message: message.into(),
        }
    }
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeError::Validation { message } => write!(f, "{message}"),
            ExchangeError::UnknownInstrument { .. } => write!(f, "unknown instrument"),
            ExchangeError::OrderNotOpen { .. } => write!(f, "order not open"),
            ExchangeError::DuplicateInstrument { .. } => write!(f, "instrument already exists"),
            ExchangeError::Storage { message } => write!(f, "storage error: {message}"),
        }
    }
}

impl std::error::Error for ExchangeError {}
