//! Structured response envelopes returned by the dispatcher.

use super::error::ExchangeError;
use crate::orders::Trade;
use serde::Serialize;

/// Response to a new-order request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum NewOrderResponse {
    /// The order was validated, matched, and its events emitted.
    #[serde(rename = "ACCEPTED")]
    Accepted {
        /// Identifier allocated to the order.
        order_id: u64,
        /// Open quantity after matching.
        remaining_qty: u64,
        /// `true` when an IOC residue was cancelled.
        cancelled: bool,
        /// Trades produced by this submission, in match order.
        trades: Vec<Trade>,
    },
    /// The request was rejected; no state changed and no events were
    /// emitted.
    #[serde(rename = "ERROR")]
    Error {
        /// Reason for the rejection.
        details: String,
    },
}

/// Response to a cancel request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum CancelResponse {
    /// The order was open and is now cancelled.
    #[serde(rename = "CANCELLED")]
    Cancelled {
        /// The cancelled order.
        order_id: u64,
    },
    /// The cancel did not apply (unknown order, repeat cancel, unknown
    /// instrument, or invalid payload).
    #[serde(rename = "ERROR")]
    Error {
        /// Reason for the rejection.
        details: String,
    },
}

/// Response to a cancel-all request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum CancelAllResponse {
    /// The party's open orders were scanned and cancelled.
    #[serde(rename = "CANCELLED_ALL")]
    CancelledAll {
        /// Orders this call transitioned to cancelled.
        cancelled_order_ids: Vec<u64>,
        /// Orders that were already dead when the scan reached them.
        failed_order_ids: Vec<u64>,
    },
    /// The request was rejected outright.
    #[serde(rename = "ERROR")]
    Error {
        /// Reason for the rejection.
        details: String,
    },
}

/// Response to a new-book request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum CreateBookResponse {
    /// A fresh empty book was created.
    #[serde(rename = "CREATED")]
    Created {
        /// The new instrument.
        instrument_id: u32,
    },
    /// The request was rejected, e.g. the instrument already exists.
    #[serde(rename = "ERROR")]
    Error {
        /// Reason for the rejection.
        details: String,
    },
}

macro_rules! impl_error_response {
    ($($response:ident),+ $(,)?) => {
        $(
            impl $response {
                /// Builds the `ERROR` envelope for a dispatcher error.
                #[must_use]
                pub(super) fn error(error: &ExchangeError) -> Self {
                    $response::Error {
                        details: error.to_string(),
                    }
                }
            }

            impl From<ExchangeError> for $response {
                fn from(error: ExchangeError) -> Self {
                    $response::error(&error)
                }
            }
        )+
    };
}

impl_error_response!(
    NewOrderResponse,
    CancelResponse,
    CancelAllResponse,
    CreateBookResponse,
);
