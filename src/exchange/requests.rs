//! Request payloads accepted by the dispatcher.
//!
//! Payloads arrive already authenticated: the outer surface has verified the
//! `password` against the party directory before the dispatcher sees them,
//! so validation here is purely structural.

use super::error::ExchangeError;
use crate::orders::{OrderType, Side};
use serde::{Deserialize, Serialize};

/// A new-order request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    /// Target instrument.
    pub instrument_id: u32,
    /// Buy or sell.
    pub side: Side,
    /// Execution policy.
    pub order_type: OrderType,
    /// Limit price in cents. Required for GTC and IOC; a missing price on a
    /// MARKET order defaults to zero and is never consulted.
    #[serde(default)]
    pub price_cents: Option<u64>,
    /// Order size. Must be positive.
    pub quantity: u64,
    /// Authenticated owner identity.
    pub party_id: String,
    /// Credential consumed by the outer surface; opaque here.
    #[serde(default)]
    pub password: String,
}

impl NewOrderRequest {
    /// Checks the structural constraints on this request.
    pub fn validate(&self) -> Result<(), ExchangeError> {
        if self.party_id.is_empty() {
            return Err(ExchangeError::validation("party_id must not be empty"));
        }
        if self.quantity == 0 {
            return Err(ExchangeError::validation("quantity must be positive"));
        }
        if self.price_cents.is_none() && self.order_type != OrderType::Market {
            return Err(ExchangeError::validation(
                "price_cents required for GTC/IOC",
            ));
        }
        Ok(())
    }

    /// The price the order will carry: the explicit limit, or zero for a
    /// MARKET order submitted without one.
    #[must_use]
    pub(super) fn effective_price(&self) -> u64 {
        self.price_cents.unwrap_or(0)
    }
}

/// A cancel request for one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    /// Instrument the order lives on.
    pub instrument_id: u32,
    /// The order to cancel.
    pub order_id: u64,
    /// Authenticated owner identity.
    pub party_id: String,
    /// Credential consumed by the outer surface; opaque here.
    #[serde(default)]
    pub password: String,
}

impl CancelRequest {
    /// Checks the structural constraints on this request.
    pub fn validate(&self) -> Result<(), ExchangeError> {
        if self.party_id.is_empty() {
            return Err(ExchangeError::validation("party_id must not be empty"));
        }
        Ok(())
    }
}

/// A request to cancel every open order a party holds on one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAllRequest {
    /// Instrument whose book is scanned.
    pub instrument_id: u32,
    /// Party whose orders are cancelled.
    pub party_id: String,
    /// Credential consumed by the outer surface; opaque here.
    #[serde(default)]
    pub password: String,
}

impl CancelAllRequest {
    /// Checks the structural constraints on this request.
    pub fn validate(&self) -> Result<(), ExchangeError> {
        if self.party_id.is_empty() {
            return Err(ExchangeError::validation("party_id must not be empty"));
        }
        Ok(())
    }
}

/// A request to open a new, empty book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookRequest {
    /// Identifier of the new instrument.
    pub instrument_id: u32,
    /// Human-readable instrument name, kept by the instrument directory.
    #[serde(default)]
    pub instrument_name: String,
    /// Optional longer description.
    #[serde(default)]
    pub instrument_description: Option<String>,
    /// Authenticated requesting identity.
    pub party_id: String,
    /// Credential consumed by the outer surface; opaque here.
    #[serde(default)]
    pub password: String,
}

impl CreateBookRequest {
    /// Checks the structural constraints on this request.
    pub fn validate(&self) -> Result<(), ExchangeError> {
        if self.party_id.is_empty() {
            return Err(ExchangeError::validation("party_id must not be empty"));
        }
        Ok(())
    }
}
