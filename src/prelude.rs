//! Prelude module that re-exports the commonly used types.
//!
//! ```rust
//! use exchange_core::prelude::*;
//! ```

// Dispatcher and its wire types
pub use crate::exchange::{
    CancelAllRequest, CancelAllResponse, CancelRequest, CancelResponse, CreateBookRequest,
    CreateBookResponse, Exchange, ExchangeError, IdAllocator, NewOrderRequest, NewOrderResponse,
};

// Order book types
pub use crate::orderbook::{DepthSnapshot, LevelDepth, OrderBook, SubmitResult};

// Data model
pub use crate::orders::{Order, OrderType, Side, Trade};

// Writer pipeline
pub use crate::writers::{
    ACTION_COUNT_COUNTER, CompositeWriter, ExchangeWriter, MulticastWriter, ORDER_ID_COUNTER,
    QueuedStoreWriter, SqliteStore, StoreError, StoreMessage, TextLogWriter,
};

// Utility functions
pub use crate::utils::current_time_nanos;
