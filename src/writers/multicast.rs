//! Best-effort UDP multicast publisher for market-data consumers.

use super::ExchangeWriter;
use crate::orders::{Order, Trade};
use serde_json::{Value, json};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use tracing::{error, trace, warn};

/// Default multicast group and port.
pub const DEFAULT_MULTICAST_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(224, 1, 1, 1)), 4444);

/// Fire-and-forget JSON datagram publisher.
///
/// Every order, trade, and cancel becomes one self-contained frame
/// `{"type": "ORDER" | "TRADE" | "CANCEL", ...entity fields}` sent to the
/// configured group. There is no sequencing header, no retry, and no
/// back-pressure on the caller; packet loss is acceptable by design, and
/// send failures are logged and swallowed. Live-order maintenance and the
/// rebuild-side methods are no-ops.
pub struct MulticastWriter {
    socket: UdpSocket,
    target: SocketAddr,
}

impl MulticastWriter {
    /// Creates a publisher sending to [`DEFAULT_MULTICAST_ADDR`].
    ///
    /// # Errors
    ///
    /// Returns [`io::Error`] when the local socket cannot be bound.
    pub fn new() -> io::Result<Self> {
        Self::with_target(DEFAULT_MULTICAST_ADDR)
    }

    /// Creates a publisher sending to an explicit target address. The
    /// target does not have to be a multicast group; a unicast address
    /// works for point-to-point feeds and for tests.
    ///
    /// # Errors
    ///
    /// Returns [`io::Error`] when the local socket cannot be bound.
    pub fn with_target(target: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        // Keep frames on the local segment.
        if target.ip().is_multicast()
            && let Err(error) = socket.set_multicast_ttl_v4(1)
        {
            warn!(%error, "could not set multicast TTL");
        }
        Ok(Self { socket, target })
    }

    /// The address frames are sent to.
    #[must_use]
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    fn publish(&self, kind: &str, entity: Result<Value, serde_json::Error>) {
        let mut frame = match entity {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                error!(kind, "entity did not serialize to a JSON object");
                return;
            }
        };
        frame.insert("type".to_string(), Value::String(kind.to_string()));

        match serde_json::to_vec(&frame) {
            Ok(bytes) => match self.socket.send_to(&bytes, self.target) {
                Ok(_) => trace!(kind, target = %self.target, "frame published"),
                Err(error) => warn!(%error, kind, "multicast send failed"),
            },
            Err(error) => error!(%error, kind, "frame serialization failed"),
        }
    }
}

impl ExchangeWriter for MulticastWriter {
    fn record_order(&self, order: &Order) {
        self.publish("ORDER", serde_json::to_value(order));
    }

    fn record_trade(&self, trade: &Trade) {
        self.publish("TRADE", serde_json::to_value(trade));
    }

    fn record_cancel(&self, instrument_id: u32, order_id: u64) {
        self.publish(
            "CANCEL",
            Ok(json!({
                "instrument_id": instrument_id,
                "order_id": order_id,
            })),
        );
    }

    fn upsert_live_order(&self, _order: &Order) {}

    fn remove_live_order(&self, _instrument_id: u32, _order_id: u64) {}

    fn update_order_quantity(&self, _instrument_id: u32, _order_id: u64, _quantity: u64) {}

    fn create_instrument(&self, _instrument_id: u32) {}
}

impl std::fmt::Debug for MulticastWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MulticastWriter")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}
