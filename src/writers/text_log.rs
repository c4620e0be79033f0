//! Append-only per-instrument CSV event logs.
//!
//! For each instrument the writer maintains four files in its base
//! directory:
//!
//! - `orders_<id>.csv` (one row per `record_order`)
//! - `trades_<id>.csv` (one row per `record_trade`)
//! - `cancels_<id>.csv` (one row per `record_cancel`)
//! - `live_events_<id>.csv` (one row per live-order upsert or removal)
//!
//! Files are created with a header on first write. Rows are appended by a
//! dedicated worker thread so the dispatcher never touches the filesystem;
//! [`TextLogWriter::shutdown`] drains the worker before returning. The log
//! is an audit artifact, not a replay source: the rebuild-side methods
//! return empty results.

use super::ExchangeWriter;
use crate::orders::{Order, Trade};
use crate::utils::current_time_nanos;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::JoinHandle;
use tracing::{error, info, warn};

const ORDER_FIELDS: &[&str] = &[
    "order_type",
    "side",
    "instrument_id",
    "price_cents",
    "quantity",
    "timestamp",
    "order_id",
    "party_id",
    "cancelled",
    "filled_quantity",
    "remaining_quantity",
];

const TRADE_FIELDS: &[&str] = &[
    "trade_id",
    "instrument_id",
    "price_cents",
    "quantity",
    "timestamp",
    "maker_order_id",
    "maker_party_id",
    "taker_order_id",
    "taker_party_id",
    "maker_is_buyer",
    "maker_quantity_remaining",
    "taker_quantity_remaining",
];

const CANCEL_FIELDS: &[&str] = &["instrument_id", "order_id", "timestamp"];

/// `live_events` rows carry the event kind plus full order info where
/// applicable; removal rows leave the unknown order columns empty.
const LIVE_FIELDS: &[&str] = &[
    "event_type",
    "order_type",
    "side",
    "instrument_id",
    "price_cents",
    "quantity",
    "timestamp",
    "order_id",
    "party_id",
    "cancelled",
    "filled_quantity",
    "remaining_quantity",
];

enum LogEvent {
    Order(Order),
    Trade(Trade),
    Cancel {
        instrument_id: u32,
        order_id: u64,
        timestamp: u64,
    },
    LiveUpsert(Order),
    LiveRemove {
        instrument_id: u32,
        order_id: u64,
    },
    CreateInstrument(u32),
}

/// Append-only CSV event logger with a background worker.
pub struct TextLogWriter {
    sender: Mutex<Option<Sender<LogEvent>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    base_dir: PathBuf,
}

impl TextLogWriter {
    /// Creates the base directory if needed and starts the worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`io::Error`] when the directory cannot be created or the
    /// worker thread cannot be spawned.
    pub fn new<P: Into<PathBuf>>(directory: P) -> io::Result<Self> {
        let base_dir = directory.into();
        fs::create_dir_all(&base_dir)?;

        let (sender, receiver) = channel();
        let worker_dir = base_dir.clone();
        let worker = std::thread::Builder::new()
            .name("text-log-writer".to_string())
            .spawn(move || worker_loop(&worker_dir, &receiver))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            base_dir,
        })
    }

    /// The directory the CSV files live in.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Drains all scheduled rows and joins the worker. Events scheduled
    /// after shutdown are dropped with a warning.
    pub fn shutdown(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
        let worker = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(worker) = worker
            && worker.join().is_err()
        {
            error!("text log worker panicked");
        }
    }

    fn schedule(&self, event: LogEvent) {
        match self.sender.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(sender) => {
                    if sender.send(event).is_err() {
                        warn!("text log worker gone, event dropped");
                    }
                }
                None => warn!("text log writer shut down, event dropped"),
            },
            Err(_) => error!("text log sender mutex poisoned"),
        }
    }
}

impl Drop for TextLogWriter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(base_dir: &Path, receiver: &Receiver<LogEvent>) {
    info!(directory = %base_dir.display(), "text log worker started");
    while let Ok(event) = receiver.recv() {
        if let Err(error) = write_event(base_dir, &event) {
            warn!(%error, "text log write failed");
        }
    }
    info!("text log worker stopped");
}

fn write_event(base_dir: &Path, event: &LogEvent) -> io::Result<()> {
    match event {
        LogEvent::Order(order) => append_row(
            &base_dir.join(format!("orders_{}.csv", order.instrument_id)),
            ORDER_FIELDS,
            &order_row(order),
        ),
        LogEvent::Trade(trade) => append_row(
            &base_dir.join(format!("trades_{}.csv", trade.instrument_id)),
            TRADE_FIELDS,
            &trade_row(trade),
        ),
        LogEvent::Cancel {
            instrument_id,
            order_id,
            timestamp,
        } => append_row(
            &base_dir.join(format!("cancels_{instrument_id}.csv")),
            CANCEL_FIELDS,
            &[
                instrument_id.to_string(),
                order_id.to_string(),
                timestamp.to_string(),
            ],
        ),
        LogEvent::LiveUpsert(order) => {
            let mut row = vec!["UPS_LIVE".to_string()];
            row.extend(order_row(order));
            append_row(
                &base_dir.join(format!("live_events_{}.csv", order.instrument_id)),
                LIVE_FIELDS,
                &row,
            )
        }
        LogEvent::LiveRemove {
            instrument_id,
            order_id,
        } => {
            let mut row = vec![
                "REM_LIVE".to_string(),
                String::new(),
                String::new(),
                instrument_id.to_string(),
            ];
            row.extend(vec![String::new(); 3]);
            row.push(order_id.to_string());
            row.extend(vec![String::new(); 4]);
            append_row(
                &base_dir.join(format!("live_events_{instrument_id}.csv")),
                LIVE_FIELDS,
                &row,
            )
        }
        LogEvent::CreateInstrument(instrument_id) => {
            for (prefix, header) in [
                ("orders", ORDER_FIELDS),
                ("trades", TRADE_FIELDS),
                ("cancels", CANCEL_FIELDS),
                ("live_events", LIVE_FIELDS),
            ] {
                ensure_file(
                    &base_dir.join(format!("{prefix}_{instrument_id}.csv")),
                    header,
                )?;
            }
            Ok(())
        }
    }
}

fn order_row(order: &Order) -> Vec<String> {
    vec![
        order.order_type.to_string(),
        order.side.to_string(),
        order.instrument_id.to_string(),
        order.price_cents.to_string(),
        order.quantity.to_string(),
        order.timestamp.to_string(),
        order.order_id.to_string(),
        order.party_id.clone(),
        order.cancelled.to_string(),
        order.filled_quantity.to_string(),
        order.remaining_quantity.to_string(),
    ]
}

fn trade_row(trade: &Trade) -> Vec<String> {
    vec![
        trade.trade_id.to_string(),
        trade.instrument_id.to_string(),
        trade.price_cents.to_string(),
        trade.quantity.to_string(),
        trade.timestamp.to_string(),
        trade.maker_order_id.to_string(),
        trade.maker_party_id.clone(),
        trade.taker_order_id.to_string(),
        trade.taker_party_id.clone(),
        trade.maker_is_buyer.to_string(),
        trade.maker_quantity_remaining.to_string(),
        trade.taker_quantity_remaining.to_string(),
    ]
}

/// Creates the file with its header row when it does not exist yet.
fn ensure_file(path: &Path, header: &[&str]) -> io::Result<()> {
    if path.exists() {
        return Ok(());
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", header.join(","))
}

fn append_row(path: &Path, header: &[&str], row: &[String]) -> io::Result<()> {
    debug_assert_eq!(header.len(), row.len());
    let needs_header = !path.exists();
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if needs_header {
        writeln!(file, "{}", header.join(","))?;
    }
    let escaped: Vec<String> = row.iter().map(|field| csv_field(field)).collect();
    writeln!(file, "{}", escaped.join(","))
}

/// Quotes a field when it contains a delimiter, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

impl ExchangeWriter for TextLogWriter {
    fn record_order(&self, order: &Order) {
        self.schedule(LogEvent::Order(order.clone()));
    }

    fn record_trade(&self, trade: &Trade) {
        self.schedule(LogEvent::Trade(trade.clone()));
    }

    fn record_cancel(&self, instrument_id: u32, order_id: u64) {
        self.schedule(LogEvent::Cancel {
            instrument_id,
            order_id,
            timestamp: current_time_nanos(),
        });
    }

    fn upsert_live_order(&self, order: &Order) {
        self.schedule(LogEvent::LiveUpsert(order.clone()));
    }

    fn remove_live_order(&self, instrument_id: u32, order_id: u64) {
        self.schedule(LogEvent::LiveRemove {
            instrument_id,
            order_id,
        });
    }

    fn update_order_quantity(&self, _instrument_id: u32, _order_id: u64, _quantity: u64) {
        // Quantity deltas are derivable from the trades file.
    }

    fn create_instrument(&self, instrument_id: u32) {
        self.schedule(LogEvent::CreateInstrument(instrument_id));
    }
}

impl std::fmt::Debug for TextLogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextLogWriter")
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}
