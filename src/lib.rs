//! cardlink — RUIM/CSIM record loader and packet-data session engine.
//!
//! The engine pairs two state machines behind one serialized event queue:
//! a record loader that batch-fetches card files and aggregates decoded
//! identity fields, and a session machine that drives packet-data setup
//! with bounded retry.  All modem I/O goes through the
//! [`TransportPort`](app::ports::TransportPort) boundary, so the whole
//! crate is testable with mock adapters.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod events;
pub mod records;
pub mod refresh;
pub mod session;
pub mod transport;

pub mod error;
