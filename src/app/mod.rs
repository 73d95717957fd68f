//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the business rules for the card engine: record
//! loading, session orchestration, refresh handling, and property
//! publication.  All interaction with the modem and the host happens
//! through **port traits** defined in [`ports`], keeping this layer fully
//! testable without a real radio.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
