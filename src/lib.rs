//! updown-hedge: trading core for Polymarket up/down rounds
//!
//! This library provides the core components for:
//! - EIP-712 order signing with tick-size aware rounding
//! - L1/L2/builder request authentication
//! - WebSocket market/user streams with heartbeat and reconnection
//! - Per-instrument order books reconciled from snapshots and deltas
//! - Round discovery and rollover for recurring up/down markets
//! - Paired hedge execution across two Safe-backed accounts
//! - Structured logging and Prometheus metrics

pub mod account;
pub mod auth;
pub mod cli;
pub mod clob;
pub mod config;
pub mod error;
pub mod execution;
pub mod market;
pub mod orderbook;
pub mod relayer;
pub mod signing;
pub mod telemetry;
pub mod ws;

pub use error::{Error, Result};
