//! # uniledger-payments
//!
//! Ticket payment verification and event access service for UniLedger.
//!
//! A browser wallet signs and submits an Algorand payment; the client then
//! reports the transaction ID to this service, which independently looks
//! the transaction up on an algod node, checks that it pays the event
//! wallet at least the ticket price, records it once, and grants the payer
//! a membership of the event. Free events are joined directly.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, bearer session)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── PaymentService (service/)
//!     │
//!     ├── PaymentRepository (persistence/)   PostgreSQL | in-memory
//!     └── ChainClient (chain/)               algod REST + normalizer
//! ```

pub mod api;
pub mod app_state;
pub mod chain;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
