//! Vendor payment approval engine
//!
//! A multi-level approval workflow over a durable sled ledger: requests
//! move `pending -> approved -> processing -> completed` (or terminate in
//! `rejected`) under a per-request approval chain resolved from a
//! configurable threshold policy. Every transition appends exactly one
//! immutable audit entry in the same storage transaction.

pub mod audit;
pub mod chain;
pub mod error;
pub mod ledger;
pub mod query;
pub mod request;
pub mod service;
pub mod utils;
pub mod vendor;
