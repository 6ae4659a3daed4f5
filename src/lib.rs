//! SEVA - ritual booking lifecycle and payment reconciliation
//!
//! Devotees book a ritual service and pay through a hosted payment provider;
//! an officiant performs it and uploads proof; payment captures, proof
//! deadlines and settlement splits are reconciled against the store.

pub mod access;
pub mod actions;
pub mod auth;
pub mod booking_machine;
pub mod bookings;
pub mod bookings_repo;
pub mod certificates;
pub mod clock;
pub mod config;
pub mod engine;
pub mod errors;
pub mod gateway;
pub mod metrics;
pub mod ops_issues;
pub mod ops_issues_repo;
pub mod outbox;
pub mod outbox_repo;
pub mod outbox_worker;
pub mod payment_events;
pub mod payment_events_repo;
pub mod payments;
pub mod payments_repo;
pub mod payouts;
pub mod payouts_repo;
pub mod proof_ledger;
pub mod proofs;
pub mod proofs_repo;
pub mod reconciler;
pub mod schema;
pub mod services;
pub mod services_repo;
pub mod settlement;
pub mod signature;
pub mod sla;
pub mod sla_scanner;
pub mod store;
pub mod web;

pub use engine::{Engine, EngineDeps};
pub use errors::{EngineError, EngineResult};
