//! portal-sync - CRM to listing portal reconciliation
//!
//! Keeps a real-estate CRM's properties and agents in agreement with an
//! external listing portal. Each sync run maps local records to the portal
//! schema, creates, updates or deactivates the portal side, and writes the
//! portal's identity and review status back onto the local record.
//!
//! ## Components
//!
//! 1. **Remote client** ([`remote`]): authenticated portal calls with retry,
//!    backoff and a shared token cache.
//! 2. **Field mapper** ([`mapper`]): pure conversion between CRM entities and
//!    portal payloads, reporting every missing field at once.
//! 3. **Reconciler** ([`sync`]): per-entity create/update/deactivate decisions,
//!    failure isolation, cancellation and bounded concurrency.
//! 4. **Run tracker** ([`sync::SyncRunTracker`]): per-entity outcomes and
//!    aggregate counts of a run.
//!
//! Runs are triggered from the CLI or over the local HTTP API ([`server`]).

pub mod config;
pub mod domain;
pub mod mapper;
pub mod remote;
pub mod server;
pub mod store;
pub mod sync;

pub use domain::*;
