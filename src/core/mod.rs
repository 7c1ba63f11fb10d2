//! Core business logic - framework-agnostic ledger, catalog, purchase and
//! scheduling operations.
//!
//! Every operation takes a connection (or the [`store::Store`]) explicitly and
//! returns [`crate::errors::Result`]; nothing here knows about Discord.

/// Store handle and transient-failure retry
pub mod store;

/// User registration and admin bootstrap
pub mod user;

/// Balance ledger and transaction log
pub mod ledger;

/// Catalog listing, item resolution and seeding
pub mod catalog;

/// Purchase engine
pub mod purchase;

/// Durable scheduler for effect expiry and delayed broadcasts
pub mod scheduler;
