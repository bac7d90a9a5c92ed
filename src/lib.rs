/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Crash-safe persistence of the state an off-chain reporting (OCR) oracle needs to resume after a
//! restart.
//!
//! An oracle participating in OCR consensus may crash and restart at any time. When it comes back, it
//! must neither re-sign messages for epochs it already took part in, nor lose reports that were
//! finalized but not yet confirmed on-chain. This crate keeps the four records that make that possible,
//! all scoped to a single oracle job ([`ScopeId`](types::data_types::ScopeId)):
//!
//! |Record|Keyed by|Used by|
//! |---|---|---|
//! |[Persistent state](database::state_store)|scope, config digest|The consensus engine, to remember epoch watermarks.|
//! |[Contract config](database::config_cache)|scope|The consensus engine, to avoid re-reading the on-chain config.|
//! |[Pending transmissions](database::pending_transmissions)|scope, config digest, epoch, round|The transmitter, to resume submitting reports.|
//! |[Latest round requested](database::round_requests)|scope|The chain log consumer, to resume scanning.|
//!
//! The four records are independent of each other. No operation on one of them reads or writes
//! another, unless the caller stages several changes in one [write batch](database::OracleDb::write).
//!
//! # Getting started
//!
//! ```ignore
//! let configuration = Configuration::builder()
//!     .scope(ScopeId::new(7))
//!     .log_events(true)
//!     .build();
//! let mut db = OracleDb::new(kv_store, configuration);
//!
//! let ctx = Context::with_timeout(Duration::from_secs(5));
//! db.write_state(&ctx, &config_digest, &PersistentState::default())?;
//! ```
//!
//! The key-value store is provided by the host. Read [`persistence`] for what it needs to implement.

pub mod context;

pub mod database;

pub mod error;

pub mod event_bus;

pub mod events;

pub mod logging;

pub mod persistence;

pub mod types;
