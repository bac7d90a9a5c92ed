/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Pluggable persistence for [`OracleDb`](crate::database::OracleDb).
//!
//! `OracleDb` does not talk to any particular database. Instead, the host provides a key-value store
//! that implements the traits in [`pluggables`]:
//!
//! |Trait|Needs to provide|
//! |---|---|
//! |[`KVGet`](pluggables::KVGet)|Point reads, and ordered prefix scans.|
//! |[`KVStore`](pluggables::KVStore)|Atomic, durable application of a write batch (unconditionally, or only if some keys still hold given values), and consistent snapshots.|
//! |[`WriteBatch`](pluggables::WriteBatch)|Buffering of sets and deletes.|
//!
//! The four logical tables of `OracleDb` are laid out over this store as described in [`variables`].
//! Writes are staged into an [`OracleDbWriteBatch`](write_batch::OracleDbWriteBatch), which forms keys
//! and serializes values, and are then committed with a single call to `KVStore::write`.

pub mod pluggables;

pub mod variables;

pub mod write_batch;
