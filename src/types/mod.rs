/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types of the values kept by [`OracleDb`](crate::database::OracleDb).
//!
//! Types that contain fixed-size byte arrays (addresses, signature components) have an intermediate
//! "bytes" form in which those arrays are variable-length vectors. The bytes forms are what gets
//! serialized into the key-value store. Converting a bytes form back into its domain type is fallible
//! and reports every length violation it finds, so that a malformed value is never silently truncated
//! or zero-padded.

pub mod data_types;

pub mod persistent_state;

pub mod contract_config;

pub mod pending_transmission;

pub mod round_requested;
