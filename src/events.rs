/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events emitted by [`OracleDb`](crate::database::OracleDb), for event handling and
//! logging.
//!
//! An event is emitted only after the write it describes has been committed to the key-value store. A
//! write that fails, or is cancelled, emits nothing.

use std::time::SystemTime;

use crate::types::{
    data_types::{Address, ConfigDigest},
    pending_transmission::PendingTransmissionKey,
    persistent_state::PersistentState,
};

#[derive(Clone, Debug)]
pub enum Event {
    // State Store.
    WriteState(WriteStateEvent),
    // Config Cache.
    WriteConfig(WriteConfigEvent),
    // Pending Transmission Queue.
    StoreTransmission(StoreTransmissionEvent),
    DeleteTransmission(DeleteTransmissionEvent),
    PruneTransmissions(PruneTransmissionsEvent),
    // Round-Request Log.
    SaveRoundRequested(SaveRoundRequestedEvent),
}

/// A [`PersistentState`] was written for `config_digest`.
#[derive(Clone, Debug)]
pub struct WriteStateEvent {
    pub timestamp: SystemTime,
    pub config_digest: ConfigDigest,
    pub state: PersistentState,
}

/// The cached contract config was replaced with the one for `config_digest`.
#[derive(Clone, Debug)]
pub struct WriteConfigEvent {
    pub timestamp: SystemTime,
    pub config_digest: ConfigDigest,
    pub encoded_config_version: u32,
}

#[derive(Clone, Debug)]
pub struct StoreTransmissionEvent {
    pub timestamp: SystemTime,
    pub key: PendingTransmissionKey,
}

/// The pending transmission at `key` was deleted. `existed` is `false` if there was nothing to delete
/// when the delete was issued.
#[derive(Clone, Debug)]
pub struct DeleteTransmissionEvent {
    pub timestamp: SystemTime,
    pub key: PendingTransmissionKey,
    pub existed: bool,
}

/// `deleted` pending transmissions created before `cutoff` were garbage collected.
#[derive(Clone, Debug)]
pub struct PruneTransmissionsEvent {
    pub timestamp: SystemTime,
    pub cutoff: SystemTime,
    pub deleted: usize,
}

#[derive(Clone, Debug)]
pub struct SaveRoundRequestedEvent {
    pub timestamp: SystemTime,
    pub requester: Address,
    pub config_digest: ConfigDigest,
    pub epoch: u32,
    pub round: u8,
}
