/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The epoch watermarks a node keeps for one contract configuration.

use borsh::{BorshDeserialize, BorshSerialize};

/// Epoch watermarks for one [config digest](super::data_types::ConfigDigest).
///
/// These are what stop a restarted node from signing or broadcasting messages for an epoch it has
/// already taken part in. They are always written together, never field by field, so that a reader can
/// never observe an `epoch` from one write alongside a `highest_sent_epoch` from another.
///
/// ## Index alignment of `highest_received_epoch`
///
/// `highest_received_epoch[i]` is the highest epoch this node has received a message for from the
/// oracle at index `i` of the configuration's signer (and transmitter) list. The vector is persisted and
/// read back in exactly this order.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PersistentState {
    /// Highest epoch this node has advanced to.
    pub epoch: u32,

    /// Highest epoch this node has sent a message in.
    pub highest_sent_epoch: u32,

    /// Highest epoch received from each oracle, indexed by oracle.
    pub highest_received_epoch: Vec<u32>,
}
