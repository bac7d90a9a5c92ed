/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Byte-prefixes that specify where each table is stored in the user-provided key-value store.
//!
//! # Tables
//!
//! |Table|Row key|Columns|
//! |---|---|---|
//! |[`PERSISTENT_STATES`]|[`ConfigDigest`]|[`ROW_VALUE`]: [`PersistentState`](crate::types::persistent_state::PersistentState), [`ROW_UPDATED_AT`]: [`Timestamp`](crate::types::data_types::Timestamp)|
//! |[`CONTRACT_CONFIGS`]|(none)|[`ROW_VALUE`]: [`ContractConfigBytes`](crate::types::contract_config::ContractConfigBytes), [`ROW_UPDATED_AT`]: `Timestamp`|
//! |[`PENDING_TRANSMISSIONS`]|[`PendingTransmissionKey`]|See [below](#pending-transmissions).|
//! |[`LATEST_ROUND_REQUESTED`]|(none)|[`ROW_VALUE`]: [`RoundRequestedEventBytes`](crate::types::round_requested::RoundRequestedEventBytes)|
//!
//! # Keys
//!
//! Every key is the concatenation of four bytestrings:
//! 1. The table's one-byte constant.
//! 2. The scope, as 8 big-endian bytes.
//! 3. The row key. For pending transmissions, this is the 32-byte config digest, then the epoch as 4
//!    big-endian bytes, then the round as 1 byte.
//! 4. A one-byte column constant.
//!
//! Since every row key in a table has the same length, all columns of a row share the prefix formed by
//! the first three parts, and all rows of a table in a scope share the prefix formed by the first two.
//! Big-endian integers make a prefix scan return pending transmissions in (digest, epoch, round) order.
//!
//! Values are Borsh-serialized.
//!
//! ## Pending transmissions
//!
//! |Column|Type|
//! |---|---|
//! |[`TRANSMISSION_TIME`]|`Timestamp`|
//! |[`TRANSMISSION_MEDIAN`]|`Vec<u8>`: the median as two's-complement big-endian bytes.|
//! |[`TRANSMISSION_SERIALIZED_REPORT`]|`Vec<u8>`|
//! |[`TRANSMISSION_SIGNATURES`]|[`SignaturesBytes`](crate::types::pending_transmission::SignaturesBytes)|
//! |[`TRANSMISSION_UPDATED_AT`]|`Timestamp`|

use crate::{
    error::{Corruption, Field},
    types::{
        data_types::{ConfigDigest, ScopeId},
        pending_transmission::PendingTransmissionKey,
    },
};

// Tables
pub const PERSISTENT_STATES: [u8; 1] = [0];
pub const CONTRACT_CONFIGS: [u8; 1] = [1];
pub const PENDING_TRANSMISSIONS: [u8; 1] = [2];
pub const LATEST_ROUND_REQUESTED: [u8; 1] = [3];

// Columns of single-value rows
pub const ROW_VALUE: [u8; 1] = [0];
pub const ROW_UPDATED_AT: [u8; 1] = [1];

// Columns of pending transmissions
pub const TRANSMISSION_TIME: [u8; 1] = [0];
pub const TRANSMISSION_MEDIAN: [u8; 1] = [1];
pub const TRANSMISSION_SERIALIZED_REPORT: [u8; 1] = [2];
pub const TRANSMISSION_SIGNATURES: [u8; 1] = [3];
pub const TRANSMISSION_UPDATED_AT: [u8; 1] = [4];

pub const TRANSMISSION_COLUMNS: [[u8; 1]; 5] = [
    TRANSMISSION_TIME,
    TRANSMISSION_MEDIAN,
    TRANSMISSION_SERIALIZED_REPORT,
    TRANSMISSION_SIGNATURES,
    TRANSMISSION_UPDATED_AT,
];

const PENDING_TRANSMISSION_ROW_KEY_LEN: usize = 32 + 4 + 1;

/// Concatenate two byteslices into one vector.
pub fn concat(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut res = Vec::with_capacity(a.len() + b.len());
    res.extend_from_slice(a);
    res.extend_from_slice(b);
    res
}

/// Prefix shared by every key of `table` in `scope`.
pub fn table_prefix(table: &[u8; 1], scope: ScopeId) -> Vec<u8> {
    concat(table, &scope.to_be_bytes())
}

pub fn persistent_state_row(scope: ScopeId, config_digest: &ConfigDigest) -> Vec<u8> {
    concat(
        &table_prefix(&PERSISTENT_STATES, scope),
        &config_digest.bytes(),
    )
}

pub fn contract_config_row(scope: ScopeId) -> Vec<u8> {
    table_prefix(&CONTRACT_CONFIGS, scope)
}

/// Prefix shared by the pending transmissions of `scope`, narrowed to a single config digest if
/// `config_digest` is `Some`.
pub fn pending_transmissions_prefix(scope: ScopeId, config_digest: Option<&ConfigDigest>) -> Vec<u8> {
    let prefix = table_prefix(&PENDING_TRANSMISSIONS, scope);
    match config_digest {
        Some(config_digest) => concat(&prefix, &config_digest.bytes()),
        None => prefix,
    }
}

pub fn pending_transmission_row(scope: ScopeId, key: &PendingTransmissionKey) -> Vec<u8> {
    let mut row = pending_transmissions_prefix(scope, Some(&key.config_digest));
    row.extend_from_slice(&key.epoch.to_be_bytes());
    row.push(key.round);
    row
}

pub fn latest_round_requested_row(scope: ScopeId) -> Vec<u8> {
    table_prefix(&LATEST_ROUND_REQUESTED, scope)
}

/// Split a key found under [`pending_transmissions_prefix(scope, None)`](pending_transmissions_prefix)
/// into the `PendingTransmissionKey` of its row and its column byte.
///
/// `suffix` is the key with the table prefix already stripped.
pub(crate) fn parse_pending_transmission_key(
    suffix: &[u8],
) -> Result<(PendingTransmissionKey, u8), Corruption> {
    if suffix.len() != PENDING_TRANSMISSION_ROW_KEY_LEN + 1 {
        return Err(Corruption::WrongLength {
            field: Field::RowKey,
            expected: PENDING_TRANSMISSION_ROW_KEY_LEN + 1,
            actual: suffix.len(),
        });
    }

    let (config_digest, rest) = suffix.split_at(32);
    let (epoch, rest) = rest.split_at(4);
    let config_digest = ConfigDigest::from_slice(config_digest)?;
    let epoch = u32::from_be_bytes([epoch[0], epoch[1], epoch[2], epoch[3]]);

    Ok((
        PendingTransmissionKey {
            config_digest,
            epoch,
            round: rest[0],
        },
        rest[1],
    ))
}
