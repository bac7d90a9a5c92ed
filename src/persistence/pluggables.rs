/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits for pluggable persistence.

use std::{
    collections::{BTreeMap, HashMap},
    fmt::{self, Display, Formatter},
    time::SystemTime,
};

use borsh::BorshDeserialize;

use crate::{
    error::{Corruption, Field},
    types::{
        contract_config::{ContractConfig, ContractConfigBytes},
        data_types::{ConfigDigest, ScopeId, Timestamp},
        pending_transmission::{
            median_from_bytes, PendingTransmission, PendingTransmissionKey, Signatures,
            SignaturesBytes,
        },
        persistent_state::PersistentState,
        round_requested::{RoundRequestedEvent, RoundRequestedEventBytes},
    },
};

use super::variables::{self, concat};

/// Error type of the user-provided key-value store. Wrapped unchanged into
/// [`StorageFault`](crate::error::OracleDbError::StorageFault).
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Columns of one row, indexed by column byte.
type Columns = BTreeMap<u8, Vec<u8>>;

pub trait KVStore: KVGet + Clone + Send + 'static {
    type WriteBatch: WriteBatch;
    type Snapshot<'a>: 'a + KVGet;

    /// Atomically apply every `set` and `delete` in `wb`. When this returns `Ok`, the changes must be
    /// durable. When it returns `Err`, none of them may be visible.
    fn write(&mut self, wb: Self::WriteBatch) -> Result<(), BackendError>;

    /// Atomically apply `wb`, but only if every key in `expected` currently holds the value paired with
    /// it (`None` meaning the key is absent). Returns `Ok(false)`, with nothing applied, if any of them
    /// does not. An `Ok(true)` must be as durable as an `Ok` from [`write`](Self::write).
    ///
    /// The comparison and the write must be a single atomic step with respect to every other `write`
    /// and `write_if_unchanged`.
    fn write_if_unchanged(
        &mut self,
        expected: &[(Vec<u8>, Option<Vec<u8>>)],
        wb: Self::WriteBatch,
    ) -> Result<bool, BackendError>;

    /// Get a read view that does not observe writes made after it was taken.
    fn snapshot<'b>(&'b self) -> Self::Snapshot<'_>;
}

pub trait KVGet {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BackendError>;

    /// Get every key-value pair whose key starts with `prefix`, in ascending key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, BackendError>;

    /* ↓↓↓ Persistent States ↓↓↓ */

    fn persistent_state(
        &self,
        scope: ScopeId,
        config_digest: &ConfigDigest,
    ) -> Result<Option<PersistentState>, KVGetError> {
        let key = || Key::PersistentState {
            scope,
            config_digest: *config_digest,
        };
        let row = variables::persistent_state_row(scope, config_digest);
        let value = match single_value_row(self, &row, Field::PersistentState).map_err(|source| {
            KVGetError::BackendError {
                key: key(),
                source,
            }
        })? {
            RowRead::Absent => return Ok(None),
            RowRead::Present(value, _) => value,
            RowRead::Incomplete(causes) => {
                return Err(KVGetError::CorruptValue { key: key(), causes })
            }
        };

        decode::<PersistentState>(&value, Field::PersistentState)
            .map(Some)
            .map_err(|cause| KVGetError::CorruptValue {
                key: key(),
                causes: vec![cause],
            })
    }

    fn persistent_state_updated_at(
        &self,
        scope: ScopeId,
        config_digest: &ConfigDigest,
    ) -> Result<Option<Timestamp>, KVGetError> {
        let row = variables::persistent_state_row(scope, config_digest);
        updated_at(
            self,
            &row,
            Key::PersistentState {
                scope,
                config_digest: *config_digest,
            },
        )
    }

    /* ↓↓↓ Contract Configs ↓↓↓ */

    fn contract_config(&self, scope: ScopeId) -> Result<Option<ContractConfig>, KVGetError> {
        let key = || Key::ContractConfig { scope };
        let row = variables::contract_config_row(scope);
        let value = match single_value_row(self, &row, Field::ContractConfig).map_err(|source| {
            KVGetError::BackendError {
                key: key(),
                source,
            }
        })? {
            RowRead::Absent => return Ok(None),
            RowRead::Present(value, _) => value,
            RowRead::Incomplete(causes) => {
                return Err(KVGetError::CorruptValue { key: key(), causes })
            }
        };

        let contract_config_bytes = decode::<ContractConfigBytes>(&value, Field::ContractConfig)
            .map_err(|cause| KVGetError::CorruptValue {
                key: key(),
                causes: vec![cause],
            })?;
        ContractConfig::try_from(contract_config_bytes)
            .map(Some)
            .map_err(|causes| KVGetError::CorruptValue { key: key(), causes })
    }

    fn contract_config_updated_at(&self, scope: ScopeId) -> Result<Option<Timestamp>, KVGetError> {
        let row = variables::contract_config_row(scope);
        updated_at(self, &row, Key::ContractConfig { scope })
    }

    /* ↓↓↓ Pending Transmissions ↓↓↓ */

    fn pending_transmission(
        &self,
        scope: ScopeId,
        transmission_key: &PendingTransmissionKey,
    ) -> Result<Option<PendingTransmission>, KVGetError> {
        let key = || Key::PendingTransmission {
            scope,
            key: *transmission_key,
        };
        let row = variables::pending_transmission_row(scope, transmission_key);

        let mut columns = Columns::new();
        for column in variables::TRANSMISSION_COLUMNS {
            let value = self.get(&concat(&row, &column)).map_err(|source| {
                KVGetError::BackendError {
                    key: key(),
                    source,
                }
            })?;
            if let Some(value) = value {
                columns.insert(column[0], value);
            }
        }

        if columns.is_empty() {
            return Ok(None);
        }
        decode_pending_transmission(&columns)
            .map(Some)
            .map_err(|causes| KVGetError::CorruptValue { key: key(), causes })
    }

    /// Get every pending transmission of `scope` that was finalized under `config_digest`.
    fn pending_transmissions(
        &self,
        scope: ScopeId,
        config_digest: &ConfigDigest,
    ) -> Result<HashMap<PendingTransmissionKey, PendingTransmission>, KVGetError> {
        let rows = pending_transmission_rows(self, scope, Some(config_digest))?;

        let mut transmissions = HashMap::with_capacity(rows.len());
        for (transmission_key, columns) in rows {
            let transmission = decode_pending_transmission(&columns).map_err(|causes| {
                KVGetError::CorruptValue {
                    key: Key::PendingTransmission {
                        scope,
                        key: transmission_key,
                    },
                    causes,
                }
            })?;
            transmissions.insert(transmission_key, transmission);
        }

        Ok(transmissions)
    }

    /// Whether any column of the pending transmission at `transmission_key` exists. Does not decode the
    /// row, so a corrupt row counts as existing.
    fn pending_transmission_exists(
        &self,
        scope: ScopeId,
        transmission_key: &PendingTransmissionKey,
    ) -> Result<bool, KVGetError> {
        let row = variables::pending_transmission_row(scope, transmission_key);
        for column in variables::TRANSMISSION_COLUMNS {
            let value = self.get(&concat(&row, &column)).map_err(|source| {
                KVGetError::BackendError {
                    key: Key::PendingTransmission {
                        scope,
                        key: *transmission_key,
                    },
                    source,
                }
            })?;
            if value.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Get the creation time of every pending transmission of `scope`, under any config digest, in key
    /// order.
    fn pending_transmission_times(
        &self,
        scope: ScopeId,
    ) -> Result<Vec<(PendingTransmissionKey, Timestamp)>, KVGetError> {
        let rows = pending_transmission_rows(self, scope, None)?;

        let mut times = Vec::with_capacity(rows.len());
        for (transmission_key, columns) in rows {
            let time = column(&columns, variables::TRANSMISSION_TIME, Field::Time)
                .and_then(|bytes| decode::<Timestamp>(bytes, Field::Time))
                .and_then(|time| system_time(time).map(|_| time))
                .map_err(|cause| KVGetError::CorruptValue {
                    key: Key::PendingTransmission {
                        scope,
                        key: transmission_key,
                    },
                    causes: vec![cause],
                })?;
            times.push((transmission_key, time));
        }

        Ok(times)
    }

    /* ↓↓↓ Latest Round Requested ↓↓↓ */

    fn latest_round_requested(
        &self,
        scope: ScopeId,
    ) -> Result<Option<RoundRequestedEvent>, KVGetError> {
        let key = || Key::LatestRoundRequested { scope };
        let row = variables::latest_round_requested_row(scope);
        let value = match self.get(&concat(&row, &variables::ROW_VALUE)) {
            Ok(Some(value)) => value,
            Ok(None) => return Ok(None),
            Err(source) => {
                return Err(KVGetError::BackendError {
                    key: key(),
                    source,
                })
            }
        };

        let event_bytes = decode::<RoundRequestedEventBytes>(&value, Field::RoundRequested)
            .map_err(|cause| KVGetError::CorruptValue {
                key: key(),
                causes: vec![cause],
            })?;
        RoundRequestedEvent::try_from(event_bytes)
            .map(Some)
            .map_err(|causes| KVGetError::CorruptValue { key: key(), causes })
    }
}

/// Error when trying to read a value from the [key value store][KVStore]. The error may arise in the
/// following circumstances:
/// 1. The key-value store itself failed the read,
/// 2. The value at a given key was found but violates its format, or a row is missing some of its
///    columns.
#[derive(Debug)]
pub enum KVGetError {
    BackendError { key: Key, source: BackendError },
    CorruptValue { key: Key, causes: Vec<Corruption> },
}

/// Logical location of a value, used to say where an error happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Key {
    PersistentState {
        scope: ScopeId,
        config_digest: ConfigDigest,
    },
    ContractConfig {
        scope: ScopeId,
    },
    PendingTransmission {
        scope: ScopeId,
        key: PendingTransmissionKey,
    },
    PendingTransmissions {
        scope: ScopeId,
        config_digest: Option<ConfigDigest>,
    },
    LatestRoundRequested {
        scope: ScopeId,
    },
    WriteBatch {
        scope: ScopeId,
    },
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Key::PersistentState {
                scope,
                config_digest,
            } => write!(
                f,
                "Persistent State for scope {} and config digest {}",
                scope, config_digest
            ),
            Key::ContractConfig { scope } => write!(f, "Contract Config for scope {}", scope),
            Key::PendingTransmission { scope, key } => {
                write!(f, "Pending Transmission {} for scope {}", key, scope)
            }
            Key::PendingTransmissions {
                scope,
                config_digest: Some(config_digest),
            } => write!(
                f,
                "Pending Transmissions for scope {} and config digest {}",
                scope, config_digest
            ),
            Key::PendingTransmissions {
                scope,
                config_digest: None,
            } => write!(f, "Pending Transmissions for scope {}", scope),
            Key::LatestRoundRequested { scope } => {
                write!(f, "Latest Round Requested for scope {}", scope)
            }
            Key::WriteBatch { scope } => write!(f, "Write Batch for scope {}", scope),
        }
    }
}

pub trait WriteBatch {
    fn new() -> Self;
    fn set(&mut self, key: &[u8], value: &[u8]);
    fn delete(&mut self, key: &[u8]);
}

enum RowRead {
    Absent,
    Present(Vec<u8>, Vec<u8>),
    Incomplete(Vec<Corruption>),
}

/// Read the value and updated-at columns of a row that has exactly those two columns. `value_field`
/// names the value column in the corruption reported if only the updated-at column exists.
fn single_value_row<G: KVGet + ?Sized>(
    kv: &G,
    row: &[u8],
    value_field: Field,
) -> Result<RowRead, BackendError> {
    let value = kv.get(&concat(row, &variables::ROW_VALUE))?;
    let updated_at = kv.get(&concat(row, &variables::ROW_UPDATED_AT))?;

    Ok(match (value, updated_at) {
        (None, None) => RowRead::Absent,
        (Some(value), Some(updated_at)) => RowRead::Present(value, updated_at),
        (None, Some(_)) => RowRead::Incomplete(vec![Corruption::MissingField {
            field: value_field,
        }]),
        (Some(_), None) => RowRead::Incomplete(vec![Corruption::MissingField {
            field: Field::UpdatedAt,
        }]),
    })
}

fn updated_at<G: KVGet + ?Sized>(
    kv: &G,
    row: &[u8],
    key: Key,
) -> Result<Option<Timestamp>, KVGetError> {
    match kv.get(&concat(row, &variables::ROW_UPDATED_AT)) {
        Ok(Some(bytes)) => decode::<Timestamp>(&bytes, Field::UpdatedAt)
            .map(Some)
            .map_err(|cause| KVGetError::CorruptValue {
                key,
                causes: vec![cause],
            }),
        Ok(None) => Ok(None),
        Err(source) => Err(KVGetError::BackendError { key, source }),
    }
}

/// Scan the pending transmissions of `scope` (narrowed to `config_digest` if `Some`) and group their
/// columns by row.
fn pending_transmission_rows<G: KVGet + ?Sized>(
    kv: &G,
    scope: ScopeId,
    config_digest: Option<&ConfigDigest>,
) -> Result<BTreeMap<PendingTransmissionKey, Columns>, KVGetError> {
    let key = || Key::PendingTransmissions {
        scope,
        config_digest: config_digest.copied(),
    };
    let table_prefix_len = variables::pending_transmissions_prefix(scope, None).len();
    let entries = kv
        .scan_prefix(&variables::pending_transmissions_prefix(scope, config_digest))
        .map_err(|source| KVGetError::BackendError {
            key: key(),
            source,
        })?;

    let mut rows: BTreeMap<PendingTransmissionKey, Columns> = BTreeMap::new();
    for (entry_key, value) in entries {
        let (transmission_key, column) =
            variables::parse_pending_transmission_key(&entry_key[table_prefix_len..]).map_err(
                |cause| KVGetError::CorruptValue {
                    key: key(),
                    causes: vec![cause],
                },
            )?;
        rows.entry(transmission_key)
            .or_default()
            .insert(column, value);
    }

    Ok(rows)
}

/// Decode the columns of one pending transmission row, collecting every violation found.
fn decode_pending_transmission(columns: &Columns) -> Result<PendingTransmission, Vec<Corruption>> {
    let mut causes = Vec::new();

    for column in columns.keys() {
        if !variables::TRANSMISSION_COLUMNS
            .iter()
            .any(|known| known[0] == *column)
        {
            causes.push(Corruption::UnexpectedColumn { column: *column });
        }
    }

    let time = column(columns, variables::TRANSMISSION_TIME, Field::Time)
        .and_then(|bytes| decode::<Timestamp>(bytes, Field::Time))
        .and_then(system_time)
        .map_err(|cause| causes.push(cause))
        .ok();

    let median = column(columns, variables::TRANSMISSION_MEDIAN, Field::Median)
        .and_then(|bytes| decode::<Vec<u8>>(bytes, Field::Median))
        .map(|bytes| median_from_bytes(&bytes))
        .map_err(|cause| causes.push(cause))
        .ok();

    let serialized_report = column(
        columns,
        variables::TRANSMISSION_SERIALIZED_REPORT,
        Field::SerializedReport,
    )
    .and_then(|bytes| decode::<Vec<u8>>(bytes, Field::SerializedReport))
    .map_err(|cause| causes.push(cause))
    .ok();

    let signatures = match column(columns, variables::TRANSMISSION_SIGNATURES, Field::Signatures)
        .and_then(|bytes| decode::<SignaturesBytes>(bytes, Field::Signatures))
    {
        Ok(signatures_bytes) => Signatures::try_from(signatures_bytes)
            .map_err(|signature_causes| causes.extend(signature_causes))
            .ok(),
        Err(cause) => {
            causes.push(cause);
            None
        }
    };

    if let Err(cause) = column(
        columns,
        variables::TRANSMISSION_UPDATED_AT,
        Field::UpdatedAt,
    )
    .and_then(|bytes| decode::<Timestamp>(bytes, Field::UpdatedAt))
    {
        causes.push(cause);
    }

    match (time, median, serialized_report, signatures) {
        (Some(time), Some(median), Some(serialized_report), Some(signatures))
            if causes.is_empty() =>
        {
            Ok(PendingTransmission {
                time,
                median,
                serialized_report,
                rs: signatures.rs,
                ss: signatures.ss,
                vs: signatures.vs,
            })
        }
        _ => Err(causes),
    }
}

/// Convert a stored creation time, rejecting one that `SystemTime` cannot represent.
fn system_time(time: Timestamp) -> Result<SystemTime, Corruption> {
    time.to_system_time()
        .ok_or(Corruption::OutOfRange { field: Field::Time })
}

fn column<'a>(columns: &'a Columns, column: [u8; 1], field: Field) -> Result<&'a [u8], Corruption> {
    columns
        .get(&column[0])
        .map(Vec::as_slice)
        .ok_or(Corruption::MissingField { field })
}

/// Borsh-deserialize `bytes`, rejecting trailing bytes.
fn decode<T: BorshDeserialize>(bytes: &[u8], field: Field) -> Result<T, Corruption> {
    T::try_from_slice(bytes).map_err(|source| Corruption::Undecodable { field, source })
}
