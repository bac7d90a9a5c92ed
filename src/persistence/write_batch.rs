/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Typed write batch that forms keys and serializes values for the caller.

use std::time::SystemTime;

use borsh::BorshSerialize;

use crate::{
    error::Corruption,
    events::{
        DeleteTransmissionEvent, Event, PruneTransmissionsEvent, SaveRoundRequestedEvent,
        StoreTransmissionEvent, WriteConfigEvent, WriteStateEvent,
    },
    types::{
        contract_config::{ContractConfig, ContractConfigBytes},
        data_types::{ConfigDigest, ScopeId, Timestamp},
        pending_transmission::{
            median_to_bytes, PendingTransmission, PendingTransmissionKey, SignaturesBytes,
        },
        persistent_state::PersistentState,
        round_requested::{RoundRequestedEvent, RoundRequestedEventBytes},
    },
};

use super::{
    pluggables::{Key, WriteBatch},
    variables::{self, concat},
};

/// A set of changes to the rows of one scope, applied atomically by
/// [`OracleDb::write`](crate::database::OracleDb::write).
///
/// Every setter serializes all of its values before touching the inner `W`, so a setter that returns
/// `Err` leaves the batch as it was.
///
/// Besides the changes, the batch remembers one [`Event`] per change, to be emitted once (and only if)
/// the batch is committed.
pub struct OracleDbWriteBatch<W: WriteBatch> {
    wb: W,
    scope: ScopeId,
    events: Vec<Event>,
}

impl<W: WriteBatch> OracleDbWriteBatch<W> {
    pub(crate) fn new(scope: ScopeId) -> OracleDbWriteBatch<W> {
        OracleDbWriteBatch {
            wb: W::new(),
            scope,
            events: Vec::new(),
        }
    }

    /// Get the scope every row written by this batch is keyed under.
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Get the underlying `WriteBatch`, to add changes to keys of the caller's own that must commit
    /// atomically with the changes in this batch.
    pub fn inner_mut(&mut self) -> &mut W {
        &mut self.wb
    }

    pub(crate) fn into_parts(self) -> (W, Vec<Event>) {
        (self.wb, self.events)
    }

    /* ↓↓↓ Persistent States ↓↓↓ */

    pub fn set_persistent_state(
        &mut self,
        config_digest: &ConfigDigest,
        state: &PersistentState,
    ) -> Result<(), KVSetError> {
        let key = || Key::PersistentState {
            scope: self.scope,
            config_digest: *config_digest,
        };
        let value = serialize(state, key)?;
        let updated_at = serialize(&Timestamp::now(), key)?;

        let row = variables::persistent_state_row(self.scope, config_digest);
        self.wb.set(&concat(&row, &variables::ROW_VALUE), &value);
        self.wb.set(&concat(&row, &variables::ROW_UPDATED_AT), &updated_at);

        self.events.push(Event::WriteState(WriteStateEvent {
            timestamp: SystemTime::now(),
            config_digest: *config_digest,
            state: state.clone(),
        }));
        Ok(())
    }

    /* ↓↓↓ Contract Configs ↓↓↓ */

    pub fn set_contract_config(&mut self, config: &ContractConfig) -> Result<(), KVSetError> {
        let key = || Key::ContractConfig { scope: self.scope };
        let value = serialize(&ContractConfigBytes::from(config), key)?;
        let updated_at = serialize(&Timestamp::now(), key)?;

        let row = variables::contract_config_row(self.scope);
        self.wb.set(&concat(&row, &variables::ROW_VALUE), &value);
        self.wb.set(&concat(&row, &variables::ROW_UPDATED_AT), &updated_at);

        self.events.push(Event::WriteConfig(WriteConfigEvent {
            timestamp: SystemTime::now(),
            config_digest: config.config_digest,
            encoded_config_version: config.encoded_config_version,
        }));
        Ok(())
    }

    /* ↓↓↓ Pending Transmissions ↓↓↓ */

    pub fn set_pending_transmission(
        &mut self,
        transmission_key: &PendingTransmissionKey,
        transmission: &PendingTransmission,
    ) -> Result<(), KVSetError> {
        let key = || Key::PendingTransmission {
            scope: self.scope,
            key: *transmission_key,
        };
        if transmission.rs.len() != transmission.ss.len() {
            return Err(KVSetError::InvalidValue {
                key: key(),
                causes: vec![Corruption::SignatureCountMismatch {
                    rs: transmission.rs.len(),
                    ss: transmission.ss.len(),
                }],
            });
        }

        let time = serialize(&Timestamp::from(transmission.time), key)?;
        let median = serialize(&median_to_bytes(&transmission.median), key)?;
        let serialized_report = serialize(&transmission.serialized_report, key)?;
        let signatures = serialize(&SignaturesBytes::from(transmission), key)?;
        let updated_at = serialize(&Timestamp::now(), key)?;

        let row = variables::pending_transmission_row(self.scope, transmission_key);
        self.wb.set(&concat(&row, &variables::TRANSMISSION_TIME), &time);
        self.wb.set(&concat(&row, &variables::TRANSMISSION_MEDIAN), &median);
        self.wb.set(
            &concat(&row, &variables::TRANSMISSION_SERIALIZED_REPORT),
            &serialized_report,
        );
        self.wb.set(
            &concat(&row, &variables::TRANSMISSION_SIGNATURES),
            &signatures,
        );
        self.wb.set(
            &concat(&row, &variables::TRANSMISSION_UPDATED_AT),
            &updated_at,
        );

        self.events
            .push(Event::StoreTransmission(StoreTransmissionEvent {
                timestamp: SystemTime::now(),
                key: *transmission_key,
            }));
        Ok(())
    }

    /// Delete every column of the pending transmission at `transmission_key`. Deleting a row that does
    /// not exist is not an error. `existed` is passed on to the emitted event.
    pub(crate) fn delete_pending_transmission(
        &mut self,
        transmission_key: &PendingTransmissionKey,
        existed: bool,
    ) {
        self.delete_pending_transmission_row(transmission_key);

        self.events
            .push(Event::DeleteTransmission(DeleteTransmissionEvent {
                timestamp: SystemTime::now(),
                key: *transmission_key,
                existed,
            }));
    }

    /// Delete the pending transmissions in `expired` as one garbage collection pass, which emits a
    /// single event instead of one per row.
    ///
    /// Returns, for each row, its time column key paired with the value it held when the row was
    /// selected. Commit the batch with `KVStore::write_if_unchanged` on these, so that a row stored
    /// again with a different time after it was selected is not deleted.
    pub(crate) fn prune_pending_transmissions(
        &mut self,
        expired: &[(PendingTransmissionKey, Timestamp)],
        cutoff: SystemTime,
    ) -> Result<Vec<(Vec<u8>, Option<Vec<u8>>)>, KVSetError> {
        let mut expected = Vec::with_capacity(expired.len());
        for (transmission_key, time) in expired {
            let time = serialize(time, || Key::PendingTransmission {
                scope: self.scope,
                key: *transmission_key,
            })?;
            let row = variables::pending_transmission_row(self.scope, transmission_key);
            expected.push((concat(&row, &variables::TRANSMISSION_TIME), Some(time)));
        }

        for (transmission_key, _) in expired {
            self.delete_pending_transmission_row(transmission_key);
        }

        self.events
            .push(Event::PruneTransmissions(PruneTransmissionsEvent {
                timestamp: SystemTime::now(),
                cutoff,
                deleted: expired.len(),
            }));
        Ok(expected)
    }

    fn delete_pending_transmission_row(&mut self, transmission_key: &PendingTransmissionKey) {
        let row = variables::pending_transmission_row(self.scope, transmission_key);
        for column in variables::TRANSMISSION_COLUMNS {
            self.wb.delete(&concat(&row, &column));
        }
    }

    /* ↓↓↓ Latest Round Requested ↓↓↓ */

    pub fn set_latest_round_requested(
        &mut self,
        event: &RoundRequestedEvent,
    ) -> Result<(), KVSetError> {
        let value = serialize(&RoundRequestedEventBytes::from(event), || {
            Key::LatestRoundRequested { scope: self.scope }
        })?;

        let row = variables::latest_round_requested_row(self.scope);
        self.wb.set(&concat(&row, &variables::ROW_VALUE), &value);

        self.events
            .push(Event::SaveRoundRequested(SaveRoundRequestedEvent {
                timestamp: SystemTime::now(),
                requester: event.requester,
                config_digest: event.config_digest,
                epoch: event.epoch,
                round: event.round,
            }));
        Ok(())
    }
}

fn serialize<T: BorshSerialize>(value: &T, key: impl FnOnce() -> Key) -> Result<Vec<u8>, KVSetError> {
    value
        .try_to_vec()
        .map_err(|source| KVSetError::SerializeValueError { key: key(), source })
}

/// Error when trying to stage a value into an [`OracleDbWriteBatch`]. The error may arise in the
/// following circumstances:
/// 1. The value could not be serialized,
/// 2. The value would be rejected as corrupt when read back, so it is never written.
#[derive(Debug)]
pub enum KVSetError {
    SerializeValueError { key: Key, source: std::io::Error },
    InvalidValue { key: Key, causes: Vec<Corruption> },
}
