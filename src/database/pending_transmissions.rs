/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The Pending Transmission Queue: reports that consensus has finalized, but that have not yet been
//! confirmed on-chain.
//!
//! # Lifecycle of a pending transmission
//!
//! 1. The transmitter [stores](OracleDb::store_pending_transmission) a report as soon as consensus
//!    finalizes it, before attempting to submit it.
//! 2. After a restart, the transmitter [loads](OracleDb::load_pending_transmissions) every report of the
//!    current config digest and resumes submitting them, without re-running consensus.
//! 3. Once a submission is confirmed, the transmitter
//!    [deletes](OracleDb::delete_pending_transmission) the report.
//! 4. Reports that are never confirmed (for example, because no other node ever finalized their round
//!    on-chain) are [garbage collected](OracleDb::delete_pending_transmissions_older_than) once they are
//!    older than a retention cutoff.
//!
//! Storing and deleting are idempotent, so both may be retried freely after a fault.
//!
//! # Corrupt rows
//!
//! A transmission with a different number of `rs` and `ss` values is refused when stored. A row whose
//! `rs`, `ss`, or `vs` does not have the exact length it must have is never returned truncated or
//! padded. Reading it returns a
//! [`CorruptionFault`](crate::error::OracleDbError::CorruptionFault) listing every violation in the row.

use std::{collections::HashMap, time::SystemTime};

use crate::{
    context::Context,
    error::{ConcurrentModification, OracleDbError, Operation},
    persistence::pluggables::{KVGet, KVStore, Key},
    types::{
        data_types::{ConfigDigest, Timestamp},
        pending_transmission::{PendingTransmission, PendingTransmissionKey},
    },
};

use super::{check_context, fault, read_fault, write_fault, OracleDb};

/// Number of times garbage collection selects expired rows again after they changed concurrently.
const MAX_PRUNE_ATTEMPTS: usize = 8;

impl<K: KVStore> OracleDb<K> {
    /// Insert `transmission` at `key`, replacing whatever was stored there before.
    ///
    /// A transmission whose `rs` and `ss` differ in length is refused with a `CorruptionFault`, and
    /// nothing is written.
    pub fn store_pending_transmission(
        &mut self,
        ctx: &Context,
        key: &PendingTransmissionKey,
        transmission: &PendingTransmission,
    ) -> Result<(), OracleDbError> {
        check_context(ctx, Operation::StorePendingTransmission)?;

        let mut wb = self.new_write_batch();
        wb.set_pending_transmission(key, transmission)
            .map_err(|err| write_fault(Operation::StorePendingTransmission, err))?;

        let fault_key = Key::PendingTransmission {
            scope: self.scope,
            key: *key,
        };
        self.commit(ctx, Operation::StorePendingTransmission, fault_key, wb)
    }

    /// Get the pending transmission at `key`, or `None` if there is none.
    pub fn pending_transmission(
        &self,
        ctx: &Context,
        key: &PendingTransmissionKey,
    ) -> Result<Option<PendingTransmission>, OracleDbError> {
        check_context(ctx, Operation::LoadPendingTransmission)?;
        self.kv_store
            .snapshot()
            .pending_transmission(self.scope, key)
            .map_err(|err| read_fault(Operation::LoadPendingTransmission, err))
    }

    /// Get every pending transmission finalized under `config_digest`. Transmissions of other config
    /// digests are not included.
    ///
    /// All rows are read from one snapshot. If any of them is corrupt, the whole load fails.
    pub fn load_pending_transmissions(
        &self,
        ctx: &Context,
        config_digest: &ConfigDigest,
    ) -> Result<HashMap<PendingTransmissionKey, PendingTransmission>, OracleDbError> {
        check_context(ctx, Operation::LoadPendingTransmissions)?;
        self.kv_store
            .snapshot()
            .pending_transmissions(self.scope, config_digest)
            .map_err(|err| read_fault(Operation::LoadPendingTransmissions, err))
    }

    /// Delete the pending transmission at `key`. Deleting a key that holds nothing succeeds.
    ///
    /// The emitted [`DeleteTransmissionEvent`](crate::events::DeleteTransmissionEvent) says whether
    /// the row existed. A corrupt row counts as existing and is deleted like any other.
    pub fn delete_pending_transmission(
        &mut self,
        ctx: &Context,
        key: &PendingTransmissionKey,
    ) -> Result<(), OracleDbError> {
        check_context(ctx, Operation::DeletePendingTransmission)?;

        let existed = self
            .kv_store
            .snapshot()
            .pending_transmission_exists(self.scope, key)
            .map_err(|err| read_fault(Operation::DeletePendingTransmission, err))?;

        let mut wb = self.new_write_batch();
        wb.delete_pending_transmission(key, existed);

        let fault_key = Key::PendingTransmission {
            scope: self.scope,
            key: *key,
        };
        self.commit(ctx, Operation::DeletePendingTransmission, fault_key, wb)
    }

    /// Delete every pending transmission of this scope, under any config digest, whose `time` is
    /// strictly before `cutoff`. Returns the number of transmissions deleted.
    ///
    /// The rows to delete are chosen from a snapshot, then deleted in one write that applies only if
    /// none of their `time` columns changed since. A transmission stored again with a newer `time` in
    /// between is therefore never deleted. If the write does not apply, the selection is redone, up to
    /// a fixed number of attempts after which a retryable `StorageFault` is returned.
    pub fn delete_pending_transmissions_older_than(
        &mut self,
        ctx: &Context,
        cutoff: SystemTime,
    ) -> Result<usize, OracleDbError> {
        let operation = Operation::DeletePendingTransmissionsOlderThan;
        let scope = self.scope;
        let fault_key = || Key::PendingTransmissions {
            scope,
            config_digest: None,
        };
        let cutoff_timestamp = Timestamp::from(cutoff);

        for _ in 0..MAX_PRUNE_ATTEMPTS {
            check_context(ctx, operation)?;

            // The snapshot is dropped at the end of this statement, before the commit below.
            let times = self
                .kv_store
                .snapshot()
                .pending_transmission_times(scope)
                .map_err(|err| read_fault(operation, err))?;

            let expired: Vec<(PendingTransmissionKey, Timestamp)> = times
                .into_iter()
                .filter(|(_, time)| *time < cutoff_timestamp)
                .collect();
            if expired.is_empty() {
                return Ok(0);
            }

            let mut wb = self.new_write_batch();
            let expected = wb
                .prune_pending_transmissions(&expired, cutoff)
                .map_err(|err| write_fault(operation, err))?;

            if self.commit_if_unchanged(ctx, operation, fault_key(), &expected, wb)? {
                return Ok(expired.len());
            }
            log::debug!(
                "{}, pending transmissions changed before they could be deleted, selecting again",
                operation
            );
        }

        Err(fault(OracleDbError::StorageFault {
            operation,
            key: fault_key(),
            source: Box::new(ConcurrentModification {
                attempts: MAX_PRUNE_ATTEMPTS,
            }),
        }))
    }
}
