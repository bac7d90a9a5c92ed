/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The State Store: one [`PersistentState`] per config digest.
//!
//! The consensus engine reads its epoch watermarks from here when it starts on a config digest, and
//! writes them back every time they advance. Losing a write silently would let a restarted node sign
//! messages for an epoch it already took part in, so every failure is returned.

use crate::{
    context::Context,
    error::{OracleDbError, Operation},
    persistence::pluggables::{KVGet, KVStore, Key},
    types::{
        data_types::{ConfigDigest, Timestamp},
        persistent_state::PersistentState,
    },
};

use super::{check_context, read_fault, write_fault, OracleDb};

impl<K: KVStore> OracleDb<K> {
    /// Get the persistent state for `config_digest`, or `None` if none was ever written. The latter is
    /// expected on the first run with a new config digest.
    pub fn read_state(
        &self,
        ctx: &Context,
        config_digest: &ConfigDigest,
    ) -> Result<Option<PersistentState>, OracleDbError> {
        check_context(ctx, Operation::ReadState)?;
        self.kv_store
            .snapshot()
            .persistent_state(self.scope, config_digest)
            .map_err(|err| read_fault(Operation::ReadState, err))
    }

    /// Insert or wholly replace the persistent state for `config_digest`.
    ///
    /// Writes are last-writer-wins. The consensus engine is assumed to be the only writer of a given
    /// config digest's state.
    pub fn write_state(
        &mut self,
        ctx: &Context,
        config_digest: &ConfigDigest,
        state: &PersistentState,
    ) -> Result<(), OracleDbError> {
        check_context(ctx, Operation::WriteState)?;

        let mut wb = self.new_write_batch();
        wb.set_persistent_state(config_digest, state)
            .map_err(|err| write_fault(Operation::WriteState, err))?;

        let key = Key::PersistentState {
            scope: self.scope,
            config_digest: *config_digest,
        };
        self.commit(ctx, Operation::WriteState, key, wb)
    }

    /// Get when the persistent state for `config_digest` was last written, or `None` if it never was.
    pub fn state_updated_at(
        &self,
        ctx: &Context,
        config_digest: &ConfigDigest,
    ) -> Result<Option<Timestamp>, OracleDbError> {
        check_context(ctx, Operation::ReadStateUpdatedAt)?;
        self.kv_store
            .snapshot()
            .persistent_state_updated_at(self.scope, config_digest)
            .map_err(|err| read_fault(Operation::ReadStateUpdatedAt, err))
    }
}
