/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The Round-Request Log: the last "new round requested" event the chain log consumer saw, so that it
//! can resume scanning from there after a restart.
//!
//! The log consumer usually records its resumption point together with bookkeeping of its own. To do so
//! atomically, stage the event with
//! [`OracleDbWriteBatch::set_latest_round_requested`](crate::persistence::write_batch::OracleDbWriteBatch::set_latest_round_requested)
//! on a batch from [`OracleDb::new_write_batch`], add the other changes through
//! [`inner_mut`](crate::persistence::write_batch::OracleDbWriteBatch::inner_mut), and commit with
//! [`OracleDb::write`].

use crate::{
    context::Context,
    error::{OracleDbError, Operation},
    persistence::pluggables::{KVGet, KVStore, Key},
    types::round_requested::RoundRequestedEvent,
};

use super::{check_context, read_fault, write_fault, OracleDb};

impl<K: KVStore> OracleDb<K> {
    /// Replace the saved event with `event`.
    pub fn save_latest_round_requested(
        &mut self,
        ctx: &Context,
        event: &RoundRequestedEvent,
    ) -> Result<(), OracleDbError> {
        check_context(ctx, Operation::SaveLatestRoundRequested)?;

        let mut wb = self.new_write_batch();
        wb.set_latest_round_requested(event)
            .map_err(|err| write_fault(Operation::SaveLatestRoundRequested, err))?;

        let key = Key::LatestRoundRequested { scope: self.scope };
        self.commit(ctx, Operation::SaveLatestRoundRequested, key, wb)
    }

    /// Get the most recently saved event, or `None` if none was ever saved.
    pub fn load_latest_round_requested(
        &self,
        ctx: &Context,
    ) -> Result<Option<RoundRequestedEvent>, OracleDbError> {
        check_context(ctx, Operation::LoadLatestRoundRequested)?;
        self.kv_store
            .snapshot()
            .latest_round_requested(self.scope)
            .map_err(|err| read_fault(Operation::LoadLatestRoundRequested, err))
    }
}
