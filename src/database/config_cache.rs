/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The Config Cache: the scope's latest [`ContractConfig`], so that a restarted node does not have to
//! read it from the chain.

use crate::{
    context::Context,
    error::{OracleDbError, Operation},
    persistence::pluggables::{KVGet, KVStore, Key},
    types::{contract_config::ContractConfig, data_types::Timestamp},
};

use super::{check_context, read_fault, write_fault, OracleDb};

impl<K: KVStore> OracleDb<K> {
    pub fn read_config(&self, ctx: &Context) -> Result<Option<ContractConfig>, OracleDbError> {
        check_context(ctx, Operation::ReadConfig)?;
        self.kv_store
            .snapshot()
            .contract_config(self.scope)
            .map_err(|err| read_fault(Operation::ReadConfig, err))
    }

    /// Replace the cached contract config with `config`, signer and transmitter lists included.
    pub fn write_config(&mut self, ctx: &Context, config: &ContractConfig) -> Result<(), OracleDbError> {
        check_context(ctx, Operation::WriteConfig)?;

        let mut wb = self.new_write_batch();
        wb.set_contract_config(config)
            .map_err(|err| write_fault(Operation::WriteConfig, err))?;

        let key = Key::ContractConfig { scope: self.scope };
        self.commit(ctx, Operation::WriteConfig, key, wb)
    }

    pub fn config_updated_at(&self, ctx: &Context) -> Result<Option<Timestamp>, OracleDbError> {
        check_context(ctx, Operation::ReadConfigUpdatedAt)?;
        self.kv_store
            .snapshot()
            .contract_config_updated_at(self.scope)
            .map_err(|err| read_fault(Operation::ReadConfigUpdatedAt, err))
    }
}
