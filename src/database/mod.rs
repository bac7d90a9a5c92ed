/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The scope-bound store instance, [`OracleDb`], and its [`Configuration`].
//!
//! `OracleDb`'s methods are grouped into four `impl` blocks, one per record it keeps, each defined in
//! its own submodule:
//! 1. [State Store](state_store).
//! 2. [Config Cache](config_cache).
//! 3. [Pending Transmission Queue](pending_transmissions).
//! 4. [Round-Request Log](round_requests).
//!
//! ## Creating an `OracleDb`
//!
//! ```ignore
//! let configuration =
//!     Configuration::builder()
//!     .scope(ScopeId::new(7))
//!     .log_events(true)
//!     .on_store_transmission(store_transmission_handler)
//!     .build();
//!
//! let db = OracleDb::new(kv_store, configuration);
//! ```
//!
//! ### Required setters
//! - `.scope(...)`
//! - `.log_events(...)`
//!
//! ### Optional setters
//!
//! The optional setters are for registering user-defined event handlers for events from
//! [crate::events]:
//! - `.on_write_state(...)`
//! - `.on_write_config(...)`
//! - `.on_store_transmission(...)`
//! - `.on_delete_transmission(...)`
//! - `.on_prune_transmissions(...)`
//! - `.on_save_round_requested(...)`
//!
//! ## Lifecycle
//!
//! An `OracleDb` lives as long as the oracle job it belongs to. It holds no state of its own besides
//! its scope and handlers: every read goes to the key-value store, and every write is committed before
//! the method that made it returns. Clone it to give each subsystem of the job its own handle.

use std::sync::Arc;

use typed_builder::TypedBuilder;

use crate::{
    context::Context,
    error::{OracleDbError, Operation},
    event_bus::{EventHandlers, HandlerPtr},
    events::*,
    logging::log_fault,
    persistence::{
        pluggables::{KVGetError, KVStore, Key},
        write_batch::{KVSetError, OracleDbWriteBatch},
    },
    types::data_types::ScopeId,
};

pub mod config_cache;

pub mod pending_transmissions;

pub mod round_requests;

pub mod state_store;

/// Stores the user-defined parameters of an [`OracleDb`], that is:
/// 1. The [scope](ScopeId) every row read or written by the database is keyed under.
/// 2. The "Log Events" flag. If set to `true`, every committed write is logged.
/// 3. Optional handlers to be invoked after every committed write of a given kind.
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.scope(...)`
    - `.log_events(...)`

    Optional:
    - `.on_write_state(...)`
    - `.on_write_config(...)`
    - `.on_store_transmission(...)`
    - `.on_delete_transmission(...)`
    - `.on_prune_transmissions(...)`
    - `.on_save_round_requested(...)`
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the scope of the oracle job the database belongs to. Required."))]
    pub scope: ScopeId,
    #[builder(setter(doc = "Enable logging of committed writes? Required."))]
    pub log_events: bool,
    #[builder(default, setter(transform = |handler: impl Fn(&WriteStateEvent) + Send + Sync + 'static| Some(Arc::new(handler) as HandlerPtr<WriteStateEvent>),
    doc = "Register a handler closure to be invoked after a persistent state is written. Optional."))]
    on_write_state: Option<HandlerPtr<WriteStateEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&WriteConfigEvent) + Send + Sync + 'static| Some(Arc::new(handler) as HandlerPtr<WriteConfigEvent>),
    doc = "Register a handler closure to be invoked after the cached contract config is replaced. Optional."))]
    on_write_config: Option<HandlerPtr<WriteConfigEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&StoreTransmissionEvent) + Send + Sync + 'static| Some(Arc::new(handler) as HandlerPtr<StoreTransmissionEvent>),
    doc = "Register a handler closure to be invoked after a pending transmission is stored. Optional."))]
    on_store_transmission: Option<HandlerPtr<StoreTransmissionEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&DeleteTransmissionEvent) + Send + Sync + 'static| Some(Arc::new(handler) as HandlerPtr<DeleteTransmissionEvent>),
    doc = "Register a handler closure to be invoked after a pending transmission is deleted. Optional."))]
    on_delete_transmission: Option<HandlerPtr<DeleteTransmissionEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&PruneTransmissionsEvent) + Send + Sync + 'static| Some(Arc::new(handler) as HandlerPtr<PruneTransmissionsEvent>),
    doc = "Register a handler closure to be invoked after old pending transmissions are garbage collected. Optional."))]
    on_prune_transmissions: Option<HandlerPtr<PruneTransmissionsEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&SaveRoundRequestedEvent) + Send + Sync + 'static| Some(Arc::new(handler) as HandlerPtr<SaveRoundRequestedEvent>),
    doc = "Register a handler closure to be invoked after the latest round requested is saved. Optional."))]
    on_save_round_requested: Option<HandlerPtr<SaveRoundRequestedEvent>>,
}

/// Handle to the four records an oracle job keeps in a key-value store, bound to the job's scope.
///
/// Every method takes a [`Context`]. See [the `context` module](crate::context) for how cancellation
/// interacts with reads and writes.
#[derive(Clone)]
pub struct OracleDb<K: KVStore> {
    kv_store: K,
    scope: ScopeId,
    event_handlers: EventHandlers,
}

/// Lifecycle methods, and caller-composed write batches.
impl<K: KVStore> OracleDb<K> {
    /// Create a new `OracleDb` on top of `kv_store`, bound to `configuration.scope`.
    pub fn new(kv_store: K, configuration: Configuration) -> Self {
        let event_handlers = EventHandlers::new(
            configuration.log_events,
            configuration.on_write_state,
            configuration.on_write_config,
            configuration.on_store_transmission,
            configuration.on_delete_transmission,
            configuration.on_prune_transmissions,
            configuration.on_save_round_requested,
        );

        OracleDb {
            kv_store,
            scope: configuration.scope,
            event_handlers,
        }
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Create an empty write batch bound to this database's scope.
    ///
    /// Stage changes on it with its setters (and, for keys of the caller's own, through
    /// [`inner_mut`](OracleDbWriteBatch::inner_mut)), then commit them all at once with
    /// [`write`](Self::write).
    pub fn new_write_batch(&self) -> OracleDbWriteBatch<K::WriteBatch> {
        OracleDbWriteBatch::new(self.scope)
    }

    /// Atomically commit every change staged in `write_batch`, then emit the events of the changes.
    pub fn write(
        &mut self,
        ctx: &Context,
        write_batch: OracleDbWriteBatch<K::WriteBatch>,
    ) -> Result<(), OracleDbError> {
        let key = Key::WriteBatch { scope: self.scope };
        self.commit(ctx, Operation::WriteBatch, key, write_batch)
    }

    /// Check `ctx` one last time, then hand `write_batch` to the key-value store.
    ///
    /// Events are fired only if the key-value store reports success.
    pub(crate) fn commit(
        &mut self,
        ctx: &Context,
        operation: Operation,
        key: Key,
        write_batch: OracleDbWriteBatch<K::WriteBatch>,
    ) -> Result<(), OracleDbError> {
        check_context(ctx, operation)?;

        let (wb, events) = write_batch.into_parts();
        self.kv_store.write(wb).map_err(|source| {
            fault(OracleDbError::StorageFault {
                operation,
                key,
                source,
            })
        })?;

        self.fire_events(events);
        Ok(())
    }

    /// Like [`commit`](Self::commit), but the batch is applied only if every key in `expected` still
    /// holds the value paired with it. Returns whether the batch was applied. Events are fired only if
    /// it was.
    pub(crate) fn commit_if_unchanged(
        &mut self,
        ctx: &Context,
        operation: Operation,
        key: Key,
        expected: &[(Vec<u8>, Option<Vec<u8>>)],
        write_batch: OracleDbWriteBatch<K::WriteBatch>,
    ) -> Result<bool, OracleDbError> {
        check_context(ctx, operation)?;

        let (wb, events) = write_batch.into_parts();
        let applied = self
            .kv_store
            .write_if_unchanged(expected, wb)
            .map_err(|source| {
                fault(OracleDbError::StorageFault {
                    operation,
                    key,
                    source,
                })
            })?;

        if applied {
            self.fire_events(events);
        }
        Ok(applied)
    }

    fn fire_events(&self, events: Vec<Event>) {
        if !self.event_handlers.is_empty() {
            for event in events {
                self.event_handlers.fire_handlers(event);
            }
        }
    }
}

/// Return `CancelledFault` if `ctx` is done.
pub(crate) fn check_context(ctx: &Context, operation: Operation) -> Result<(), OracleDbError> {
    match ctx.err() {
        Some(reason) => Err(fault(OracleDbError::CancelledFault { operation, reason })),
        None => Ok(()),
    }
}

/// Log `error`, then return it.
pub(crate) fn fault(error: OracleDbError) -> OracleDbError {
    log_fault(&error);
    error
}

/// Convert a failed read into the fault returned by `operation`.
pub(crate) fn read_fault(operation: Operation, err: KVGetError) -> OracleDbError {
    fault(match err {
        KVGetError::BackendError { key, source } => OracleDbError::StorageFault {
            operation,
            key,
            source,
        },
        KVGetError::CorruptValue { key, causes } => OracleDbError::CorruptionFault {
            operation,
            key,
            causes,
        },
    })
}

/// Convert a value that could not be staged into the fault returned by `operation`.
pub(crate) fn write_fault(operation: Operation, err: KVSetError) -> OracleDbError {
    fault(match err {
        KVSetError::SerializeValueError { key, source } => OracleDbError::StorageFault {
            operation,
            key,
            source: Box::new(source),
        },
        KVSetError::InvalidValue { key, causes } => OracleDbError::CorruptionFault {
            operation,
            key,
            causes,
        },
    })
}
