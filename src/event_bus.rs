/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Dispatch of [events](crate::events) to the handlers registered for them.
//!
//! Handlers run synchronously on the thread that committed the write, right after the commit returns.
//! A handler that blocks therefore delays the `OracleDb` operation that emitted the event.

use std::sync::Arc;

use crate::{events::*, logging::Logger};

/// Pointer to a handler closure. Shared between the clones of an [`OracleDb`](crate::database::OracleDb).
pub type HandlerPtr<T> = Arc<dyn Fn(&T) + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct EventHandlers {
    pub(crate) write_state_handlers: Vec<HandlerPtr<WriteStateEvent>>,
    pub(crate) write_config_handlers: Vec<HandlerPtr<WriteConfigEvent>>,
    pub(crate) store_transmission_handlers: Vec<HandlerPtr<StoreTransmissionEvent>>,
    pub(crate) delete_transmission_handlers: Vec<HandlerPtr<DeleteTransmissionEvent>>,
    pub(crate) prune_transmissions_handlers: Vec<HandlerPtr<PruneTransmissionsEvent>>,
    pub(crate) save_round_requested_handlers: Vec<HandlerPtr<SaveRoundRequestedEvent>>,
}

impl EventHandlers {
    /// Collect the user-provided handlers, adding the default [logger](crate::logging) for every event
    /// type if `log_events` is `true`.
    pub(crate) fn new(
        log_events: bool,
        write_state_handler: Option<HandlerPtr<WriteStateEvent>>,
        write_config_handler: Option<HandlerPtr<WriteConfigEvent>>,
        store_transmission_handler: Option<HandlerPtr<StoreTransmissionEvent>>,
        delete_transmission_handler: Option<HandlerPtr<DeleteTransmissionEvent>>,
        prune_transmissions_handler: Option<HandlerPtr<PruneTransmissionsEvent>>,
        save_round_requested_handler: Option<HandlerPtr<SaveRoundRequestedEvent>>,
    ) -> EventHandlers {
        EventHandlers {
            write_state_handlers: handlers(log_events, write_state_handler),
            write_config_handlers: handlers(log_events, write_config_handler),
            store_transmission_handlers: handlers(log_events, store_transmission_handler),
            delete_transmission_handlers: handlers(log_events, delete_transmission_handler),
            prune_transmissions_handlers: handlers(log_events, prune_transmissions_handler),
            save_round_requested_handlers: handlers(log_events, save_round_requested_handler),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.write_state_handlers.is_empty()
            && self.write_config_handlers.is_empty()
            && self.store_transmission_handlers.is_empty()
            && self.delete_transmission_handlers.is_empty()
            && self.prune_transmissions_handlers.is_empty()
            && self.save_round_requested_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::WriteState(write_state_event) => self
                .write_state_handlers
                .iter()
                .for_each(|handler| handler(&write_state_event)),

            Event::WriteConfig(write_config_event) => self
                .write_config_handlers
                .iter()
                .for_each(|handler| handler(&write_config_event)),

            Event::StoreTransmission(store_transmission_event) => self
                .store_transmission_handlers
                .iter()
                .for_each(|handler| handler(&store_transmission_event)),

            Event::DeleteTransmission(delete_transmission_event) => self
                .delete_transmission_handlers
                .iter()
                .for_each(|handler| handler(&delete_transmission_event)),

            Event::PruneTransmissions(prune_transmissions_event) => self
                .prune_transmissions_handlers
                .iter()
                .for_each(|handler| handler(&prune_transmissions_event)),

            Event::SaveRoundRequested(save_round_requested_event) => self
                .save_round_requested_handlers
                .iter()
                .for_each(|handler| handler(&save_round_requested_event)),
        }
    }
}

fn handlers<T: Logger>(log_events: bool, user_handler: Option<HandlerPtr<T>>) -> Vec<HandlerPtr<T>> {
    let mut handlers = Vec::new();
    if log_events {
        handlers.push(T::get_logger());
    }
    if let Some(handler) = user_handler {
        handlers.push(handler);
    }
    handlers
}
