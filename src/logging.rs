/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events and faults.
//!
//! Event logs are printed if the user enabled them via the database's
//! [configuration](crate::database::Configuration). Fault logs are always printed.
//!
//! This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Event log format
//!
//! Event logs are printed at the `info` level as CSVs (Comma Separated Values) with at least two
//! values. The first two values are always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [StoreTransmission](crate::events::StoreTransmissionEvent) is printed:
//!
//! ```text
//! StoreTransmission, 1701329264, fNGCJyk, 12, 3
//! ```
//!
//! In the snippet:
//! - The third value is the first seven characters of the Base64 encoding of the config digest.
//! - The fourth value is the epoch.
//! - The fifth value is the round.
//!
//! ## Fault log format
//!
//! A fault is printed right before it is returned to the caller, as the name of the
//! [operation](crate::error::Operation) that failed followed by the error message. Corruption faults
//! are printed at the `error` level, since they need operator attention. Other faults are printed at
//! the `warn` level.

use std::{sync::Arc, time::SystemTime};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use log;

use crate::{error::OracleDbError, event_bus::HandlerPtr, events::*};

// Names of each event in PascalCase for printing:
pub const WRITE_STATE: &str = "WriteState";
pub const WRITE_CONFIG: &str = "WriteConfig";

pub const STORE_TRANSMISSION: &str = "StoreTransmission";
pub const DELETE_TRANSMISSION: &str = "DeleteTransmission";
pub const PRUNE_TRANSMISSIONS: &str = "PruneTransmissions";

pub const SAVE_ROUND_REQUESTED: &str = "SaveRoundRequested";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> HandlerPtr<Self>;
}

impl Logger for WriteStateEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |write_state_event: &WriteStateEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                WRITE_STATE,
                secs_since_unix_epoch(write_state_event.timestamp),
                first_seven_base64_chars(&write_state_event.config_digest.bytes()),
                write_state_event.state.epoch,
                write_state_event.state.highest_sent_epoch
            )
        };
        Arc::new(logger)
    }
}

impl Logger for WriteConfigEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |write_config_event: &WriteConfigEvent| {
            log::info!(
                "{}, {}, {}, {}",
                WRITE_CONFIG,
                secs_since_unix_epoch(write_config_event.timestamp),
                first_seven_base64_chars(&write_config_event.config_digest.bytes()),
                write_config_event.encoded_config_version
            )
        };
        Arc::new(logger)
    }
}

impl Logger for StoreTransmissionEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |store_transmission_event: &StoreTransmissionEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                STORE_TRANSMISSION,
                secs_since_unix_epoch(store_transmission_event.timestamp),
                first_seven_base64_chars(&store_transmission_event.key.config_digest.bytes()),
                store_transmission_event.key.epoch,
                store_transmission_event.key.round
            )
        };
        Arc::new(logger)
    }
}

impl Logger for DeleteTransmissionEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |delete_transmission_event: &DeleteTransmissionEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                DELETE_TRANSMISSION,
                secs_since_unix_epoch(delete_transmission_event.timestamp),
                first_seven_base64_chars(&delete_transmission_event.key.config_digest.bytes()),
                delete_transmission_event.key.epoch,
                delete_transmission_event.key.round,
                delete_transmission_event.existed
            )
        };
        Arc::new(logger)
    }
}

impl Logger for PruneTransmissionsEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |prune_transmissions_event: &PruneTransmissionsEvent| {
            log::info!(
                "{}, {}, {}, {}",
                PRUNE_TRANSMISSIONS,
                secs_since_unix_epoch(prune_transmissions_event.timestamp),
                secs_since_unix_epoch(prune_transmissions_event.cutoff),
                prune_transmissions_event.deleted
            )
        };
        Arc::new(logger)
    }
}

impl Logger for SaveRoundRequestedEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |save_round_requested_event: &SaveRoundRequestedEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                SAVE_ROUND_REQUESTED,
                secs_since_unix_epoch(save_round_requested_event.timestamp),
                first_seven_base64_chars(&save_round_requested_event.requester.bytes()),
                first_seven_base64_chars(&save_round_requested_event.config_digest.bytes()),
                save_round_requested_event.epoch,
                save_round_requested_event.round
            )
        };
        Arc::new(logger)
    }
}

/// Log `fault` at the level its kind calls for.
pub(crate) fn log_fault(fault: &OracleDbError) {
    match fault {
        OracleDbError::CorruptionFault { operation, .. } => {
            log::error!("{}, {}", operation, fault)
        }
        OracleDbError::StorageFault { operation, .. }
        | OracleDbError::CancelledFault { operation, .. } => {
            log::warn!("{}, {}", operation, fault)
        }
    }
}

fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

/// Seconds since the Unix Epoch, or zero for times before it.
fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
