/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Errors returned by [`OracleDb`](crate::database::OracleDb) operations.
//!
//! # Taxonomy
//!
//! |Error|Cause|Retry?|
//! |---|---|---|
//! |[`StorageFault`](OracleDbError::StorageFault)|The key-value store failed a read or a write, a value could not be serialized, or rows kept changing concurrently.|Yes, at the caller's discretion.|
//! |[`CorruptionFault`](OracleDbError::CorruptionFault)|A stored value violates the format it must have been written in, or a value passed to a write would violate it and was not written.|No. The row (or the caller's value) needs attention.|
//! |[`CancelledFault`](OracleDbError::CancelledFault)|The caller's [`Context`](crate::context::Context) was cancelled or expired.|Yes.|
//!
//! A row that does not exist is not an error: single-row reads return `Ok(None)`.
//!
//! Nothing in this crate retries. Every error is returned to the immediate caller together with the
//! [`Operation`] that failed.

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

use crate::{
    context::CancelReason,
    persistence::pluggables::{BackendError, Key},
};

#[derive(Debug, Error)]
pub enum OracleDbError {
    #[error("{operation} failed: storage fault at {key}: {source}")]
    StorageFault {
        operation: Operation,
        key: Key,
        source: BackendError,
    },

    #[error("{operation} failed: corrupt value at {key}: {}", DisplayCauses(.causes))]
    CorruptionFault {
        operation: Operation,
        key: Key,
        causes: Vec<Corruption>,
    },

    #[error("{operation} failed: {reason}")]
    CancelledFault {
        operation: Operation,
        reason: CancelReason,
    },
}

impl OracleDbError {
    /// Get the operation that failed.
    pub fn operation(&self) -> Operation {
        match self {
            OracleDbError::StorageFault { operation, .. }
            | OracleDbError::CorruptionFault { operation, .. }
            | OracleDbError::CancelledFault { operation, .. } => *operation,
        }
    }

    /// Whether the caller may retry the operation that returned this error.
    ///
    /// Corrupt rows stay corrupt no matter how many times they are read.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, OracleDbError::CorruptionFault { .. })
    }
}

/// Operations exposed by [`OracleDb`](crate::database::OracleDb), named in PascalCase for errors and
/// logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    ReadState,
    WriteState,
    ReadStateUpdatedAt,
    ReadConfig,
    WriteConfig,
    ReadConfigUpdatedAt,
    StorePendingTransmission,
    LoadPendingTransmission,
    LoadPendingTransmissions,
    DeletePendingTransmission,
    DeletePendingTransmissionsOlderThan,
    SaveLatestRoundRequested,
    LoadLatestRoundRequested,
    WriteBatch,
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::ReadState => "ReadState",
            Operation::WriteState => "WriteState",
            Operation::ReadStateUpdatedAt => "ReadStateUpdatedAt",
            Operation::ReadConfig => "ReadConfig",
            Operation::WriteConfig => "WriteConfig",
            Operation::ReadConfigUpdatedAt => "ReadConfigUpdatedAt",
            Operation::StorePendingTransmission => "StorePendingTransmission",
            Operation::LoadPendingTransmission => "LoadPendingTransmission",
            Operation::LoadPendingTransmissions => "LoadPendingTransmissions",
            Operation::DeletePendingTransmission => "DeletePendingTransmission",
            Operation::DeletePendingTransmissionsOlderThan => "DeletePendingTransmissionsOlderThan",
            Operation::SaveLatestRoundRequested => "SaveLatestRoundRequested",
            Operation::LoadLatestRoundRequested => "LoadLatestRoundRequested",
            Operation::WriteBatch => "WriteBatch",
        };
        f.write_str(name)
    }
}

/// Source of the [`StorageFault`](OracleDbError::StorageFault) returned when rows kept changing
/// between being read and being conditionally written, on every attempt.
#[derive(Debug, Error)]
#[error("rows changed concurrently in each of {attempts} attempts")]
pub struct ConcurrentModification {
    pub attempts: usize,
}

/// One way in which a stored value violates its format.
///
/// Decoding a row does not stop at the first violation. All violations found in the row are returned
/// together in [`CorruptionFault`](OracleDbError::CorruptionFault)'s `causes`.
#[derive(Debug, Error)]
pub enum Corruption {
    #[error("expected {expected} bytes for {field}, got {actual} bytes")]
    WrongLength {
        field: Field,
        expected: usize,
        actual: usize,
    },

    #[error("got {rs} rs values but {ss} ss values")]
    SignatureCountMismatch { rs: usize, ss: usize },

    #[error("{field} is missing")]
    MissingField { field: Field },

    #[error("{field} is out of range")]
    OutOfRange { field: Field },

    #[error("unexpected column {column} in row")]
    UnexpectedColumn { column: u8 },

    #[error("{field} cannot be deserialized: {source}")]
    Undecodable {
        field: Field,
        source: std::io::Error,
    },
}

/// A field of a stored row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    RowKey,
    PersistentState,
    ContractConfig,
    ConfigDigest,
    Signer(usize),
    Transmitter(usize),
    UpdatedAt,
    Time,
    Median,
    SerializedReport,
    Signatures,
    Rs(usize),
    Ss(usize),
    Vs,
    RoundRequested,
    Requester,
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Field::RowKey => write!(f, "row key"),
            Field::PersistentState => write!(f, "persistent state"),
            Field::ContractConfig => write!(f, "contract config"),
            Field::ConfigDigest => write!(f, "config digest"),
            Field::Signer(index) => write!(f, "signer at index {}", index),
            Field::Transmitter(index) => write!(f, "transmitter at index {}", index),
            Field::UpdatedAt => write!(f, "updated at"),
            Field::Time => write!(f, "time"),
            Field::Median => write!(f, "median"),
            Field::SerializedReport => write!(f, "serialized report"),
            Field::Signatures => write!(f, "signatures"),
            Field::Rs(index) => write!(f, "rs value at index {}", index),
            Field::Ss(index) => write!(f, "ss value at index {}", index),
            Field::Vs => write!(f, "vs"),
            Field::RoundRequested => write!(f, "round requested"),
            Field::Requester => write!(f, "requester"),
        }
    }
}

struct DisplayCauses<'a>(&'a Vec<Corruption>);

impl Display for DisplayCauses<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, cause) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", cause)?;
        }
        Ok(())
    }
}
