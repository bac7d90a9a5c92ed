/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Signed reports that have been finalized by consensus but not yet confirmed on-chain.

use std::{
    fmt::{self, Display, Formatter},
    time::SystemTime,
};

use borsh::{BorshDeserialize, BorshSerialize};
use num_bigint::BigInt;

use crate::error::{Corruption, Field};

use super::data_types::{fixed_bytes, ConfigDigest, RecoveryBytes, SignatureComponent};

/// Identifies the round a [`PendingTransmission`] was finalized in.
///
/// Each round produces at most one report, so there is at most one pending transmission per key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PendingTransmissionKey {
    pub config_digest: ConfigDigest,
    pub epoch: u32,
    pub round: u8,
}

impl Display for PendingTransmissionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(config digest {}, epoch {}, round {})",
            self.config_digest, self.epoch, self.round
        )
    }
}

/// A report and the signatures over it, waiting to be submitted on-chain.
///
/// `rs[i]` and `ss[i]` together are the signature of the `i`-th signer that contributed to the report,
/// so `rs` and `ss` must have the same length. A transmission where they do not is refused by
/// [`OracleDb::store_pending_transmission`](crate::database::OracleDb::store_pending_transmission).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingTransmission {
    /// When this node created the transmission. Used for garbage collection.
    pub time: SystemTime,
    pub median: BigInt,
    pub serialized_report: Vec<u8>,
    pub rs: Vec<SignatureComponent>,
    pub ss: Vec<SignatureComponent>,
    pub vs: RecoveryBytes,
}

/// Intermediate representation of a [`PendingTransmission`]'s signatures for safe serialization and
/// deserialization.
///
/// Every signature component is stored as a variable-length vector, so that a wrongly-sized component
/// is detected when the row is read instead of being truncated or padded into shape. Conversion into
/// [`Signatures`] using `TryFrom` fails with every violation found.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SignaturesBytes {
    pub rs: Vec<Vec<u8>>,
    pub ss: Vec<Vec<u8>>,
    pub vs: Vec<u8>,
}

/// The signature fields of a [`PendingTransmission`], after validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signatures {
    pub rs: Vec<SignatureComponent>,
    pub ss: Vec<SignatureComponent>,
    pub vs: RecoveryBytes,
}

impl From<&PendingTransmission> for SignaturesBytes {
    fn from(transmission: &PendingTransmission) -> Self {
        SignaturesBytes {
            rs: transmission.rs.iter().map(|r| r.bytes().to_vec()).collect(),
            ss: transmission.ss.iter().map(|s| s.bytes().to_vec()).collect(),
            vs: transmission.vs.bytes().to_vec(),
        }
    }
}

impl TryFrom<SignaturesBytes> for Signatures {
    type Error = Vec<Corruption>;

    fn try_from(value: SignaturesBytes) -> Result<Self, Self::Error> {
        let mut causes = Vec::new();

        if value.rs.len() != value.ss.len() {
            causes.push(Corruption::SignatureCountMismatch {
                rs: value.rs.len(),
                ss: value.ss.len(),
            });
        }

        let mut rs = Vec::with_capacity(value.rs.len());
        for (i, r) in value.rs.iter().enumerate() {
            match fixed_bytes(r, Field::Rs(i)) {
                Ok(bytes) => rs.push(SignatureComponent::new(bytes)),
                Err(cause) => causes.push(cause),
            }
        }

        let mut ss = Vec::with_capacity(value.ss.len());
        for (i, s) in value.ss.iter().enumerate() {
            match fixed_bytes(s, Field::Ss(i)) {
                Ok(bytes) => ss.push(SignatureComponent::new(bytes)),
                Err(cause) => causes.push(cause),
            }
        }

        let vs = fixed_bytes(&value.vs, Field::Vs)
            .map_err(|cause| causes.push(cause))
            .ok();

        match vs {
            Some(vs) if causes.is_empty() => Ok(Signatures {
                rs,
                ss,
                vs: RecoveryBytes::new(vs),
            }),
            _ => Err(causes),
        }
    }
}

/// Encode `median` as two's-complement big-endian bytes.
pub(crate) fn median_to_bytes(median: &BigInt) -> Vec<u8> {
    median.to_signed_bytes_be()
}

/// Decode a median encoded by [`median_to_bytes`].
pub(crate) fn median_from_bytes(bytes: &[u8]) -> BigInt {
    BigInt::from_signed_bytes_be(bytes)
}
