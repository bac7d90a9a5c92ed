/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::{Corruption, Field};

use super::data_types::{fixed_bytes, Address, ConfigDigest};

/// A "new round requested" event observed in the aggregator contract's logs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundRequestedEvent {
    pub requester: Address,
    pub config_digest: ConfigDigest,
    pub epoch: u32,
    pub round: u8,
    /// The chain log record the event was decoded from, kept for replay and debugging.
    pub raw: Vec<u8>,
}

/// Intermediate representation of [`RoundRequestedEvent`] for safe serialization and deserialization.
///
/// See [`ContractConfigBytes`](super::contract_config::ContractConfigBytes#rationale) for why the
/// fixed-size fields are stored as vectors.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RoundRequestedEventBytes {
    pub requester: Vec<u8>,
    pub config_digest: Vec<u8>,
    pub epoch: u32,
    pub round: u8,
    pub raw: Vec<u8>,
}

impl From<&RoundRequestedEvent> for RoundRequestedEventBytes {
    fn from(event: &RoundRequestedEvent) -> Self {
        RoundRequestedEventBytes {
            requester: event.requester.bytes().to_vec(),
            config_digest: event.config_digest.bytes().to_vec(),
            epoch: event.epoch,
            round: event.round,
            raw: event.raw.clone(),
        }
    }
}

impl TryFrom<RoundRequestedEventBytes> for RoundRequestedEvent {
    type Error = Vec<Corruption>;

    fn try_from(value: RoundRequestedEventBytes) -> Result<Self, Self::Error> {
        let requester = fixed_bytes(&value.requester, Field::Requester);
        let config_digest = ConfigDigest::from_slice(&value.config_digest);

        match (requester, config_digest) {
            (Ok(requester), Ok(config_digest)) => Ok(RoundRequestedEvent {
                requester: Address::new(requester),
                config_digest,
                epoch: value.epoch,
                round: value.round,
                raw: value.raw,
            }),
            (requester, config_digest) => Err(requester
                .err()
                .into_iter()
                .chain(config_digest.err())
                .collect()),
        }
    }
}
