/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The on-chain contract configuration cached locally.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::{Corruption, Field};

use super::data_types::{fixed_bytes, Address, ConfigDigest};

/// The configuration of the on-chain aggregator contract, as of the digest it carries.
///
/// ## Ordering of signers and transmitters
///
/// The position of an address in `signers` (and in `transmitters`) is the oracle's slot in the
/// configuration. Both lists are persisted and read back in exactly the order they were written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractConfig {
    pub config_digest: ConfigDigest,
    pub signers: Vec<Address>,
    pub transmitters: Vec<Address>,
    /// Minimum number of signers that must agree on a report.
    pub threshold: u8,
    pub encoded_config_version: u32,
    /// Protocol-specific configuration payload. Opaque to this crate.
    pub encoded: Vec<u8>,
}

/// Intermediate representation of [`ContractConfig`] for safe serialization and deserialization.
///
/// To serialize a `ContractConfig`, convert it into a `ContractConfigBytes` using
/// `From<&ContractConfig>`, then serialize the `ContractConfigBytes` using Borsh. Reverse the steps to
/// deserialize.
///
/// ## Rationale
///
/// The digest and addresses are stored as variable-length vectors, so a value written by a faulty or
/// foreign writer deserializes successfully and its lengths can then be checked. Conversion into
/// `ContractConfig` using `TryFrom` fails with every length violation found.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ContractConfigBytes {
    pub config_digest: Vec<u8>,
    pub signers: Vec<Vec<u8>>,
    pub transmitters: Vec<Vec<u8>>,
    pub threshold: u8,
    pub encoded_config_version: u32,
    pub encoded: Vec<u8>,
}

impl From<&ContractConfig> for ContractConfigBytes {
    fn from(config: &ContractConfig) -> Self {
        ContractConfigBytes {
            config_digest: config.config_digest.bytes().to_vec(),
            signers: config.signers.iter().map(|s| s.bytes().to_vec()).collect(),
            transmitters: config
                .transmitters
                .iter()
                .map(|t| t.bytes().to_vec())
                .collect(),
            threshold: config.threshold,
            encoded_config_version: config.encoded_config_version,
            encoded: config.encoded.clone(),
        }
    }
}

impl TryFrom<ContractConfigBytes> for ContractConfig {
    type Error = Vec<Corruption>;

    fn try_from(value: ContractConfigBytes) -> Result<Self, Self::Error> {
        let mut causes = Vec::new();

        let config_digest = ConfigDigest::from_slice(&value.config_digest)
            .map_err(|cause| causes.push(cause))
            .ok();

        let mut signers = Vec::with_capacity(value.signers.len());
        for (i, signer) in value.signers.iter().enumerate() {
            match fixed_bytes(signer, Field::Signer(i)) {
                Ok(bytes) => signers.push(Address::new(bytes)),
                Err(cause) => causes.push(cause),
            }
        }

        let mut transmitters = Vec::with_capacity(value.transmitters.len());
        for (i, transmitter) in value.transmitters.iter().enumerate() {
            match fixed_bytes(transmitter, Field::Transmitter(i)) {
                Ok(bytes) => transmitters.push(Address::new(bytes)),
                Err(cause) => causes.push(cause),
            }
        }

        match config_digest {
            Some(config_digest) if causes.is_empty() => Ok(ContractConfig {
                config_digest,
                signers,
                transmitters,
                threshold: value.threshold,
                encoded_config_version: value.encoded_config_version,
                encoded: value.encoded,
            }),
            _ => Err(causes),
        }
    }
}
