//! Builders for the values written in tests, filled with random bytes where the content does not
//! matter.

use std::time::SystemTime;

use num_bigint::BigInt;
use ocr_db::{
    database::{Configuration, OracleDb},
    types::{
        contract_config::ContractConfig,
        data_types::{Address, ConfigDigest, RecoveryBytes, ScopeId, SignatureComponent},
        pending_transmission::PendingTransmission,
        round_requested::RoundRequestedEvent,
    },
};
use rand::Rng;

use super::mem_db::MemDB;

/// Create an `OracleDb` for `scope` on top of `kv_store`, with no handlers and event logging on.
pub(crate) fn oracle_db(kv_store: MemDB, scope: u64) -> OracleDb<MemDB> {
    let configuration = Configuration::builder()
        .scope(ScopeId::new(scope))
        .log_events(true)
        .build();
    OracleDb::new(kv_store, configuration)
}

pub(crate) fn random_config_digest() -> ConfigDigest {
    ConfigDigest::new(rand::random())
}

pub(crate) fn random_address() -> Address {
    Address::new(rand::random())
}

pub(crate) fn random_signature_component() -> SignatureComponent {
    SignatureComponent::new(rand::random())
}

pub(crate) fn contract_config(config_digest: ConfigDigest, oracles: usize) -> ContractConfig {
    ContractConfig {
        config_digest,
        signers: (0..oracles).map(|_| random_address()).collect(),
        transmitters: (0..oracles).map(|_| random_address()).collect(),
        threshold: (oracles / 3) as u8,
        encoded_config_version: 1,
        encoded: random_bytes(64),
    }
}

/// Create a pending transmission created at `time`, signed by `signers` signers.
pub(crate) fn pending_transmission(time: SystemTime, signers: usize) -> PendingTransmission {
    let mut rng = rand::thread_rng();
    PendingTransmission {
        time,
        median: BigInt::from(rng.gen::<i64>()) * BigInt::from(rng.gen::<u64>()),
        serialized_report: random_bytes(128),
        rs: (0..signers).map(|_| random_signature_component()).collect(),
        ss: (0..signers).map(|_| random_signature_component()).collect(),
        vs: RecoveryBytes::new(rand::random()),
    }
}

pub(crate) fn round_requested_event(config_digest: ConfigDigest, epoch: u32, round: u8) -> RoundRequestedEvent {
    RoundRequestedEvent {
        requester: random_address(),
        config_digest,
        epoch,
        round,
        raw: random_bytes(96),
    }
}

pub(crate) fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen()).collect()
}
