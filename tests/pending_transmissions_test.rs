use std::time::{Duration, SystemTime};

use borsh::BorshSerialize;
use log::LevelFilter;
use num_bigint::BigInt;

use ocr_db::{
    context::Context,
    error::{Corruption, Field, OracleDbError, Operation},
    persistence::{
        pluggables::{KVStore, WriteBatch},
        variables::{self, concat},
    },
    types::{
        data_types::{RecoveryBytes, ScopeId, SignatureComponent, Timestamp},
        pending_transmission::{PendingTransmission, PendingTransmissionKey, SignaturesBytes},
    },
};

mod common;

use common::{
    fixtures::{oracle_db, pending_transmission, random_config_digest},
    logging::setup_logger,
    mem_db::{MemDB, MemWriteBatch},
};

const SCOPE: u64 = 1;

/// Stores an all-zero transmission, loads it back, deletes it, and checks that nothing is left.
#[test]
fn store_load_delete_test() {
    setup_logger(LevelFilter::Trace);
    let ctx = Context::background();
    let mut db = oracle_db(MemDB::new(), SCOPE);
    let d1 = random_config_digest();

    let key = PendingTransmissionKey {
        config_digest: d1,
        epoch: 1,
        round: 1,
    };
    let transmission = PendingTransmission {
        time: SystemTime::now(),
        median: BigInt::from(0),
        serialized_report: vec![],
        rs: vec![SignatureComponent::new([0; 32])],
        ss: vec![SignatureComponent::new([0; 32])],
        vs: RecoveryBytes::new([0; 32]),
    };

    db.store_pending_transmission(&ctx, &key, &transmission)
        .unwrap();

    let loaded = db.load_pending_transmissions(&ctx, &d1).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.get(&key), Some(&transmission));

    db.delete_pending_transmission(&ctx, &key).unwrap();
    assert!(db.load_pending_transmissions(&ctx, &d1).unwrap().is_empty());
    assert_eq!(db.pending_transmission(&ctx, &key).unwrap(), None);
}

/// Stores transmissions with several signers, a negative median, and sub-second creation times, and
/// checks that every field is read back exactly.
#[test]
fn round_trip_test() {
    setup_logger(LevelFilter::Trace);
    let ctx = Context::background();
    let mut db = oracle_db(MemDB::new(), SCOPE);
    let d1 = random_config_digest();

    let mut stored = Vec::new();
    for round in 0..5u8 {
        let key = PendingTransmissionKey {
            config_digest: d1,
            epoch: 7,
            round,
        };
        let mut transmission = pending_transmission(
            SystemTime::UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789 + round as u32),
            round as usize + 1,
        );
        if round % 2 == 0 {
            transmission.median = -transmission.median;
        }
        db.store_pending_transmission(&ctx, &key, &transmission)
            .unwrap();
        stored.push((key, transmission));
    }

    let loaded = db.load_pending_transmissions(&ctx, &d1).unwrap();
    assert_eq!(loaded.len(), stored.len());
    for (key, transmission) in &stored {
        let loaded_transmission = &loaded[key];
        assert_eq!(loaded_transmission, transmission);
        assert_eq!(loaded_transmission.rs.len(), loaded_transmission.ss.len());
        assert!(loaded_transmission.rs.iter().all(|r| r.bytes().len() == 32));
        assert_eq!(
            db.pending_transmission(&ctx, key).unwrap().as_ref(),
            Some(transmission)
        );
    }
}

/// Storing the same transmission twice leaves one row, and storing different content at the same key
/// replaces it.
#[test]
fn store_is_idempotent_test() {
    setup_logger(LevelFilter::Trace);
    let ctx = Context::background();
    let kv_store = MemDB::new();
    let mut db = oracle_db(kv_store.clone(), SCOPE);
    let d1 = random_config_digest();
    let key = PendingTransmissionKey {
        config_digest: d1,
        epoch: 2,
        round: 3,
    };
    let transmission = pending_transmission(SystemTime::now(), 4);

    db.store_pending_transmission(&ctx, &key, &transmission)
        .unwrap();
    let keys_after_first_store = kv_store.len();
    db.store_pending_transmission(&ctx, &key, &transmission)
        .unwrap();

    assert_eq!(kv_store.len(), keys_after_first_store);
    let loaded = db.load_pending_transmissions(&ctx, &d1).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[&key], transmission);

    let updated = pending_transmission(SystemTime::now(), 2);
    db.store_pending_transmission(&ctx, &key, &updated).unwrap();
    let loaded = db.load_pending_transmissions(&ctx, &d1).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[&key], updated);
}

#[test]
fn delete_absent_transmission_test() {
    setup_logger(LevelFilter::Trace);
    let ctx = Context::background();
    let mut db = oracle_db(MemDB::new(), SCOPE);
    let key = PendingTransmissionKey {
        config_digest: random_config_digest(),
        epoch: 9,
        round: 9,
    };

    db.delete_pending_transmission(&ctx, &key).unwrap();
    db.delete_pending_transmission(&ctx, &key).unwrap();
}

/// Loading the transmissions of one config digest does not return those of another config digest or of
/// another scope.
#[test]
fn load_filters_by_digest_and_scope_test() {
    setup_logger(LevelFilter::Trace);
    let ctx = Context::background();
    let kv_store = MemDB::new();
    let mut db = oracle_db(kv_store.clone(), SCOPE);
    let mut other_job = oracle_db(kv_store, SCOPE + 1);
    let d1 = random_config_digest();
    let d2 = random_config_digest();

    let key_d1 = PendingTransmissionKey {
        config_digest: d1,
        epoch: 1,
        round: 1,
    };
    let key_d2 = PendingTransmissionKey {
        config_digest: d2,
        epoch: 1,
        round: 1,
    };
    db.store_pending_transmission(&ctx, &key_d1, &pending_transmission(SystemTime::now(), 1))
        .unwrap();
    db.store_pending_transmission(&ctx, &key_d2, &pending_transmission(SystemTime::now(), 1))
        .unwrap();
    other_job
        .store_pending_transmission(&ctx, &key_d1, &pending_transmission(SystemTime::now(), 3))
        .unwrap();

    let loaded = db.load_pending_transmissions(&ctx, &d1).unwrap();
    assert_eq!(loaded.len(), 1);
    assert!(loaded.contains_key(&key_d1));
    assert_eq!(loaded[&key_d1].rs.len(), 1);

    assert!(db
        .load_pending_transmissions(&ctx, &random_config_digest())
        .unwrap()
        .is_empty());
}

/// Given transmissions created at t-10, t-5 and t+5, garbage collection with cutoff t deletes exactly
/// the first two, whatever their config digest.
#[test]
fn delete_older_than_test() {
    setup_logger(LevelFilter::Trace);
    let ctx = Context::background();
    let mut db = oracle_db(MemDB::new(), SCOPE);
    let d1 = random_config_digest();
    let d2 = random_config_digest();
    let t = SystemTime::now();

    let oldest = PendingTransmissionKey {
        config_digest: d1,
        epoch: 1,
        round: 0,
    };
    let older = PendingTransmissionKey {
        config_digest: d2,
        epoch: 1,
        round: 1,
    };
    let newer = PendingTransmissionKey {
        config_digest: d1,
        epoch: 1,
        round: 2,
    };
    db.store_pending_transmission(
        &ctx,
        &oldest,
        &pending_transmission(t - Duration::from_secs(10), 1),
    )
    .unwrap();
    db.store_pending_transmission(
        &ctx,
        &older,
        &pending_transmission(t - Duration::from_secs(5), 1),
    )
    .unwrap();
    db.store_pending_transmission(
        &ctx,
        &newer,
        &pending_transmission(t + Duration::from_secs(5), 1),
    )
    .unwrap();

    assert_eq!(db.delete_pending_transmissions_older_than(&ctx, t).unwrap(), 2);

    let remaining_d1 = db.load_pending_transmissions(&ctx, &d1).unwrap();
    assert_eq!(remaining_d1.len(), 1);
    assert!(remaining_d1.contains_key(&newer));
    assert!(db.load_pending_transmissions(&ctx, &d2).unwrap().is_empty());

    // Nothing else is older than the cutoff.
    assert_eq!(db.delete_pending_transmissions_older_than(&ctx, t).unwrap(), 0);
}

/// A transmission stored again with a newer time while garbage collection is selecting rows is not
/// deleted, while the other expired transmission is.
#[test]
fn delete_older_than_keeps_restored_transmission_test() {
    setup_logger(LevelFilter::Trace);
    let ctx = Context::background();
    let kv_store = MemDB::new();
    let mut db = oracle_db(kv_store.clone(), SCOPE);
    let d1 = random_config_digest();
    let t = SystemTime::now();

    let restored = PendingTransmissionKey {
        config_digest: d1,
        epoch: 1,
        round: 0,
    };
    let abandoned = PendingTransmissionKey {
        config_digest: d1,
        epoch: 1,
        round: 1,
    };
    for key in [restored, abandoned] {
        db.store_pending_transmission(
            &ctx,
            &key,
            &pending_transmission(t - Duration::from_secs(10), 1),
        )
        .unwrap();
    }

    // The transmitter stores `restored` again after the rows were selected, but before they are
    // deleted.
    let fresh = pending_transmission(t + Duration::from_secs(5), 2);
    let mut transmitter = db.clone();
    let fresh_copy = fresh.clone();
    kv_store.before_next_conditional_write(move || {
        transmitter
            .store_pending_transmission(&Context::background(), &restored, &fresh_copy)
            .unwrap();
    });

    assert_eq!(db.delete_pending_transmissions_older_than(&ctx, t).unwrap(), 1);
    assert_eq!(db.pending_transmission(&ctx, &restored).unwrap(), Some(fresh));
    assert_eq!(db.pending_transmission(&ctx, &abandoned).unwrap(), None);
}

/// A transmission created exactly at the cutoff is kept.
#[test]
fn delete_older_than_is_strict_test() {
    setup_logger(LevelFilter::Trace);
    let ctx = Context::background();
    let mut db = oracle_db(MemDB::new(), SCOPE);
    let t = SystemTime::now();
    let key = PendingTransmissionKey {
        config_digest: random_config_digest(),
        epoch: 4,
        round: 4,
    };
    db.store_pending_transmission(&ctx, &key, &pending_transmission(t, 1))
        .unwrap();

    assert_eq!(db.delete_pending_transmissions_older_than(&ctx, t).unwrap(), 0);
    assert!(db.pending_transmission(&ctx, &key).unwrap().is_some());
}

/// Overwrites the signatures column of a stored transmission with `signatures`, and returns the fault
/// from loading it.
fn load_with_signatures(signatures: SignaturesBytes) -> (PendingTransmissionKey, OracleDbError) {
    let ctx = Context::background();
    let mut kv_store = MemDB::new();
    let mut db = oracle_db(kv_store.clone(), SCOPE);
    let key = PendingTransmissionKey {
        config_digest: random_config_digest(),
        epoch: 1,
        round: 1,
    };
    db.store_pending_transmission(&ctx, &key, &pending_transmission(SystemTime::now(), 2))
        .unwrap();

    let mut wb = MemWriteBatch::new();
    let row = variables::pending_transmission_row(ScopeId::new(SCOPE), &key);
    wb.set(
        &concat(&row, &variables::TRANSMISSION_SIGNATURES),
        &signatures.try_to_vec().unwrap(),
    );
    kv_store.write(wb).unwrap();

    let err = db
        .load_pending_transmissions(&ctx, &key.config_digest)
        .unwrap_err();
    (key, err)
}

#[test]
fn short_and_long_rs_are_corrupt_test() {
    setup_logger(LevelFilter::Trace);

    for len in [31, 33] {
        let (_, err) = load_with_signatures(SignaturesBytes {
            rs: vec![vec![0; len]],
            ss: vec![vec![0; 32]],
            vs: vec![0; 32],
        });

        assert_eq!(err.operation(), Operation::LoadPendingTransmissions);
        assert!(!err.is_retryable());
        match err {
            OracleDbError::CorruptionFault { causes, .. } => assert!(matches!(
                causes.as_slice(),
                [Corruption::WrongLength {
                    field: Field::Rs(0),
                    expected: 32,
                    actual
                }] if *actual == len
            )),
            other => panic!("expected a corruption fault, got {:?}", other),
        }
    }
}

/// Every violation in the row is reported, not only the first.
#[test]
fn every_violation_is_reported_test() {
    setup_logger(LevelFilter::Trace);

    let (_, err) = load_with_signatures(SignaturesBytes {
        rs: vec![vec![0; 32], vec![0; 31], vec![0; 32]],
        ss: vec![vec![0; 32], vec![0; 32]],
        vs: vec![0; 33],
    });

    match err {
        OracleDbError::CorruptionFault { causes, .. } => {
            assert_eq!(causes.len(), 3);
            assert!(causes.iter().any(|cause| matches!(
                cause,
                Corruption::SignatureCountMismatch { rs: 3, ss: 2 }
            )));
            assert!(causes.iter().any(|cause| matches!(
                cause,
                Corruption::WrongLength {
                    field: Field::Rs(1),
                    actual: 31,
                    ..
                }
            )));
            assert!(causes.iter().any(|cause| matches!(
                cause,
                Corruption::WrongLength {
                    field: Field::Vs,
                    actual: 33,
                    ..
                }
            )));
        }
        other => panic!("expected a corruption fault, got {:?}", other),
    }
}

/// A transmission missing one of its columns is corrupt, both through a single-row read and a load.
#[test]
fn missing_column_is_corrupt_test() {
    setup_logger(LevelFilter::Trace);
    let ctx = Context::background();
    let mut kv_store = MemDB::new();
    let mut db = oracle_db(kv_store.clone(), SCOPE);
    let key = PendingTransmissionKey {
        config_digest: random_config_digest(),
        epoch: 3,
        round: 0,
    };
    db.store_pending_transmission(&ctx, &key, &pending_transmission(SystemTime::now(), 1))
        .unwrap();

    let mut wb = MemWriteBatch::new();
    let row = variables::pending_transmission_row(ScopeId::new(SCOPE), &key);
    wb.delete(&concat(&row, &variables::TRANSMISSION_MEDIAN));
    kv_store.write(wb).unwrap();

    let is_missing_median = |err: OracleDbError| match err {
        OracleDbError::CorruptionFault { causes, .. } => matches!(
            causes.as_slice(),
            [Corruption::MissingField {
                field: Field::Median
            }]
        ),
        _ => false,
    };
    assert!(is_missing_median(
        db.pending_transmission(&ctx, &key).unwrap_err()
    ));
    assert!(is_missing_median(
        db.load_pending_transmissions(&ctx, &key.config_digest)
            .unwrap_err()
    ));
}

/// A transmission with more `ss` than `rs` values is refused, and the other transmissions of its config
/// digest can still be loaded.
#[test]
fn mismatched_signature_counts_are_refused_test() {
    setup_logger(LevelFilter::Trace);
    let ctx = Context::background();
    let kv_store = MemDB::new();
    let mut db = oracle_db(kv_store.clone(), SCOPE);
    let d1 = random_config_digest();

    let valid_key = PendingTransmissionKey {
        config_digest: d1,
        epoch: 1,
        round: 1,
    };
    let valid = pending_transmission(SystemTime::now(), 2);
    db.store_pending_transmission(&ctx, &valid_key, &valid)
        .unwrap();
    let keys_after_valid_store = kv_store.len();

    let mismatched_key = PendingTransmissionKey {
        config_digest: d1,
        epoch: 1,
        round: 2,
    };
    let mut mismatched = pending_transmission(SystemTime::now(), 2);
    mismatched.ss.push(SignatureComponent::new([7; 32]));

    let err = db
        .store_pending_transmission(&ctx, &mismatched_key, &mismatched)
        .unwrap_err();
    assert_eq!(err.operation(), Operation::StorePendingTransmission);
    assert!(!err.is_retryable());
    match err {
        OracleDbError::CorruptionFault { causes, .. } => assert!(matches!(
            causes.as_slice(),
            [Corruption::SignatureCountMismatch { rs: 2, ss: 3 }]
        )),
        other => panic!("expected a corruption fault, got {:?}", other),
    }

    assert_eq!(kv_store.len(), keys_after_valid_store);
    assert_eq!(db.pending_transmission(&ctx, &mismatched_key).unwrap(), None);
    let loaded = db.load_pending_transmissions(&ctx, &d1).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[&valid_key], valid);
}

/// A stored time that `SystemTime` cannot represent is corrupt for garbage collection and for loads
/// alike.
#[test]
fn out_of_range_time_is_corrupt_test() {
    setup_logger(LevelFilter::Trace);
    let ctx = Context::background();
    let mut kv_store = MemDB::new();
    let mut db = oracle_db(kv_store.clone(), SCOPE);
    let key = PendingTransmissionKey {
        config_digest: random_config_digest(),
        epoch: 5,
        round: 5,
    };
    db.store_pending_transmission(&ctx, &key, &pending_transmission(SystemTime::now(), 1))
        .unwrap();

    let mut wb = MemWriteBatch::new();
    let row = variables::pending_transmission_row(ScopeId::new(SCOPE), &key);
    wb.set(
        &concat(&row, &variables::TRANSMISSION_TIME),
        &Timestamp::from_unix_nanos(i128::MAX).try_to_vec().unwrap(),
    );
    kv_store.write(wb).unwrap();

    let is_out_of_range_time = |err: &OracleDbError| match err {
        OracleDbError::CorruptionFault { causes, .. } => matches!(
            causes.as_slice(),
            [Corruption::OutOfRange { field: Field::Time }]
        ),
        _ => false,
    };

    let gc_err = db
        .delete_pending_transmissions_older_than(&ctx, SystemTime::now())
        .unwrap_err();
    assert_eq!(gc_err.operation(), Operation::DeletePendingTransmissionsOlderThan);
    assert!(is_out_of_range_time(&gc_err));

    let load_err = db
        .load_pending_transmissions(&ctx, &key.config_digest)
        .unwrap_err();
    assert!(is_out_of_range_time(&load_err));
}
