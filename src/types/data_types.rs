/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store bytes or numbers, and do not have any major "active" behavior.

use std::{
    fmt::{self, Debug, Display, Formatter},
    time::{Duration, SystemTime},
};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::{Corruption, Field};

/// Identifier of one oracle job on this node.
///
/// Every row written by an [`OracleDb`](crate::database::OracleDb) is keyed under the `ScopeId` the
/// database was configured with. Two jobs on the same node never see each other's rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct ScopeId(u64);

impl ScopeId {
    /// Create a new `ScopeId` wrapping `int`.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` value of this `ScopeId`.
    pub const fn int(&self) -> u64 {
        self.0
    }

    /// Get the big-endian representation of the inner `u64` value of this `ScopeId`.
    pub fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl Display for ScopeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// 32-byte identifier of one version of the on-chain contract configuration.
///
/// A new digest is produced every time the signer set, transmitter set, or threshold changes on-chain.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct ConfigDigest([u8; 32]);

impl ConfigDigest {
    /// Create a new `ConfigDigest` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 32]` value of this `ConfigDigest`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Create a `ConfigDigest` from a slice that must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Corruption> {
        fixed_bytes(bytes, Field::ConfigDigest).map(Self)
    }
}

impl Display for ConfigDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&STANDARD_NO_PAD.encode(self.0))
    }
}

impl Debug for ConfigDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigDigest({})", self)
    }
}

/// 20-byte on-chain account address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct Address([u8; 20]);

impl Address {
    /// Create a new `Address` wrapping `bytes`.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 20]` value of this `Address`.
    pub const fn bytes(&self) -> [u8; 20] {
        self.0
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&STANDARD_NO_PAD.encode(self.0))
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

/// One 32-byte component (`r` or `s`) of a signer's signature over a report.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct SignatureComponent([u8; 32]);

impl SignatureComponent {
    /// Create a new `SignatureComponent` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 32]` value of this `SignatureComponent`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Debug for SignatureComponent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The `vs` of a report: one recovery byte for each of the 32 possible signer slots.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct RecoveryBytes([u8; 32]);

impl RecoveryBytes {
    /// Create a new `RecoveryBytes` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 32]` value of this `RecoveryBytes`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Debug for RecoveryBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Point in time, stored as signed nanoseconds relative to the Unix epoch.
///
/// Unlike `SystemTime`, a `Timestamp` has a fixed serialization and a total order, which makes it
/// suitable for comparing against a garbage collection cutoff inside the key-value store. Conversion
/// from `SystemTime` is lossless.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct Timestamp(i128);

impl Timestamp {
    /// Create a new `Timestamp` `nanos` nanoseconds after (or, if negative, before) the Unix epoch.
    pub const fn from_unix_nanos(nanos: i128) -> Self {
        Self(nanos)
    }

    /// Get the number of nanoseconds between the Unix epoch and this `Timestamp`.
    pub const fn unix_nanos(&self) -> i128 {
        self.0
    }

    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    /// Convert this `Timestamp` into a `SystemTime`, or return `None` if it lies outside the range the
    /// platform's `SystemTime` can represent.
    pub fn to_system_time(&self) -> Option<SystemTime> {
        let magnitude = self.0.unsigned_abs();
        let secs = u64::try_from(magnitude / 1_000_000_000).ok()?;
        let nanos = (magnitude % 1_000_000_000) as u32;
        let offset = Duration::new(secs, nanos);
        if self.0 >= 0 {
            SystemTime::UNIX_EPOCH.checked_add(offset)
        } else {
            SystemTime::UNIX_EPOCH.checked_sub(offset)
        }
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(after) => Timestamp(after.as_nanos() as i128),
            Err(before) => Timestamp(-(before.duration().as_nanos() as i128)),
        }
    }
}

/// Copy `bytes` into an `N`-byte array, or report how far off its length is.
pub(crate) fn fixed_bytes<const N: usize>(bytes: &[u8], field: Field) -> Result<[u8; N], Corruption> {
    <[u8; N]>::try_from(bytes).map_err(|_| Corruption::WrongLength {
        field,
        expected: N,
        actual: bytes.len(),
    })
}
