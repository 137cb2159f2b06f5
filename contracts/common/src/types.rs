//! Core Types for the USDP Position Manager
//!
//! This module defines the data structures shared between the position
//! manager, its collaborators and the reference oracle.

use crate::Vec;
use borsh::{BorshDeserialize, BorshSerialize};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::oracle::UNSET_ORACLE_TYPE;

/// Type alias for account addresses (32-byte hash)
pub type Address = [u8; 32];

/// Type alias for collateral asset identifiers
pub type AssetId = [u8; 32];

/// Type alias for position identifiers
pub type PositionId = [u8; 32];

/// Token amounts in native units
pub type Amount = u128;

/// Seconds since the unix epoch
pub type Timestamp = u64;

// ============ Oracle Types ============

/// Identifier of an oracle implementation in the oracle registry
///
/// Type `0` is reserved: a position that was never spawned reports it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct OracleType(pub u16);

impl OracleType {
    /// The reserved "no oracle" type
    pub const UNSET: Self = Self(UNSET_ORACLE_TYPE);

    /// Returns true if this is a real oracle type
    pub fn is_set(&self) -> bool {
        self.0 != UNSET_ORACLE_TYPE
    }
}

/// Opaque price proof handed through to the oracle
///
/// The position manager never looks inside; only the oracle that
/// receives it knows how to verify it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PriceProof(pub Vec<u8>);

impl PriceProof {
    /// Wrap raw proof bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// An empty proof (enough for oracles that do not need one)
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Raw proof bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// ============ Position Types ============

/// Read-only view of a position as held by the vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PositionSnapshot {
    /// Stable position identifier
    pub id: PositionId,
    /// Collateral asset
    pub asset: AssetId,
    /// Owning account
    pub owner: Address,
    /// Collateral in native units
    pub collateral: Amount,
    /// Debt principal, excluding accrued fee
    pub debt_principal: Amount,
    /// Principal plus accrued fee
    pub total_debt: Amount,
    /// Annual stability fee (1e5 denominator)
    pub stability_fee: u128,
    /// Last fee accrual checkpoint
    pub last_update: Timestamp,
    /// Oracle bound at spawn time
    pub oracle_type: OracleType,
}

impl PositionSnapshot {
    /// Returns true if the position currently carries debt
    pub fn is_spawned(&self) -> bool {
        self.debt_principal != 0
    }

    /// Accrued but unrealized fee
    pub fn accrued_fee(&self) -> Amount {
        self.total_debt.saturating_sub(self.debt_principal)
    }
}

/// Liquidation price of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiquidationPrice {
    /// Q112 price per native collateral unit at which the position
    /// reaches the liquidation ratio
    At(U256),
    /// Position has no debt and can never be liquidated
    Unbounded,
}

impl LiquidationPrice {
    /// Q112 value, with `U256::MAX` standing for "infinite"
    pub fn as_q112(&self) -> U256 {
        match self {
            Self::At(price) => *price,
            Self::Unbounded => U256::MAX,
        }
    }

    /// Returns true if the position has no debt
    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded)
    }
}

/// Marker returned by the vault journal when an operation begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Savepoint(pub u64);

// ============ Helper Functions ============

/// Derive the deterministic identifier of the (asset, owner) position
pub fn position_id(asset: &AssetId, owner: &Address) -> PositionId {
    let mut hasher = Sha256::new();
    hasher.update(b"usdp/position");
    hasher.update(asset);
    hasher.update(owner);
    let result = hasher.finalize();
    let mut id = [0u8; 32];
    id.copy_from_slice(&result);
    id
}
