//! Collaborator Interfaces
//!
//! The position manager owns no balances, prices or parameters. Everything
//! it reads or mutates goes through these traits, injected at construction.
//!
//! All methods take `&self`: implementations use interior mutability, which
//! is what allows a collaborator to call back into the manager mid-operation
//! (and the manager's guard to reject it).

use crate::types::{Address, Amount, AssetId, OracleType, PriceProof, Savepoint, Timestamp};
use crate::errors::UsdpResult;
use crate::Vec;
use primitive_types::U256;

#[cfg(not(feature = "std"))]
use alloc::rc::Rc;
#[cfg(feature = "std")]
use std::rc::Rc;

/// Ledger holding collateral and debt for every (asset, owner) position
pub trait Vault {
    // ============ Queries ============

    /// Collateral held, in native units
    fn collateral(&self, asset: &AssetId, owner: &Address) -> Amount;

    /// Debt principal, excluding accrued fee
    fn debt(&self, asset: &AssetId, owner: &Address) -> Amount;

    /// Principal plus fee accrued since the last update
    fn total_debt(&self, asset: &AssetId, owner: &Address) -> UsdpResult<Amount>;

    /// Annual stability fee of the position (1e5 denominator)
    fn stability_fee(&self, asset: &AssetId, owner: &Address) -> u128;

    /// Timestamp of the last fee accrual
    fn last_update(&self, asset: &AssetId, owner: &Address) -> Timestamp;

    /// Oracle type bound at spawn (`OracleType::UNSET` if never spawned)
    fn oracle_type(&self, asset: &AssetId, owner: &Address) -> OracleType;

    // ============ Mutations ============

    /// Bind a debt-free position to an oracle type
    fn spawn(&self, asset: &AssetId, owner: &Address, oracle_type: OracleType) -> UsdpResult<()>;

    /// Move collateral from the owner into the position
    fn deposit(&self, asset: &AssetId, owner: &Address, amount: Amount) -> UsdpResult<()>;

    /// Move collateral from the position back to the owner
    fn withdraw(&self, asset: &AssetId, owner: &Address, amount: Amount) -> UsdpResult<()>;

    /// Accrue fee, then mint `amount` of debt token to the owner
    fn borrow(&self, asset: &AssetId, owner: &Address, amount: Amount) -> UsdpResult<Amount>;

    /// Burn `amount` from the owner and reduce principal; returns principal left
    fn repay(&self, asset: &AssetId, owner: &Address, amount: Amount) -> UsdpResult<Amount>;

    /// Clear debt-side storage of a position whose principal reached zero
    fn destroy(&self, asset: &AssetId, owner: &Address) -> UsdpResult<()>;

    /// Fold accrued fee into principal and restart the accrual clock
    fn update(&self, asset: &AssetId, owner: &Address) -> UsdpResult<()>;

    /// Fee owed when repaying `amount` of principal
    fn calculate_fee(&self, asset: &AssetId, owner: &Address, amount: Amount) -> UsdpResult<Amount>;

    /// Collect a stability fee from the owner
    fn charge_fee(&self, owner: &Address, amount: Amount) -> UsdpResult<()>;

    /// Hand the position to the liquidation auction at `initial_price`
    fn trigger_liquidation(&self, asset: &AssetId, owner: &Address, initial_price: U256) -> UsdpResult<()>;

    // ============ Journal ============

    /// Open a savepoint; every mutation after it can be undone
    fn begin(&self) -> Savepoint;

    /// Keep every mutation made since `savepoint`
    fn commit(&self, savepoint: Savepoint);

    /// Undo every mutation made since `savepoint`
    fn rollback(&self, savepoint: Savepoint);
}

/// Converts a collateral amount to a Q112 USD value
pub trait UsdOracle {
    /// Q112 USD value of `amount` native units of `asset`
    ///
    /// `proof` is opaque to the caller; verification failures are returned
    /// as-is and propagate to the user.
    fn asset_to_usd(&self, asset: &AssetId, amount: Amount, proof: &PriceProof) -> UsdpResult<U256>;
}

/// Maps oracle types to oracle implementations
pub trait OracleRegistry {
    /// Known oracle types, highest priority first
    fn oracle_types_in_priority(&self) -> Vec<OracleType>;

    /// Oracle behind a type, if any
    fn oracle_by_type(&self, oracle_type: OracleType) -> Option<Rc<dyn UsdOracle>>;
}

/// Per-asset risk parameters
pub trait Parameters {
    /// Maximum debt as a percentage of collateral value (e.g. `67`)
    fn initial_collateral_ratio(&self, asset: &AssetId) -> u128;

    /// Debt/collateral percentage at which liquidation opens (e.g. `75`)
    fn liquidation_ratio(&self, asset: &AssetId) -> u128;

    /// Liquidator discount on collateral value (1e5 denominator)
    fn liquidation_discount(&self, asset: &AssetId) -> u128;

    /// Whether `oracle_type` may price `asset`
    fn is_oracle_type_enabled(&self, oracle_type: OracleType, asset: &AssetId) -> bool;
}

/// Off-chain index of active positions
pub trait Registry {
    /// Re-index the position after an operation
    fn checkpoint(&self, asset: &AssetId, owner: &Address);
}

/// Token metadata lookup
pub trait TokenMetadata {
    /// Fractional decimals reported by the token
    fn decimals(&self, asset: &AssetId) -> u8;
}

/// Current time source
pub trait Clock {
    /// Seconds since the unix epoch
    fn now(&self) -> Timestamp;
}
