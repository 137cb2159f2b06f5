//! Position Manager - CDP Orchestrator for USDP
//!
//! Users lock collateral in a position and borrow the USDP stablecoin
//! against it. The manager owns no balances: it checks preconditions, moves
//! value through the [`Vault`], prices collateral through the oracle chosen
//! by the oracle selector, and enforces the collateralization rule.
//!
//! ## Core Operations
//!
//! - **join**: deposit collateral and/or borrow, spawning the position on
//!   its first borrow
//! - **exit**: withdraw collateral and/or repay, destroying the position
//!   once its principal reaches zero
//! - **exit_target_repayment**: exit with a total repayment (fee included)
//!   instead of a principal amount
//! - **trigger_liquidation**: hand an unsafe position to the auction
//!
//! ## Atomicity
//!
//! Every guarded operation opens a vault savepoint, runs its body and either
//! commits (publishing the event) or rolls back (publishing nothing). The
//! position is always checkpointed in the registry afterwards.
//!
//! ```text
//! guard ─► begin ─► body ─┬─ Ok  ─► commit   ─► emit ─┬─► checkpoint ─► release
//!                         └─ Err ─► rollback ─────────┘
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, info, warn};
use usdp_common::{
    errors::{UsdpError, UsdpResult},
    events::{EventLog, EventType, PositionEvent},
    guard::ReentrancyGuard,
    interfaces::{Clock, OracleRegistry, Parameters, Registry, TokenMetadata, Vault},
    math::ensure_supported_decimals,
    oracle_selector::{resolve_oracle, ResolvedOracle},
    risk,
    types::{self, Address, Amount, AssetId, LiquidationPrice, PositionId, PositionSnapshot, PriceProof},
    U256,
};

mod builder;
pub use builder::PositionManagerBuilder;

#[cfg(any(test, feature = "testing"))]
pub mod testing;


// ============ Position Manager ============

/// Orchestrates position operations over injected collaborators
///
/// Built with [`PositionManagerBuilder`]. All operations take `&self`; the
/// re-entrancy guard and event log use interior mutability.
pub struct PositionManager {
    vault: Rc<dyn Vault>,
    oracles: Rc<dyn OracleRegistry>,
    parameters: Rc<dyn Parameters>,
    registry: Rc<dyn Registry>,
    tokens: Rc<dyn TokenMetadata>,
    clock: Rc<dyn Clock>,
    guard: ReentrancyGuard,
    events: RefCell<EventLog>,
}

impl fmt::Debug for PositionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PositionManager")
            .field("guard", &self.guard)
            .field("events", &self.events.borrow().len())
            .finish_non_exhaustive()
    }
}

impl PositionManager {
    /// Start building a manager
    pub fn builder() -> PositionManagerBuilder {
        PositionManagerBuilder::new()
    }

    // ============ Guarded Operations ============

    /// Deposit `collateral` and/or borrow `debt` on the (asset, owner) position
    ///
    /// A debt-free join only deposits and never consults an oracle. Any
    /// borrow resolves the oracle first, spawns the position if it has no
    /// principal yet, and checks collateralization against `proof` after
    /// the ledger has been updated.
    ///
    /// # Errors
    /// `UselessOperation` if both amounts are zero, `UnsupportedDecimals`
    /// for assets above 18 decimals, `Undercollateralized` if the resulting
    /// debt exceeds the limit, plus any oracle or vault error.
    pub fn join(
        &self,
        owner: &Address,
        asset: &AssetId,
        collateral: Amount,
        debt: Amount,
        proof: &PriceProof,
    ) -> UsdpResult<()> {
        debug!(asset = %Short(asset), owner = %Short(owner), collateral, debt, "join");

        self.run_guarded("join", asset, owner, || {
            // 1. Reject no-op requests
            if collateral == 0 && debt == 0 {
                return Err(UsdpError::UselessOperation);
            }

            // 2. Reject assets whose decimals cannot be normalised
            self.ensure_supported_asset(asset)?;

            if debt == 0 {
                // 3a. Collateral-only top up
                self.vault.deposit(asset, owner, collateral)?;
            } else {
                // 3b. Resolve the oracle before touching the ledger
                let resolved = self.resolve(asset)?;

                // 4. First borrow binds the position to the resolved oracle
                if self.vault.debt(asset, owner) == 0 {
                    self.vault.spawn(asset, owner, resolved.oracle_type)?;
                    info!(
                        asset = %Short(asset),
                        owner = %Short(owner),
                        oracle_type = resolved.oracle_type.0,
                        "position spawned"
                    );
                }

                // 5. Move value
                if collateral != 0 {
                    self.vault.deposit(asset, owner, collateral)?;
                }
                self.vault.borrow(asset, owner, debt)?;

                // 6. Check the resulting position
                self.ensure_collateralization(asset, owner, &resolved, proof)?;
            }

            let event = PositionEvent::Join {
                position_id: types::position_id(asset, owner),
                asset: *asset,
                owner: *owner,
                collateral,
                debt,
            };
            Ok(((), event))
        })
    }

    /// Withdraw `collateral` and/or repay `debt` principal
    ///
    /// `debt` is clamped to the outstanding principal, so passing any amount
    /// at or above it repays in full; the accrued fee is charged on top.
    /// Returns the principal actually repaid.
    ///
    /// # Errors
    /// `UselessOperation` if both amounts are zero after clamping. A partial
    /// withdrawal that leaves debt behind fails with `Undercollateralized`
    /// if the remaining collateral no longer covers it.
    pub fn exit(
        &self,
        owner: &Address,
        asset: &AssetId,
        collateral: Amount,
        debt: Amount,
        proof: &PriceProof,
    ) -> UsdpResult<Amount> {
        debug!(asset = %Short(asset), owner = %Short(owner), collateral, debt, "exit");

        self.run_guarded("exit", asset, owner, || {
            // 1. Clamp to the outstanding principal
            let principal = self.vault.debt(asset, owner);
            let repaid = debt.min(principal);

            // 2. A destroyed position has nothing left to repay
            if collateral == 0 && repaid == 0 {
                return Err(UsdpError::UselessOperation);
            }

            if collateral == 0 {
                // 3a. Repayment only
                self.repay(asset, owner, repaid)?;
            } else if repaid == principal {
                // 3b. Withdrawal that leaves no debt behind
                self.vault.withdraw(asset, owner, collateral)?;
                if repaid != 0 {
                    self.repay(asset, owner, repaid)?;
                }
            } else {
                // 3c. Withdrawal with debt remaining
                let resolved = self.resolve(asset)?;
                self.vault.withdraw(asset, owner, collateral)?;
                if repaid != 0 {
                    self.repay(asset, owner, repaid)?;
                }
                self.vault.update(asset, owner)?;
                self.ensure_collateralization(asset, owner, &resolved, proof)?;
            }

            let event = PositionEvent::Exit {
                position_id: types::position_id(asset, owner),
                asset: *asset,
                owner: *owner,
                collateral,
                debt: repaid,
            };
            Ok((repaid, event))
        })
    }

    /// Exit repaying `target` in total, stability fee included
    ///
    /// Back-solves the principal whose repayment plus fee equals `target`
    /// and delegates to [`exit`](Self::exit). The result may be short of
    /// `target` by integer rounding.
    pub fn exit_target_repayment(
        &self,
        owner: &Address,
        asset: &AssetId,
        collateral: Amount,
        target: Amount,
        proof: &PriceProof,
    ) -> UsdpResult<Amount> {
        let elapsed = self
            .clock
            .now()
            .saturating_sub(self.vault.last_update(asset, owner));
        let principal =
            risk::principal_for_repayment(target, self.vault.stability_fee(asset, owner), elapsed)?;

        debug!(target, principal, elapsed, "target repayment resolved");

        self.exit(owner, asset, collateral, principal, proof)
    }

    /// Hand an unsafe position to the liquidation auction
    ///
    /// The auction starts at the collateral value minus the liquidation
    /// discount. Callable by anyone.
    ///
    /// # Errors
    /// `SafePosition` if the position is below the liquidation ratio.
    pub fn trigger_liquidation(
        &self,
        asset: &AssetId,
        owner: &Address,
        proof: &PriceProof,
    ) -> UsdpResult<()> {
        debug!(asset = %Short(asset), owner = %Short(owner), "trigger_liquidation");

        self.run_guarded("trigger_liquidation", asset, owner, || {
            // 1. Value the collateral
            self.ensure_supported_asset(asset)?;
            let resolved = self.resolve(asset)?;
            let usd_value = self.valuation(asset, owner, &resolved, proof)?;

            // 2. Only unsafe positions can be liquidated
            let total_debt = self.vault.total_debt(asset, owner)?;
            if !risk::is_liquidatable(total_debt, usd_value, self.parameters.liquidation_ratio(asset))? {
                return Err(UsdpError::SafePosition);
            }

            // 3. Start the auction below market
            let initial_price =
                risk::initial_liquidation_price(usd_value, self.parameters.liquidation_discount(asset))?;
            self.vault.trigger_liquidation(asset, owner, initial_price)?;

            info!(
                asset = %Short(asset),
                owner = %Short(owner),
                total_debt,
                %initial_price,
                "liquidation triggered"
            );

            let event = PositionEvent::LiquidationTriggered {
                position_id: types::position_id(asset, owner),
                asset: *asset,
                owner: *owner,
            };
            Ok(((), event))
        })
    }

    // ============ Queries ============

    /// Q112 USD value of the position's collateral under `proof`
    pub fn collateral_usd_value(
        &self,
        asset: &AssetId,
        owner: &Address,
        proof: &PriceProof,
    ) -> UsdpResult<U256> {
        self.ensure_supported_asset(asset)?;
        let resolved = self.resolve(asset)?;
        self.valuation(asset, owner, &resolved, proof)
    }

    /// Returns true if the position has reached the liquidation ratio
    ///
    /// A position without debt is never liquidatable and skips the oracle.
    pub fn is_liquidatable_position(
        &self,
        asset: &AssetId,
        owner: &Address,
        proof: &PriceProof,
    ) -> UsdpResult<bool> {
        let total_debt = self.vault.total_debt(asset, owner)?;
        if total_debt == 0 {
            return Ok(false);
        }
        let usd_value = self.collateral_usd_value(asset, owner, proof)?;
        risk::is_liquidatable(total_debt, usd_value, self.parameters.liquidation_ratio(asset))
    }

    /// Debt as a percentage of collateral value, scaled by Q112
    pub fn utilization_ratio(
        &self,
        asset: &AssetId,
        owner: &Address,
        proof: &PriceProof,
    ) -> UsdpResult<U256> {
        let total_debt = self.vault.total_debt(asset, owner)?;
        if total_debt == 0 {
            return Ok(U256::zero());
        }
        let usd_value = self.collateral_usd_value(asset, owner, proof)?;
        risk::utilization_ratio(total_debt, usd_value)
    }

    /// Collateral price at which the position becomes liquidatable
    ///
    /// Computed from the position alone, without a price proof.
    pub fn liquidation_price(&self, asset: &AssetId, owner: &Address) -> UsdpResult<LiquidationPrice> {
        risk::liquidation_price(
            self.vault.total_debt(asset, owner)?,
            self.vault.collateral(asset, owner),
            self.parameters.liquidation_ratio(asset),
            self.tokens.decimals(asset),
        )
    }

    /// Snapshot of the position as held by the vault
    pub fn position(&self, asset: &AssetId, owner: &Address) -> UsdpResult<PositionSnapshot> {
        Ok(PositionSnapshot {
            id: types::position_id(asset, owner),
            asset: *asset,
            owner: *owner,
            collateral: self.vault.collateral(asset, owner),
            debt_principal: self.vault.debt(asset, owner),
            total_debt: self.vault.total_debt(asset, owner)?,
            stability_fee: self.vault.stability_fee(asset, owner),
            last_update: self.vault.last_update(asset, owner),
            oracle_type: self.vault.oracle_type(asset, owner),
        })
    }

    /// Identifier of the (asset, owner) position
    pub fn position_id(&self, asset: &AssetId, owner: &Address) -> PositionId {
        types::position_id(asset, owner)
    }

    /// Events published so far
    pub fn events(&self) -> Vec<PositionEvent> {
        self.events.borrow().events().to_vec()
    }

    /// Published events of one type
    pub fn events_of_type(&self, event_type: EventType) -> Vec<PositionEvent> {
        self.events
            .borrow()
            .filter_by_type(event_type)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Take every published event, leaving the log empty
    pub fn take_events(&self) -> Vec<PositionEvent> {
        self.events.borrow_mut().drain()
    }

    // ============ Internals ============

    /// Run `body` under the guard inside a vault savepoint
    fn run_guarded<T>(
        &self,
        operation: &'static str,
        asset: &AssetId,
        owner: &Address,
        body: impl FnOnce() -> UsdpResult<(T, PositionEvent)>,
    ) -> UsdpResult<T> {
        let _scope = self.guard.enter().map_err(|err| {
            warn!(operation, "re-entrant call rejected");
            err
        })?;

        let savepoint = self.vault.begin();
        let outcome = match body() {
            Ok((value, event)) => {
                self.vault.commit(savepoint);
                self.events.borrow_mut().emit(event);
                Ok(value)
            }
            Err(err) => {
                self.vault.rollback(savepoint);
                warn!(operation, code = err.code(), error = %err, "operation rolled back");
                Err(err)
            }
        };

        self.registry.checkpoint(asset, owner);
        outcome
    }

    /// Charge the fee on `amount`, repay it, and destroy on the zero transition
    fn repay(&self, asset: &AssetId, owner: &Address, amount: Amount) -> UsdpResult<()> {
        let fee = self.vault.calculate_fee(asset, owner, amount)?;
        self.vault.charge_fee(owner, fee)?;

        let debt_after = self.vault.repay(asset, owner, amount)?;
        if amount != 0 && debt_after == 0 {
            self.vault.destroy(asset, owner)?;
            info!(asset = %Short(asset), owner = %Short(owner), "position destroyed");
        }
        Ok(())
    }

    /// Require total debt to stay within the initial collateral ratio
    fn ensure_collateralization(
        &self,
        asset: &AssetId,
        owner: &Address,
        resolved: &ResolvedOracle,
        proof: &PriceProof,
    ) -> UsdpResult<()> {
        let usd_value = self.valuation(asset, owner, resolved, proof)?;
        let total_debt = self.vault.total_debt(asset, owner)?;
        risk::ensure_collateralized(
            total_debt,
            usd_value,
            self.parameters.initial_collateral_ratio(asset),
        )
    }

    /// Value the current collateral with an already resolved oracle
    fn valuation(
        &self,
        asset: &AssetId,
        owner: &Address,
        resolved: &ResolvedOracle,
        proof: &PriceProof,
    ) -> UsdpResult<U256> {
        self.ensure_supported_asset(asset)?;
        let collateral = self.vault.collateral(asset, owner);
        resolved.oracle.asset_to_usd(asset, collateral, proof)
    }

    fn ensure_supported_asset(&self, asset: &AssetId) -> UsdpResult<()> {
        ensure_supported_decimals(self.tokens.decimals(asset))
    }

    fn resolve(&self, asset: &AssetId) -> UsdpResult<ResolvedOracle> {
        resolve_oracle(self.oracles.as_ref(), self.parameters.as_ref(), asset)
    }
}

/// Leading bytes of an identifier, for log fields
struct Short<'a>(&'a [u8; 32]);

impl fmt::Display for Short<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..4] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_formatting() {
        let mut id = [0u8; 32];
        id[0] = 0xab;
        id[3] = 0x01;
        id[4] = 0xff;
        assert_eq!(Short(&id).to_string(), "ab000001");
    }
}
