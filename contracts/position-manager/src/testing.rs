//! In-Memory Collaborators
//!
//! Single-threaded implementations of every collaborator trait, used by the
//! crate's own tests and by downstream crates through the `testing` feature.
//!
//! [`InMemoryVault`] keeps a full ledger (positions, wallets, USDP balances,
//! collected fees) and journals it by snapshot, so a rolled-back operation
//! leaves no trace. Every mutating call is recorded and may trigger a hook,
//! which is how tests simulate a collaborator calling back into the manager.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use usdp_common::{
    constants::token::MAX_DECIMALS,
    errors::{UsdpError, UsdpResult},
    interfaces::{Clock, OracleRegistry, Parameters, Registry, TokenMetadata, UsdOracle, Vault},
    math::{accrued_fee, decimals_multiplier, mul, safe_add, safe_sub, to_q112},
    types::{Address, Amount, AssetId, OracleType, PriceProof, Savepoint, Timestamp},
    U256,
};

// ============ Clock ============

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Timestamp>,
}

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        Self { now: Cell::new(now) }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.set(now);
    }

    pub fn advance(&self, seconds: u64) {
        self.now.set(self.now.get().saturating_add(seconds));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.get()
    }
}

// ============ Vault ============

/// Debt-side and collateral-side state of one position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionRecord {
    pub collateral: Amount,
    pub debt: Amount,
    pub stability_fee: u128,
    pub last_update: Timestamp,
    pub oracle_type: OracleType,
}

/// Auction start recorded by [`InMemoryVault::trigger_liquidation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationRecord {
    pub asset: AssetId,
    pub owner: Address,
    pub initial_price: U256,
}

/// Everything the vault journals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    pub positions: BTreeMap<(AssetId, Address), PositionRecord>,
    /// Collateral held by owners outside any position
    pub wallets: BTreeMap<(AssetId, Address), Amount>,
    pub usdp_balances: BTreeMap<Address, Amount>,
    pub fees_collected: Amount,
    pub liquidations: Vec<LiquidationRecord>,
}

/// Mutating vault entry points, in call order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultCall {
    Spawn,
    Deposit,
    Withdraw,
    Borrow,
    Repay,
    Destroy,
    Update,
    ChargeFee,
    TriggerLiquidation,
}

type CallHook = Box<dyn Fn(VaultCall)>;

/// Journaled in-memory ledger
pub struct InMemoryVault {
    clock: Rc<dyn Clock>,
    ledger: RefCell<Ledger>,
    snapshots: RefCell<Vec<Ledger>>,
    stability_fees: RefCell<BTreeMap<AssetId, u128>>,
    calls: RefCell<Vec<VaultCall>>,
    hook: RefCell<Option<CallHook>>,
}

impl std::fmt::Debug for InMemoryVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVault")
            .field("ledger", &self.ledger.borrow())
            .field("open_savepoints", &self.snapshots.borrow().len())
            .finish_non_exhaustive()
    }
}

impl InMemoryVault {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            ledger: RefCell::new(Ledger::default()),
            snapshots: RefCell::new(Vec::new()),
            stability_fees: RefCell::new(BTreeMap::new()),
            calls: RefCell::new(Vec::new()),
            hook: RefCell::new(None),
        }
    }

    // ============ Setup ============

    /// Annual fee applied to positions of `asset` spawned from now on
    pub fn set_stability_fee(&self, asset: &AssetId, stability_fee: u128) {
        self.stability_fees.borrow_mut().insert(*asset, stability_fee);
    }

    /// Give `owner` collateral to deposit
    pub fn fund_collateral(&self, asset: &AssetId, owner: &Address, amount: Amount) {
        *self.ledger.borrow_mut().wallets.entry((*asset, *owner)).or_default() += amount;
    }

    /// Give `owner` USDP, e.g. to cover stability fees
    pub fn fund_usdp(&self, owner: &Address, amount: Amount) {
        *self.ledger.borrow_mut().usdp_balances.entry(*owner).or_default() += amount;
    }

    /// Call `hook` at the start of every mutating call
    pub fn on_call(&self, hook: impl Fn(VaultCall) + 'static) {
        *self.hook.borrow_mut() = Some(Box::new(hook));
    }

    pub fn clear_hook(&self) {
        *self.hook.borrow_mut() = None;
    }

    // ============ Inspection ============

    pub fn ledger(&self) -> Ledger {
        self.ledger.borrow().clone()
    }

    pub fn wallet(&self, asset: &AssetId, owner: &Address) -> Amount {
        self.ledger.borrow().wallets.get(&(*asset, *owner)).copied().unwrap_or(0)
    }

    pub fn usdp_balance(&self, owner: &Address) -> Amount {
        self.ledger.borrow().usdp_balances.get(owner).copied().unwrap_or(0)
    }

    pub fn fees_collected(&self) -> Amount {
        self.ledger.borrow().fees_collected
    }

    pub fn liquidations(&self) -> Vec<LiquidationRecord> {
        self.ledger.borrow().liquidations.clone()
    }

    /// Every mutating call so far, including rolled-back ones
    pub fn calls(&self) -> Vec<VaultCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self, call: VaultCall) -> usize {
        self.calls.borrow().iter().filter(|c| **c == call).count()
    }

    pub fn open_savepoints(&self) -> usize {
        self.snapshots.borrow().len()
    }

    // ============ Internals ============

    fn record(&self, call: VaultCall) {
        self.calls.borrow_mut().push(call);
        if let Some(hook) = self.hook.borrow().as_ref() {
            hook(call);
        }
    }

    fn read<R>(&self, asset: &AssetId, owner: &Address, f: impl FnOnce(&PositionRecord) -> R) -> R {
        let ledger = self.ledger.borrow();
        match ledger.positions.get(&(*asset, *owner)) {
            Some(record) => f(record),
            None => f(&PositionRecord::default()),
        }
    }

    fn write<R>(
        &self,
        asset: &AssetId,
        owner: &Address,
        f: impl FnOnce(&mut Ledger, &mut PositionRecord) -> UsdpResult<R>,
    ) -> UsdpResult<R> {
        let mut ledger = self.ledger.borrow_mut();
        let key = (*asset, *owner);
        let mut record = ledger.positions.get(&key).cloned().unwrap_or_default();

        let result = f(&mut *ledger, &mut record)?;

        if record == PositionRecord::default() {
            ledger.positions.remove(&key);
        } else {
            ledger.positions.insert(key, record);
        }
        Ok(result)
    }

    fn elapsed(&self, record: &PositionRecord) -> u64 {
        self.clock.now().saturating_sub(record.last_update)
    }

    fn accrue(&self, record: &mut PositionRecord) -> UsdpResult<()> {
        let fee = accrued_fee(record.debt, record.stability_fee, self.elapsed(record))?;
        record.debt = safe_add(record.debt, fee)?;
        record.last_update = self.clock.now();
        Ok(())
    }
}

impl Vault for InMemoryVault {
    fn collateral(&self, asset: &AssetId, owner: &Address) -> Amount {
        self.read(asset, owner, |r| r.collateral)
    }

    fn debt(&self, asset: &AssetId, owner: &Address) -> Amount {
        self.read(asset, owner, |r| r.debt)
    }

    fn total_debt(&self, asset: &AssetId, owner: &Address) -> UsdpResult<Amount> {
        let record = self.read(asset, owner, PositionRecord::clone);
        let fee = accrued_fee(record.debt, record.stability_fee, self.elapsed(&record))?;
        safe_add(record.debt, fee)
    }

    fn stability_fee(&self, asset: &AssetId, owner: &Address) -> u128 {
        self.read(asset, owner, |r| r.stability_fee)
    }

    fn last_update(&self, asset: &AssetId, owner: &Address) -> Timestamp {
        self.read(asset, owner, |r| r.last_update)
    }

    fn oracle_type(&self, asset: &AssetId, owner: &Address) -> OracleType {
        self.read(asset, owner, |r| r.oracle_type)
    }

    fn spawn(&self, asset: &AssetId, owner: &Address, oracle_type: OracleType) -> UsdpResult<()> {
        self.record(VaultCall::Spawn);
        let stability_fee = self.stability_fees.borrow().get(asset).copied().unwrap_or(0);
        let now = self.clock.now();
        self.write(asset, owner, |_, record| {
            record.oracle_type = oracle_type;
            record.stability_fee = stability_fee;
            record.last_update = now;
            Ok(())
        })
    }

    fn deposit(&self, asset: &AssetId, owner: &Address, amount: Amount) -> UsdpResult<()> {
        self.record(VaultCall::Deposit);
        self.write(asset, owner, |ledger, record| {
            let wallet = ledger.wallets.entry((*asset, *owner)).or_default();
            if *wallet < amount {
                return Err(UsdpError::InsufficientCollateral {
                    available: *wallet,
                    requested: amount,
                });
            }
            *wallet -= amount;
            record.collateral = safe_add(record.collateral, amount)?;
            Ok(())
        })
    }

    fn withdraw(&self, asset: &AssetId, owner: &Address, amount: Amount) -> UsdpResult<()> {
        self.record(VaultCall::Withdraw);
        self.write(asset, owner, |ledger, record| {
            if record.collateral < amount {
                return Err(UsdpError::InsufficientCollateral {
                    available: record.collateral,
                    requested: amount,
                });
            }
            record.collateral -= amount;
            let wallet = ledger.wallets.entry((*asset, *owner)).or_default();
            *wallet = safe_add(*wallet, amount)?;
            Ok(())
        })
    }

    fn borrow(&self, asset: &AssetId, owner: &Address, amount: Amount) -> UsdpResult<Amount> {
        self.record(VaultCall::Borrow);
        self.write(asset, owner, |ledger, record| {
            self.accrue(record)?;
            record.debt = safe_add(record.debt, amount)?;
            let balance = ledger.usdp_balances.entry(*owner).or_default();
            *balance = safe_add(*balance, amount)?;
            Ok(record.debt)
        })
    }

    fn repay(&self, asset: &AssetId, owner: &Address, amount: Amount) -> UsdpResult<Amount> {
        self.record(VaultCall::Repay);
        self.write(asset, owner, |ledger, record| {
            if record.debt < amount {
                return Err(UsdpError::InsufficientDebt {
                    available: record.debt,
                    requested: amount,
                });
            }
            let balance = ledger.usdp_balances.entry(*owner).or_default();
            *balance = safe_sub(*balance, amount)?;
            record.debt -= amount;
            Ok(record.debt)
        })
    }

    fn destroy(&self, asset: &AssetId, owner: &Address) -> UsdpResult<()> {
        self.record(VaultCall::Destroy);
        self.write(asset, owner, |_, record| {
            record.stability_fee = 0;
            record.last_update = 0;
            record.oracle_type = OracleType::UNSET;
            Ok(())
        })
    }

    fn update(&self, asset: &AssetId, owner: &Address) -> UsdpResult<()> {
        self.record(VaultCall::Update);
        self.write(asset, owner, |_, record| self.accrue(record))
    }

    fn calculate_fee(&self, asset: &AssetId, owner: &Address, amount: Amount) -> UsdpResult<Amount> {
        let record = self.read(asset, owner, PositionRecord::clone);
        accrued_fee(amount, record.stability_fee, self.elapsed(&record))
    }

    fn charge_fee(&self, owner: &Address, amount: Amount) -> UsdpResult<()> {
        self.record(VaultCall::ChargeFee);
        let mut ledger = self.ledger.borrow_mut();
        let balance = ledger.usdp_balances.entry(*owner).or_default();
        *balance = safe_sub(*balance, amount)?;
        ledger.fees_collected = safe_add(ledger.fees_collected, amount)?;
        Ok(())
    }

    fn trigger_liquidation(&self, asset: &AssetId, owner: &Address, initial_price: U256) -> UsdpResult<()> {
        self.record(VaultCall::TriggerLiquidation);
        self.ledger.borrow_mut().liquidations.push(LiquidationRecord {
            asset: *asset,
            owner: *owner,
            initial_price,
        });
        Ok(())
    }

    fn begin(&self) -> Savepoint {
        let mut snapshots = self.snapshots.borrow_mut();
        snapshots.push(self.ledger.borrow().clone());
        Savepoint(snapshots.len() as u64 - 1)
    }

    fn commit(&self, savepoint: Savepoint) {
        self.snapshots.borrow_mut().truncate(savepoint.0 as usize);
    }

    fn rollback(&self, savepoint: Savepoint) {
        let mut snapshots = self.snapshots.borrow_mut();
        if let Some(snapshot) = snapshots.get(savepoint.0 as usize) {
            *self.ledger.borrow_mut() = snapshot.clone();
        }
        snapshots.truncate(savepoint.0 as usize);
    }
}

// ============ Oracles ============

/// Oracle returning `amount * price` from a configured per-unit Q112 price
///
/// Optionally insists on one exact proof, to exercise proof failures.
#[derive(Debug, Default)]
pub struct FixedPriceOracle {
    prices: RefCell<BTreeMap<AssetId, U256>>,
    required_proof: RefCell<Option<PriceProof>>,
    calls: Cell<usize>,
}

impl FixedPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Q112 USD (18-decimal units) per native unit of `asset`
    pub fn set_unit_price(&self, asset: &AssetId, price_q112: U256) {
        self.prices.borrow_mut().insert(*asset, price_q112);
    }

    /// Price one whole token of `asset` at `usd` dollars
    pub fn set_usd_price(&self, asset: &AssetId, usd: u128, decimals: u8) -> UsdpResult<()> {
        let unit_price = mul(to_q112(usd)?, decimals_multiplier(decimals)?)?;
        self.set_unit_price(asset, unit_price);
        Ok(())
    }

    /// Reject every proof except `proof`
    pub fn require_proof(&self, proof: PriceProof) {
        *self.required_proof.borrow_mut() = Some(proof);
    }

    /// Number of valuations served
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl UsdOracle for FixedPriceOracle {
    fn asset_to_usd(&self, asset: &AssetId, amount: Amount, proof: &PriceProof) -> UsdpResult<U256> {
        self.calls.set(self.calls.get() + 1);

        if let Some(required) = self.required_proof.borrow().as_ref() {
            if required != proof {
                return Err(UsdpError::InvalidPriceProof { reason: "proof mismatch" });
            }
        }

        let price = self
            .prices
            .borrow()
            .get(asset)
            .copied()
            .ok_or(UsdpError::AssetNotSupported)?;
        mul(U256::from(amount), price)
    }
}

/// Oracle registry with a fixed priority list
#[derive(Default)]
pub struct StaticOracleRegistry {
    priority: RefCell<Vec<OracleType>>,
    oracles: RefCell<BTreeMap<OracleType, Rc<dyn UsdOracle>>>,
}

impl StaticOracleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `oracle`, appending its type to the priority list if new
    pub fn register(&self, oracle_type: OracleType, oracle: Rc<dyn UsdOracle>) {
        let mut priority = self.priority.borrow_mut();
        if !priority.contains(&oracle_type) {
            priority.push(oracle_type);
        }
        self.oracles.borrow_mut().insert(oracle_type, oracle);
    }

    /// Remove the oracle behind `oracle_type`, keeping its priority slot
    pub fn unregister(&self, oracle_type: OracleType) {
        self.oracles.borrow_mut().remove(&oracle_type);
    }
}

impl OracleRegistry for StaticOracleRegistry {
    fn oracle_types_in_priority(&self) -> Vec<OracleType> {
        self.priority.borrow().clone()
    }

    fn oracle_by_type(&self, oracle_type: OracleType) -> Option<Rc<dyn UsdOracle>> {
        self.oracles.borrow().get(&oracle_type).cloned()
    }
}

// ============ Parameters ============

/// Risk parameters of one collateral asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetParameters {
    pub initial_collateral_ratio: u128,
    pub liquidation_ratio: u128,
    pub liquidation_discount: u128,
    pub enabled_oracles: BTreeSet<OracleType>,
}

impl AssetParameters {
    pub fn new(initial_collateral_ratio: u128, liquidation_ratio: u128, liquidation_discount: u128) -> Self {
        Self {
            initial_collateral_ratio,
            liquidation_ratio,
            liquidation_discount,
            enabled_oracles: BTreeSet::new(),
        }
    }

    pub fn with_oracle(mut self, oracle_type: OracleType) -> Self {
        self.enabled_oracles.insert(oracle_type);
        self
    }
}

/// Parameters table; unknown assets have zero ratios and no oracles
#[derive(Debug, Default)]
pub struct StaticParameters {
    assets: RefCell<BTreeMap<AssetId, AssetParameters>>,
}

impl StaticParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, asset: &AssetId, parameters: AssetParameters) {
        self.assets.borrow_mut().insert(*asset, parameters);
    }

    pub fn enable_oracle(&self, asset: &AssetId, oracle_type: OracleType) {
        if let Some(params) = self.assets.borrow_mut().get_mut(asset) {
            params.enabled_oracles.insert(oracle_type);
        }
    }

    pub fn disable_oracle(&self, asset: &AssetId, oracle_type: OracleType) {
        if let Some(params) = self.assets.borrow_mut().get_mut(asset) {
            params.enabled_oracles.remove(&oracle_type);
        }
    }

    fn lookup<R>(&self, asset: &AssetId, f: impl FnOnce(&AssetParameters) -> R) -> Option<R> {
        self.assets.borrow().get(asset).map(f)
    }
}

impl Parameters for StaticParameters {
    fn initial_collateral_ratio(&self, asset: &AssetId) -> u128 {
        self.lookup(asset, |p| p.initial_collateral_ratio).unwrap_or(0)
    }

    fn liquidation_ratio(&self, asset: &AssetId) -> u128 {
        self.lookup(asset, |p| p.liquidation_ratio).unwrap_or(0)
    }

    fn liquidation_discount(&self, asset: &AssetId) -> u128 {
        self.lookup(asset, |p| p.liquidation_discount).unwrap_or(0)
    }

    fn is_oracle_type_enabled(&self, oracle_type: OracleType, asset: &AssetId) -> bool {
        self.lookup(asset, |p| p.enabled_oracles.contains(&oracle_type))
            .unwrap_or(false)
    }
}

// ============ Registry & Metadata ============

/// Registry that remembers every checkpoint
#[derive(Debug, Default)]
pub struct RecordingRegistry {
    checkpoints: RefCell<Vec<(AssetId, Address)>>,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkpoints(&self) -> Vec<(AssetId, Address)> {
        self.checkpoints.borrow().clone()
    }
}

impl Registry for RecordingRegistry {
    fn checkpoint(&self, asset: &AssetId, owner: &Address) {
        self.checkpoints.borrow_mut().push((*asset, *owner));
    }
}

/// Token decimals table; unknown tokens report 18
#[derive(Debug, Default)]
pub struct StaticTokenMetadata {
    decimals: RefCell<BTreeMap<AssetId, u8>>,
}

impl StaticTokenMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_decimals(&self, asset: &AssetId, decimals: u8) {
        self.decimals.borrow_mut().insert(*asset, decimals);
    }
}

impl TokenMetadata for StaticTokenMetadata {
    fn decimals(&self, asset: &AssetId) -> u8 {
        self.decimals.borrow().get(asset).copied().unwrap_or(MAX_DECIMALS)
    }
}
