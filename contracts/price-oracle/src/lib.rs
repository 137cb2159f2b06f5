//! Committed Price Oracle
//!
//! A [`UsdOracle`] whose price proofs are attestations bound to block
//! commitments published by a trusted operator. The position manager treats
//! the proof as opaque bytes; this crate is the only place that decodes it.
//!
//! ## Proof Format
//!
//! A proof is a borsh-encoded [`PriceAttestation`]. It is accepted when:
//! - the oracle is active and the asset is registered with matching decimals
//! - the referenced block was committed by the operator
//! - the block is at least `min_proof_age_blocks` and at most
//!   `max_proof_age_blocks` behind the latest commitment
//! - `sha256(asset || block_number || price_q112 || block_hash)` matches
//!
//! ## Roles
//!
//! - **operator**: commits block hashes
//! - **admin**: registers assets, rotates the operator, toggles the oracle

use std::cell::RefCell;
use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use usdp_common::{
    constants::oracle::{MAX_PROOF_AGE_BLOCKS, MIN_PROOF_AGE_BLOCKS},
    errors::{UsdpError, UsdpResult},
    interfaces::UsdOracle,
    math::{decimals_multiplier, ensure_supported_decimals, mul},
    types::{Address, Amount, AssetId, OracleType, PriceProof},
    U256,
};


/// Block hash as committed by the operator
pub type BlockHash = [u8; 32];

// ============ Configuration ============

/// Static oracle configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct OracleConfig {
    /// Type under which the oracle is registered; reported when disabled
    pub oracle_type: OracleType,
    /// Youngest acceptable proof block, in blocks behind the head
    pub min_proof_age_blocks: u64,
    /// Oldest acceptable proof block, in blocks behind the head
    pub max_proof_age_blocks: u64,
}

impl OracleConfig {
    pub fn new(oracle_type: OracleType) -> Self {
        Self {
            oracle_type,
            min_proof_age_blocks: MIN_PROOF_AGE_BLOCKS,
            max_proof_age_blocks: MAX_PROOF_AGE_BLOCKS,
        }
    }
}

// ============ Attestation ============

/// Price claim carried inside a [`PriceProof`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PriceAttestation {
    /// Priced asset
    pub asset: AssetId,
    /// Block the price was observed at
    pub block_number: u64,
    /// Q112 USD per 18-decimal-normalised unit, big-endian
    pub price_q112: [u8; 32],
    /// Decimals the asset is expected to report
    pub decimals: u8,
    /// Binding of the price to the committed block hash
    pub commitment: [u8; 32],
}

impl PriceAttestation {
    /// Build an attestation committed to `block_hash`
    pub fn new(
        asset: AssetId,
        block_number: u64,
        price_q112: U256,
        decimals: u8,
        block_hash: &BlockHash,
    ) -> Self {
        let mut price_bytes = [0u8; 32];
        price_q112.to_big_endian(&mut price_bytes);

        Self {
            asset,
            block_number,
            price_q112: price_bytes,
            decimals,
            commitment: price_commitment(&asset, block_number, &price_bytes, block_hash),
        }
    }

    /// Attested price
    pub fn price(&self) -> U256 {
        U256::from_big_endian(&self.price_q112)
    }

    /// Encode as an opaque proof
    pub fn to_proof(&self) -> PriceProof {
        PriceProof::new(borsh::to_vec(self).unwrap_or_default())
    }

    /// Decode from proof bytes
    pub fn from_proof(proof: &PriceProof) -> UsdpResult<Self> {
        borsh::from_slice(proof.as_bytes()).map_err(|_| UsdpError::InvalidPriceProof {
            reason: "malformed attestation",
        })
    }
}

/// sha256(asset || block_number (LE) || price_q112 (BE) || block_hash)
pub fn price_commitment(
    asset: &AssetId,
    block_number: u64,
    price_q112: &[u8; 32],
    block_hash: &BlockHash,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(asset);
    hasher.update(block_number.to_le_bytes());
    hasher.update(price_q112);
    hasher.update(block_hash);
    let result = hasher.finalize();
    let mut commitment = [0u8; 32];
    commitment.copy_from_slice(&result);
    commitment
}

// ============ Oracle State ============

/// Mutable oracle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct OracleState {
    /// Authorized operator (commits blocks)
    pub operator: Address,
    /// Admin (assets, operator, activation)
    pub admin: Address,
    /// Whether proofs are accepted
    pub is_active: bool,
    /// Highest committed block
    pub head_block: u64,
    /// Committed hashes still inside the proof window
    pub block_hashes: BTreeMap<u64, BlockHash>,
    /// Registered assets and their decimals
    pub assets: BTreeMap<AssetId, u8>,
}

/// Oracle verifying operator-committed price attestations
#[derive(Debug)]
pub struct CommittedPriceOracle {
    config: OracleConfig,
    state: RefCell<OracleState>,
}

impl CommittedPriceOracle {
    /// Create an active oracle with no commitments
    ///
    /// # Errors
    /// Returns `UsdpError::InvalidArgument` if admin or operator is the zero address.
    pub fn new(admin: Address, operator: Address, config: OracleConfig) -> UsdpResult<Self> {
        if admin == [0u8; 32] {
            return Err(UsdpError::InvalidArgument { collaborator: "admin" });
        }
        if operator == [0u8; 32] {
            return Err(UsdpError::InvalidArgument { collaborator: "operator" });
        }

        Ok(Self {
            config,
            state: RefCell::new(OracleState {
                operator,
                admin,
                is_active: true,
                head_block: 0,
                block_hashes: BTreeMap::new(),
                assets: BTreeMap::new(),
            }),
        })
    }

    // ============ Operator ============

    /// Publish the hash of `block_number`
    ///
    /// Blocks must be committed in increasing order. Commitments that fall
    /// out of the proof window are dropped.
    pub fn commit_block(&self, signer: &Address, block_number: u64, block_hash: BlockHash) -> UsdpResult<()> {
        let mut state = self.state.borrow_mut();

        // 1. Only operator can commit
        if *signer != state.operator {
            return Err(UsdpError::Unauthorized {
                expected: state.operator,
                actual: *signer,
            });
        }

        // 2. Oracle must be active
        if !state.is_active {
            return Err(self.disabled());
        }

        // 3. Heads only move forward
        if block_number <= state.head_block && !state.block_hashes.is_empty() {
            return Err(UsdpError::UselessOperation);
        }

        state.block_hashes.insert(block_number, block_hash);
        state.head_block = block_number;

        // 4. Forget blocks no proof may reference any more
        let oldest = block_number.saturating_sub(self.config.max_proof_age_blocks);
        state.block_hashes = state.block_hashes.split_off(&oldest);

        debug!(block_number, retained = state.block_hashes.len(), "block committed");
        Ok(())
    }

    // ============ Admin ============

    /// Accept proofs for `asset`, which must report `decimals`
    pub fn add_asset(&self, signer: &Address, asset: AssetId, decimals: u8) -> UsdpResult<()> {
        let mut state = self.state.borrow_mut();
        Self::ensure_admin(&state, signer)?;
        ensure_supported_decimals(decimals)?;

        state.assets.insert(asset, decimals);
        Ok(())
    }

    /// Hand the operator role to `new_operator`
    pub fn set_operator(&self, signer: &Address, new_operator: Address) -> UsdpResult<()> {
        let mut state = self.state.borrow_mut();

        // 1. Only admin can change operator
        Self::ensure_admin(&state, signer)?;

        // 2. New operator must be different
        if new_operator == state.operator {
            return Err(UsdpError::UselessOperation);
        }
        if new_operator == [0u8; 32] {
            return Err(UsdpError::InvalidArgument { collaborator: "operator" });
        }

        state.operator = new_operator;
        info!(oracle_type = self.config.oracle_type.0, "oracle operator rotated");
        Ok(())
    }

    /// Enable or disable proof verification
    pub fn set_active(&self, signer: &Address, is_active: bool) -> UsdpResult<()> {
        let mut state = self.state.borrow_mut();
        Self::ensure_admin(&state, signer)?;

        state.is_active = is_active;
        info!(oracle_type = self.config.oracle_type.0, is_active, "oracle activation changed");
        Ok(())
    }

    // ============ Queries ============

    pub fn config(&self) -> OracleConfig {
        self.config
    }

    pub fn state(&self) -> OracleState {
        self.state.borrow().clone()
    }

    pub fn head_block(&self) -> u64 {
        self.state.borrow().head_block
    }

    /// Check `proof` for `asset` and return the attestation it carries
    pub fn verify(&self, asset: &AssetId, proof: &PriceProof) -> UsdpResult<PriceAttestation> {
        let state = self.state.borrow();

        // 1. Oracle must be active
        if !state.is_active {
            return Err(self.disabled());
        }

        // 2. Decode and match the asset
        let attestation = PriceAttestation::from_proof(proof)?;
        if attestation.asset != *asset {
            return Err(UsdpError::InvalidPriceProof { reason: "asset mismatch" });
        }
        let decimals = state.assets.get(asset).copied().ok_or(UsdpError::AssetNotSupported)?;
        if attestation.decimals != decimals {
            return Err(UsdpError::InvalidPriceProof { reason: "decimals mismatch" });
        }

        // 3. Block must sit inside the proof window
        if attestation.block_number > state.head_block {
            return Err(UsdpError::InvalidPriceProof { reason: "block not committed" });
        }
        let age = state.head_block - attestation.block_number;
        if age < self.config.min_proof_age_blocks {
            return Err(UsdpError::InvalidPriceProof { reason: "block too recent" });
        }
        if age > self.config.max_proof_age_blocks {
            return Err(UsdpError::StalePriceProof {
                age,
                max_age: self.config.max_proof_age_blocks,
            });
        }

        // 4. Price must be bound to the committed hash
        let block_hash = state
            .block_hashes
            .get(&attestation.block_number)
            .ok_or(UsdpError::InvalidPriceProof { reason: "block not committed" })?;
        let expected = price_commitment(
            &attestation.asset,
            attestation.block_number,
            &attestation.price_q112,
            block_hash,
        );
        if expected != attestation.commitment {
            return Err(UsdpError::InvalidPriceProof { reason: "commitment mismatch" });
        }

        if attestation.price().is_zero() {
            return Err(UsdpError::InvalidPriceProof { reason: "zero price" });
        }

        Ok(attestation)
    }

    // ============ Internals ============

    fn ensure_admin(state: &OracleState, signer: &Address) -> UsdpResult<()> {
        if *signer != state.admin {
            return Err(UsdpError::Unauthorized {
                expected: state.admin,
                actual: *signer,
            });
        }
        Ok(())
    }

    fn disabled(&self) -> UsdpError {
        UsdpError::OracleDisabled {
            oracle_type: self.config.oracle_type.0,
        }
    }
}

impl UsdOracle for CommittedPriceOracle {
    /// `amount * 10^(18 - decimals) * price_q112`
    fn asset_to_usd(&self, asset: &AssetId, amount: Amount, proof: &PriceProof) -> UsdpResult<U256> {
        let attestation = self.verify(asset, proof)?;
        let normalised = mul(U256::from(amount), decimals_multiplier(attestation.decimals)?)?;
        mul(normalised, attestation.price())
    }
}

// ============ Tests ============
