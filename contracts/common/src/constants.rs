//! Protocol Constants
//!
//! All fixed denominators and limits used by the USDP position manager.
//! Per-asset risk parameters (ratios, discounts, enabled oracles) are NOT
//! constants: they are read from the `Parameters` collaborator at call time.

/// Fixed-point scales
pub mod fixed_point {
    /// Number of fractional bits in the Q112 format
    pub const Q112_BITS: usize = 112;

    /// `2^112` as a `u128`, i.e. `1.0` in Q112
    ///
    /// Use [`crate::math::q112`] for the 256-bit value used in calculations.
    pub const Q112_U128: u128 = 1u128 << Q112_BITS;
}

/// Stability fee and discount configuration
pub mod fees {
    /// Denominator for fee rates and liquidation discounts (1e5 = 100%)
    ///
    /// A stability fee of `1_900` means 1.9% per year.
    pub const DENOMINATOR_1E5: u128 = 100_000;

    /// Length of the fee year in seconds (365 days)
    pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;
}

/// Ratio configuration
pub mod ratios {
    /// Percentage precision (100 = 100%)
    pub const PERCENT: u128 = 100;
}

/// Collateral token constraints
pub mod token {
    /// Maximum fractional decimals a collateral asset may report
    pub const MAX_DECIMALS: u8 = 18;
}

/// Oracle identifiers and reference-oracle defaults
pub mod oracle {
    /// Oracle type `0` is reserved and never resolves to an oracle
    pub const UNSET_ORACLE_TYPE: u16 = 0;

    /// Youngest block a price proof may reference (blocks behind head)
    pub const MIN_PROOF_AGE_BLOCKS: u64 = 1;

    /// Oldest block a price proof may reference (blocks behind head)
    pub const MAX_PROOF_AGE_BLOCKS: u64 = 200;
}
