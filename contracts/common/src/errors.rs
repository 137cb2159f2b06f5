//! Error Types for the USDP Position Manager
//!
//! Every failure aborts the whole operation; the ledger is rolled back
//! before the error reaches the caller. Each variant carries a stable code
//! so callers and tooling can branch on the cause.

use core::fmt;

/// Result type alias for USDP operations
pub type UsdpResult<T> = Result<T, UsdpError>;

/// Main error enum for all position manager errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsdpError {
    // ============ Construction Errors ============
    /// A required collaborator was not supplied at construction
    InvalidArgument { collaborator: &'static str },

    // ============ Input Errors ============
    /// Both requested amounts are zero
    UselessOperation,

    /// Collateral asset reports more fractional decimals than supported
    UnsupportedDecimals { decimals: u8, maximum: u8 },

    // ============ Risk Errors ============
    /// Debt exceeds the USD limit allowed by the initial collateral ratio
    Undercollateralized { debt: u128, usd_limit: u128 },

    /// Liquidation requested for a position below the liquidation ratio
    SafePosition,

    // ============ Oracle Errors ============
    /// No oracle type is enabled for the asset
    NoOracleAvailable,

    /// The selected oracle type has no oracle behind it
    OracleDisabled { oracle_type: u16 },

    /// Price proof failed verification
    InvalidPriceProof { reason: &'static str },

    /// Price proof references a block outside the accepted window
    StalePriceProof { age: u64, max_age: u64 },

    /// Oracle does not price this asset
    AssetNotSupported,

    // ============ Ledger Errors ============
    /// Withdrawal exceeds the collateral held by the position
    InsufficientCollateral { available: u128, requested: u128 },

    /// Repayment exceeds the principal owed by the position
    InsufficientDebt { available: u128, requested: u128 },

    // ============ Authorization Errors ============
    /// Caller is not authorized for this operation
    Unauthorized { expected: [u8; 32], actual: [u8; 32] },

    // ============ Math Errors ============
    /// Arithmetic overflow occurred
    ArithmeticOverflow,

    /// Arithmetic underflow occurred
    Underflow,

    /// Division by zero
    DivisionByZero,

    // ============ Concurrency Errors ============
    /// A guarded operation was entered while another one is in progress
    Reentrancy,
}

impl UsdpError {
    /// Returns a human-readable error code for logging/debugging
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "E001_INVALID_ARGUMENT",
            Self::UselessOperation => "E002_USELESS_TX",
            Self::UnsupportedDecimals { .. } => "E003_UNSUPPORTED_DECIMALS",
            Self::Undercollateralized { .. } => "E010_UNDERCOLLATERALIZED",
            Self::SafePosition => "E011_SAFE_POSITION",
            Self::NoOracleAvailable => "E020_NO_ORACLE",
            Self::OracleDisabled { .. } => "E021_DISABLED_ORACLE",
            Self::InvalidPriceProof { .. } => "E022_INVALID_PROOF",
            Self::StalePriceProof { .. } => "E023_STALE_PROOF",
            Self::AssetNotSupported => "E024_ASSET_NOT_SUPPORTED",
            Self::InsufficientCollateral { .. } => "E030_INSUFFICIENT_COLLATERAL",
            Self::InsufficientDebt { .. } => "E031_INSUFFICIENT_DEBT",
            Self::Unauthorized { .. } => "E040_UNAUTHORIZED",
            Self::ArithmeticOverflow => "E080_OVERFLOW",
            Self::Underflow => "E081_UNDERFLOW",
            Self::DivisionByZero => "E082_DIV_ZERO",
            Self::Reentrancy => "E090_REENTRANCY",
        }
    }

    /// Returns true if the caller can fix the condition and resubmit
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Undercollateralized { .. } => true, // Add collateral or borrow less
            Self::UselessOperation => true,           // Pass a non-zero amount
            Self::StalePriceProof { .. } => true,     // Build a fresh proof
            Self::InvalidPriceProof { .. } => true,
            Self::InsufficientCollateral { .. } => true,
            _ => false,
        }
    }
}

impl fmt::Display for UsdpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { collaborator } => {
                write!(f, "{}: missing collaborator `{}`", self.code(), collaborator)
            }
            Self::UnsupportedDecimals { decimals, maximum } => {
                write!(f, "{}: {} decimals (max {})", self.code(), decimals, maximum)
            }
            Self::Undercollateralized { debt, usd_limit } => {
                write!(f, "{}: debt {} exceeds limit {}", self.code(), debt, usd_limit)
            }
            Self::OracleDisabled { oracle_type } => {
                write!(f, "{}: oracle type {}", self.code(), oracle_type)
            }
            Self::InvalidPriceProof { reason } => write!(f, "{}: {}", self.code(), reason),
            Self::StalePriceProof { age, max_age } => {
                write!(f, "{}: age {} blocks (max {})", self.code(), age, max_age)
            }
            Self::InsufficientCollateral { available, requested }
            | Self::InsufficientDebt { available, requested } => {
                write!(f, "{}: requested {} of {}", self.code(), requested, available)
            }
            _ => f.write_str(self.code()),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for UsdpError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_error_codes_unique() {
        let errors = [
            UsdpError::InvalidArgument { collaborator: "vault" },
            UsdpError::UselessOperation,
            UsdpError::UnsupportedDecimals { decimals: 19, maximum: 18 },
            UsdpError::Undercollateralized { debt: 700, usd_limit: 670 },
            UsdpError::SafePosition,
            UsdpError::NoOracleAvailable,
            UsdpError::OracleDisabled { oracle_type: 3 },
            UsdpError::InvalidPriceProof { reason: "bad" },
            UsdpError::StalePriceProof { age: 300, max_age: 200 },
            UsdpError::AssetNotSupported,
            UsdpError::InsufficientCollateral { available: 1, requested: 2 },
            UsdpError::InsufficientDebt { available: 1, requested: 2 },
            UsdpError::Unauthorized { expected: [1u8; 32], actual: [2u8; 32] },
            UsdpError::ArithmeticOverflow,
            UsdpError::Underflow,
            UsdpError::DivisionByZero,
            UsdpError::Reentrancy,
        ];

        let codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        let unique: BTreeSet<_> = codes.iter().collect();
        assert_eq!(codes.len(), unique.len(), "Error codes must be unique");
    }

    #[test]
    fn test_display_includes_code() {
        let err = UsdpError::Undercollateralized { debt: 700, usd_limit: 670 };
        assert_eq!(err.to_string(), "E010_UNDERCOLLATERALIZED: debt 700 exceeds limit 670");
        assert_eq!(UsdpError::SafePosition.to_string(), "E011_SAFE_POSITION");
    }

    #[test]
    fn test_recoverable() {
        assert!(UsdpError::Undercollateralized { debt: 1, usd_limit: 0 }.is_recoverable());
        assert!(!UsdpError::Reentrancy.is_recoverable());
        assert!(!UsdpError::DivisionByZero.is_recoverable());
    }
}
