//! Mathematical Utilities for USDP
//!
//! Checked 256-bit arithmetic for Q112 fixed-point values, decimal scaling
//! and stability fee accrual. Nothing here panics on overflow: every
//! operation that can overflow or divide by zero returns an error.

use primitive_types::U256;

use crate::constants::{fees, fixed_point, token};
use crate::errors::{UsdpError, UsdpResult};
use crate::types::{Amount, Timestamp};

/// `1.0` in Q112 (`2^112`)
pub fn q112() -> U256 {
    U256::from(fixed_point::Q112_U128)
}

/// Encode a whole number as Q112
pub fn to_q112(value: u128) -> UsdpResult<U256> {
    mul(U256::from(value), q112())
}

/// Checked multiplication
pub fn mul(a: U256, b: U256) -> UsdpResult<U256> {
    a.checked_mul(b).ok_or(UsdpError::ArithmeticOverflow)
}

/// Checked division
pub fn div(a: U256, b: U256) -> UsdpResult<U256> {
    if b.is_zero() {
        return Err(UsdpError::DivisionByZero);
    }
    Ok(a / b)
}

/// Checked subtraction
pub fn sub(a: U256, b: U256) -> UsdpResult<U256> {
    a.checked_sub(b).ok_or(UsdpError::Underflow)
}

/// `a * b / c` with overflow and zero-divisor checks
pub fn mul_div(a: U256, b: U256, c: U256) -> UsdpResult<U256> {
    div(mul(a, b)?, c)
}

/// Narrow a 256-bit value into a token amount
pub fn to_amount(value: U256) -> UsdpResult<Amount> {
    if value > U256::from(u128::MAX) {
        return Err(UsdpError::ArithmeticOverflow);
    }
    Ok(value.low_u128())
}

/// Reject assets reporting more than 18 fractional decimals
pub fn ensure_supported_decimals(decimals: u8) -> UsdpResult<()> {
    if decimals > token::MAX_DECIMALS {
        return Err(UsdpError::UnsupportedDecimals {
            decimals,
            maximum: token::MAX_DECIMALS,
        });
    }
    Ok(())
}

/// `10^(18 - decimals)`: multiplier normalising a native amount to 18 decimals
pub fn decimals_multiplier(decimals: u8) -> UsdpResult<U256> {
    ensure_supported_decimals(decimals)?;
    Ok(U256::exp10((token::MAX_DECIMALS - decimals) as usize))
}

/// Stability fee accrued on `principal` over `elapsed` seconds
///
/// fee = principal * stability_fee * elapsed / SECONDS_PER_YEAR / 1e5
pub fn accrued_fee(principal: Amount, stability_fee: u128, elapsed: Timestamp) -> UsdpResult<Amount> {
    if principal == 0 || stability_fee == 0 || elapsed == 0 {
        return Ok(0);
    }

    let fee = mul(
        mul(U256::from(principal), U256::from(stability_fee))?,
        U256::from(elapsed),
    )?;
    let fee = div(fee, U256::from(fees::SECONDS_PER_YEAR))?;
    let fee = div(fee, U256::from(fees::DENOMINATOR_1E5))?;

    to_amount(fee)
}

/// Safe addition with overflow check
pub fn safe_add(a: Amount, b: Amount) -> UsdpResult<Amount> {
    a.checked_add(b).ok_or(UsdpError::ArithmeticOverflow)
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: Amount, b: Amount) -> UsdpResult<Amount> {
    a.checked_sub(b).ok_or(UsdpError::Underflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ONE_TOKEN: u128 = 1_000_000_000_000_000_000; // 1e18

    #[test]
    fn test_q112_is_two_pow_112() {
        assert_eq!(q112(), U256::from(2u8).pow(U256::from(112u8)));
        assert_eq!(to_q112(3).unwrap(), q112() * U256::from(3u8));
    }

    #[test]
    fn test_div_by_zero() {
        assert_eq!(div(U256::one(), U256::zero()), Err(UsdpError::DivisionByZero));
        assert_eq!(mul_div(U256::one(), U256::one(), U256::zero()), Err(UsdpError::DivisionByZero));
    }

    #[test]
    fn test_mul_overflow() {
        assert_eq!(mul(U256::MAX, U256::from(2u8)), Err(UsdpError::ArithmeticOverflow));
    }

    #[test]
    fn test_sub_underflow() {
        assert_eq!(sub(U256::zero(), U256::one()), Err(UsdpError::Underflow));
    }

    #[test]
    fn test_to_amount_bounds() {
        assert_eq!(to_amount(U256::from(u128::MAX)).unwrap(), u128::MAX);
        assert_eq!(
            to_amount(U256::from(u128::MAX) + U256::one()),
            Err(UsdpError::ArithmeticOverflow)
        );
    }

    #[test]
    fn test_decimals_multiplier() {
        assert_eq!(decimals_multiplier(18).unwrap(), U256::one());
        assert_eq!(decimals_multiplier(6).unwrap(), U256::exp10(12));
        assert_eq!(decimals_multiplier(0).unwrap(), U256::exp10(18));
        assert_eq!(
            decimals_multiplier(19),
            Err(UsdpError::UnsupportedDecimals { decimals: 19, maximum: 18 })
        );
    }

    #[test]
    fn test_accrued_fee_one_year() {
        // 1000 USDP at 1.9% for a full year = 19 USDP
        let fee = accrued_fee(1_000 * ONE_TOKEN, 1_900, fees::SECONDS_PER_YEAR).unwrap();
        assert_eq!(fee, 19 * ONE_TOKEN);
    }

    #[test]
    fn test_accrued_fee_zero_inputs() {
        assert_eq!(accrued_fee(0, 1_900, 100).unwrap(), 0);
        assert_eq!(accrued_fee(100, 0, 100).unwrap(), 0);
        assert_eq!(accrued_fee(100, 1_900, 0).unwrap(), 0);
    }

    proptest! {
        #[test]
        fn prop_q112_roundtrip(value in any::<u128>()) {
            let encoded = to_q112(value).unwrap();
            prop_assert_eq!(to_amount(div(encoded, q112()).unwrap()).unwrap(), value);
        }

        #[test]
        fn prop_fee_monotonic_in_time(
            principal in 0u128..1_000_000_000 * ONE_TOKEN,
            rate in 0u128..100_000,
            t1 in 0u64..10 * fees::SECONDS_PER_YEAR,
            dt in 0u64..fees::SECONDS_PER_YEAR,
        ) {
            let early = accrued_fee(principal, rate, t1).unwrap();
            let late = accrued_fee(principal, rate, t1 + dt).unwrap();
            prop_assert!(late >= early);
        }
    }
}
