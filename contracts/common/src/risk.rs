//! Risk Calculator
//!
//! Pure functions interpreting Q112 USD valuations against per-asset risk
//! parameters. Ratios are whole percentages (`67` = 67%); discounts and
//! stability fees use the 1e5 denominator.
//!
//! ```text
//! usd_limit          = usd_value_q112 * initial_collateral_ratio / Q112 / 100
//! utilization        = debt * 100 * Q112 / usd_value_q112
//! liquidatable       = utilization >= liquidation_ratio
//! initial_liq_price  = (usd_value_q112 - usd_value_q112 * discount / 1e5) / Q112
//! ```

use primitive_types::U256;

use crate::constants::{fees::DENOMINATOR_1E5, ratios::PERCENT};
use crate::errors::{UsdpError, UsdpResult};
use crate::math::{decimals_multiplier, div, mul, mul_div, q112, sub, to_amount};
use crate::types::{Amount, LiquidationPrice, Timestamp};

/// Maximum debt (in debt-token units) a collateral value supports
pub fn usd_limit(usd_value_q112: U256, initial_collateral_ratio: u128) -> UsdpResult<U256> {
    let limit = mul(usd_value_q112, U256::from(initial_collateral_ratio))?;
    let limit = div(limit, q112())?;
    div(limit, U256::from(PERCENT))
}

/// Fails with `Undercollateralized` if `total_debt` exceeds the USD limit
pub fn ensure_collateralized(
    total_debt: Amount,
    usd_value_q112: U256,
    initial_collateral_ratio: u128,
) -> UsdpResult<()> {
    let limit = usd_limit(usd_value_q112, initial_collateral_ratio)?;
    if U256::from(total_debt) > limit {
        return Err(UsdpError::Undercollateralized {
            debt: total_debt,
            // limit < total_debt here, so it fits
            usd_limit: limit.low_u128(),
        });
    }
    Ok(())
}

/// Debt-to-collateral percentage scaled by Q112
///
/// Zero debt is always 0, even when the collateral value is zero.
pub fn utilization_ratio(total_debt: Amount, usd_value_q112: U256) -> UsdpResult<U256> {
    if total_debt == 0 {
        return Ok(U256::zero());
    }
    let scaled = mul(mul(U256::from(total_debt), U256::from(PERCENT))?, q112())?;
    div(scaled, usd_value_q112)
}

/// Returns true if the position reached the liquidation ratio
///
/// A position without debt is never liquidatable. A position with debt
/// and a zero collateral value fails with `DivisionByZero`.
pub fn is_liquidatable(
    total_debt: Amount,
    usd_value_q112: U256,
    liquidation_ratio: u128,
) -> UsdpResult<bool> {
    if total_debt == 0 {
        return Ok(false);
    }
    Ok(utilization_ratio(total_debt, usd_value_q112)? >= U256::from(liquidation_ratio))
}

/// Q112 discount granted to the liquidator
pub fn liquidation_discount(usd_value_q112: U256, discount_1e5: u128) -> UsdpResult<U256> {
    mul_div(usd_value_q112, U256::from(discount_1e5), U256::from(DENOMINATOR_1E5))
}

/// Starting auction price in debt-token units
pub fn initial_liquidation_price(usd_value_q112: U256, discount_1e5: u128) -> UsdpResult<U256> {
    let discount = liquidation_discount(usd_value_q112, discount_1e5)?;
    div(sub(usd_value_q112, discount)?, q112())
}

/// Q112 collateral price at which the position becomes liquidatable
///
/// Derived only from current debt, collateral and the liquidation ratio,
/// so no price proof is needed. Returns `Unbounded` for debt-free positions.
/// The decimals guard runs first, so unsupported assets fail even without debt.
pub fn liquidation_price(
    total_debt: Amount,
    collateral: Amount,
    liquidation_ratio: u128,
    decimals: u8,
) -> UsdpResult<LiquidationPrice> {
    let multiplier = decimals_multiplier(decimals)?;
    if total_debt == 0 {
        return Ok(LiquidationPrice::Unbounded);
    }

    let collateral_price = mul(mul(U256::from(total_debt), U256::from(PERCENT))?, q112())?;
    let collateral_price = div(collateral_price, U256::from(liquidation_ratio))?;
    let per_unit = div(collateral_price, U256::from(collateral))?;

    Ok(LiquidationPrice::At(div(per_unit, multiplier)?))
}

/// Back-solve the principal whose repayment, fee included, totals `target`
///
/// principal = target * 1e5 / (1e5 + stability_fee * elapsed / YEAR)
pub fn principal_for_repayment(
    target: Amount,
    stability_fee: u128,
    elapsed: Timestamp,
) -> UsdpResult<Amount> {
    let year = U256::from(crate::constants::fees::SECONDS_PER_YEAR);
    let fee_factor = div(mul(U256::from(stability_fee), U256::from(elapsed))?, year)?;
    let denominator = U256::from(DENOMINATOR_1E5)
        .checked_add(fee_factor)
        .ok_or(UsdpError::ArithmeticOverflow)?;

    to_amount(mul_div(U256::from(target), U256::from(DENOMINATOR_1E5), denominator)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::fees::SECONDS_PER_YEAR;
    use crate::math::{accrued_fee, to_q112};
    use proptest::prelude::*;

    const ONE_TOKEN: u128 = 1_000_000_000_000_000_000; // 1e18

    fn usd(whole: u128) -> U256 {
        to_q112(whole * ONE_TOKEN).unwrap()
    }

    #[test]
    fn test_usd_limit_67_percent() {
        let limit = usd_limit(usd(1_000), 67).unwrap();
        assert_eq!(limit, U256::from(670 * ONE_TOKEN));
    }

    #[test]
    fn test_collateralization_scenario() {
        // 1000 USD of collateral at 67% supports 600 but not 700
        assert!(ensure_collateralized(600 * ONE_TOKEN, usd(1_000), 67).is_ok());
        assert!(ensure_collateralized(670 * ONE_TOKEN, usd(1_000), 67).is_ok());
        assert_eq!(
            ensure_collateralized(700 * ONE_TOKEN, usd(1_000), 67),
            Err(UsdpError::Undercollateralized {
                debt: 700 * ONE_TOKEN,
                usd_limit: 670 * ONE_TOKEN,
            })
        );
    }

    #[test]
    fn test_utilization_ratio() {
        let ratio = utilization_ratio(500 * ONE_TOKEN, usd(1_000)).unwrap();
        assert_eq!(ratio, U256::from(50u8));
        assert_eq!(utilization_ratio(0, U256::zero()).unwrap(), U256::zero());
    }

    #[test]
    fn test_liquidation_threshold_75() {
        assert!(is_liquidatable(760 * ONE_TOKEN, usd(1_000), 75).unwrap());
        assert!(!is_liquidatable(740 * ONE_TOKEN, usd(1_000), 75).unwrap());
    }

    #[test]
    fn test_liquidation_boundary_exact() {
        // Exactly at the ratio is liquidatable, one unit below is not
        assert!(is_liquidatable(750 * ONE_TOKEN, usd(1_000), 75).unwrap());
        assert!(!is_liquidatable(750 * ONE_TOKEN - 1, usd(1_000), 75).unwrap());
    }

    #[test]
    fn test_zero_debt_never_liquidatable() {
        assert!(!is_liquidatable(0, U256::zero(), 75).unwrap());
        assert!(!is_liquidatable(0, usd(1), 0).unwrap());
    }

    #[test]
    fn test_zero_value_with_debt_fails_cleanly() {
        assert_eq!(
            is_liquidatable(1, U256::zero(), 75),
            Err(UsdpError::DivisionByZero)
        );
    }

    #[test]
    fn test_initial_liquidation_price() {
        // 10% discount on 1000 USD starts the auction at 900 USD
        let price = initial_liquidation_price(usd(1_000), 10_000).unwrap();
        assert_eq!(price, U256::from(900 * ONE_TOKEN));
        assert_eq!(liquidation_discount(usd(1_000), 10_000).unwrap(), usd(100));
    }

    #[test]
    fn test_liquidation_price_unbounded_without_debt() {
        assert_eq!(liquidation_price(0, 0, 75, 18).unwrap(), LiquidationPrice::Unbounded);
    }

    #[test]
    fn test_liquidation_price_18_decimals() {
        // 750 debt on 1000 units at 75% liquidates when one unit is worth 1 USD
        let price = liquidation_price(750 * ONE_TOKEN, 1_000 * ONE_TOKEN, 75, 18).unwrap();
        assert_eq!(price, LiquidationPrice::At(q112()));
    }

    #[test]
    fn test_liquidation_price_6_decimals() {
        // Same position with a 6-decimal collateral token
        let price = liquidation_price(750 * ONE_TOKEN, 1_000 * 1_000_000, 75, 6).unwrap();
        assert_eq!(price, LiquidationPrice::At(q112()));
    }

    #[test]
    fn test_liquidation_price_guards() {
        assert_eq!(
            liquidation_price(1, 1, 75, 19),
            Err(UsdpError::UnsupportedDecimals { decimals: 19, maximum: 18 })
        );
        assert_eq!(
            liquidation_price(0, 0, 75, 19),
            Err(UsdpError::UnsupportedDecimals { decimals: 19, maximum: 18 })
        );
        assert_eq!(liquidation_price(1, 0, 75, 18), Err(UsdpError::DivisionByZero));
    }

    #[test]
    fn test_principal_for_repayment_no_fee() {
        assert_eq!(principal_for_repayment(1_000, 0, 1_000).unwrap(), 1_000);
        assert_eq!(principal_for_repayment(1_000, 1_900, 0).unwrap(), 1_000);
    }

    #[test]
    fn test_principal_for_repayment_one_year() {
        // 10% fee for a year: 1100 total pays 1000 principal
        let principal = principal_for_repayment(1_100 * ONE_TOKEN, 10_000, SECONDS_PER_YEAR).unwrap();
        assert_eq!(principal, 1_000 * ONE_TOKEN);
    }

    proptest! {
        #[test]
        fn prop_target_repayment_roundtrip(
            target in ONE_TOKEN..1_000_000 * ONE_TOKEN,
            rate in 0u128..20_000,
            years in 0u64..5,
        ) {
            // Whole years keep the fee factor exact, leaving only floor rounding
            let elapsed = years * SECONDS_PER_YEAR;
            let principal = principal_for_repayment(target, rate, elapsed).unwrap();
            let fee = accrued_fee(principal, rate, elapsed).unwrap();
            let total = principal + fee;
            prop_assert!(total <= target);
            prop_assert!(target - total <= 2);
        }

        #[test]
        fn prop_collateralized_implies_not_above_limit(
            debt in 0u128..10_000_000 * ONE_TOKEN,
            value in 1u128..10_000_000,
            ratio in 1u128..100,
        ) {
            let usd_value = usd(value);
            if ensure_collateralized(debt, usd_value, ratio).is_ok() {
                prop_assert!(U256::from(debt) <= usd_limit(usd_value, ratio).unwrap());
            }
        }
    }
}
