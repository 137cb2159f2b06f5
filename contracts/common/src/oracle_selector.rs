//! Oracle Selector
//!
//! Picks the oracle that prices an asset: the first type in the registry's
//! priority list that the parameters enable for the asset. Earlier entries
//! win. The result is meant to be reused for the rest of one operation and
//! never stored.

use core::fmt;

use crate::errors::{UsdpError, UsdpResult};
use crate::interfaces::{OracleRegistry, Parameters, UsdOracle};
use crate::types::{AssetId, OracleType};

#[cfg(not(feature = "std"))]
use alloc::rc::Rc;
#[cfg(feature = "std")]
use std::rc::Rc;

/// An oracle type together with the oracle that serves it
#[derive(Clone)]
pub struct ResolvedOracle {
    /// Selected type
    pub oracle_type: OracleType,
    /// Oracle registered for that type
    pub oracle: Rc<dyn UsdOracle>,
}

impl fmt::Debug for ResolvedOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedOracle")
            .field("oracle_type", &self.oracle_type)
            .finish_non_exhaustive()
    }
}

/// First oracle type enabled for `asset`, in registry priority order
pub fn select_oracle_type(
    registry: &dyn OracleRegistry,
    parameters: &dyn Parameters,
    asset: &AssetId,
) -> UsdpResult<OracleType> {
    registry
        .oracle_types_in_priority()
        .into_iter()
        .filter(OracleType::is_set)
        .find(|oracle_type| parameters.is_oracle_type_enabled(*oracle_type, asset))
        .ok_or(UsdpError::NoOracleAvailable)
}

/// Select the oracle type for `asset` and look up its oracle
///
/// Fails with `NoOracleAvailable` if no type is enabled, and with
/// `OracleDisabled` if the selected type has no oracle registered.
pub fn resolve_oracle(
    registry: &dyn OracleRegistry,
    parameters: &dyn Parameters,
    asset: &AssetId,
) -> UsdpResult<ResolvedOracle> {
    let oracle_type = select_oracle_type(registry, parameters, asset)?;
    let oracle = registry
        .oracle_by_type(oracle_type)
        .ok_or(UsdpError::OracleDisabled { oracle_type: oracle_type.0 })?;

    tracing::debug!(oracle_type = oracle_type.0, "oracle selected");

    Ok(ResolvedOracle { oracle_type, oracle })
}
