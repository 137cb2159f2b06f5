//! Position Manager Construction
//!
//! Every collaborator is required. `build` names the first missing one so
//! a misconfigured deployment fails before any operation runs.

use std::cell::RefCell;
use std::rc::Rc;

use usdp_common::{
    errors::{UsdpError, UsdpResult},
    events::EventLog,
    guard::ReentrancyGuard,
    interfaces::{Clock, OracleRegistry, Parameters, Registry, TokenMetadata, Vault},
};

use crate::PositionManager;

/// Collects collaborators for a [`PositionManager`]
#[derive(Default)]
pub struct PositionManagerBuilder {
    vault: Option<Rc<dyn Vault>>,
    oracle_registry: Option<Rc<dyn OracleRegistry>>,
    parameters: Option<Rc<dyn Parameters>>,
    registry: Option<Rc<dyn Registry>>,
    token_metadata: Option<Rc<dyn TokenMetadata>>,
    clock: Option<Rc<dyn Clock>>,
}

impl PositionManagerBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vault(mut self, vault: Rc<dyn Vault>) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn oracle_registry(mut self, oracle_registry: Rc<dyn OracleRegistry>) -> Self {
        self.oracle_registry = Some(oracle_registry);
        self
    }

    pub fn parameters(mut self, parameters: Rc<dyn Parameters>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn registry(mut self, registry: Rc<dyn Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn token_metadata(mut self, token_metadata: Rc<dyn TokenMetadata>) -> Self {
        self.token_metadata = Some(token_metadata);
        self
    }

    pub fn clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Assemble the manager
    ///
    /// # Errors
    /// Returns `UsdpError::InvalidArgument` naming the first missing collaborator.
    pub fn build(self) -> UsdpResult<PositionManager> {
        Ok(PositionManager {
            vault: required(self.vault, "vault")?,
            oracles: required(self.oracle_registry, "oracle_registry")?,
            parameters: required(self.parameters, "parameters")?,
            registry: required(self.registry, "registry")?,
            tokens: required(self.token_metadata, "token_metadata")?,
            clock: required(self.clock, "clock")?,
            guard: ReentrancyGuard::new(),
            events: RefCell::new(EventLog::new()),
        })
    }
}

fn required<T: ?Sized>(slot: Option<Rc<T>>, collaborator: &'static str) -> UsdpResult<Rc<T>> {
    slot.ok_or(UsdpError::InvalidArgument { collaborator })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        FixedPriceOracle, InMemoryVault, ManualClock, RecordingRegistry, StaticOracleRegistry,
        StaticParameters, StaticTokenMetadata,
    };

    fn complete() -> PositionManagerBuilder {
        let clock = Rc::new(ManualClock::new(0));
        let oracles = StaticOracleRegistry::new();
        oracles.register(usdp_common::OracleType(1), Rc::new(FixedPriceOracle::new()));

        PositionManagerBuilder::new()
            .vault(Rc::new(InMemoryVault::new(clock.clone())))
            .oracle_registry(Rc::new(oracles))
            .parameters(Rc::new(StaticParameters::new()))
            .registry(Rc::new(RecordingRegistry::new()))
            .token_metadata(Rc::new(StaticTokenMetadata::new()))
            .clock(clock)
    }

    #[test]
    fn test_build_with_all_collaborators() {
        assert!(complete().build().is_ok());
    }

    #[test]
    fn test_missing_vault_rejected() {
        let err = PositionManagerBuilder::new().build().unwrap_err();
        assert_eq!(err, UsdpError::InvalidArgument { collaborator: "vault" });
    }

    #[test]
    fn test_missing_clock_rejected() {
        let mut builder = complete();
        builder.clock = None;

        let err = builder.build().unwrap_err();
        assert_eq!(err, UsdpError::InvalidArgument { collaborator: "clock" });
        assert_eq!(err.code(), "E001_INVALID_ARGUMENT");
    }

    #[test]
    fn test_missing_registry_rejected() {
        let mut builder = complete();
        builder.registry = None;

        assert_eq!(
            builder.build().unwrap_err(),
            UsdpError::InvalidArgument { collaborator: "registry" }
        );
    }
}
