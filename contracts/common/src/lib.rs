//! USDP Common Library
//!
//! Shared types, constants, and risk math for the USDP position manager.
//!
//! ## Fixed Point
//!
//! USD values are Q112 integers: `2^112` represents `1.0`. They are carried
//! as 256-bit unsigned integers and every multiplication or division goes
//! through the checked helpers in [`math`].
//!
//! ## Modules
//!
//! - **Risk Calculator** ([`risk`]): collateralization limit, utilization,
//!   liquidation eligibility and pricing, target-repayment back-solve
//! - **Oracle Selector** ([`oracle_selector`]): priority-ordered oracle lookup
//! - **Re-entrancy Guard** ([`guard`]): fail-fast mutual exclusion
//! - **Interfaces** ([`interfaces`]): vault, oracle, parameters, registry,
//!   token metadata and clock collaborators
//! - **Events** ([`events`]): Join / Exit / LiquidationTriggered
//!
//! This crate is `no_std` compatible when built without the `std` feature.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

// Re-export Vec for submodules based on feature
#[cfg(not(feature = "std"))]
pub use alloc::vec::Vec;
#[cfg(feature = "std")]
pub use std::vec::Vec;

pub use primitive_types::U256;

pub mod constants;
pub mod errors;
pub mod types;
pub mod math;
pub mod risk;
pub mod events;
pub mod interfaces;
pub mod oracle_selector;
pub mod guard;

// Re-exports for convenience
pub use errors::*;
pub use types::*;
pub use events::*;
pub use interfaces::*;
pub use oracle_selector::{resolve_oracle, select_oracle_type, ResolvedOracle};
pub use guard::{GuardScope, ReentrancyGuard};
