//! Position Events
//!
//! Events are published by the position manager after an operation's body
//! succeeds and can be indexed off-chain. A failed operation publishes
//! nothing.

use crate::Vec;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use crate::types::{Address, Amount, AssetId, PositionId};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    Join = 0x01,
    Exit = 0x02,
    LiquidationTriggered = 0x03,
}

/// Main event enum containing all position manager events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum PositionEvent {
    /// Emitted when collateral is deposited and/or debt is borrowed
    Join {
        position_id: PositionId,
        asset: AssetId,
        owner: Address,
        collateral: Amount,
        debt: Amount,
    },

    /// Emitted when collateral is withdrawn and/or debt is repaid
    ///
    /// `debt` is the amount actually repaid, after clamping.
    Exit {
        position_id: PositionId,
        asset: AssetId,
        owner: Address,
        collateral: Amount,
        debt: Amount,
    },

    /// Emitted when an unsafe position is handed to the liquidation auction
    LiquidationTriggered {
        position_id: PositionId,
        asset: AssetId,
        owner: Address,
    },
}

impl PositionEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Join { .. } => EventType::Join,
            Self::Exit { .. } => EventType::Exit,
            Self::LiquidationTriggered { .. } => EventType::LiquidationTriggered,
        }
    }

    /// Position the event refers to
    pub fn position_id(&self) -> PositionId {
        match self {
            Self::Join { position_id, .. }
            | Self::Exit { position_id, .. }
            | Self::LiquidationTriggered { position_id, .. } => *position_id,
        }
    }

    /// Serialize event to bytes for storage/transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Deserialize event from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

/// Append-only log of published events
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<PositionEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an event (add to log)
    pub fn emit(&mut self, event: PositionEvent) {
        self.events.push(event);
    }

    /// Get all events
    pub fn events(&self) -> &[PositionEvent] {
        &self.events
    }

    /// Take all events, leaving the log empty
    pub fn drain(&mut self) -> Vec<PositionEvent> {
        core::mem::take(&mut self.events)
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&PositionEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Check if any events were emitted
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if nothing was emitted
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
