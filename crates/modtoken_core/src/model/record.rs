//! Registry rows and emitted notifications.
//!
//! # Invariants
//! - `InstalledExtension::events` is exactly the set bound to `address`.
//! - `CoreEvent` payloads are append-only once written to the event log.

use crate::model::address::Address;
use crate::model::event::{EventSet, HandlerMode, LifecycleEvent, Selector};
use crate::model::hook::{Amount, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One bound event slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub event: LifecycleEvent,
    pub handler: Address,
    /// Mode the extension declared for this event at install time.
    pub declared_mode: HandlerMode,
}

/// One bound entrypoint selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrypointEntry {
    pub selector: Selector,
    pub handler: Address,
    pub name: String,
    pub restricted: bool,
}

/// Installed extension snapshot, listed in install order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledExtension {
    pub address: Address,
    pub name: String,
    pub version: String,
    pub events: EventSet,
    pub entrypoints: BTreeSet<Selector>,
}

/// Notification appended to the core event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreEvent {
    ExtensionInstalled {
        extension: Address,
        events: EventSet,
        entrypoints: BTreeSet<Selector>,
    },
    ExtensionUninstalled {
        extension: Address,
        events: EventSet,
    },
    Transfer {
        operator: Address,
        from: Address,
        to: Address,
        token_id: Option<TokenId>,
        amount: Amount,
    },
    Approval {
        owner: Address,
        spender: Address,
        token_id: Option<TokenId>,
        amount: Amount,
    },
    ApprovalForAll {
        owner: Address,
        operator: Address,
        approved: bool,
    },
}

impl CoreEvent {
    /// Stable name stored in the `kind` column of the event log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ExtensionInstalled { .. } => "extension_installed",
            Self::ExtensionUninstalled { .. } => "extension_uninstalled",
            Self::Transfer { .. } => "transfer",
            Self::Approval { .. } => "approval",
            Self::ApprovalForAll { .. } => "approval_for_all",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CoreEvent;
    use crate::model::address::Address;
    use crate::model::event::{CoreVariant, EventKind};

    #[test]
    fn core_event_json_keeps_full_amount_range() {
        let event = CoreEvent::Transfer {
            operator: Address::derive("alice"),
            from: Address::ZERO,
            to: Address::derive("alice"),
            token_id: Some(u128::MAX),
            amount: u128::MAX,
        };
        let json = serde_json::to_string(&event).expect("serialize event");
        let decoded: CoreEvent = serde_json::from_str(&json).expect("deserialize event");
        assert_eq!(decoded, event);
        assert_eq!(event.kind(), "transfer");
    }

    #[test]
    fn install_notification_renders_selectors_as_hex() {
        let mint = CoreVariant::Fungible
            .event(EventKind::Mint)
            .expect("mint event");
        let event = CoreEvent::ExtensionInstalled {
            extension: Address::derive("claim"),
            events: [mint].into_iter().collect(),
            entrypoints: Default::default(),
        };
        let json = serde_json::to_value(&event).expect("serialize event");
        let rendered = json["extension_installed"]["events"][0]
            .as_str()
            .expect("selector string");
        assert_eq!(rendered, mint.to_string());
    }
}
