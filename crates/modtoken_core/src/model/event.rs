//! Lifecycle event identifiers and per-variant event catalogs.
//!
//! # Responsibility
//! - Define the 4-byte selector used for lifecycle events and entrypoints.
//! - Declare the closed event catalog of every core variant.
//!
//! # Invariants
//! - A selector is derived from one canonical signature and never reused
//!   for different semantics.
//! - Each catalog holds at most one event per `EventKind`.
//! - Catalog modes are the dispatch policy of the calling operation.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

pub const BEFORE_MINT_ERC20: &str = "beforeMintERC20(address,uint256,bytes)";
pub const BEFORE_TRANSFER_ERC20: &str = "beforeTransferERC20(address,address,uint256)";
pub const BEFORE_BURN_ERC20: &str = "beforeBurnERC20(address,uint256,bytes)";
pub const BEFORE_APPROVE_ERC20: &str = "beforeApproveERC20(address,address,uint256)";

pub const BEFORE_MINT_ERC721: &str = "beforeMintERC721(address,uint256,uint256,bytes)";
pub const BEFORE_TRANSFER_ERC721: &str = "beforeTransferERC721(address,address,uint256)";
pub const BEFORE_BURN_ERC721: &str = "beforeBurnERC721(uint256,bytes)";
pub const BEFORE_APPROVE_ERC721: &str = "beforeApproveERC721(address,uint256,bool)";

pub const BEFORE_MINT_ERC1155: &str = "beforeMintERC1155(address,uint256,uint256,bytes)";
pub const BEFORE_TRANSFER_ERC1155: &str =
    "beforeTransferERC1155(address,address,uint256,uint256)";
pub const BEFORE_BURN_ERC1155: &str = "beforeBurnERC1155(address,uint256,uint256,bytes)";

pub const BEFORE_APPROVE_FOR_ALL: &str = "beforeApproveForAll(address,address,bool)";
pub const ON_TOKEN_URI: &str = "onTokenURI(uint256)";
pub const ROYALTY_INFO: &str = "royaltyInfo(uint256,uint256)";

/// 4-byte function tag.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector([u8; 4]);

/// Hook point identifier. Kept as an alias so signatures state intent.
pub type LifecycleEvent = Selector;

/// Ordered set of lifecycle events.
pub type EventSet = BTreeSet<LifecycleEvent>;

impl Selector {
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Derives the selector of one canonical signature.
    pub fn from_signature(signature: &str) -> Self {
        let digest = Sha256::digest(signature.as_bytes());
        Self([digest[0], digest[1], digest[2], digest[3]])
    }

    /// Parses `0x` + 8 hex digits.
    pub fn parse(value: &str) -> Result<Self, SelectorParseError> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .ok_or_else(|| SelectorParseError(trimmed.to_string()))?;
        if digits.len() != 8 {
            return Err(SelectorParseError(trimmed.to_string()));
        }
        let decoded = hex::decode(digits).map_err(|_| SelectorParseError(trimmed.to_string()))?;
        Ok(Self([decoded[0], decoded[1], decoded[2], decoded[3]]))
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Debug for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Selector({self})")
    }
}

impl TryFrom<String> for Selector {
    type Error = SelectorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Selector> for String {
    fn from(value: Selector) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorParseError(pub String);

impl Display for SelectorParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "selector is invalid: {}", self.0)
    }
}

impl Error for SelectorParseError {}

/// Whether an event must have a handler installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerMode {
    /// The owning operation fails while no handler is installed.
    Required,
    /// The owning operation proceeds unaffected without a handler.
    Optional,
}

impl HandlerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Optional => "optional",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "required" => Some(Self::Required),
            "optional" => Some(Self::Optional),
            _ => None,
        }
    }
}

/// Shape of a hook point; fixes the argument and result encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Mint,
    Transfer,
    Burn,
    Approve,
    ApproveForAll,
    TokenUri,
    RoyaltyInfo,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mint => "mint",
            Self::Transfer => "transfer",
            Self::Burn => "burn",
            Self::Approve => "approve",
            Self::ApproveForAll => "approve_for_all",
            Self::TokenUri => "token_uri",
            Self::RoyaltyInfo => "royalty_info",
        }
    }
}

/// Token standard implemented by one core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreVariant {
    Fungible,
    NonFungible,
    MultiToken,
}

impl CoreVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fungible => "fungible",
            Self::NonFungible => "non_fungible",
            Self::MultiToken => "multi_token",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "fungible" => Some(Self::Fungible),
            "non_fungible" => Some(Self::NonFungible),
            "multi_token" => Some(Self::MultiToken),
            _ => None,
        }
    }

    /// Closed event catalog declared by this variant.
    pub fn catalog(self) -> &'static EventCatalog {
        match self {
            Self::Fungible => &FUNGIBLE_CATALOG,
            Self::NonFungible => &NON_FUNGIBLE_CATALOG,
            Self::MultiToken => &MULTI_TOKEN_CATALOG,
        }
    }

    /// Shorthand for the catalog event of `kind`.
    ///
    /// Returns `None` when the variant has no hook point of that kind.
    pub fn event(self, kind: EventKind) -> Option<LifecycleEvent> {
        self.catalog().spec_for(kind).map(|spec| spec.event)
    }
}

impl Display for CoreVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSpec {
    pub event: LifecycleEvent,
    pub signature: &'static str,
    pub kind: EventKind,
    pub mode: HandlerMode,
    /// Handler may receive forwarded value.
    pub payable: bool,
    /// Handler must be side-effect-free.
    pub view: bool,
}

impl EventSpec {
    fn new(signature: &'static str, kind: EventKind, mode: HandlerMode) -> Self {
        Self {
            event: Selector::from_signature(signature),
            signature,
            kind,
            mode,
            payable: kind == EventKind::Mint,
            view: matches!(kind, EventKind::TokenUri | EventKind::RoyaltyInfo),
        }
    }
}

/// Closed, fixed event catalog of one core variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventCatalog {
    variant: CoreVariant,
    specs: Vec<EventSpec>,
}

impl EventCatalog {
    pub fn variant(&self) -> CoreVariant {
        self.variant
    }

    pub fn specs(&self) -> &[EventSpec] {
        &self.specs
    }

    pub fn lookup(&self, event: LifecycleEvent) -> Option<&EventSpec> {
        self.specs.iter().find(|spec| spec.event == event)
    }

    pub fn spec_for(&self, kind: EventKind) -> Option<&EventSpec> {
        self.specs.iter().find(|spec| spec.kind == kind)
    }

    pub fn contains(&self, event: LifecycleEvent) -> bool {
        self.lookup(event).is_some()
    }

    pub fn events(&self) -> EventSet {
        self.specs.iter().map(|spec| spec.event).collect()
    }
}

static FUNGIBLE_CATALOG: Lazy<EventCatalog> = Lazy::new(|| EventCatalog {
    variant: CoreVariant::Fungible,
    specs: vec![
        EventSpec::new(BEFORE_MINT_ERC20, EventKind::Mint, HandlerMode::Required),
        EventSpec::new(BEFORE_TRANSFER_ERC20, EventKind::Transfer, HandlerMode::Optional),
        EventSpec::new(BEFORE_BURN_ERC20, EventKind::Burn, HandlerMode::Optional),
        EventSpec::new(BEFORE_APPROVE_ERC20, EventKind::Approve, HandlerMode::Optional),
    ],
});

static NON_FUNGIBLE_CATALOG: Lazy<EventCatalog> = Lazy::new(|| EventCatalog {
    variant: CoreVariant::NonFungible,
    specs: vec![
        EventSpec::new(BEFORE_MINT_ERC721, EventKind::Mint, HandlerMode::Required),
        EventSpec::new(BEFORE_TRANSFER_ERC721, EventKind::Transfer, HandlerMode::Optional),
        EventSpec::new(BEFORE_BURN_ERC721, EventKind::Burn, HandlerMode::Optional),
        EventSpec::new(BEFORE_APPROVE_ERC721, EventKind::Approve, HandlerMode::Optional),
        EventSpec::new(
            BEFORE_APPROVE_FOR_ALL,
            EventKind::ApproveForAll,
            HandlerMode::Optional,
        ),
        EventSpec::new(ON_TOKEN_URI, EventKind::TokenUri, HandlerMode::Required),
        EventSpec::new(ROYALTY_INFO, EventKind::RoyaltyInfo, HandlerMode::Optional),
    ],
});

static MULTI_TOKEN_CATALOG: Lazy<EventCatalog> = Lazy::new(|| EventCatalog {
    variant: CoreVariant::MultiToken,
    specs: vec![
        EventSpec::new(BEFORE_MINT_ERC1155, EventKind::Mint, HandlerMode::Required),
        EventSpec::new(BEFORE_TRANSFER_ERC1155, EventKind::Transfer, HandlerMode::Optional),
        EventSpec::new(BEFORE_BURN_ERC1155, EventKind::Burn, HandlerMode::Optional),
        EventSpec::new(
            BEFORE_APPROVE_FOR_ALL,
            EventKind::ApproveForAll,
            HandlerMode::Optional,
        ),
        EventSpec::new(ON_TOKEN_URI, EventKind::TokenUri, HandlerMode::Required),
        EventSpec::new(ROYALTY_INFO, EventKind::RoyaltyInfo, HandlerMode::Optional),
    ],
});
