//! Error types for bank operations.

use thiserror::Error;

use crate::engine::persist::PersistError;
use crate::model::{ItemId, MemberId, SlotId, TabId};

/// Top-level error returned by [`Guild::apply`](super::Guild::apply).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("rejected: {0}")]
    Rejected(#[from] BankError),

    #[error("member {0} not found")]
    UnknownMember(MemberId),

    #[error("item {0} has no template")]
    UnknownItem(ItemId),

    #[error("item {0} cannot be granted with contents")]
    NotABag(ItemId),

    /// The durable commit failed; nothing was applied.
    #[error("commit failed: {0}")]
    Persistence(#[from] PersistError),
}

impl EngineError {
    /// The recoverable rejection kind, if this is one.
    pub fn rejection(&self) -> Option<&BankError> {
        match self {
            EngineError::Rejected(err) => Some(err),
            _ => None,
        }
    }
}

/// Why a bank operation was refused. State is untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BankError {
    #[error("no item in the source slot")]
    ItemNotFound,

    #[error("cannot split {requested} from a stack of {available}")]
    TooFewToSplit { requested: u32, available: u32 },

    #[error("missing bank right")]
    Permission,

    #[error("daily withdrawal limit reached")]
    WithdrawLimit,

    #[error("bank tab is full")]
    BankFull,

    #[error("inventory is full")]
    InventoryFull,

    #[error("destination slot is locked by another item")]
    ItemLocked,

    #[error("item cannot be traded")]
    NonTransferableItem,

    #[error("bank tab {0} is not purchased")]
    InvalidTab(TabId),

    #[error("slot {0} is out of range")]
    InvalidSlot(SlotId),

    #[error("move does not involve the guild bank")]
    NoBankEndpoint,

    #[error("not enough money")]
    InsufficientFunds,

    #[error("balance cannot hold that much money")]
    BalanceOverflow,

    #[error("all {0} bank tabs are already purchased")]
    TabLimitReached(u8),
}
