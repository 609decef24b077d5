//! Core domain types for the guild bank engine.

use serde::Serialize;

use crate::Money;
use crate::engine::{BankRights, Quota};

/// Guild member identifier.
pub type MemberId = u64;

/// Guild rank identifier. Rank 0 is the guild master.
pub type RankId = u8;

/// Bank tab index.
pub type TabId = u8;

/// Slot index within a bank tab or an inventory.
pub type SlotId = u8;

/// Item template identifier.
pub type ItemId = u32;

/// Identity of one item instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ItemGuid(pub u64);

/// Read-only item definition, as served by the item definition provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTemplate {
    pub id: ItemId,
    pub max_stack: u32,
    /// Bind-on-pickup: can never leave the owner's inventory.
    pub soulbound: bool,
    /// The item is a bag that can hold other items.
    pub container: bool,
}

impl ItemTemplate {
    pub fn new(id: ItemId, max_stack: u32) -> Self {
        Self {
            id,
            max_stack: max_stack.max(1),
            soulbound: false,
            container: false,
        }
    }

    pub fn soulbound(mut self) -> Self {
        self.soulbound = true;
        self
    }

    pub fn container(mut self) -> Self {
        self.container = true;
        self
    }
}

/// A stack of homogeneous item units occupying one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    pub item: ItemId,
    pub count: u32,
    pub guid: ItemGuid,
    /// Number of items held inside, for bags.
    pub contents: u16,
}

impl Stack {
    pub fn new(item: ItemId, count: u32, guid: ItemGuid) -> Self {
        Self {
            item,
            count,
            guid,
            contents: 0,
        }
    }

    /// A new instance of the same item with a fresh count and identity.
    pub fn clone_with(&self, count: u32, guid: ItemGuid) -> Self {
        Self {
            item: self.item,
            count,
            guid,
            contents: 0,
        }
    }

    pub fn is_nonempty_bag(&self) -> bool {
        self.contents > 0
    }
}

/// A slot array an item can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Container {
    Bank(TabId),
    Inventory(MemberId),
}

/// One addressable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotRef {
    pub container: Container,
    pub slot: SlotId,
}

/// One side of a move request, relative to the requesting member.
///
/// `slot` is mandatory for a source; for a destination `None` lets the
/// allocator choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Bank { tab: TabId, slot: Option<SlotId> },
    Inventory { slot: Option<SlotId> },
}

impl Endpoint {
    pub fn bank(tab: TabId, slot: SlotId) -> Self {
        Endpoint::Bank {
            tab,
            slot: Some(slot),
        }
    }

    pub fn inventory(slot: SlotId) -> Self {
        Endpoint::Inventory { slot: Some(slot) }
    }

    pub fn is_bank(&self) -> bool {
        matches!(self, Endpoint::Bank { .. })
    }
}

/// A request to move items between two endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRequest {
    pub member: MemberId,
    pub source: Endpoint,
    pub destination: Endpoint,
    /// Units to split off the source stack; 0 moves the entire stack.
    pub split: u32,
}

impl MoveRequest {
    pub fn new(member: MemberId, source: Endpoint, destination: Endpoint) -> Self {
        Self {
            member,
            source,
            destination,
            split: 0,
        }
    }

    pub fn split(mut self, count: u32) -> Self {
        self.split = count;
        self
    }
}

/// The possible inputs of the engine.
#[derive(Debug, Clone)]
pub enum Command {
    /// Move items between the bank and an inventory, or within the bank.
    Move(MoveRequest),
    /// Move money from the member to the bank.
    DepositMoney { member: MemberId, amount: Money },
    /// Move money from the bank to the member, within the rank's daily quota.
    WithdrawMoney { member: MemberId, amount: Money },
    /// Replace a tab's free text.
    SetTabText {
        member: MemberId,
        tab: TabId,
        text: String,
    },
    /// Append a new tab to the bank.
    PurchaseTab { name: String, icon: String },
    /// Zero all withdrawal counters.
    ResetQuotas,
    /// State owned by external collaborators (ranks, items, inventories).
    Admin(Admin),
}

/// Commands standing in for collaborators outside the bank engine.
#[derive(Debug, Clone)]
pub enum Admin {
    AddMember {
        member: MemberId,
        rank: RankId,
    },
    DefineItem(ItemTemplate),
    SetTabRights {
        rank: RankId,
        tab: TabId,
        rights: BankRights,
        slot_quota: Quota<u32>,
    },
    SetGoldQuota {
        rank: RankId,
        quota: Quota<Money>,
    },
    GrantItem {
        member: MemberId,
        slot: Option<SlotId>,
        item: ItemId,
        count: u32,
        /// Items already inside, for a bag.
        contents: u16,
    },
    GrantMoney {
        member: MemberId,
        amount: Money,
    },
}
