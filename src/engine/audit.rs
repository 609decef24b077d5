//! Bounded, per-channel history of committed bank events.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

use crate::Money;
use crate::model::{ItemId, MemberId, TabId};

/// Log a bank event belongs to: one per tab, plus one for money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuditChannel {
    Tab(TabId),
    Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    DepositItem,
    WithdrawItem,
    MoveItem,
    DepositMoney,
    WithdrawMoney,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditSubject {
    Item { item: ItemId, count: u32 },
    Money(Money),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub actor: MemberId,
    pub kind: AuditKind,
    pub channel: AuditChannel,
    pub subject: AuditSubject,
    /// Receiving tab, for moves between tabs.
    pub dest_tab: Option<TabId>,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    capacity: usize,
    channels: BTreeMap<AuditChannel, VecDeque<AuditEntry>>,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: BTreeMap::new(),
        }
    }

    /// Append an entry, evicting the oldest one of a full channel.
    pub fn append(&mut self, entry: AuditEntry) {
        let capacity = self.capacity;
        let log = self
            .channels
            .entry(entry.channel)
            .or_insert_with(|| VecDeque::with_capacity(capacity));
        if log.len() == capacity {
            log.pop_front();
        }
        log.push_back(entry);
    }

    /// Entries of one channel, oldest first.
    pub fn entries(&self, channel: AuditChannel) -> impl Iterator<Item = &AuditEntry> + '_ {
        self.channels.get(&channel).into_iter().flatten()
    }

    pub fn len(&self, channel: AuditChannel) -> usize {
        self.channels.get(&channel).map_or(0, VecDeque::len)
    }
}
