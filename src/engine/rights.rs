//! Per-rank bank rights and withdrawal quotas.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;

use crate::Money;
use crate::model::{RankId, TabId};

/// Rank holding every right with unlimited quotas, whatever the matrix says.
pub const GUILD_MASTER_RANK: RankId = 0;

/// Bitset of rights a rank holds on one bank tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BankRights(u8);

impl BankRights {
    pub const NONE: Self = BankRights(0);
    pub const VIEW: Self = BankRights(0x01);
    pub const DEPOSIT: Self = BankRights(0x02);
    pub const MODIFY: Self = BankRights(0x04);
    pub const WITHDRAW: Self = BankRights(0x08);
    pub const FULL: Self = BankRights(0x0F);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Parse a `|`-separated list such as `view|deposit`, or `full`.
    pub fn parse(value: &str) -> Option<Self> {
        value
            .split('|')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .try_fold(Self::NONE, |acc, name| {
                let right = match name.to_ascii_lowercase().as_str() {
                    "view" => Self::VIEW,
                    "deposit" => Self::DEPOSIT,
                    "modify" => Self::MODIFY,
                    "withdraw" => Self::WITHDRAW,
                    "full" => Self::FULL,
                    _ => return None,
                };
                Some(acc | right)
            })
    }
}

impl BitOr for BankRights {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        BankRights(self.0 | rhs.0)
    }
}

impl fmt::Display for BankRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::VIEW, "view"),
            (Self::DEPOSIT, "deposit"),
            (Self::MODIFY, "modify"),
            (Self::WITHDRAW, "withdraw"),
        ]
        .into_iter()
        .filter(|(right, _)| self.contains(*right))
        .map(|(_, name)| name)
        .collect();
        write!(f, "{}", names.join("|"))
    }
}

/// Units a daily quota is counted in.
pub trait QuotaUnit: Copy + Ord {
    fn plus(self, other: Self) -> Self;
}

impl QuotaUnit for u32 {
    fn plus(self, other: Self) -> Self {
        self.saturating_add(other)
    }
}

impl QuotaUnit for Money {
    fn plus(self, other: Self) -> Self {
        self.saturating_add(other)
    }
}

/// A per-day withdrawal allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quota<T> {
    Unlimited,
    Daily(T),
}

impl<T: QuotaUnit> Quota<T> {
    /// Whether `requested` more units fit on top of `used` today.
    pub fn permits(&self, used: T, requested: T) -> bool {
        match self {
            Quota::Unlimited => true,
            Quota::Daily(limit) => used.plus(requested) <= *limit,
        }
    }
}

/// Rights and slot quota of one rank on one tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabProfile {
    pub rights: BankRights,
    pub slot_quota: Quota<u32>,
}

impl TabProfile {
    pub const FULL: Self = TabProfile {
        rights: BankRights::FULL,
        slot_quota: Quota::Unlimited,
    };

    pub fn new(rights: BankRights, slot_quota: Quota<u32>) -> Self {
        Self { rights, slot_quota }
    }

    pub fn has(&self, right: BankRights) -> bool {
        self.rights.contains(right)
    }
}

impl Default for TabProfile {
    fn default() -> Self {
        Self {
            rights: BankRights::NONE,
            slot_quota: Quota::Daily(0),
        }
    }
}

#[derive(Debug, Clone)]
struct RankProfile {
    tabs: Vec<TabProfile>,
    gold_quota: Quota<Money>,
}

impl RankProfile {
    fn new(tab_count: usize) -> Self {
        Self {
            tabs: vec![TabProfile::default(); tab_count],
            gold_quota: Quota::Daily(Money::ZERO),
        }
    }
}

/// Read-only lookup of `(rank, tab) -> TabProfile` for the engine.
#[derive(Debug, Clone, Default)]
pub struct RightsMatrix {
    ranks: BTreeMap<RankId, RankProfile>,
    tab_count: usize,
}

impl RightsMatrix {
    pub fn new(tab_count: usize) -> Self {
        Self {
            ranks: BTreeMap::new(),
            tab_count,
        }
    }

    pub fn tab_profile(&self, rank: RankId, tab: TabId) -> TabProfile {
        if rank == GUILD_MASTER_RANK {
            return TabProfile::FULL;
        }
        self.ranks
            .get(&rank)
            .and_then(|profile| profile.tabs.get(tab as usize))
            .copied()
            .unwrap_or_default()
    }

    pub fn gold_quota(&self, rank: RankId) -> Quota<Money> {
        if rank == GUILD_MASTER_RANK {
            return Quota::Unlimited;
        }
        self.ranks
            .get(&rank)
            .map(|profile| profile.gold_quota)
            .unwrap_or(Quota::Daily(Money::ZERO))
    }

    /// Load one row of the matrix. Rows for the guild master are ignored.
    pub fn set_tab_profile(&mut self, rank: RankId, tab: TabId, profile: TabProfile) -> bool {
        if rank == GUILD_MASTER_RANK || tab as usize >= self.tab_count {
            return false;
        }
        let tab_count = self.tab_count;
        let entry = self
            .ranks
            .entry(rank)
            .or_insert_with(|| RankProfile::new(tab_count));
        entry.tabs[tab as usize] = profile;
        true
    }

    pub fn set_gold_quota(&mut self, rank: RankId, quota: Quota<Money>) -> bool {
        if rank == GUILD_MASTER_RANK {
            return false;
        }
        let tab_count = self.tab_count;
        self.ranks
            .entry(rank)
            .or_insert_with(|| RankProfile::new(tab_count))
            .gold_quota = quota;
        true
    }

    /// Back-fill a default row for a newly purchased tab on every known rank.
    pub(crate) fn add_tab(&mut self) {
        self.tab_count += 1;
        for profile in self.ranks.values_mut() {
            profile.tabs.push(TabProfile::default());
        }
    }
}

/// Product policy for reordering items inside one tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorderPolicy {
    pub requires_deposit_or_withdraw: bool,
}

impl ReorderPolicy {
    pub fn permits(&self, modify: bool, deposit: bool, withdraw: bool) -> bool {
        modify && (!self.requires_deposit_or_withdraw || deposit || withdraw)
    }
}
