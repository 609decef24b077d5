use crate::Money;
use crate::engine::rights::{Quota, TabProfile};
use crate::model::TabId;

/// What a member has withdrawn since the last reset.
///
/// Counters only grow between resets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberQuotaState {
    slots: Vec<u32>,
    money: Money,
}

impl MemberQuotaState {
    pub fn withdrawn_slots(&self, tab: TabId) -> u32 {
        self.slots.get(tab as usize).copied().unwrap_or(0)
    }

    pub fn withdrawn_money(&self) -> Money {
        self.money
    }

    pub fn has_slot_quota(&self, profile: &TabProfile, tab: TabId) -> bool {
        profile.slot_quota.permits(self.withdrawn_slots(tab), 1)
    }

    pub fn has_money_quota(&self, quota: &Quota<Money>, amount: Money) -> bool {
        quota.permits(self.money, amount)
    }

    pub(crate) fn set_withdrawn_slots(&mut self, tab: TabId, count: u32) {
        let index = tab as usize;
        if self.slots.len() <= index {
            self.slots.resize(index + 1, 0);
        }
        self.slots[index] = count;
    }

    pub(crate) fn set_withdrawn_money(&mut self, amount: Money) {
        self.money = amount;
    }

    /// Tabs with a nonzero counter.
    pub fn charged_tabs(&self) -> impl Iterator<Item = TabId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(tab, _)| tab as TabId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rights::BankRights;

    #[test]
    fn fresh_state_is_zero() {
        let state = MemberQuotaState::default();
        assert_eq!(state.withdrawn_slots(3), 0);
        assert_eq!(state.withdrawn_money(), Money::ZERO);
        assert_eq!(state.charged_tabs().count(), 0);
    }

    #[test]
    fn slot_quota_exhausts_at_limit() {
        let profile = TabProfile::new(BankRights::WITHDRAW, Quota::Daily(2));
        let mut state = MemberQuotaState::default();
        assert!(state.has_slot_quota(&profile, 1));
        state.set_withdrawn_slots(1, 2);
        assert!(!state.has_slot_quota(&profile, 1));
        assert!(state.has_slot_quota(&profile, 0));
        assert_eq!(state.charged_tabs().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn money_quota_accounts_for_withdrawn() {
        let quota = Quota::Daily(Money::from_copper(500));
        let mut state = MemberQuotaState::default();
        state.set_withdrawn_money(Money::from_copper(450));
        assert!(state.has_money_quota(&quota, Money::from_copper(50)));
        assert!(!state.has_money_quota(&quota, Money::from_copper(51)));
    }
}
