use std::collections::HashMap;

use crate::Money;
use crate::engine::quota::MemberQuotaState;
use crate::model::{ItemId, ItemTemplate, MemberId, RankId, SlotId, Stack, TabId};

/// One bank tab: display data plus a fixed-size slot array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub name: String,
    pub icon: String,
    pub text: String,
    slots: Vec<Option<Stack>>,
}

impl Tab {
    pub fn new(name: impl Into<String>, icon: impl Into<String>, slot_count: u8) -> Self {
        Self {
            name: name.into(),
            icon: icon.into(),
            text: String::new(),
            slots: vec![None; slot_count as usize],
        }
    }

    pub fn slot(&self, slot: SlotId) -> Option<&Stack> {
        self.slots
            .get(slot as usize)
            .and_then(|entry| entry.as_ref())
    }

    pub fn slots(&self) -> &[Option<Stack>] {
        &self.slots
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn set_slot(&mut self, slot: SlotId, stack: Option<Stack>) {
        if let Some(entry) = self.slots.get_mut(slot as usize) {
            *entry = stack;
        }
    }

    pub fn count_item(&self, item: ItemId) -> u64 {
        count_item(&self.slots, item)
    }
}

/// The guild's shared container: purchased tabs and the money balance.
#[derive(Debug, Clone, Default)]
pub struct GuildBank {
    tabs: Vec<Tab>,
    pub(crate) money: Money,
}

impl GuildBank {
    pub fn tab(&self, tab: TabId) -> Option<&Tab> {
        self.tabs.get(tab as usize)
    }

    pub(crate) fn tab_mut(&mut self, tab: TabId) -> Option<&mut Tab> {
        self.tabs.get_mut(tab as usize)
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    pub fn money(&self) -> Money {
        self.money
    }

    pub(crate) fn push_tab(&mut self, tab: Tab) {
        self.tabs.push(tab);
    }

    /// Every occupied slot as `(tab, slot, stack)`, in tab then slot order.
    pub fn contents(&self) -> impl Iterator<Item = (TabId, SlotId, &Stack)> + '_ {
        self.tabs.iter().enumerate().flat_map(|(tab, entry)| {
            entry
                .slots
                .iter()
                .enumerate()
                .filter_map(move |(slot, stack)| {
                    stack
                        .as_ref()
                        .map(|stack| (tab as TabId, slot as SlotId, stack))
                })
        })
    }

    pub fn count_item(&self, item: ItemId) -> u64 {
        self.tabs.iter().map(|tab| tab.count_item(item)).sum()
    }
}

/// A member's personal inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    slots: Vec<Option<Stack>>,
}

impl Inventory {
    pub fn new(slot_count: u8) -> Self {
        Self {
            slots: vec![None; slot_count as usize],
        }
    }

    pub fn slot(&self, slot: SlotId) -> Option<&Stack> {
        self.slots
            .get(slot as usize)
            .and_then(|entry| entry.as_ref())
    }

    pub fn slots(&self) -> &[Option<Stack>] {
        &self.slots
    }

    pub(crate) fn set_slot(&mut self, slot: SlotId, stack: Option<Stack>) {
        if let Some(entry) = self.slots.get_mut(slot as usize) {
            *entry = stack;
        }
    }

    pub fn count_item(&self, item: ItemId) -> u64 {
        count_item(&self.slots, item)
    }
}

/// A guild member as seen by the bank engine.
#[derive(Debug, Clone)]
pub struct Member {
    id: MemberId,
    pub(crate) rank: RankId,
    pub(crate) quota: MemberQuotaState,
    pub(crate) inventory: Inventory,
    pub(crate) money: Money,
}

impl Member {
    pub fn new(id: MemberId, rank: RankId, inventory_slots: u8) -> Self {
        Self {
            id,
            rank,
            quota: MemberQuotaState::default(),
            inventory: Inventory::new(inventory_slots),
            money: Money::ZERO,
        }
    }

    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn rank(&self) -> RankId {
        self.rank
    }

    pub fn quota(&self) -> &MemberQuotaState {
        &self.quota
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn money(&self) -> Money {
        self.money
    }
}

/// Item definition provider.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    templates: HashMap<ItemId, ItemTemplate>,
}

impl ItemCatalog {
    pub fn get(&self, item: ItemId) -> Option<&ItemTemplate> {
        self.templates.get(&item)
    }

    pub fn insert(&mut self, template: ItemTemplate) {
        self.templates.insert(template.id, template);
    }
}

fn count_item(slots: &[Option<Stack>], item: ItemId) -> u64 {
    slots
        .iter()
        .flatten()
        .filter(|stack| stack.item == item)
        .map(|stack| stack.count as u64)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemGuid;

    #[test]
    fn new_tab_is_empty() {
        let tab = Tab::new("Armory", "", 4);
        assert_eq!(tab.slot_count(), 4);
        assert!(tab.slots().iter().all(Option::is_none));
        assert!(tab.slot(9).is_none());
    }

    #[test]
    fn set_slot_ignores_out_of_range() {
        let mut tab = Tab::new("Armory", "", 2);
        tab.set_slot(5, Some(Stack::new(1, 1, ItemGuid(1))));
        assert!(tab.slots().iter().all(Option::is_none));
    }

    #[test]
    fn bank_contents_lists_occupied_slots_in_order() {
        let mut bank = GuildBank::default();
        bank.push_tab(Tab::new("A", "", 3));
        bank.push_tab(Tab::new("B", "", 3));
        bank.tab_mut(1)
            .unwrap()
            .set_slot(2, Some(Stack::new(5, 4, ItemGuid(1))));
        bank.tab_mut(0)
            .unwrap()
            .set_slot(1, Some(Stack::new(5, 6, ItemGuid(2))));

        let contents: Vec<_> = bank
            .contents()
            .map(|(tab, slot, stack)| (tab, slot, stack.count))
            .collect();
        assert_eq!(contents, vec![(0, 1, 6), (1, 2, 4)]);
        assert_eq!(bank.count_item(5), 10);
    }

    #[test]
    fn member_starts_empty() {
        let member = Member::new(9, 2, 16);
        assert_eq!(member.id(), 9);
        assert_eq!(member.rank(), 2);
        assert_eq!(member.inventory().slots().len(), 16);
        assert_eq!(member.money(), Money::ZERO);
    }
}
