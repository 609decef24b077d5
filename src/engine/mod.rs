//! Guild bank engine.
//!
//! The engine owns one guild's bank tabs, member quota state and audit log.
//! Every operation is validated completely against a staged copy of the
//! state, committed to persistence as one write set, and only then applied
//! in memory. Also supports async stream of commands.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::Money;
use crate::config::BankConfig;
use crate::model::{Admin, Command, ItemId, ItemTemplate, MemberId, RankId, SlotId, Stack, TabId};

mod allocator;
pub use allocator::{NoSpace, Placement, Reservation, allocate};

mod audit;
pub use audit::{AuditChannel, AuditEntry, AuditKind, AuditLog, AuditSubject};

mod endpoint;
pub use endpoint::{BankEndpoint, InventoryEndpoint, MoveEndpoint, Staging};

mod error;
pub use error::{BankError, EngineError};

mod persist;
pub use persist::{MemoryStore, PersistError, Persistence, Write};

mod quota;
pub use quota::MemberQuotaState;

mod rights;
pub use rights::{
    BankRights, GUILD_MASTER_RANK, Quota, QuotaUnit, ReorderPolicy, RightsMatrix, TabProfile,
};

mod shared;
pub use shared::SharedGuild;

mod state;
pub use state::{GuildBank, Inventory, ItemCatalog, Member, Tab};

mod transfer;
pub use transfer::TransferOutcome;

/// One guild's bank, members and audit log.
pub struct Guild<P = MemoryStore> {
    config: BankConfig,
    bank: GuildBank,
    rights: RightsMatrix,
    members: HashMap<MemberId, Member>,
    items: ItemCatalog,
    audit: AuditLog,
    /// Next free item instance guid
    next_guid: u64,
    store: P,
}

/// Public API
impl Guild<MemoryStore> {
    pub fn new(config: BankConfig) -> Self {
        Self::with_persistence(config, MemoryStore::default())
    }
}

/// Public API
impl<P: Persistence> Guild<P> {
    pub fn with_persistence(config: BankConfig, store: P) -> Self {
        Self {
            rights: RightsMatrix::new(0),
            audit: AuditLog::new(config.log_capacity),
            config,
            bank: GuildBank::default(),
            members: HashMap::new(),
            items: ItemCatalog::default(),
            next_guid: 1,
            store,
        }
    }

    /// Run the engine with the given command stream
    pub async fn run(&mut self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(command) = stream.next().await {
            // a rejected command must not stop the engine, it is already logged
            let _ = self.apply(command);
        }
    }

    /// Apply a single command on top of the current guild state
    pub fn apply(&mut self, command: Command) -> Result<(), EngineError> {
        match command {
            Command::Move(request) => {
                let result = self.transfer(&request);
                Self::log_result("move", request.member, &result);
                result?;
            }
            Command::DepositMoney { member, amount } => {
                let result = self.deposit_money(member, amount);
                Self::log_result("deposit money", member, &result);
                result?;
            }
            Command::WithdrawMoney { member, amount } => {
                let result = self.withdraw_money(member, amount);
                Self::log_result("withdraw money", member, &result);
                result?;
            }
            Command::SetTabText { member, tab, text } => {
                let result = self.set_tab_text(member, tab, text);
                Self::log_result("set tab text", member, &result);
                result?;
            }
            Command::PurchaseTab { name, icon } => {
                let result = self.purchase_tab(name, icon);
                Self::log_result("purchase tab", 0, &result);
                result?;
            }
            Command::ResetQuotas => {
                let result = self.reset_quotas();
                Self::log_result("reset quotas", 0, &result);
                result?;
            }
            Command::Admin(admin) => self.apply_admin(admin)?,
        }
        Ok(())
    }

    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    pub fn bank(&self) -> &GuildBank {
        &self.bank
    }

    pub fn rights(&self) -> &RightsMatrix {
        &self.rights
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn persistence(&self) -> &P {
        &self.store
    }

    /// Return the state of all members
    pub fn members(&self) -> impl Iterator<Item = &Member> + '_ {
        self.members.values()
    }

    /// Return the state of one member
    pub fn get_member(&self, member: MemberId) -> Option<&Member> {
        self.members.get(&member)
    }

    /// Every occupied bank slot as `(tab, slot, item, count)`.
    pub fn bank_contents(&self) -> impl Iterator<Item = (TabId, SlotId, ItemId, u32)> + '_ {
        self.bank
            .contents()
            .map(|(tab, slot, stack)| (tab, slot, stack.item, stack.count))
    }

    pub fn add_member(&mut self, member: MemberId, rank: RankId) {
        let inventory_slots = self.config.inventory_slots;
        self.members
            .entry(member)
            .and_modify(|existing| existing.rank = rank)
            .or_insert_with(|| Member::new(member, rank, inventory_slots));
    }

    pub fn define_item(&mut self, template: ItemTemplate) {
        self.items.insert(template);
    }

    pub fn set_tab_profile(&mut self, rank: RankId, tab: TabId, profile: TabProfile) -> bool {
        self.rights.set_tab_profile(rank, tab, profile)
    }

    pub fn set_gold_quota(&mut self, rank: RankId, quota: Quota<Money>) -> bool {
        self.rights.set_gold_quota(rank, quota)
    }
}

/// Private API
impl<P: Persistence> Guild<P> {
    /// Small helper to log `apply` results
    fn log_result<T, E: std::fmt::Display>(command: &str, member: MemberId, result: &Result<T, E>) {
        match result {
            Ok(_) => {
                info!(member = %member, "{command} applied");
            }
            Err(e) => {
                info!(member = %member, reason = %e, "{command} skipped");
            }
        }
    }

    fn apply_admin(&mut self, admin: Admin) -> Result<(), EngineError> {
        match admin {
            Admin::AddMember { member, rank } => self.add_member(member, rank),
            Admin::DefineItem(template) => self.define_item(template),
            Admin::SetTabRights {
                rank,
                tab,
                rights,
                slot_quota,
            } => {
                if !self.set_tab_profile(rank, tab, TabProfile::new(rights, slot_quota)) {
                    warn!(rank, tab, "rights row ignored");
                }
            }
            Admin::SetGoldQuota { rank, quota } => {
                if !self.set_gold_quota(rank, quota) {
                    warn!(rank, "gold quota ignored");
                }
            }
            Admin::GrantItem {
                member,
                slot,
                item,
                count,
                contents,
            } => {
                let result = self.grant_item(member, slot, item, count, contents);
                Self::log_result("grant item", member, &result);
                result?;
            }
            Admin::GrantMoney { member, amount } => {
                let result = self.grant_money(member, amount);
                Self::log_result("grant money", member, &result);
                result?;
            }
        }
        Ok(())
    }

    fn member(&self, member: MemberId) -> Result<&Member, EngineError> {
        self.members
            .get(&member)
            .ok_or(EngineError::UnknownMember(member))
    }

    fn template(&self, item: ItemId) -> Result<&ItemTemplate, EngineError> {
        self.items.get(item).ok_or(EngineError::UnknownItem(item))
    }

    /// Commit `writes` durably, then mirror them in memory.
    fn commit(&mut self, writes: Vec<Write>) -> Result<(), EngineError> {
        if let Err(e) = self.store.commit(&writes) {
            warn!(writes = writes.len(), error = %e, "commit failed, nothing applied");
            return Err(e.into());
        }
        for write in writes {
            self.apply_write(write);
        }
        Ok(())
    }

    fn apply_write(&mut self, write: Write) {
        match write {
            Write::BankSlot { tab, slot, stack } => {
                if let Some(tab) = self.bank.tab_mut(tab) {
                    tab.set_slot(slot, stack);
                }
            }
            Write::InventorySlot {
                member,
                slot,
                stack,
            } => {
                if let Some(member) = self.members.get_mut(&member) {
                    member.inventory.set_slot(slot, stack);
                }
            }
            Write::TabInfo {
                tab,
                name,
                icon,
                text,
            } => {
                let tab_count = self.bank.tab_count();
                match self.bank.tab_mut(tab) {
                    Some(existing) => {
                        existing.name = name;
                        existing.icon = icon;
                        existing.text = text;
                    }
                    None if tab as usize == tab_count => {
                        let mut created = Tab::new(name, icon, self.config.slots_per_tab);
                        created.text = text;
                        self.bank.push_tab(created);
                        self.rights.add_tab();
                    }
                    None => warn!(tab, "tab info for a missing tab ignored"),
                }
            }
            Write::WithdrawnSlots { member, tab, count } => {
                if let Some(member) = self.members.get_mut(&member) {
                    member.quota.set_withdrawn_slots(tab, count);
                }
            }
            Write::WithdrawnMoney { member, amount } => {
                if let Some(member) = self.members.get_mut(&member) {
                    member.quota.set_withdrawn_money(amount);
                }
            }
            Write::BankMoney(amount) => self.bank.money = amount,
            Write::MemberMoney { member, amount } => {
                if let Some(member) = self.members.get_mut(&member) {
                    member.money = amount;
                }
            }
            Write::Audit(entry) => self.audit.append(entry),
        }
    }

    /// Place freshly created items into a member's inventory.
    ///
    /// `contents` marks a granted bag as already holding items; only a
    /// single container item can carry it.
    fn grant_item(
        &mut self,
        member: MemberId,
        slot: Option<SlotId>,
        item: ItemId,
        count: u32,
        contents: u16,
    ) -> Result<(), EngineError> {
        if count == 0 {
            return Ok(());
        }
        let holder = self.member(member)?;
        let template = self.template(item)?;
        if contents > 0 && (!template.container || count != 1) {
            return Err(EngineError::NotABag(item));
        }
        let inventory = InventoryEndpoint::new(holder, &self.items, slot)?;
        let mut staging = Staging::new(member, unix_now(), self.next_guid);
        let mut stack = Stack::new(item, count, staging.fresh_guid());
        stack.contents = contents;
        match inventory.can_store(&mut staging, &stack, template, false)? {
            Placement::Placed(reservations) => inventory.store(&mut staging, stack, &reservations),
            Placement::Occupied(_) => return Err(BankError::InventoryFull.into()),
        }
        let changes = staging.into_changes();
        let writes = changes
            .slots
            .into_iter()
            .map(|(at, stack)| Write::InventorySlot {
                member,
                slot: at.slot,
                stack,
            })
            .collect();
        self.commit(writes)?;
        self.next_guid = changes.next_guid;
        Ok(())
    }

    fn grant_money(&mut self, member: MemberId, amount: Money) -> Result<(), EngineError> {
        let holder = self.member(member)?;
        let amount = holder
            .money
            .checked_add(amount)
            .ok_or(BankError::BalanceOverflow)?;
        self.commit(vec![Write::MemberMoney { member, amount }])
    }
}

impl Default for Guild<MemoryStore> {
    fn default() -> Self {
        Self::new(BankConfig::default())
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Endpoint, MoveRequest};

    // test utils

    const ORE: ItemId = 100;
    const BAG: ItemId = 400;

    fn guild() -> Guild {
        let mut guild = Guild::new(BankConfig {
            slots_per_tab: 4,
            inventory_slots: 4,
            ..BankConfig::default()
        });
        guild.apply(purchase("Main")).unwrap();
        guild.define_item(ItemTemplate::new(ORE, 20));
        guild.add_member(1, GUILD_MASTER_RANK);
        guild
    }

    fn purchase(name: &str) -> Command {
        Command::PurchaseTab {
            name: name.to_string(),
            icon: String::new(),
        }
    }

    fn grant(member: MemberId, slot: SlotId, count: u32) -> Command {
        Command::Admin(Admin::GrantItem {
            member,
            slot: Some(slot),
            item: ORE,
            count,
            contents: 0,
        })
    }

    fn deposit(member: MemberId, slot: SlotId) -> Command {
        Command::Move(MoveRequest::new(
            member,
            Endpoint::inventory(slot),
            Endpoint::Bank { tab: 0, slot: None },
        ))
    }

    #[test]
    fn new_guild() {
        let guild = Guild::default();
        assert_eq!(guild.members().count(), 0);
        assert_eq!(guild.bank().tab_count(), 0);
        assert_eq!(guild.bank_contents().count(), 0);
    }

    #[test]
    fn purchase_tab_backfills_rights() {
        let mut guild = guild();
        guild.set_tab_profile(2, 0, TabProfile::FULL);
        guild.apply(purchase("Second")).unwrap();

        assert_eq!(guild.bank().tab_count(), 2);
        assert_eq!(
            guild.bank().tab(1).map(|tab| tab.name.as_str()),
            Some("Second")
        );
        assert_eq!(guild.rights().tab_profile(2, 1), TabProfile::default());
        assert_eq!(guild.rights().tab_profile(2, 0), TabProfile::FULL);
    }

    #[test]
    fn grant_item_fills_inventory() {
        let mut guild = guild();
        guild.apply(grant(1, 2, 25)).unwrap();

        let inventory = guild.get_member(1).unwrap().inventory();
        assert_eq!(inventory.slot(2).map(|s| s.count), Some(20));
        assert_eq!(inventory.slot(0).map(|s| s.count), Some(5));
        assert_eq!(inventory.count_item(ORE), 25);
    }

    #[test]
    fn grant_item_guids_are_unique() {
        let mut guild = guild();
        guild.apply(grant(1, 0, 45)).unwrap();

        let inventory = guild.get_member(1).unwrap().inventory();
        let mut guids: Vec<_> = inventory.slots().iter().flatten().map(|s| s.guid).collect();
        guids.sort();
        guids.dedup();
        assert_eq!(guids.len(), 3);
    }

    #[test]
    fn grant_to_unknown_member_fails() {
        let mut guild = guild();
        let result = guild.apply(grant(9, 0, 1));
        assert!(matches!(result, Err(EngineError::UnknownMember(9))));
    }

    #[test]
    fn only_a_single_bag_can_be_granted_with_contents() {
        let mut guild = guild();
        guild.define_item(ItemTemplate::new(BAG, 1).container());
        let filled = |item, count| {
            Command::Admin(Admin::GrantItem {
                member: 1,
                slot: Some(0),
                item,
                count,
                contents: 4,
            })
        };

        assert!(matches!(
            guild.apply(filled(ORE, 1)),
            Err(EngineError::NotABag(ORE))
        ));
        assert!(matches!(
            guild.apply(filled(BAG, 2)),
            Err(EngineError::NotABag(BAG))
        ));
        assert_eq!(guild.get_member(1).unwrap().inventory().count_item(ORE), 0);

        guild.apply(filled(BAG, 1)).unwrap();
        let bag = guild
            .get_member(1)
            .unwrap()
            .inventory()
            .slot(0)
            .cloned()
            .unwrap();
        assert_eq!(bag.contents, 4);
        assert!(bag.is_nonempty_bag());
    }

    #[test]
    fn add_member_twice_updates_rank() {
        let mut guild = guild();
        guild.add_member(1, 4);
        assert_eq!(guild.get_member(1).unwrap().rank(), 4);
        assert_eq!(guild.members().count(), 1);
    }

    // Async run()

    #[tokio::test]
    async fn run_processes_all_commands() {
        let mut guild = guild();
        let commands = vec![
            grant(1, 0, 10),
            grant(1, 1, 15),
            deposit(1, 0),
            deposit(1, 1),
        ];

        guild.run(tokio_stream::iter(commands)).await;

        let contents: Vec<_> = guild.bank_contents().collect();
        assert_eq!(contents, vec![(0, 0, ORE, 20), (0, 1, ORE, 5)]);
    }

    #[tokio::test]
    async fn run_skips_rejected_commands_and_continues() {
        let mut guild = guild();
        let commands = vec![
            grant(1, 0, 10),
            deposit(1, 3), // empty slot, rejected
            Command::DepositMoney {
                member: 1,
                amount: Money::from_copper(5),
            }, // no money, rejected
            deposit(1, 0),
        ];

        guild.run(tokio_stream::iter(commands)).await;

        let contents: Vec<_> = guild.bank_contents().collect();
        assert_eq!(contents, vec![(0, 0, ORE, 10)]);
        assert_eq!(guild.bank().money(), Money::ZERO);
    }
}
