//! Move endpoint adapters.
//!
//! A transfer reads and writes its two sides only through [`MoveEndpoint`],
//! implemented once for a bank tab slot and once for an inventory slot.
//! Every mutation lands in a [`Staging`] copy of the touched containers;
//! committed state is only changed once the whole plan is known to succeed.

use std::collections::{BTreeMap, BTreeSet};

use crate::engine::allocator::{Placement, Reservation, allocate};
use crate::engine::audit::{AuditChannel, AuditEntry, AuditKind, AuditSubject};
use crate::engine::error::BankError;
use crate::engine::quota::MemberQuotaState;
use crate::engine::rights::{BankRights, RightsMatrix, TabProfile};
use crate::engine::state::{GuildBank, ItemCatalog, Member, Tab};
use crate::model::{Container, ItemGuid, ItemTemplate, MemberId, SlotId, SlotRef, Stack, TabId};

#[derive(Debug)]
struct SlotView {
    slots: Vec<Option<Stack>>,
    touched: BTreeSet<SlotId>,
}

impl SlotView {
    fn get(&self, slot: SlotId) -> Option<&Stack> {
        self.slots.get(slot as usize).and_then(Option::as_ref)
    }

    fn set(&mut self, slot: SlotId, stack: Option<Stack>) {
        if let Some(entry) = self.slots.get_mut(slot as usize) {
            *entry = stack;
            self.touched.insert(slot);
        }
    }
}

/// Everything a planned transfer would change.
#[derive(Debug)]
pub(crate) struct StagedChanges {
    pub slots: Vec<(SlotRef, Option<Stack>)>,
    pub charged_tabs: Vec<TabId>,
    pub audit: Vec<AuditEntry>,
    pub next_guid: u64,
}

/// Scratch copy of the containers touched by one transfer.
#[derive(Debug)]
pub struct Staging {
    actor: MemberId,
    timestamp: u64,
    next_guid: u64,
    views: BTreeMap<Container, SlotView>,
    charged_tabs: Vec<TabId>,
    audit: Vec<AuditEntry>,
}

impl Staging {
    pub(crate) fn new(actor: MemberId, timestamp: u64, next_guid: u64) -> Self {
        Self {
            actor,
            timestamp,
            next_guid,
            views: BTreeMap::new(),
            charged_tabs: Vec::new(),
            audit: Vec::new(),
        }
    }

    pub(crate) fn fresh_guid(&mut self) -> ItemGuid {
        let guid = ItemGuid(self.next_guid);
        self.next_guid += 1;
        guid
    }

    fn view(
        &mut self,
        container: Container,
        snapshot: impl FnOnce() -> Vec<Option<Stack>>,
    ) -> &mut SlotView {
        self.views.entry(container).or_insert_with(|| SlotView {
            slots: snapshot(),
            touched: BTreeSet::new(),
        })
    }

    fn item_at(
        &mut self,
        container: Container,
        snapshot: impl FnOnce() -> Vec<Option<Stack>>,
        slot: Option<SlotId>,
    ) -> Result<Stack, BankError> {
        let slot = slot.ok_or(BankError::ItemNotFound)?;
        self.view(container, snapshot)
            .get(slot)
            .cloned()
            .ok_or(BankError::ItemNotFound)
    }

    fn allocate(
        &mut self,
        container: Container,
        snapshot: impl FnOnce() -> Vec<Option<Stack>>,
        stack: &Stack,
        template: &ItemTemplate,
        explicit: Option<SlotId>,
        swap: bool,
    ) -> Option<Placement> {
        let view = self.view(container, snapshot);
        allocate(&view.slots, stack, template.max_stack, explicit, swap).ok()
    }

    /// Take `amount` units out of `slot`, clearing it when nothing is left.
    fn take(
        &mut self,
        container: Container,
        snapshot: impl FnOnce() -> Vec<Option<Stack>>,
        slot: Option<SlotId>,
        amount: u32,
    ) {
        let Some(slot) = slot else { return };
        let view = self.view(container, snapshot);
        let remaining = match view.get(slot) {
            Some(stack) if amount < stack.count => {
                let mut stack = stack.clone();
                stack.count -= amount;
                Some(stack)
            }
            _ => None,
        };
        view.set(slot, remaining);
    }

    /// Replay reservations. Every reservation that lands in an empty slot but
    /// the last gets a cloned instance with a fresh guid.
    fn place(
        &mut self,
        container: Container,
        snapshot: impl FnOnce() -> Vec<Option<Stack>>,
        stack: Stack,
        reservations: &[Reservation],
    ) {
        self.view(container, snapshot);
        let last = reservations.len().saturating_sub(1);
        for (index, reservation) in reservations.iter().enumerate() {
            let occupant = self
                .views
                .get(&container)
                .and_then(|view| view.get(reservation.slot))
                .cloned();
            let placed = match occupant {
                Some(mut existing) => {
                    existing.count += reservation.count;
                    existing
                }
                None if index == last => {
                    let mut original = stack.clone();
                    original.count = reservation.count;
                    original
                }
                None => {
                    let guid = self.fresh_guid();
                    stack.clone_with(reservation.count, guid)
                }
            };
            if let Some(view) = self.views.get_mut(&container) {
                view.set(reservation.slot, Some(placed));
            }
        }
    }

    fn charge(&mut self, tab: TabId) {
        self.charged_tabs.push(tab);
    }

    fn log(
        &mut self,
        kind: AuditKind,
        channel: AuditChannel,
        subject: AuditSubject,
        dest_tab: Option<TabId>,
    ) {
        self.audit.push(AuditEntry {
            actor: self.actor,
            kind,
            channel,
            subject,
            dest_tab,
            timestamp: self.timestamp,
        });
    }

    pub(crate) fn into_changes(self) -> StagedChanges {
        let slots = self
            .views
            .into_iter()
            .flat_map(|(container, view)| {
                let SlotView { slots, touched } = view;
                touched.into_iter().map(move |slot| {
                    (
                        SlotRef { container, slot },
                        slots.get(slot as usize).cloned().flatten(),
                    )
                })
            })
            .collect();
        StagedChanges {
            slots,
            charged_tabs: self.charged_tabs,
            audit: self.audit,
            next_guid: self.next_guid,
        }
    }
}

/// One side of a transfer.
pub trait MoveEndpoint {
    fn container(&self) -> Container;

    /// The slot this endpoint addresses, if any.
    fn slot(&self) -> Option<SlotId>;

    /// Committed contents of the container.
    fn slots(&self) -> Vec<Option<Stack>>;

    fn is_bank(&self) -> bool {
        matches!(self.container(), Container::Bank(_))
    }

    /// The stack in the addressed slot, if it may leave this container.
    fn resolve_item(&self, staging: &mut Staging) -> Result<Stack, BankError>;

    fn has_deposit_rights(&self) -> bool;

    fn has_withdraw_rights(&self) -> bool;

    fn has_withdraw_quota(&self) -> bool;

    fn has_modify_rights(&self) -> bool;

    /// Error reported when the container has no room left.
    fn full_error(&self) -> BankError;

    /// Plan where `stack` would land.
    fn can_store(
        &self,
        staging: &mut Staging,
        stack: &Stack,
        template: &ItemTemplate,
        swap: bool,
    ) -> Result<Placement, BankError> {
        staging
            .allocate(
                self.container(),
                || self.slots(),
                stack,
                template,
                self.slot(),
                swap,
            )
            .ok_or_else(|| self.full_error())
    }

    /// Take `amount` units out of the addressed slot, on their way to `other`.
    fn remove(&self, staging: &mut Staging, other: &dyn MoveEndpoint, amount: u32);

    fn store(&self, staging: &mut Staging, stack: Stack, reservations: &[Reservation]) {
        staging.place(self.container(), || self.slots(), stack, reservations);
    }

    /// Record the audit entry for `stack` arriving here from `other`.
    fn log_transfer(&self, staging: &mut Staging, other: &dyn MoveEndpoint, stack: &Stack);
}

/// A slot in one of the guild bank's tabs.
pub struct BankEndpoint<'a> {
    tab_id: TabId,
    tab: &'a Tab,
    slot: Option<SlotId>,
    profile: TabProfile,
    quota: &'a MemberQuotaState,
}

impl<'a> BankEndpoint<'a> {
    pub fn new(
        bank: &'a GuildBank,
        rights: &RightsMatrix,
        member: &'a Member,
        tab_id: TabId,
        slot: Option<SlotId>,
    ) -> Result<Self, BankError> {
        let tab = bank.tab(tab_id).ok_or(BankError::InvalidTab(tab_id))?;
        if let Some(slot) = slot.filter(|slot| *slot as usize >= tab.slot_count()) {
            return Err(BankError::InvalidSlot(slot));
        }
        Ok(Self {
            tab_id,
            tab,
            slot,
            profile: rights.tab_profile(member.rank(), tab_id),
            quota: member.quota(),
        })
    }

    pub fn profile(&self) -> &TabProfile {
        &self.profile
    }
}

impl MoveEndpoint for BankEndpoint<'_> {
    fn container(&self) -> Container {
        Container::Bank(self.tab_id)
    }

    fn slot(&self) -> Option<SlotId> {
        self.slot
    }

    fn slots(&self) -> Vec<Option<Stack>> {
        self.tab.slots().to_vec()
    }

    fn resolve_item(&self, staging: &mut Staging) -> Result<Stack, BankError> {
        staging.item_at(self.container(), || self.slots(), self.slot)
    }

    fn has_deposit_rights(&self) -> bool {
        self.profile.has(BankRights::DEPOSIT)
    }

    fn has_withdraw_rights(&self) -> bool {
        self.profile.has(BankRights::WITHDRAW)
    }

    fn has_withdraw_quota(&self) -> bool {
        self.quota.has_slot_quota(&self.profile, self.tab_id)
    }

    fn has_modify_rights(&self) -> bool {
        self.profile.has(BankRights::MODIFY)
    }

    fn full_error(&self) -> BankError {
        BankError::BankFull
    }

    fn can_store(
        &self,
        staging: &mut Staging,
        stack: &Stack,
        template: &ItemTemplate,
        swap: bool,
    ) -> Result<Placement, BankError> {
        if template.soulbound {
            return Err(BankError::NonTransferableItem);
        }
        staging
            .allocate(
                self.container(),
                || self.slots(),
                stack,
                template,
                self.slot,
                swap,
            )
            .ok_or(BankError::BankFull)
    }

    fn remove(&self, staging: &mut Staging, other: &dyn MoveEndpoint, amount: u32) {
        staging.take(self.container(), || self.slots(), self.slot, amount);
        if other.container() != self.container() {
            staging.charge(self.tab_id);
        }
    }

    fn log_transfer(&self, staging: &mut Staging, other: &dyn MoveEndpoint, stack: &Stack) {
        let subject = AuditSubject::Item {
            item: stack.item,
            count: stack.count,
        };
        match other.container() {
            Container::Bank(from) => staging.log(
                AuditKind::MoveItem,
                AuditChannel::Tab(from),
                subject,
                Some(self.tab_id),
            ),
            Container::Inventory(_) => staging.log(
                AuditKind::DepositItem,
                AuditChannel::Tab(self.tab_id),
                subject,
                None,
            ),
        }
    }
}

/// A slot in the acting member's own inventory. The owner holds every right.
pub struct InventoryEndpoint<'a> {
    member: &'a Member,
    items: &'a ItemCatalog,
    slot: Option<SlotId>,
}

impl<'a> InventoryEndpoint<'a> {
    pub fn new(
        member: &'a Member,
        items: &'a ItemCatalog,
        slot: Option<SlotId>,
    ) -> Result<Self, BankError> {
        if let Some(slot) = slot.filter(|slot| *slot as usize >= member.inventory().slots().len()) {
            return Err(BankError::InvalidSlot(slot));
        }
        Ok(Self {
            member,
            items,
            slot,
        })
    }
}

impl MoveEndpoint for InventoryEndpoint<'_> {
    fn container(&self) -> Container {
        Container::Inventory(self.member.id())
    }

    fn slot(&self) -> Option<SlotId> {
        self.slot
    }

    fn slots(&self) -> Vec<Option<Stack>> {
        self.member.inventory().slots().to_vec()
    }

    fn resolve_item(&self, staging: &mut Staging) -> Result<Stack, BankError> {
        let stack = staging.item_at(self.container(), || self.slots(), self.slot)?;
        let (soulbound, bag) = self
            .items
            .get(stack.item)
            .map_or((false, false), |template| {
                (template.soulbound, template.container)
            });
        if soulbound || (bag && stack.is_nonempty_bag()) {
            return Err(BankError::NonTransferableItem);
        }
        Ok(stack)
    }

    fn has_deposit_rights(&self) -> bool {
        true
    }

    fn has_withdraw_rights(&self) -> bool {
        true
    }

    fn has_withdraw_quota(&self) -> bool {
        true
    }

    fn has_modify_rights(&self) -> bool {
        true
    }

    fn full_error(&self) -> BankError {
        BankError::InventoryFull
    }

    fn remove(&self, staging: &mut Staging, _other: &dyn MoveEndpoint, amount: u32) {
        staging.take(self.container(), || self.slots(), self.slot, amount);
    }

    fn log_transfer(&self, staging: &mut Staging, other: &dyn MoveEndpoint, stack: &Stack) {
        if let Container::Bank(from) = other.container() {
            staging.log(
                AuditKind::WithdrawItem,
                AuditChannel::Tab(from),
                AuditSubject::Item {
                    item: stack.item,
                    count: stack.count,
                },
                None,
            );
        }
    }
}
