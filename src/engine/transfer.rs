//! Transfer orchestrator.
//!
//! Every operation here first builds the complete write set against staged
//! state, without touching the guild, and hands it to `Guild::commit` as
//! one unit. A rejection at any step therefore has no effect.

use std::collections::BTreeMap;

use tracing::debug;

use crate::Money;
use crate::engine::audit::{AuditChannel, AuditEntry, AuditKind, AuditSubject};
use crate::engine::endpoint::{
    BankEndpoint, InventoryEndpoint, MoveEndpoint, StagedChanges, Staging,
};
use crate::engine::rights::{BankRights, ReorderPolicy};
use crate::engine::{
    BankError, EngineError, Guild, Member, Persistence, Placement, Reservation, Write, unix_now,
};
use crate::model::{Container, Endpoint, MemberId, MoveRequest, SlotId, SlotRef, TabId};

/// Result of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Every slot whose contents changed, on both sides.
    pub changed: Vec<SlotRef>,
    /// Units that arrived at the destination.
    pub moved: u32,
    /// The destination occupant went back to the source.
    pub swapped: bool,
}

impl TransferOutcome {
    /// Changed slots of one container, for view refresh.
    pub fn changed_in(&self, container: Container) -> impl Iterator<Item = SlotId> + '_ {
        self.changed
            .iter()
            .filter(move |at| at.container == container)
            .map(|at| at.slot)
    }
}

struct TransferPlan {
    writes: Vec<Write>,
    outcome: TransferOutcome,
    next_guid: u64,
}

/// Public API
impl<P: Persistence> Guild<P> {
    /// Move items between two endpoints, atomically.
    pub fn transfer(&mut self, request: &MoveRequest) -> Result<TransferOutcome, EngineError> {
        let plan = self.plan_transfer(request)?;
        self.commit(plan.writes)?;
        self.next_guid = plan.next_guid;
        Ok(plan.outcome)
    }

    /// Apply a `Command::DepositMoney`:
    /// - Ensure the member holds the amount
    /// - Move it to the bank balance and log it on the money channel
    pub fn deposit_money(&mut self, member: MemberId, amount: Money) -> Result<(), EngineError> {
        let holder = self.member(member)?;
        if amount.is_zero() {
            return Ok(());
        }
        let left = holder
            .money
            .checked_sub(amount)
            .ok_or(BankError::InsufficientFunds)?;
        let balance = self
            .bank
            .money
            .checked_add(amount)
            .ok_or(BankError::BalanceOverflow)?;

        let writes = vec![
            Write::MemberMoney {
                member,
                amount: left,
            },
            Write::BankMoney(balance),
            Write::Audit(money_entry(member, AuditKind::DepositMoney, amount)),
        ];
        self.commit(writes)
    }

    /// Apply a `Command::WithdrawMoney`:
    /// - Ensure the rank's daily gold quota covers the amount
    /// - Ensure the bank holds the amount
    /// - Move it to the member, count it against the quota and log it
    pub fn withdraw_money(&mut self, member: MemberId, amount: Money) -> Result<(), EngineError> {
        let holder = self.member(member)?;
        if amount.is_zero() {
            return Ok(());
        }
        let quota = self.rights.gold_quota(holder.rank);
        if !holder.quota.has_money_quota(&quota, amount) {
            return Err(BankError::WithdrawLimit.into());
        }
        let left = self
            .bank
            .money
            .checked_sub(amount)
            .ok_or(BankError::InsufficientFunds)?;
        let purse = holder
            .money
            .checked_add(amount)
            .ok_or(BankError::BalanceOverflow)?;

        let writes = vec![
            Write::BankMoney(left),
            Write::MemberMoney {
                member,
                amount: purse,
            },
            Write::WithdrawnMoney {
                member,
                amount: holder.quota.withdrawn_money().saturating_add(amount),
            },
            Write::Audit(money_entry(member, AuditKind::WithdrawMoney, amount)),
        ];
        self.commit(writes)
    }

    /// Replace a tab's free text; needs modify rights on that tab.
    pub fn set_tab_text(
        &mut self,
        member: MemberId,
        tab: TabId,
        text: String,
    ) -> Result<(), EngineError> {
        let holder = self.member(member)?;
        let existing = self.bank.tab(tab).ok_or(BankError::InvalidTab(tab))?;
        if !self
            .rights
            .tab_profile(holder.rank, tab)
            .has(BankRights::MODIFY)
        {
            return Err(BankError::Permission.into());
        }

        let write = Write::TabInfo {
            tab,
            name: existing.name.clone(),
            icon: existing.icon.clone(),
            text,
        };
        self.commit(vec![write])
    }

    /// Append a tab; every rank starts with no rights on it.
    pub fn purchase_tab(&mut self, name: String, icon: String) -> Result<TabId, EngineError> {
        let max_tabs = self.config.max_tabs;
        if self.bank.tab_count() >= max_tabs as usize {
            return Err(BankError::TabLimitReached(max_tabs).into());
        }
        let tab = self.bank.tab_count() as TabId;
        self.commit(vec![Write::TabInfo {
            tab,
            name,
            icon,
            text: String::new(),
        }])?;
        Ok(tab)
    }

    /// Zero every member's withdrawal counters.
    pub fn reset_quotas(&mut self) -> Result<(), EngineError> {
        let mut members: Vec<&Member> = self.members.values().collect();
        members.sort_by_key(|member| member.id());

        let mut writes = Vec::new();
        for member in members {
            writes.extend(
                member
                    .quota
                    .charged_tabs()
                    .map(|tab| Write::WithdrawnSlots {
                        member: member.id(),
                        tab,
                        count: 0,
                    }),
            );
            if !member.quota.withdrawn_money().is_zero() {
                writes.push(Write::WithdrawnMoney {
                    member: member.id(),
                    amount: Money::ZERO,
                });
            }
        }
        if writes.is_empty() {
            return Ok(());
        }
        self.commit(writes)
    }
}

/// Private API
impl<P: Persistence> Guild<P> {
    fn endpoint<'a>(
        &'a self,
        member: &'a Member,
        at: Endpoint,
    ) -> Result<Box<dyn MoveEndpoint + 'a>, BankError> {
        Ok(match at {
            Endpoint::Bank { tab, slot } => Box::new(BankEndpoint::new(
                &self.bank,
                &self.rights,
                member,
                tab,
                slot,
            )?),
            Endpoint::Inventory { slot } => {
                Box::new(InventoryEndpoint::new(member, &self.items, slot)?)
            }
        })
    }

    /// Plan a `Command::Move`:
    /// - Resolve the source stack and the split amount
    /// - Check rights on both sides (modify only, for a reorder inside one tab)
    /// - Place the stack at the destination, swapping with an occupant of the
    ///   explicit slot when it cannot merge
    /// - Charge withdrawal quota and log every leg
    fn plan_transfer(&self, request: &MoveRequest) -> Result<TransferPlan, EngineError> {
        if !request.source.is_bank() && !request.destination.is_bank() {
            return Err(BankError::NoBankEndpoint.into());
        }
        let member = self.member(request.member)?;
        let source = self.endpoint(member, request.source)?;
        let destination = self.endpoint(member, request.destination)?;
        let (source, destination) = (source.as_ref(), destination.as_ref());

        let mut staging = Staging::new(member.id(), unix_now(), self.next_guid);
        let stack = source.resolve_item(&mut staging)?;
        let template = self.template(stack.item)?;

        let split = match request.split {
            0 => None,
            requested if requested > stack.count => {
                return Err(BankError::TooFewToSplit {
                    requested,
                    available: stack.count,
                }
                .into());
            }
            requested if requested == stack.count => None,
            requested => Some(requested),
        };

        let same_container = source.container() == destination.container();
        if same_container {
            let policy = ReorderPolicy {
                requires_deposit_or_withdraw: self.config.reorder_requires_deposit_or_withdraw,
            };
            if !policy.permits(
                source.has_modify_rights(),
                source.has_deposit_rights(),
                source.has_withdraw_rights(),
            ) {
                return Err(BankError::Permission.into());
            }
        } else {
            check_withdraw(source)?;
            if !destination.has_deposit_rights() {
                return Err(BankError::Permission.into());
            }
        }

        let moving = match split {
            Some(count) => {
                let guid = staging.fresh_guid();
                stack.clone_with(count, guid)
            }
            None => stack,
        };
        source.remove(&mut staging, destination, moving.count);

        let displaced = match destination.can_store(&mut staging, &moving, template, false)? {
            Placement::Placed(reservations) => {
                destination.store(&mut staging, moving.clone(), &reservations);
                None
            }
            Placement::Occupied(slot) => {
                if split.is_some() {
                    return Err(destination.full_error().into());
                }
                if !destination.has_modify_rights() {
                    let locked = if source.is_bank() {
                        BankError::ItemLocked
                    } else {
                        BankError::Permission
                    };
                    return Err(locked.into());
                }
                if !same_container {
                    if !source.has_deposit_rights() {
                        return Err(BankError::Permission.into());
                    }
                    check_withdraw(destination)?;
                }

                let displaced = destination.resolve_item(&mut staging)?;
                let displaced_template = self.template(displaced.item)?;
                destination.remove(&mut staging, source, displaced.count);

                let forward = placed(
                    destination.can_store(&mut staging, &moving, template, true)?,
                    destination,
                )?;
                let back = placed(
                    source.can_store(&mut staging, &displaced, displaced_template, true)?,
                    source,
                )?;
                debug!(
                    slot,
                    item = displaced.item,
                    "swapping with destination occupant"
                );
                destination.store(&mut staging, moving.clone(), &forward);
                source.store(&mut staging, displaced.clone(), &back);
                Some(displaced)
            }
        };

        destination.log_transfer(&mut staging, source, &moving);
        if let Some(displaced) = &displaced {
            source.log_transfer(&mut staging, destination, displaced);
        }

        Ok(build_plan(
            member,
            staging.into_changes(),
            moving.count,
            displaced.is_some(),
        ))
    }
}

/// Withdraw-side gate: the right itself, then today's slot quota.
fn check_withdraw(endpoint: &dyn MoveEndpoint) -> Result<(), BankError> {
    if !endpoint.has_withdraw_rights() {
        return Err(BankError::Permission);
    }
    if !endpoint.has_withdraw_quota() {
        return Err(BankError::WithdrawLimit);
    }
    Ok(())
}

fn placed(
    placement: Placement,
    endpoint: &dyn MoveEndpoint,
) -> Result<Vec<Reservation>, BankError> {
    match placement {
        Placement::Placed(reservations) => Ok(reservations),
        Placement::Occupied(_) => Err(endpoint.full_error()),
    }
}

fn build_plan(member: &Member, changes: StagedChanges, moved: u32, swapped: bool) -> TransferPlan {
    let mut writes = Vec::with_capacity(changes.slots.len() + changes.audit.len() + 2);
    let mut changed = Vec::with_capacity(changes.slots.len());
    for (at, stack) in changes.slots {
        changed.push(at);
        writes.push(match at.container {
            Container::Bank(tab) => Write::BankSlot {
                tab,
                slot: at.slot,
                stack,
            },
            Container::Inventory(owner) => Write::InventorySlot {
                member: owner,
                slot: at.slot,
                stack,
            },
        });
    }

    let mut charged: BTreeMap<TabId, u32> = BTreeMap::new();
    for tab in changes.charged_tabs {
        *charged.entry(tab).or_default() += 1;
    }
    for (tab, count) in charged {
        writes.push(Write::WithdrawnSlots {
            member: member.id(),
            tab,
            count: member.quota.withdrawn_slots(tab).saturating_add(count),
        });
    }

    writes.extend(changes.audit.into_iter().map(Write::Audit));

    TransferPlan {
        writes,
        outcome: TransferOutcome {
            changed,
            moved,
            swapped,
        },
        next_guid: changes.next_guid,
    }
}

fn money_entry(actor: MemberId, kind: AuditKind, amount: Money) -> AuditEntry {
    AuditEntry {
        actor,
        kind,
        channel: AuditChannel::Money,
        subject: AuditSubject::Money(amount),
        dest_tab: None,
        timestamp: unix_now(),
    }
}
