//! Cloneable handle serializing concurrent requests against one guild.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::Money;
use crate::engine::{EngineError, Guild, MemoryStore, Persistence, TransferOutcome};
use crate::model::{Command, MemberId, MoveRequest};

/// Every operation holds the guild lock from validation to commit, so two
/// members can never both spend the last unit of a quota or the same stack.
pub struct SharedGuild<P = MemoryStore> {
    inner: Arc<Mutex<Guild<P>>>,
}

impl<P> Clone for SharedGuild<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Persistence> SharedGuild<P> {
    pub fn new(guild: Guild<P>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(guild)),
        }
    }

    pub async fn transfer(&self, request: &MoveRequest) -> Result<TransferOutcome, EngineError> {
        self.inner.lock().await.transfer(request)
    }

    pub async fn deposit_money(&self, member: MemberId, amount: Money) -> Result<(), EngineError> {
        self.inner.lock().await.deposit_money(member, amount)
    }

    pub async fn withdraw_money(&self, member: MemberId, amount: Money) -> Result<(), EngineError> {
        self.inner.lock().await.withdraw_money(member, amount)
    }

    pub async fn reset_quotas(&self) -> Result<(), EngineError> {
        self.inner.lock().await.reset_quotas()
    }

    pub async fn apply(&self, command: Command) -> Result<(), EngineError> {
        self.inner.lock().await.apply(command)
    }

    /// Exclusive access, e.g. for reading a consistent snapshot.
    pub async fn lock(&self) -> MutexGuard<'_, Guild<P>> {
        self.inner.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BankConfig;
    use crate::engine::{BankError, BankRights, GUILD_MASTER_RANK, Quota, TabProfile};
    use crate::model::{Admin, Endpoint, ItemTemplate};

    const GEM: u32 = 200;

    async fn stocked_guild(gems: u8) -> SharedGuild {
        let mut guild = Guild::new(BankConfig {
            slots_per_tab: 8,
            inventory_slots: 8,
            ..BankConfig::default()
        });
        guild.purchase_tab("Main".into(), String::new()).unwrap();
        guild.define_item(ItemTemplate::new(GEM, 1));
        guild.add_member(1, GUILD_MASTER_RANK);
        for member in 2..6 {
            guild.add_member(member, 2);
        }
        guild.set_tab_profile(
            2,
            0,
            TabProfile::new(BankRights::VIEW | BankRights::WITHDRAW, Quota::Daily(2)),
        );

        let shared = SharedGuild::new(guild);
        for slot in 0..gems {
            shared
                .apply(Command::Admin(Admin::GrantItem {
                    member: 1,
                    slot: Some(0),
                    item: GEM,
                    count: 1,
                    contents: 0,
                }))
                .await
                .unwrap();
            shared
                .transfer(&MoveRequest::new(
                    1,
                    Endpoint::inventory(0),
                    Endpoint::bank(0, slot),
                ))
                .await
                .unwrap();
        }
        shared
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_withdrawals_respect_the_quota() {
        let shared = stocked_guild(8).await;

        let handles: Vec<_> = (0..6u8)
            .map(|slot| {
                let shared = shared.clone();
                tokio::spawn(async move {
                    let request = MoveRequest::new(
                        2,
                        Endpoint::bank(0, slot),
                        Endpoint::Inventory { slot: None },
                    );
                    shared.transfer(&request).await
                })
            })
            .collect();

        let mut granted = 0;
        let mut limited = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => granted += 1,
                Err(err) => {
                    assert_eq!(err.rejection(), Some(&BankError::WithdrawLimit));
                    limited += 1;
                }
            }
        }

        assert_eq!((granted, limited), (2, 4));
        let guild = shared.lock().await;
        assert_eq!(guild.get_member(2).unwrap().inventory().count_item(GEM), 2);
        assert_eq!(guild.bank().count_item(GEM), 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_members_cannot_take_the_same_stack() {
        let shared = stocked_guild(1).await;

        let handles: Vec<_> = (2..6)
            .map(|member| {
                let shared = shared.clone();
                tokio::spawn(async move {
                    let request = MoveRequest::new(
                        member,
                        Endpoint::bank(0, 0),
                        Endpoint::Inventory { slot: None },
                    );
                    shared.transfer(&request).await
                })
            })
            .collect();

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                granted += 1;
            }
        }

        assert_eq!(granted, 1);
        assert_eq!(shared.lock().await.bank().count_item(GEM), 0);
    }
}
