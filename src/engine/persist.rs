//! Persistence boundary: row-level writes committed all-or-nothing.

use thiserror::Error;

use crate::Money;
use crate::engine::audit::AuditEntry;
use crate::model::{MemberId, SlotId, Stack, TabId};

/// One row-level upsert (or delete, for an empty slot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    BankSlot {
        tab: TabId,
        slot: SlotId,
        stack: Option<Stack>,
    },
    InventorySlot {
        member: MemberId,
        slot: SlotId,
        stack: Option<Stack>,
    },
    /// Tab metadata; writing the next tab index creates that tab.
    TabInfo {
        tab: TabId,
        name: String,
        icon: String,
        text: String,
    },
    WithdrawnSlots {
        member: MemberId,
        tab: TabId,
        count: u32,
    },
    WithdrawnMoney {
        member: MemberId,
        amount: Money,
    },
    BankMoney(Money),
    MemberMoney {
        member: MemberId,
        amount: Money,
    },
    Audit(AuditEntry),
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("journal write failed: {0}")]
    Journal(#[from] csv::Error),

    #[error("journal flush failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable storage for committed write sets.
pub trait Persistence: Send {
    /// Apply `writes` as a single transaction: all of them or none.
    fn commit(&mut self, writes: &[Write]) -> Result<(), PersistError>;
}

impl<P: Persistence + ?Sized> Persistence for Box<P> {
    fn commit(&mut self, writes: &[Write]) -> Result<(), PersistError> {
        (**self).commit(writes)
    }
}

/// Keeps every committed batch in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    batches: Vec<Vec<Write>>,
}

impl MemoryStore {
    pub fn batches(&self) -> &[Vec<Write>] {
        &self.batches
    }

    pub fn last_batch(&self) -> Option<&[Write]> {
        self.batches.last().map(Vec::as_slice)
    }
}

impl Persistence for MemoryStore {
    fn commit(&mut self, writes: &[Write]) -> Result<(), PersistError> {
        self.batches.push(writes.to_vec());
        Ok(())
    }
}
