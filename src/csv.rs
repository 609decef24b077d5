use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::engine::{
    AuditChannel, AuditEntry, AuditKind, AuditSubject, BankRights, PersistError, Persistence,
    Quota, Write,
};
use crate::model::{Admin, ItemTemplate, RankId, Stack};
use crate::{Command, Endpoint, ItemId, MemberId, Money, MoveRequest, SlotId, TabId};

/// Errors that can occur when parsing csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("cannot open {}: {source}", path.display())]
    Open { path: PathBuf, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized command type '{kind}'")]
    UnrecognizedType { line: usize, kind: String },

    #[error("line {line}: {kind} missing {field}")]
    MissingField {
        line: usize,
        kind: String,
        field: &'static str,
    },

    #[error("line {line}: invalid {field} '{value}'")]
    Invalid {
        line: usize,
        field: &'static str,
        value: String,
    },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    member: Option<MemberId>,
    rank: Option<RankId>,
    tab: Option<TabId>,
    slot: Option<SlotId>,
    to_tab: Option<TabId>,
    to_slot: Option<SlotId>,
    item: Option<ItemId>,
    count: Option<u64>,
    flags: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    tab: TabId,
    slot: SlotId,
    item: ItemId,
    count: u32,
}

/// Read commands from a csv script
pub fn read_script(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Command, CsvError>>, CsvError> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            row.into_command(line)
        }))
}

impl InputRow {
    fn into_command(self, line: usize) -> Result<Command, CsvError> {
        let command = match self.r#type.as_str() {
            "member" => Command::Admin(Admin::AddMember {
                member: self.required(line, "member", self.member)?,
                rank: self.required(line, "rank", self.rank)?,
            }),
            "item" => {
                let item = self.required(line, "item", self.item)?;
                let max_stack = self.required(line, "count", self.count)?;
                let mut template = ItemTemplate::new(item, narrow(line, max_stack)?);
                for flag in self.flag_list() {
                    template = match flag {
                        "soulbound" => template.soulbound(),
                        "container" => template.container(),
                        other => return Err(invalid(line, "flags", other)),
                    };
                }
                Command::Admin(Admin::DefineItem(template))
            }
            "tab" => Command::PurchaseTab {
                name: self.flags.clone().unwrap_or_default(),
                icon: String::new(),
            },
            "rights" => {
                let flags = self.flags.as_deref().unwrap_or_default();
                let rights =
                    BankRights::parse(flags).ok_or_else(|| invalid(line, "flags", flags))?;
                let slot_quota = match self.count {
                    Some(count) => Quota::Daily(narrow(line, count)?),
                    None => Quota::Unlimited,
                };
                Command::Admin(Admin::SetTabRights {
                    rank: self.required(line, "rank", self.rank)?,
                    tab: self.required(line, "tab", self.tab)?,
                    rights,
                    slot_quota,
                })
            }
            "gold_quota" => Command::Admin(Admin::SetGoldQuota {
                rank: self.required(line, "rank", self.rank)?,
                quota: self.count.map_or(Quota::Unlimited, |copper| {
                    Quota::Daily(Money::from_copper(copper))
                }),
            }),
            "grant" => Command::Admin(Admin::GrantItem {
                member: self.required(line, "member", self.member)?,
                slot: self.slot,
                item: self.required(line, "item", self.item)?,
                count: narrow(line, self.required(line, "count", self.count)?)?,
                contents: self.bag_contents(line)?,
            }),
            "grant_money" => Command::Admin(Admin::GrantMoney {
                member: self.required(line, "member", self.member)?,
                amount: Money::from_copper(self.required(line, "count", self.count)?),
            }),
            "deposit" => self.transfer(
                line,
                Endpoint::Inventory {
                    slot: Some(self.required(line, "slot", self.slot)?),
                },
                Endpoint::Bank {
                    tab: self.required(line, "to_tab", self.to_tab)?,
                    slot: self.to_slot,
                },
            )?,
            "withdraw" => self.transfer(
                line,
                Endpoint::Bank {
                    tab: self.required(line, "tab", self.tab)?,
                    slot: Some(self.required(line, "slot", self.slot)?),
                },
                Endpoint::Inventory { slot: self.to_slot },
            )?,
            "move" => self.transfer(
                line,
                Endpoint::Bank {
                    tab: self.required(line, "tab", self.tab)?,
                    slot: Some(self.required(line, "slot", self.slot)?),
                },
                Endpoint::Bank {
                    tab: self.required(line, "to_tab", self.to_tab)?,
                    slot: self.to_slot,
                },
            )?,
            "deposit_money" => Command::DepositMoney {
                member: self.required(line, "member", self.member)?,
                amount: Money::from_copper(self.required(line, "count", self.count)?),
            },
            "withdraw_money" => Command::WithdrawMoney {
                member: self.required(line, "member", self.member)?,
                amount: Money::from_copper(self.required(line, "count", self.count)?),
            },
            "tab_text" => Command::SetTabText {
                member: self.required(line, "member", self.member)?,
                tab: self.required(line, "tab", self.tab)?,
                text: self.flags.clone().unwrap_or_default(),
            },
            "reset" => Command::ResetQuotas,
            other => {
                return Err(CsvError::UnrecognizedType {
                    line,
                    kind: other.to_string(),
                });
            }
        };
        Ok(command)
    }

    /// A move row; `count` is the split amount, empty for the whole stack.
    fn transfer(
        &self,
        line: usize,
        source: Endpoint,
        destination: Endpoint,
    ) -> Result<Command, CsvError> {
        let member = self.required(line, "member", self.member)?;
        let split = narrow(line, self.count.unwrap_or(0))?;
        Ok(Command::Move(
            MoveRequest::new(member, source, destination).split(split),
        ))
    }

    fn required<T>(
        &self,
        line: usize,
        field: &'static str,
        value: Option<T>,
    ) -> Result<T, CsvError> {
        value.ok_or_else(|| CsvError::MissingField {
            line,
            kind: self.r#type.clone(),
            field,
        })
    }

    /// `flags` of a grant row: how many items the granted bag already holds.
    fn bag_contents(&self, line: usize) -> Result<u16, CsvError> {
        match self.flags.as_deref() {
            None | Some("") => Ok(0),
            Some(flags) => flags.parse().map_err(|_| invalid(line, "flags", flags)),
        }
    }

    fn flag_list(&self) -> impl Iterator<Item = &str> {
        self.flags
            .as_deref()
            .unwrap_or_default()
            .split('|')
            .map(str::trim)
            .filter(|flag| !flag.is_empty())
    }
}

fn narrow(line: usize, count: u64) -> Result<u32, CsvError> {
    u32::try_from(count).map_err(|_| invalid(line, "count", &count.to_string()))
}

fn invalid(line: usize, field: &'static str, value: &str) -> CsvError {
    CsvError::Invalid {
        line,
        field,
        value: value.to_string(),
    }
}

/// Write bank contents in csv format
pub fn write_bank(
    out: impl io::Write,
    contents: impl IntoIterator<Item = (TabId, SlotId, ItemId, u32)>,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);

    for (tab, slot, item, count) in contents {
        writer.serialize(OutputRow {
            tab,
            slot,
            item,
            count,
        })?;
    }

    writer.flush()?;
    Ok(())
}

/// One journal line; a committed batch spans consecutive lines sharing `batch`.
#[derive(Debug, Default, Serialize)]
struct JournalRow {
    batch: u64,
    write: &'static str,
    member: Option<MemberId>,
    tab: Option<TabId>,
    slot: Option<SlotId>,
    to_tab: Option<TabId>,
    item: Option<ItemId>,
    count: Option<u32>,
    guid: Option<u64>,
    amount: Option<Money>,
    event: Option<AuditKind>,
    timestamp: Option<u64>,
    text: Option<String>,
}

impl JournalRow {
    fn new(batch: u64, write: &Write) -> Self {
        let row = JournalRow {
            batch,
            ..JournalRow::default()
        };
        match write {
            Write::BankSlot { tab, slot, stack } => JournalRow {
                write: "bank_slot",
                tab: Some(*tab),
                slot: Some(*slot),
                ..row.with_stack(stack.as_ref())
            },
            Write::InventorySlot {
                member,
                slot,
                stack,
            } => JournalRow {
                write: "inventory_slot",
                member: Some(*member),
                slot: Some(*slot),
                ..row.with_stack(stack.as_ref())
            },
            Write::TabInfo {
                tab,
                name,
                icon,
                text,
            } => JournalRow {
                write: "tab_info",
                tab: Some(*tab),
                text: Some(format!("{name}|{icon}|{text}")),
                ..row
            },
            Write::WithdrawnSlots { member, tab, count } => JournalRow {
                write: "withdrawn_slots",
                member: Some(*member),
                tab: Some(*tab),
                count: Some(*count),
                ..row
            },
            Write::WithdrawnMoney { member, amount } => JournalRow {
                write: "withdrawn_money",
                member: Some(*member),
                amount: Some(*amount),
                ..row
            },
            Write::BankMoney(amount) => JournalRow {
                write: "bank_money",
                amount: Some(*amount),
                ..row
            },
            Write::MemberMoney { member, amount } => JournalRow {
                write: "member_money",
                member: Some(*member),
                amount: Some(*amount),
                ..row
            },
            Write::Audit(entry) => row.with_audit(entry),
        }
    }

    fn with_stack(self, stack: Option<&Stack>) -> Self {
        match stack {
            Some(stack) => JournalRow {
                item: Some(stack.item),
                count: Some(stack.count),
                guid: Some(stack.guid.0),
                ..self
            },
            None => self,
        }
    }

    fn with_audit(self, entry: &AuditEntry) -> Self {
        let tab = match entry.channel {
            AuditChannel::Tab(tab) => Some(tab),
            AuditChannel::Money => None,
        };
        let row = JournalRow {
            write: "audit",
            member: Some(entry.actor),
            tab,
            to_tab: entry.dest_tab,
            event: Some(entry.kind),
            timestamp: Some(entry.timestamp),
            ..self
        };
        match entry.subject {
            AuditSubject::Item { item, count } => JournalRow {
                item: Some(item),
                count: Some(count),
                ..row
            },
            AuditSubject::Money(amount) => JournalRow {
                amount: Some(amount),
                ..row
            },
        }
    }
}

/// Appends every committed write set to a csv journal.
pub struct CsvJournal<W: io::Write> {
    writer: csv::Writer<W>,
    batch: u64,
}

impl CsvJournal<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: io::Write> CsvJournal<W> {
    pub fn new(out: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(out),
            batch: 0,
        }
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }
}

impl<W: io::Write + Send> Persistence for CsvJournal<W> {
    fn commit(&mut self, writes: &[Write]) -> Result<(), PersistError> {
        self.batch += 1;
        for write in writes {
            self.writer.serialize(JournalRow::new(self.batch, write))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
