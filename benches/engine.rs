use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use guild_bank::engine::{PersistError, Persistence, Quota, TabProfile, Write};
use guild_bank::model::{Admin, ItemTemplate};
use guild_bank::{BankConfig, Command, Endpoint, Guild, MemberId, Money, MoveRequest};

const ORE: u32 = 100;
const RANK: u8 = 1;

/// Accepts every write set without keeping it.
struct Discard;

impl Persistence for Discard {
    fn commit(&mut self, _writes: &[Write]) -> Result<(), PersistError> {
        Ok(())
    }
}

/// A guild where every member holds one ore stack in inventory slot 0.
fn guild(members: MemberId) -> Guild<Discard> {
    let config = BankConfig {
        slots_per_tab: 98,
        ..BankConfig::default()
    };
    let mut guild = Guild::with_persistence(config, Discard);
    guild.purchase_tab("Main".into(), String::new()).unwrap();
    guild.define_item(ItemTemplate::new(ORE, 20));
    guild.set_tab_profile(RANK, 0, TabProfile::FULL);
    guild.set_gold_quota(RANK, Quota::Unlimited);
    for member in 1..=members {
        guild.add_member(member, RANK);
        guild
            .apply(Command::Admin(Admin::GrantItem {
                member,
                slot: Some(0),
                item: ORE,
                count: 10,
                contents: 0,
            }))
            .unwrap();
        guild
            .apply(Command::Admin(Admin::GrantMoney {
                member,
                amount: Money::from_gold(100, 0, 0),
            }))
            .unwrap();
    }
    guild
}

/// Generates valid move sequences for benchmarking.
///
/// Pattern per member (repeating):
/// 1. Deposit inventory slot 0 into the member's own bank slot
/// 2. Withdraw that bank slot back into inventory slot 0
///
/// Members own distinct bank slots, so no move is ever rejected.
pub struct MoveGenerator {
    members: MemberId,
    moves_per_member: u32,
    current_member: MemberId,
    current_step: u32,
}

impl MoveGenerator {
    pub fn new(members: MemberId, moves_per_member: u32) -> Self {
        Self {
            members,
            moves_per_member,
            current_member: 1,
            current_step: 0,
        }
    }
}

impl Iterator for MoveGenerator {
    type Item = Command;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_member > self.members {
            return None;
        }

        let member = self.current_member;
        let bank = Endpoint::bank(0, (member - 1) as u8);
        let inventory = Endpoint::inventory(0);
        let request = match self.current_step % 2 {
            0 => MoveRequest::new(member, inventory, bank),
            _ => MoveRequest::new(member, bank, inventory),
        };

        self.current_step += 1;

        // Move to next member after moves_per_member moves
        if self.current_step >= self.moves_per_member {
            self.current_step = 0;
            self.current_member += 1;
        }

        Some(Command::Move(request))
    }
}

fn bench_single_member(c: &mut Criterion) {
    let mut group = c.benchmark_group("moves");

    for count in [10_000u32, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut guild = guild(1);
                for command in MoveGenerator::new(1, count) {
                    let _ = black_box(guild.apply(command));
                }
                guild
            });
        });
    }

    group.finish();
}

fn bench_many_members(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed");

    for (members, moves_per) in [(90, 1_000), (10, 10_000)] {
        let label = format!("{members}m_{moves_per}mv");
        group.bench_with_input(
            BenchmarkId::from_parameter(&label),
            &(members, moves_per),
            |b, &(members, moves_per)| {
                b.iter(|| {
                    let mut guild = guild(members);
                    for command in MoveGenerator::new(members, moves_per) {
                        let _ = black_box(guild.apply(command));
                    }
                    guild
                });
            },
        );
    }

    group.finish();
}

fn bench_money(c: &mut Criterion) {
    let mut group = c.benchmark_group("money");

    group.bench_function("100k_deposit_withdraw", |b| {
        b.iter(|| {
            let mut guild = guild(10);
            for round in 0..10_000u32 {
                for member in 1..=10 {
                    let amount = Money::from_copper(u64::from(round % 50) + 1);
                    let command = if round % 2 == 0 {
                        Command::DepositMoney { member, amount }
                    } else {
                        Command::WithdrawMoney { member, amount }
                    };
                    let _ = black_box(guild.apply(command));
                }
            }
            guild
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_member,
    bench_many_members,
    bench_money
);
criterion_main!(benches);
