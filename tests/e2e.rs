use std::process::Command;

const CONFIG_KEYS: [&str; 6] = [
    "GUILD_BANK_MAX_TABS",
    "GUILD_BANK_SLOTS_PER_TAB",
    "GUILD_BANK_INVENTORY_SLOTS",
    "GUILD_BANK_LOG_CAPACITY",
    "GUILD_BANK_REORDER_NEEDS_DEPOSIT_OR_WITHDRAW",
    "GUILD_BANK_JOURNAL",
];

fn bank(fixture: &str, env: &[(&str, &str)]) -> (String, String, bool) {
    let path = format!("tests/fixtures/{fixture}");
    let mut command = Command::new(env!("CARGO_BIN_EXE_guild-bank"));
    command.arg(&path).env("RUST_LOG", "warn");
    for key in CONFIG_KEYS {
        command.env_remove(key);
    }
    command.envs(env.iter().copied());
    let output = command.output().expect("failed to run binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn run(fixture: &str) -> (String, String, bool) {
    bank(fixture, &[])
}

#[test]
fn valid_script() {
    let (stdout, stderr, success) = run("valid.csv");

    assert!(success);
    assert!(stderr.is_empty(), "unexpected stderr: {stderr}");

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec!["tab,slot,item,count", "0,0,100,17", "0,1,100,5"]
    );
}

#[test]
fn errors_warn_but_do_not_block() {
    let (stdout, stderr, success) = run("with_errors.csv");

    assert!(success);
    assert!(stderr.contains("unrecognized command type"));
    assert!(stderr.contains("deposit missing slot"));
    assert!(stderr.contains("rights row ignored"));

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["tab,slot,item,count", "0,0,100,10"]);
}

#[test]
fn journal_records_committed_writes() {
    let dir = tempfile::tempdir().unwrap();
    let journal = dir.path().join("journal.csv");
    let journal_path = journal.to_str().unwrap();

    let (_, _, success) = bank("valid.csv", &[("GUILD_BANK_JOURNAL", journal_path)]);

    assert!(success);
    let text = std::fs::read_to_string(&journal).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("batch,write,"));
    assert!(text.contains(",tab_info,"));
    assert!(text.contains(",withdrawn_slots,2,0,"));
    assert!(text.contains("withdraw_item"));
    assert!(text.contains("deposit_money"));
}

#[test]
fn small_tabs_overflow_to_bank_full() {
    let (stdout, _, success) = bank("valid.csv", &[("GUILD_BANK_SLOTS_PER_TAB", "1")]);

    assert!(success);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["tab,slot,item,count", "0,0,100,17"]);
}

#[test]
fn invalid_config_fails() {
    let (stdout, stderr, success) = bank("valid.csv", &[("GUILD_BANK_MAX_TABS", "lots")]);

    assert!(!success);
    assert!(stdout.is_empty());
    assert!(stderr.contains("GUILD_BANK_MAX_TABS"));
}
