use std::{env, io, process};

use guild_bank::csv::{CsvJournal, read_script, write_bank};
use guild_bank::engine::{MemoryStore, Persistence};
use guild_bank::{BankConfig, Guild};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let path = env::args().nth(1).expect("usage: guild-bank <script.csv>");

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let config = match BankConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            process::exit(2);
        }
    };

    let store: Box<dyn Persistence> = match &config.journal {
        Some(journal) => match CsvJournal::create(journal) {
            Ok(journal) => Box::new(journal),
            Err(e) => {
                error!(journal = %journal.display(), "{e}");
                process::exit(2);
            }
        },
        None => Box::new(MemoryStore::default()),
    };

    let script = match read_script(path.clone()) {
        Ok(script) => script,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let mut guild = Guild::with_persistence(config, store);
    let (command_sender, command_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in script {
            match result {
                Ok(command) => {
                    if command_sender.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    guild.run(ReceiverStream::new(command_receiver)).await;

    write_bank(io::stdout().lock(), guild.bank_contents()).expect("failed to write bank contents");
}
