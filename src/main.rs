// Entry point for the node binary: one long-running command and a few
// read-only queries against the node's database
use clap::Parser;
use crossbeam_channel::bounded;
use log::{error, info, LevelFilter};
use serde_json::json;
use std::process;
use tangle_relay::core::{balance, inclusion_states, were_addresses_spent_from};
use tangle_relay::storage::{Store, Tag};
use tangle_relay::utils::hex_decode;
use tangle_relay::{Command, Config, Node, Opt};

fn main() {
    let opt = Opt::parse();

    // Info by default; RUST_LOG still wins when set
    let level = if opt.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::builder()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = run(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };
    config.validate()?;
    Ok(config)
}

fn decode_all(values: &[String]) -> Result<Vec<Vec<u8>>, Box<dyn std::error::Error>> {
    Ok(values
        .iter()
        .map(|v| hex_decode(v))
        .collect::<Result<Vec<_>, _>>()?)
}

fn run(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(opt.config.as_deref())?;
    match opt.command {
        Command::StartNode => {
            let mut node = Node::new(config)?;
            node.start()?;
            let (signal_tx, signal_rx) = bounded::<()>(1);
            ctrlc::set_handler(move || {
                let _ = signal_tx.try_send(());
            })?;
            info!("Node running, press Ctrl-C to stop");
            node.run_until(&signal_rx)?;
        }
        Command::InclusionStates { hashes } => {
            let store = Store::open(&config.storage.path)?;
            let states = inclusion_states(&store, &decode_all(&hashes)?)?;
            println!("{}", json!({ "states": states }));
        }
        Command::SpentFrom { addresses } => {
            let store = Store::open(&config.storage.path)?;
            let states = were_addresses_spent_from(&store, &decode_all(&addresses)?)?;
            println!("{}", json!({ "states": states }));
        }
        Command::Balance { address } => {
            let store = Store::open(&config.storage.path)?;
            let balance = balance(&store, &hex_decode(&address)?)?;
            println!("{}", json!({ "address": address, "balance": balance }));
        }
        Command::Pending => {
            let store = Store::open(&config.storage.path)?;
            let mut pending = Vec::new();
            for (key, hash) in store.entries_with_tag(Tag::PendingHash)? {
                let timestamp = store.get_value::<i64>(&key.with_tag(Tag::PendingTimestamp))?;
                pending.push(json!({ "hash": hex::encode(hash), "timestamp": timestamp }));
            }
            println!("{}", serde_json::to_string_pretty(&pending)?);
        }
    }
    Ok(())
}
