use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "tangle-relay")]
pub struct Opt {
    #[arg(long, short, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<String>,
    #[arg(long, short, global = true, help = "Log at debug level")]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "start-node", about = "Run the node until interrupted")]
    StartNode,
    #[command(
        name = "inclusion-states",
        about = "Print whether each transaction is confirmed"
    )]
    InclusionStates {
        #[arg(required = true, help = "Hex-encoded transaction hashes")]
        hashes: Vec<String>,
    },
    #[command(
        name = "spent-from",
        about = "Print whether each address has a confirmed spend"
    )]
    SpentFrom {
        #[arg(required = true, help = "Hex-encoded addresses")]
        addresses: Vec<String>,
    },
    #[command(name = "balance", about = "Print the confirmed balance of an address")]
    Balance {
        #[arg(help = "Hex-encoded address")]
        address: String,
    },
    #[command(name = "pending", about = "List persisted pending requests")]
    Pending,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_commands() {
        let opt = Opt::parse_from(["tangle-relay", "balance", "abcd", "--config", "node.toml"]);
        assert_eq!(opt.config.as_deref(), Some("node.toml"));
        assert!(matches!(opt.command, Command::Balance { ref address } if address == "abcd"));

        let opt = Opt::parse_from(["tangle-relay", "-v", "inclusion-states", "aa", "bb"]);
        assert!(opt.verbose);
        match opt.command {
            Command::InclusionStates { hashes } => assert_eq!(hashes, vec!["aa", "bb"]),
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Opt::try_parse_from(["tangle-relay", "spent-from"]).is_err());
    }
}
