// src/config.rs

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "miragemod")]
#[command(author, version, about = "Figment counter - bridges channel-point redemptions on a Kilovolt broker to chat")]
pub struct Args {
    /// Address:port to connect to
    #[arg(long, default_value = "http://localhost:4337/ws")]
    pub endpoint: String,

    /// Optional Authorization bearer token
    #[arg(long, default_value = "")]
    pub auth: String,

    /// Prefix/Namespace for the ledger key
    #[arg(long, default_value = "mirage/")]
    pub prefix: String,

    /// Reward ID to check for
    #[arg(long, default_value = "a715bd7d-9454-4ff4-b91f-f74ffc97d63f")]
    pub reward: String,

    /// Optional password for Kilovolt
    #[arg(long, default_value = "")]
    pub password: String,
}

impl Args {
    /// Broker key holding the persisted figment ledger. The prefix applies to
    /// this key only; the chat and webhook keys live in other modules'
    /// namespaces.
    pub fn ledger_key(&self) -> String {
        format!("{}figments", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_conventions() {
        let args = Args::parse_from(["miragemod"]);
        assert_eq!(args.endpoint, "http://localhost:4337/ws");
        assert_eq!(args.prefix, "mirage/");
        assert_eq!(args.ledger_key(), "mirage/figments");
        assert!(args.auth.is_empty());
        assert!(args.password.is_empty());
    }

    #[test]
    fn prefix_flag_moves_the_ledger_key() {
        let args = Args::parse_from(["miragemod", "--prefix", "staging/"]);
        assert_eq!(args.ledger_key(), "staging/figments");
    }
}
