use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "keva",
    about = "Keva: namespaced key-value state projected from a ledger",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Node configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a scenario script against in-memory nodes
    Run(RunArgs),
    /// Run a scenario script, then write a snapshot of confirmed state
    Dump(DumpArgs),
    /// Print the effective node configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct RunArgs {
    pub script: PathBuf,
}

#[derive(Args)]
pub struct DumpArgs {
    pub script: PathBuf,
    pub out: PathBuf,
    /// Which node's state to export
    #[arg(long, default_value = "0")]
    pub node: usize,
}

#[derive(Args)]
pub struct ConfigArgs {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run() {
        let cli = Cli::try_parse_from(["keva", "run", "scenario.json"]).unwrap();
        if let Command::Run(args) = cli.command {
            assert_eq!(args.script, PathBuf::from("scenario.json"));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_dump_with_node() {
        let cli = Cli::try_parse_from(["keva", "dump", "s.json", "out.snap", "--node", "1"]).unwrap();
        if let Command::Dump(args) = cli.command {
            assert_eq!(args.out, PathBuf::from("out.snap"));
            assert_eq!(args.node, 1);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn dump_requires_output() {
        assert!(Cli::try_parse_from(["keva", "dump", "s.json"]).is_err());
    }

    #[test]
    fn parse_config_flag() {
        let cli = Cli::try_parse_from(["keva", "--config", "node.toml", "config"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("node.toml")));
        assert!(matches!(cli.command, Command::Config(_)));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["keva", "--verbose", "run", "s.json"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["keva", "--format", "json", "run", "s.json"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
