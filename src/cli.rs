use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "benchboard",
    version,
    about = "Benchmark leaderboard aggregation over a local metadata store"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Import(ImportArgs),
    Table(TableArgs),
    Plots(PlotsArgs),
    List(ListArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[arg(long, default_value = ".cache/benchboard")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub input: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct TableArgs {
    #[arg(long, default_value = ".cache/benchboard")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub registry_path: Option<PathBuf>,

    #[arg(long)]
    pub benchmark: String,

    #[arg(long, default_value_t = false)]
    pub by_creator: bool,

    #[arg(long, default_value_t = 1000)]
    pub plot_ttl_ms: u64,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PlotsArgs {
    #[arg(long, default_value = ".cache/benchboard")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub registry_path: Option<PathBuf>,

    #[arg(long)]
    pub benchmark: String,

    #[arg(long, default_value_t = 1000)]
    pub plot_ttl_ms: u64,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(long, default_value = ".cache/benchboard")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub parent: Option<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/benchboard")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub registry_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Commands};

    #[test]
    fn table_command_defaults() {
        let cli = Cli::try_parse_from(["benchboard", "table", "--benchmark", "mt"])
            .expect("table args should parse");
        let Commands::Table(args) = cli.command else {
            panic!("expected table command");
        };
        assert_eq!(args.benchmark, "mt");
        assert_eq!(args.cache_root.to_str(), Some(".cache/benchboard"));
        assert_eq!(args.plot_ttl_ms, 1000);
        assert!(!args.by_creator);
        assert!(args.db_path.is_none());
    }

    #[test]
    fn import_requires_input() {
        assert!(Cli::try_parse_from(["benchboard", "import"]).is_err());
    }
}
