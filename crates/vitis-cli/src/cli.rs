use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "vitis")]
#[command(about = "Vitis cache administration: statistics, clearing, fallback files")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to vitis.toml when present)
    #[arg(short, long, global = true, env = "VITIS_CONFIG")]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Log at debug level regardless of configuration
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show per-layer cache statistics and overall health
    Stats,
    /// Delete remote cache entries
    Clear(ClearArgs),
    /// Check that every mapped fallback file exists
    Validate,
    /// List endpoints, sub-options and their fallback files
    Endpoints,
    /// Parse every present fallback file and report the parsed-file memo
    Memo(MemoArgs),
    /// Retrieve one dataset through the full cache cascade
    Get(GetArgs),
}

#[derive(clap::Args)]
pub struct ClearArgs {
    /// Only clear entries of this endpoint
    #[arg(short, long)]
    pub endpoint: Option<String>,
    /// Which remote layers to clear: short, fallback or all
    #[arg(long, default_value = "all")]
    pub scope: String,
}

#[derive(clap::Args)]
pub struct MemoArgs {
    /// Drop expired entries and trim the memo to its LRU threshold
    #[arg(long)]
    pub optimize: bool,
    /// Optimize even when the memo is below its threshold
    #[arg(long, requires = "optimize")]
    pub force: bool,
    /// Drop every memo entry after reporting
    #[arg(long)]
    pub clear: bool,
}

#[derive(clap::Args)]
pub struct GetArgs {
    /// Endpoint name (e.g. producao)
    pub endpoint: String,
    /// Year filter
    #[arg(short, long)]
    pub year: Option<String>,
    /// Sub-option (e.g. "VINHO DE MESA" or americanas)
    #[arg(short, long)]
    pub sub_option: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_get_with_filters() {
        let cli = Cli::try_parse_from([
            "vitis",
            "get",
            "producao",
            "--year",
            "2023",
            "--sub-option",
            "VINHO DE MESA",
            "--format",
            "table",
        ])
        .unwrap();
        let Commands::Get(args) = cli.command else {
            panic!("expected get");
        };
        assert_eq!(args.endpoint, "producao");
        assert_eq!(args.year.as_deref(), Some("2023"));
        assert_eq!(args.sub_option.as_deref(), Some("VINHO DE MESA"));
        assert!(matches!(cli.format, Some(OutputFormat::Table)));
    }

    #[test]
    fn clear_defaults_to_all_layers() {
        let cli = Cli::try_parse_from(["vitis", "clear", "-e", "exportacao"]).unwrap();
        let Commands::Clear(args) = cli.command else {
            panic!("expected clear");
        };
        assert_eq!(args.scope, "all");
        assert_eq!(args.endpoint.as_deref(), Some("exportacao"));
    }

    #[test]
    fn memo_force_requires_optimize() {
        assert!(Cli::try_parse_from(["vitis", "memo", "--force"]).is_err());

        let cli = Cli::try_parse_from(["vitis", "memo", "--optimize", "--force", "--clear"]).unwrap();
        let Commands::Memo(args) = cli.command else {
            panic!("expected memo");
        };
        assert!(args.optimize && args.force && args.clear);
    }
}
