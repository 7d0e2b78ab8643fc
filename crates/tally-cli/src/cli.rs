use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tally_core::{EntityType, MutationAction};

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Record point-of-sale mutations offline and push them to the server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Append a mutation to the local log
    Record {
        /// Entity type, e.g. orders or stock-history
        #[arg(value_parser = parse_entity)]
        entity: EntityType,
        /// Mutation kind
        #[arg(long, value_enum, default_value_t = ActionArg::Insert)]
        action: ActionArg,
        /// JSON document (insert) or {"filter": ..., "update": ...} (update); `-` reads stdin
        data: String,
    },
    /// Push pending mutations once
    Push {
        /// Entity types to push (all configured entities when omitted)
        #[arg(short, long = "entity", value_parser = parse_entity, value_name = "ENTITY")]
        entities: Vec<EntityType>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Push periodically until interrupted
    Run {
        /// Seconds between cycles (defaults to TALLY_PUSH_INTERVAL_SECS)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Show pending mutations and outstanding requests per entity
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recent sync requests
    Requests {
        /// Only show requests for this entity type
        #[arg(long, value_parser = parse_entity)]
        entity: Option<EntityType>,
        /// Number of requests to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check that the configured R2 media bucket is reachable
    MediaCheck,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ActionArg {
    Insert,
    Update,
}

impl From<ActionArg> for MutationAction {
    fn from(action: ActionArg) -> Self {
        match action {
            ActionArg::Insert => Self::Insert,
            ActionArg::Update => Self::Update,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

pub fn parse_entity(raw: &str) -> Result<EntityType, String> {
    raw.parse::<EntityType>().map_err(|_| {
        let known = EntityType::ALL
            .iter()
            .map(|entity| entity.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!("unknown entity type '{raw}' (expected one of: {known})")
    })
}
