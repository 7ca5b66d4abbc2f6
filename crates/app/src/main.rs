use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tally_core::{MatchKind, SemanticField, TransformRule};
use tally_storage::{ProfileRepository, SqliteStore};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "tally", about = "Normalize bank and card statement exports.")]
struct Cli {
    /// Settings database (default: <data dir>/tally.db)
    #[arg(long, env = "TALLY_DB", global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage source profiles.
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Add or remove transform rules on a profile.
    Rule {
        #[command(subcommand)]
        command: RuleCommands,
    },
    /// Ingest statement files through a profile and print the result.
    Import {
        profile: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the column headers of a statement file with their indices.
    Columns {
        file: PathBuf,
        /// File is tab-separated
        #[arg(long)]
        tab: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Load a profile from a TOML or JSON file and save it.
    Add { file: PathBuf },
    List,
    Show { name: String },
    Remove { name: String },
}

#[derive(Subcommand)]
enum RuleCommands {
    Add(RuleArgs),
    /// Remove the first rule equal to the one described.
    Remove(RuleArgs),
}

#[derive(Args)]
struct RuleArgs {
    profile: String,
    /// Field the rule rewrites (e.g. Category, Description)
    #[arg(long)]
    field: SemanticField,
    #[arg(long = "match")]
    match_value: String,
    /// Require equality instead of substring match
    #[arg(long)]
    exact: bool,
    #[arg(long)]
    replace: String,
    /// Only apply when this field also matches `--when`
    #[arg(long, requires = "when")]
    when_field: Option<SemanticField>,
    #[arg(long, requires = "when_field")]
    when: Option<String>,
    #[arg(long)]
    when_exact: bool,
}

fn kind(exact: bool) -> MatchKind {
    if exact {
        MatchKind::ExactEquals
    } else {
        MatchKind::Contains
    }
}

impl RuleArgs {
    fn to_rule(&self) -> TransformRule {
        let rule = TransformRule::new(
            self.field,
            kind(self.exact),
            self.match_value.as_str(),
            self.replace.as_str(),
        );
        match (self.when_field, &self.when) {
            (Some(field), Some(value)) => rule.when(field, kind(self.when_exact), value.as_str()),
            _ => rule,
        }
    }
}

fn default_db_path() -> Result<PathBuf> {
    let project_dirs = directories::ProjectDirs::from("com", "tally", "Tally")
        .context("Failed to get app directory")?;
    let data_dir = project_dirs.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
    Ok(data_dir.join("tally.db"))
}

async fn open_repository(db: Option<PathBuf>) -> Result<ProfileRepository<SqliteStore>> {
    let path = match db {
        Some(path) => path,
        None => default_db_path()?,
    };
    let store = SqliteStore::open(&path)
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    Ok(ProfileRepository::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Columns { file, tab } = &cli.command {
        return commands::columns(file, *tab);
    }

    let repo = open_repository(cli.db).await?;
    match cli.command {
        Commands::Profile { command } => match command {
            ProfileCommands::Add { file } => commands::profile_add(&repo, &file).await,
            ProfileCommands::List => commands::profile_list(&repo).await,
            ProfileCommands::Show { name } => commands::profile_show(&repo, &name).await,
            ProfileCommands::Remove { name } => commands::profile_remove(&repo, &name).await,
        },
        Commands::Rule { command } => match command {
            RuleCommands::Add(args) => commands::rule_add(&repo, &args.profile, args.to_rule()).await,
            RuleCommands::Remove(args) => {
                commands::rule_remove(&repo, &args.profile, &args.to_rule()).await
            }
        },
        Commands::Import { profile, files } => commands::import(&repo, &profile, &files).await,
        Commands::Columns { .. } => Ok(()),
    }
}
