//! # vectcode CLI
//!
//! ```bash
//! vectcode init
//! vectcode index --path ~/src/billing --name billing --group payments
//! vectcode search --query "retry failed charge" --group payments
//! vectcode stale --name billing
//! ```
//!
//! Results go to stdout. Logs go to stderr and follow `RUST_LOG`.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env, Target};
use std::path::PathBuf;

use vectcode::commands;
use vectcode::config;
use vectcode::indexer::IndexRequest;
use vectcode::search::SearchScope;

/// vectcode: structural indexing and semantic search for Go code.
#[derive(Parser)]
#[command(name = "vectcode", version, about)]
struct Cli {
    /// Path to the configuration file (TOML).
    ///
    /// Defaults to `~/.vectcode/config.toml`. A missing file means defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only log warnings and errors.
    #[arg(long, short, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug output.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create both databases and run migrations. Safe to repeat.
    Init,

    /// Index a Go project.
    ///
    /// Extracts every top-level function, method and type, embeds them and
    /// stores them. Without `--clean`, chunks for code that no longer exists
    /// are kept.
    Index {
        /// Project root directory.
        #[arg(long)]
        path: PathBuf,

        /// Project name. Defaults to the directory name.
        #[arg(long)]
        name: Option<String>,

        /// Assign the project to this group, creating it if needed.
        #[arg(long)]
        group: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Delete the project's existing data before indexing.
        #[arg(long)]
        clean: bool,
    },

    /// Semantic search over indexed code.
    Search {
        #[arg(long)]
        query: String,

        #[arg(long, default_value_t = 5)]
        limit: usize,

        /// Restrict to one project.
        #[arg(long, conflicts_with = "group")]
        project: Option<String>,

        /// Restrict to the projects of one group.
        #[arg(long)]
        group: Option<String>,
    },

    /// List indexed projects.
    List {
        #[arg(long)]
        group: Option<String>,

        #[arg(long)]
        detailed: bool,
    },

    /// Show details for one project.
    Info {
        #[arg(long)]
        name: String,
    },

    /// List files modified since they were last indexed.
    Stale {
        #[arg(long)]
        name: String,
    },

    /// Remove a project from the vector store and the tracker.
    Delete {
        #[arg(long)]
        name: String,
    },

    /// Manage project groups.
    Group {
        #[command(subcommand)]
        action: GroupAction,
    },
}

#[derive(Subcommand)]
enum GroupAction {
    Create {
        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        description: String,
    },
    List,
    /// Delete a group. Its projects are kept and become unassigned.
    Delete {
        #[arg(long)]
        name: String,
    },
}

fn init_logging(quiet: bool, verbose: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    Builder::from_env(Env::default().default_filter_or(level))
        .target(Target::Stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let config_path = cli.config.unwrap_or_else(config::default_config_path);
    let cfg = config::load_or_default(&config_path)?;

    match cli.command {
        Commands::Init => commands::run_init(&cfg).await?,
        Commands::Index {
            path,
            name,
            group,
            description,
            clean,
        } => {
            let name = commands::project_name(&path, name)?;
            let request = IndexRequest {
                path,
                name,
                group,
                description,
                clean,
            };
            commands::run_index(&cfg, &request).await?;
        }
        Commands::Search {
            query,
            limit,
            project,
            group,
        } => {
            if limit == 0 {
                bail!("--limit must be at least 1");
            }
            let scope = match (project, group) {
                (Some(project), _) => SearchScope::Project(project),
                (None, Some(group)) => SearchScope::Group(group),
                (None, None) => SearchScope::All,
            };
            commands::run_search(&cfg, &query, limit, &scope).await?;
        }
        Commands::List { group, detailed } => commands::run_list(&cfg, group, detailed).await?,
        Commands::Info { name } => commands::run_info(&cfg, &name).await?,
        Commands::Stale { name } => commands::run_stale(&cfg, &name).await?,
        Commands::Delete { name } => commands::run_delete(&cfg, &name).await?,
        Commands::Group { action } => match action {
            GroupAction::Create { name, description } => {
                commands::run_group_create(&cfg, &name, &description).await?
            }
            GroupAction::List => commands::run_group_list(&cfg).await?,
            GroupAction::Delete { name } => commands::run_group_delete(&cfg, &name).await?,
        },
    }

    Ok(())
}
